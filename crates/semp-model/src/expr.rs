//! Linear expressions and constraint rows
//!
//! The assembly layer works on plain column indices so that constraint
//! generation stays independent of any solver library; lowering to the
//! backend happens once, in [`crate::solve`]. Expressions accumulate
//! coefficients per column, merging repeated terms.

use indexmap::IndexMap;

/// A linear expression `Σ coef·x[col] + constant` over catalog columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: IndexMap<usize, f64>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-term convenience constructor.
    pub fn term(col: usize, coef: f64) -> Self {
        let mut e = Self::new();
        e.add(col, coef);
        e
    }

    /// Add `coef·x[col]`, merging with any existing coefficient.
    pub fn add(&mut self, col: usize, coef: f64) {
        *self.terms.entry(col).or_insert(0.0) += coef;
    }

    pub fn add_constant(&mut self, c: f64) {
        self.constant += c;
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.terms.iter().map(|(&c, &v)| (c, v))
    }

    pub fn coefficient(&self, col: usize) -> f64 {
        *self.terms.get(&col).unwrap_or(&0.0)
    }

    /// Evaluate the expression against a dense column-value vector.
    pub fn value_in(&self, values: &[f64]) -> f64 {
        self.iter().map(|(col, coef)| coef * values[col]).sum::<f64>() + self.constant
    }
}

/// Constraint sense, always stated against zero: `expr op 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Le,
    Ge,
}

/// Constraint family tag, used for labelling, dual-value grouping and
/// assembly diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    ReserveAggregation,
    EnergyBalance,
    MarketBalance,
    MarketBalanceIntraday,
    MarketBalanceRealTime,
    IntradayCap,
    NonAnticipativity,
    ConversionOut,
    ConversionIn,
    Ramping,
    ExcessHeat,
    ShiftWindow,
    ShiftZeroOutside,
    ShiftCap,
    ShiftReserveDemandCap,
    ShiftReserveSocUp,
    ShiftReserveSocDwn,
    ReserveLimit,
    ReserveStorageGuard,
    ReserveActivation,
    ChargeRateLimit,
    SocDynamics,
    SocEndOfHorizon,
    SocLimit,
    SupplyLimit,
    ExportCap,
    PeakDraw,
    CapexTech,
    CapexStorage,
    EmissionCap,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::ReserveAggregation => "reserve_aggregation",
            Family::EnergyBalance => "energy_balance",
            Family::MarketBalance => "market_balance",
            Family::MarketBalanceIntraday => "market_balance_id",
            Family::MarketBalanceRealTime => "market_balance_rt",
            Family::IntradayCap => "intraday_cap",
            Family::NonAnticipativity => "non_anticipativity",
            Family::ConversionOut => "conversion_out",
            Family::ConversionIn => "conversion_in",
            Family::Ramping => "ramping",
            Family::ExcessHeat => "excess_heat",
            Family::ShiftWindow => "shift_window",
            Family::ShiftZeroOutside => "shift_zero_outside",
            Family::ShiftCap => "shift_cap",
            Family::ShiftReserveDemandCap => "shift_reserve_demand_cap",
            Family::ShiftReserveSocUp => "shift_reserve_soc_up",
            Family::ShiftReserveSocDwn => "shift_reserve_soc_dwn",
            Family::ReserveLimit => "reserve_limit",
            Family::ReserveStorageGuard => "reserve_storage_guard",
            Family::ReserveActivation => "reserve_activation",
            Family::ChargeRateLimit => "charge_rate_limit",
            Family::SocDynamics => "soc_dynamics",
            Family::SocEndOfHorizon => "soc_end_of_horizon",
            Family::SocLimit => "soc_limit",
            Family::SupplyLimit => "supply_limit",
            Family::ExportCap => "export_cap",
            Family::PeakDraw => "peak_draw",
            Family::CapexTech => "capex_tech",
            Family::CapexStorage => "capex_storage",
            Family::EmissionCap => "emission_cap",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated constraint: `expr op 0`, uniquely labelled within the
/// instance by family plus index tuple.
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub label: String,
    pub family: Family,
    pub expr: LinearExpr,
    pub op: ComparisonOp,
}

impl ConstraintRow {
    pub fn new(family: Family, label: String, expr: LinearExpr, op: ComparisonOp) -> Self {
        Self { label, family, expr, op }
    }
}
