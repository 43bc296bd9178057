//! Decision variable catalog
//!
//! Every decision variable of the assembled LP is declared here, keyed by a
//! typed [`VarKey`] and mapped to a dense column index. The index domains
//! come from the registry and the scenario tree: market and reserve
//! positions exist at every node (non-anticipativity equalities tie them
//! along the tree), conversion flows exist only for the legal
//! `(technology, carrier, mode)` relation triples.
//!
//! Expansion variables are frozen at zero unless the corresponding
//! [`CatalogOptions`] flag opens them, so a dispatch-only run can never
//! invest by accident.

use indexmap::IndexMap;
use semp_core::{
    CarrierId, LoadId, ModeId, MonthId, NodeId, Registry, ScenarioTree, SempError, SempResult,
    TechId,
};

/// Typed identity of one decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKey {
    /// Day-ahead market position `x_DA[n,t]`
    DayAhead { n: NodeId, t: usize },
    /// Intraday upward adjustment `x_ID_Up[n,t]`
    IntradayUp { n: NodeId, t: usize },
    /// Intraday downward adjustment `x_ID_Dwn[n,t]`
    IntradayDwn { n: NodeId, t: usize },
    /// Real-time upward adjustment `x_RT_Up[n,t]`
    RealTimeUp { n: NodeId, t: usize },
    /// Real-time downward adjustment `x_RT_Dwn[n,t]`
    RealTimeDwn { n: NodeId, t: usize },
    /// Reserved up-regulation capacity `x_UP[n,t,b]`
    ReserveUp { n: NodeId, t: usize, b: LoadId },
    /// Reserved down-regulation capacity `x_DWN[n,t,b]`
    ReserveDwn { n: NodeId, t: usize, b: LoadId },
    /// Aggregate reserved up-regulation `x_UP_Tot[n,t]`
    ReserveUpTotal { n: NodeId, t: usize },
    /// Aggregate reserved down-regulation `x_DWN_Tot[n,t]`
    ReserveDwnTotal { n: NodeId, t: usize },
    /// Conversion activity `y_activity[n,t,i,o]`
    Activity { n: NodeId, t: usize, i: TechId, o: ModeId },
    /// Carrier output `y_out[n,t,i,e,o]`, legal out-triples only
    FlowOut { n: NodeId, t: usize, i: TechId, e: CarrierId, o: ModeId },
    /// Carrier input `y_in[n,t,i,e,o]`, legal in-triples only
    FlowIn { n: NodeId, t: usize, i: TechId, e: CarrierId, o: ModeId },
    /// Export `z_export[n,t,e]`
    Export { n: NodeId, t: usize, e: CarrierId },
    /// Flexible demand `d_flex[n,t,e]`
    FlexDemand { n: NodeId, t: usize, e: CarrierId },
    /// Storage charge `q_charge[n,t,b]`
    Charge { n: NodeId, t: usize, b: LoadId },
    /// Storage discharge `q_discharge[n,t,b]`
    Discharge { n: NodeId, t: usize, b: LoadId },
    /// State of charge `q_SoC[n,t,b]`
    StateOfCharge { n: NodeId, t: usize, b: LoadId },
    /// Technology capacity addition `v_new_tech[i]`
    TechExpansion { i: TechId },
    /// Storage capacity addition `v_new_bat[b]`
    StorageExpansion { b: LoadId },
    /// Monthly peak grid draw `y_max[n,m]`
    PeakDraw { n: NodeId, m: MonthId },
}

impl VarKey {
    /// Human-readable label in the naming convention of the input tables,
    /// e.g. `x_DA[leaf2,7]`.
    pub fn label(&self, reg: &Registry) -> String {
        let node = |n: &NodeId| reg.node_name(*n).to_string();
        let period = |t: &usize| reg.period_label(*t);
        match self {
            VarKey::DayAhead { n, t } => format!("x_DA[{},{}]", node(n), period(t)),
            VarKey::IntradayUp { n, t } => format!("x_ID_Up[{},{}]", node(n), period(t)),
            VarKey::IntradayDwn { n, t } => format!("x_ID_Dwn[{},{}]", node(n), period(t)),
            VarKey::RealTimeUp { n, t } => format!("x_RT_Up[{},{}]", node(n), period(t)),
            VarKey::RealTimeDwn { n, t } => format!("x_RT_Dwn[{},{}]", node(n), period(t)),
            VarKey::ReserveUp { n, t, b } => {
                format!("x_UP[{},{},{}]", node(n), period(t), reg.load_name(*b))
            }
            VarKey::ReserveDwn { n, t, b } => {
                format!("x_DWN[{},{},{}]", node(n), period(t), reg.load_name(*b))
            }
            VarKey::ReserveUpTotal { n, t } => format!("x_UP_Tot[{},{}]", node(n), period(t)),
            VarKey::ReserveDwnTotal { n, t } => format!("x_DWN_Tot[{},{}]", node(n), period(t)),
            VarKey::Activity { n, t, i, o } => format!(
                "y_activity[{},{},{},{}]",
                node(n),
                period(t),
                reg.tech_name(*i),
                reg.mode_name(*o)
            ),
            VarKey::FlowOut { n, t, i, e, o } => format!(
                "y_out[{},{},{},{},{}]",
                node(n),
                period(t),
                reg.tech_name(*i),
                reg.carrier_name(*e),
                reg.mode_name(*o)
            ),
            VarKey::FlowIn { n, t, i, e, o } => format!(
                "y_in[{},{},{},{},{}]",
                node(n),
                period(t),
                reg.tech_name(*i),
                reg.carrier_name(*e),
                reg.mode_name(*o)
            ),
            VarKey::Export { n, t, e } => {
                format!("z_export[{},{},{}]", node(n), period(t), reg.carrier_name(*e))
            }
            VarKey::FlexDemand { n, t, e } => {
                format!("d_flex[{},{},{}]", node(n), period(t), reg.carrier_name(*e))
            }
            VarKey::Charge { n, t, b } => {
                format!("q_charge[{},{},{}]", node(n), period(t), reg.load_name(*b))
            }
            VarKey::Discharge { n, t, b } => {
                format!("q_discharge[{},{},{}]", node(n), period(t), reg.load_name(*b))
            }
            VarKey::StateOfCharge { n, t, b } => {
                format!("q_SoC[{},{},{}]", node(n), period(t), reg.load_name(*b))
            }
            VarKey::TechExpansion { i } => format!("v_new_tech[{}]", reg.tech_name(*i)),
            VarKey::StorageExpansion { b } => format!("v_new_bat[{}]", reg.load_name(*b)),
            VarKey::PeakDraw { n, m } => {
                format!("y_max[{},{}]", node(n), reg.month_name(*m))
            }
        }
    }
}

/// Lower/upper bound of one column. All variables are continuous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn non_negative() -> Self {
        Bounds { min: 0.0, max: None }
    }

    pub fn frozen() -> Self {
        Bounds { min: 0.0, max: Some(0.0) }
    }
}

/// Catalog construction knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogOptions {
    /// Open `v_new_tech` above zero.
    pub allow_tech_expansion: bool,
    /// Open `v_new_bat` above zero.
    pub allow_storage_expansion: bool,
}

/// The full declared variable set, keyed by [`VarKey`] with dense column
/// indices in declaration order.
#[derive(Debug, Clone)]
pub struct VariableCatalog {
    columns: IndexMap<VarKey, Bounds>,
}

impl VariableCatalog {
    /// Declare every variable family over the registry and tree.
    pub fn build(reg: &Registry, tree: &ScenarioTree, options: CatalogOptions) -> Self {
        let mut columns = IndexMap::new();
        let mut declare = |key: VarKey, bounds: Bounds| {
            columns.insert(key, bounds);
        };
        let nn = Bounds::non_negative();
        let elec = reg.electricity();

        for n in tree.nodes() {
            for t in 0..reg.num_periods() {
                declare(VarKey::DayAhead { n, t }, nn);
                declare(VarKey::IntradayUp { n, t }, nn);
                declare(VarKey::IntradayDwn { n, t }, nn);
                declare(VarKey::RealTimeUp { n, t }, nn);
                declare(VarKey::RealTimeDwn { n, t }, nn);
                declare(VarKey::ReserveUpTotal { n, t }, nn);
                declare(VarKey::ReserveDwnTotal { n, t }, nn);

                for b in reg.flexible_loads() {
                    declare(VarKey::ReserveUp { n, t, b }, nn);
                    declare(VarKey::ReserveDwn { n, t, b }, nn);
                    declare(VarKey::Charge { n, t, b }, nn);
                    declare(VarKey::Discharge { n, t, b }, nn);
                    declare(VarKey::StateOfCharge { n, t, b }, nn);
                }

                for &(i, o) in reg.tech_mode_pairs() {
                    declare(VarKey::Activity { n, t, i, o }, nn);
                }
                for c in reg.conversions_out() {
                    declare(VarKey::FlowOut { n, t, i: c.tech, e: c.carrier, o: c.mode }, nn);
                }
                for c in reg.conversions_in() {
                    declare(VarKey::FlowIn { n, t, i: c.tech, e: c.carrier, o: c.mode }, nn);
                }

                for e in reg.carriers() {
                    // Only electricity may leave the site; the export-cap
                    // rows bound it, other carriers stay at zero.
                    let export = if Some(e) == elec { nn } else { Bounds::frozen() };
                    declare(VarKey::Export { n, t, e }, export);
                    declare(VarKey::FlexDemand { n, t, e }, nn);
                }
            }

            for m in reg.months() {
                declare(VarKey::PeakDraw { n, m }, nn);
            }
        }

        let tech_bounds = if options.allow_tech_expansion { nn } else { Bounds::frozen() };
        for i in reg.technologies() {
            declare(VarKey::TechExpansion { i }, tech_bounds);
        }
        let storage_bounds =
            if options.allow_storage_expansion { nn } else { Bounds::frozen() };
        for b in reg.flexible_loads() {
            declare(VarKey::StorageExpansion { b }, storage_bounds);
        }

        VariableCatalog { columns }
    }

    pub fn num_vars(&self) -> usize {
        self.columns.len()
    }

    /// Dense column index of a declared variable. An undeclared key means a
    /// constraint generator assumed domain membership it never had.
    pub fn column(&self, key: VarKey) -> SempResult<usize> {
        self.columns.get_index_of(&key).ok_or_else(|| {
            SempError::ConstraintDomain(format!("undeclared decision variable {key:?}"))
        })
    }

    pub fn bounds(&self, col: usize) -> Bounds {
        *self.columns.get_index(col).map(|(_, b)| b).expect("column in range")
    }

    pub fn keys(&self) -> impl Iterator<Item = (usize, &VarKey)> {
        self.columns.keys().enumerate()
    }
}
