//! Entity registry: the typed sets and parameters of a planning case
//!
//! The registry is the static data everything else is built from. It is
//! populated once through [`RegistryBuilder`] (by the table importer or by
//! test fixtures) and read-only afterwards; model assembly never mutates it.
//!
//! All entity names are interned: the registry owns the name tables and hands
//! out `Copy` newtype ids. Time periods are positional indices into the
//! ordered period vector, so `t - 1` is always the previous hour.
//!
//! Parameter accessors default to `0.0` for missing entries, matching the
//! input convention that an absent table row means "no cost / no demand".
//! Structurally mandatory parameters (conversion efficiencies, node
//! probabilities, storage efficiencies) are validated in
//! [`RegistryBuilder::finish`] instead, so a hole in them is a load-time
//! error and never a silent zero.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::error::{SempError, SempResult};
use crate::tree::Stage;

/// Carrier name that market, reserve and balancing rules key on.
pub const ELECTRICITY: &str = "Electricity";
/// Technology name representing grid import, the delivery point of the
/// sequential markets.
pub const GRID_TECHNOLOGY: &str = "Power_Grid";

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub fn new(index: usize) -> Self {
                $name(index)
            }

            pub fn index(&self) -> usize {
                self.0
            }
        }
    };
}

entity_id!(
    /// Scenario-tree node
    NodeId
);
entity_id!(
    /// Conversion technology
    TechId
);
entity_id!(
    /// Energy carrier (electricity, heat grades, fuels, ...)
    CarrierId
);
entity_id!(
    /// Mode of operation of a technology
    ModeId
);
entity_id!(
    /// Flexible load / storage device
    LoadId
);
entity_id!(
    /// Billing month
    MonthId
);
entity_id!(
    /// Load-shifting interval
    IntervalId
);

/// One legal `(technology, carrier, mode)` conversion triple with its
/// efficiency. These triples are the *only* places conversion flows exist;
/// anything outside them is omitted, not zero-filled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub tech: TechId,
    pub carrier: CarrierId,
    pub mode: ModeId,
    pub efficiency: f64,
}

/// Raw parameter storage. Populated by the importer via the builder; consumed
/// through the typed accessors on [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct Params {
    // (node, time) market data
    pub spot_price: HashMap<(NodeId, usize), f64>,
    pub intraday_price: HashMap<(NodeId, usize), f64>,
    pub rk_up_price: HashMap<(NodeId, usize), f64>,
    pub rk_dwn_price: HashMap<(NodeId, usize), f64>,
    pub afrr_up_cap_price: HashMap<(NodeId, usize), f64>,
    pub afrr_dwn_cap_price: HashMap<(NodeId, usize), f64>,
    pub afrr_up_act_price: HashMap<(NodeId, usize), f64>,
    pub afrr_dwn_act_price: HashMap<(NodeId, usize), f64>,
    pub activation_up: HashMap<(NodeId, usize), f64>,
    pub activation_dwn: HashMap<(NodeId, usize), f64>,

    // indexed technology / carrier data
    pub energy_cost: HashMap<(NodeId, usize, TechId), f64>,
    pub export_price: HashMap<(NodeId, usize, CarrierId), f64>,
    pub demand: HashMap<(NodeId, usize, CarrierId), f64>,
    pub availability: HashMap<(NodeId, usize, TechId), f64>,
    pub carbon_intensity: HashMap<(TechId, ModeId), f64>,

    // per-technology data
    pub installed_capacity: HashMap<TechId, f64>,
    pub ramping_factor: HashMap<TechId, f64>,
    pub tech_expansion_cost: HashMap<TechId, f64>,
    pub tech_capex_cap: HashMap<TechId, f64>,

    // per-flexible-load data
    pub charge_efficiency: HashMap<LoadId, f64>,
    pub discharge_efficiency: HashMap<LoadId, f64>,
    pub max_rate: HashMap<LoadId, f64>,
    pub max_storage: HashMap<LoadId, f64>,
    pub self_discharge: HashMap<LoadId, f64>,
    pub initial_soc: HashMap<LoadId, f64>,
    pub energy_to_power: HashMap<LoadId, f64>,
    pub storage_cost: HashMap<LoadId, f64>,
    pub storage_expansion_cost: HashMap<LoadId, f64>,
    pub storage_capex_cap: HashMap<LoadId, f64>,

    // per-node data
    pub probability: HashMap<NodeId, f64>,

    // scalars
    pub carbon_price: f64,
    pub grid_tariff: f64,
    pub imbalance_cost: f64,
    pub max_export: f64,
    pub up_shift_max: f64,
    pub down_shift_max: f64,
    pub excess_heat_fraction: f64,
    pub max_emission: Option<f64>,
}

/// Immutable sets + parameters of one planning case.
#[derive(Debug, Clone)]
pub struct Registry {
    periods: Vec<i64>,
    period_index: HashMap<i64, usize>,

    nodes: Vec<String>,
    stages: Vec<Option<Stage>>,
    parent_links: Vec<(NodeId, NodeId)>,

    technologies: Vec<String>,
    carriers: Vec<String>,
    modes: Vec<String>,
    loads: Vec<String>,

    conversions_out: Vec<Conversion>,
    conversions_in: Vec<Conversion>,
    tech_mode_pairs: Vec<(TechId, ModeId)>,

    load_carrier_pairs: Vec<(LoadId, CarrierId)>,
    shiftable_pairs: HashSet<(LoadId, CarrierId)>,
    shiftable_loads: HashSet<LoadId>,

    months: Vec<String>,
    time_in_month: Vec<Vec<usize>>,

    shift_intervals: Vec<String>,
    shift_windows: Vec<Vec<usize>>,
    in_window: Vec<bool>,

    excess_heat_rules: Vec<(TechId, CarrierId, ModeId)>,

    electricity: Option<CarrierId>,
    grid_tech: Option<TechId>,

    params: Params,
}

impl Registry {
    // --- time ---------------------------------------------------------

    pub fn num_periods(&self) -> usize {
        self.periods.len()
    }

    pub fn periods(&self) -> &[i64] {
        &self.periods
    }

    pub fn period_label(&self, t: usize) -> i64 {
        self.periods[t]
    }

    pub fn period_position(&self, label: i64) -> Option<usize> {
        self.period_index.get(&label).copied()
    }

    // --- entity sets --------------------------------------------------

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_name(&self, n: NodeId) -> &str {
        &self.nodes[n.index()]
    }

    /// Stage assignment as loaded from the stage-subset tables. `None` means
    /// the node appeared in no subset; the scenario tree rejects that.
    pub fn stage_of(&self, n: NodeId) -> Option<Stage> {
        self.stages[n.index()]
    }

    /// Raw `(child, parent)` links as loaded; validated by the scenario tree.
    pub fn parent_links(&self) -> &[(NodeId, NodeId)] {
        &self.parent_links
    }

    pub fn technologies(&self) -> impl Iterator<Item = TechId> {
        (0..self.technologies.len()).map(TechId::new)
    }

    pub fn tech_name(&self, i: TechId) -> &str {
        &self.technologies[i.index()]
    }

    pub fn carriers(&self) -> impl Iterator<Item = CarrierId> {
        (0..self.carriers.len()).map(CarrierId::new)
    }

    pub fn carrier_name(&self, e: CarrierId) -> &str {
        &self.carriers[e.index()]
    }

    pub fn modes(&self) -> impl Iterator<Item = ModeId> {
        (0..self.modes.len()).map(ModeId::new)
    }

    pub fn mode_name(&self, o: ModeId) -> &str {
        &self.modes[o.index()]
    }

    pub fn flexible_loads(&self) -> impl Iterator<Item = LoadId> {
        (0..self.loads.len()).map(LoadId::new)
    }

    pub fn load_name(&self, b: LoadId) -> &str {
        &self.loads[b.index()]
    }

    pub fn months(&self) -> impl Iterator<Item = MonthId> {
        (0..self.months.len()).map(MonthId::new)
    }

    pub fn month_name(&self, m: MonthId) -> &str {
        &self.months[m.index()]
    }

    /// Positional periods billed under month `m`.
    pub fn periods_in_month(&self, m: MonthId) -> &[usize] {
        &self.time_in_month[m.index()]
    }

    // --- conversion relations -----------------------------------------

    pub fn conversions_out(&self) -> &[Conversion] {
        &self.conversions_out
    }

    pub fn conversions_in(&self) -> &[Conversion] {
        &self.conversions_in
    }

    /// `(technology, mode)` pairs that occur in at least one conversion
    /// relation. Activity variables exist exactly for these.
    pub fn tech_mode_pairs(&self) -> &[(TechId, ModeId)] {
        &self.tech_mode_pairs
    }

    // --- flexible loads -----------------------------------------------

    pub fn load_carrier_pairs(&self) -> &[(LoadId, CarrierId)] {
        &self.load_carrier_pairs
    }

    pub fn loads_for_carrier(&self, e: CarrierId) -> impl Iterator<Item = LoadId> + '_ {
        self.load_carrier_pairs
            .iter()
            .filter(move |(_, c)| *c == e)
            .map(|(b, _)| *b)
    }

    pub fn is_shiftable(&self, b: LoadId, e: CarrierId) -> bool {
        self.shiftable_pairs.contains(&(b, e))
    }

    /// A load that participates in window shifting for any carrier.
    pub fn is_shiftable_load(&self, b: LoadId) -> bool {
        self.shiftable_loads.contains(&b)
    }

    pub fn shiftable_pairs(&self) -> impl Iterator<Item = (LoadId, CarrierId)> + '_ {
        self.load_carrier_pairs
            .iter()
            .copied()
            .filter(|p| self.shiftable_pairs.contains(p))
    }

    // --- load shifting windows ----------------------------------------

    pub fn shift_intervals(&self) -> impl Iterator<Item = IntervalId> {
        (0..self.shift_intervals.len()).map(IntervalId::new)
    }

    pub fn interval_name(&self, iv: IntervalId) -> &str {
        &self.shift_intervals[iv.index()]
    }

    /// Ordered positional periods of one shifting window.
    pub fn window(&self, iv: IntervalId) -> &[usize] {
        &self.shift_windows[iv.index()]
    }

    /// Whether period `t` falls inside any shifting window.
    pub fn in_any_window(&self, t: usize) -> bool {
        self.in_window[t]
    }

    // --- special entities ---------------------------------------------

    pub fn electricity(&self) -> Option<CarrierId> {
        self.electricity
    }

    pub fn grid_tech(&self) -> Option<TechId> {
        self.grid_tech
    }

    pub fn excess_heat_rules(&self) -> &[(TechId, CarrierId, ModeId)] {
        &self.excess_heat_rules
    }

    // --- parameter accessors (default 0.0) ----------------------------

    pub fn spot_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.spot_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn intraday_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.intraday_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn rk_up_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.rk_up_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn rk_dwn_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.rk_dwn_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn afrr_up_cap_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.afrr_up_cap_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn afrr_dwn_cap_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.afrr_dwn_cap_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn afrr_up_act_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.afrr_up_act_price.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn afrr_dwn_act_price(&self, n: NodeId, t: usize) -> f64 {
        *self.params.afrr_dwn_act_price.get(&(n, t)).unwrap_or(&0.0)
    }

    /// Fraction of reserved up-capacity actually called in `(n, t)`.
    pub fn activation_up(&self, n: NodeId, t: usize) -> f64 {
        *self.params.activation_up.get(&(n, t)).unwrap_or(&0.0)
    }

    /// Fraction of reserved down-capacity actually called in `(n, t)`.
    pub fn activation_dwn(&self, n: NodeId, t: usize) -> f64 {
        *self.params.activation_dwn.get(&(n, t)).unwrap_or(&0.0)
    }

    pub fn energy_cost(&self, n: NodeId, t: usize, i: TechId) -> f64 {
        *self.params.energy_cost.get(&(n, t, i)).unwrap_or(&0.0)
    }

    pub fn export_price(&self, n: NodeId, t: usize, e: CarrierId) -> f64 {
        *self.params.export_price.get(&(n, t, e)).unwrap_or(&0.0)
    }

    pub fn demand(&self, n: NodeId, t: usize, e: CarrierId) -> f64 {
        *self.params.demand.get(&(n, t, e)).unwrap_or(&0.0)
    }

    /// `None` when no availability was configured for `(n, t, i)`; the
    /// supply-limit rule is omitted rather than clamped to zero.
    pub fn availability(&self, n: NodeId, t: usize, i: TechId) -> Option<f64> {
        self.params.availability.get(&(n, t, i)).copied()
    }

    pub fn carbon_intensity(&self, i: TechId, o: ModeId) -> f64 {
        *self.params.carbon_intensity.get(&(i, o)).unwrap_or(&0.0)
    }

    pub fn installed_capacity(&self, i: TechId) -> f64 {
        *self.params.installed_capacity.get(&i).unwrap_or(&0.0)
    }

    /// `None` when the technology has no ramping limit configured; the
    /// ramping rule is omitted rather than clamped to zero.
    pub fn ramping_factor(&self, i: TechId) -> Option<f64> {
        self.params.ramping_factor.get(&i).copied()
    }

    pub fn tech_expansion_cost(&self, i: TechId) -> f64 {
        *self.params.tech_expansion_cost.get(&i).unwrap_or(&0.0)
    }

    pub fn tech_capex_cap(&self, i: TechId) -> f64 {
        *self.params.tech_capex_cap.get(&i).unwrap_or(&0.0)
    }

    /// Mandatory; validated in [`RegistryBuilder::finish`].
    pub fn charge_efficiency(&self, b: LoadId) -> f64 {
        *self.params.charge_efficiency.get(&b).unwrap_or(&1.0)
    }

    /// Mandatory and strictly positive (it is divided by).
    pub fn discharge_efficiency(&self, b: LoadId) -> f64 {
        *self.params.discharge_efficiency.get(&b).unwrap_or(&1.0)
    }

    pub fn max_rate(&self, b: LoadId) -> f64 {
        *self.params.max_rate.get(&b).unwrap_or(&1.0)
    }

    pub fn max_storage(&self, b: LoadId) -> f64 {
        *self.params.max_storage.get(&b).unwrap_or(&0.0)
    }

    pub fn self_discharge(&self, b: LoadId) -> f64 {
        *self.params.self_discharge.get(&b).unwrap_or(&0.0)
    }

    pub fn initial_soc(&self, b: LoadId) -> f64 {
        *self.params.initial_soc.get(&b).unwrap_or(&0.0)
    }

    pub fn energy_to_power(&self, b: LoadId) -> f64 {
        *self.params.energy_to_power.get(&b).unwrap_or(&0.0)
    }

    pub fn storage_cost(&self, b: LoadId) -> f64 {
        *self.params.storage_cost.get(&b).unwrap_or(&0.0)
    }

    pub fn storage_expansion_cost(&self, b: LoadId) -> f64 {
        *self.params.storage_expansion_cost.get(&b).unwrap_or(&0.0)
    }

    pub fn storage_capex_cap(&self, b: LoadId) -> f64 {
        *self.params.storage_capex_cap.get(&b).unwrap_or(&0.0)
    }

    /// Mandatory; validated in [`RegistryBuilder::finish`].
    pub fn probability(&self, n: NodeId) -> f64 {
        *self.params.probability.get(&n).unwrap_or(&0.0)
    }

    pub fn carbon_price(&self) -> f64 {
        self.params.carbon_price
    }

    pub fn grid_tariff(&self) -> f64 {
        self.params.grid_tariff
    }

    pub fn imbalance_cost(&self) -> f64 {
        self.params.imbalance_cost
    }

    pub fn max_export(&self) -> f64 {
        self.params.max_export
    }

    pub fn up_shift_max(&self) -> f64 {
        self.params.up_shift_max
    }

    pub fn down_shift_max(&self) -> f64 {
        self.params.down_shift_max
    }

    pub fn excess_heat_fraction(&self) -> f64 {
        self.params.excess_heat_fraction
    }

    /// Annual emission cap. `None` means no cap was configured and the
    /// emission constraint family is omitted entirely.
    pub fn max_emission(&self) -> Option<f64> {
        self.params.max_emission
    }
}

/// Mutable construction side of [`Registry`].
///
/// Interns names on first use and rejects duplicates where the underlying
/// table declares a set (a set member listed twice is a data error, not a
/// merge).
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    periods: Vec<i64>,
    period_index: HashMap<i64, usize>,

    nodes: IndexMap<String, NodeId>,
    stages: Vec<Option<Stage>>,
    parent_links: Vec<(NodeId, NodeId)>,

    technologies: IndexMap<String, TechId>,
    carriers: IndexMap<String, CarrierId>,
    modes: IndexMap<String, ModeId>,
    loads: IndexMap<String, LoadId>,

    conversions_out: Vec<Conversion>,
    conversions_in: Vec<Conversion>,

    load_carrier_pairs: Vec<(LoadId, CarrierId)>,
    shiftable_pairs: HashSet<(LoadId, CarrierId)>,

    months: IndexMap<String, MonthId>,
    time_in_month: Vec<Vec<usize>>,

    shift_intervals: IndexMap<String, IntervalId>,
    shift_windows: Vec<Vec<usize>>,

    excess_heat_rules: Vec<(TechId, CarrierId, ModeId)>,

    /// Raw parameter storage, filled directly by the importer.
    pub params: Params,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_period(&mut self, label: i64) -> SempResult<usize> {
        if self.period_index.contains_key(&label) {
            return Err(SempError::Data(format!("duplicate time period {label}")));
        }
        let t = self.periods.len();
        self.periods.push(label);
        self.period_index.insert(label, t);
        Ok(t)
    }

    pub fn period_position(&self, label: i64) -> SempResult<usize> {
        self.period_index
            .get(&label)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown time period {label}")))
    }

    pub fn add_node(&mut self, name: &str) -> SempResult<NodeId> {
        if self.nodes.contains_key(name) {
            return Err(SempError::Data(format!("duplicate node '{name}'")));
        }
        let id = NodeId::new(self.nodes.len());
        self.nodes.insert(name.to_string(), id);
        self.stages.push(None);
        Ok(id)
    }

    pub fn node(&self, name: &str) -> SempResult<NodeId> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown node '{name}'")))
    }

    pub fn set_stage(&mut self, n: NodeId, stage: Stage) -> SempResult<()> {
        match self.stages[n.index()] {
            None => {
                self.stages[n.index()] = Some(stage);
                Ok(())
            }
            Some(existing) if existing == stage => Err(SempError::Data(format!(
                "node '{}' listed twice in the {stage} stage subset",
                self.nodes.get_index(n.index()).map(|(k, _)| k.as_str()).unwrap_or("?"),
            ))),
            Some(existing) => Err(SempError::Data(format!(
                "node '{}' assigned to both {existing} and {stage} stage subsets",
                self.nodes.get_index(n.index()).map(|(k, _)| k.as_str()).unwrap_or("?"),
            ))),
        }
    }

    pub fn add_parent_link(&mut self, child: NodeId, parent: NodeId) {
        self.parent_links.push((child, parent));
    }

    pub fn add_technology(&mut self, name: &str) -> SempResult<TechId> {
        if self.technologies.contains_key(name) {
            return Err(SempError::Data(format!("duplicate technology '{name}'")));
        }
        let id = TechId::new(self.technologies.len());
        self.technologies.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn technology(&self, name: &str) -> SempResult<TechId> {
        self.technologies
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown technology '{name}'")))
    }

    pub fn add_carrier(&mut self, name: &str) -> SempResult<CarrierId> {
        if self.carriers.contains_key(name) {
            return Err(SempError::Data(format!("duplicate energy carrier '{name}'")));
        }
        let id = CarrierId::new(self.carriers.len());
        self.carriers.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn carrier(&self, name: &str) -> SempResult<CarrierId> {
        self.carriers
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown energy carrier '{name}'")))
    }

    pub fn add_mode(&mut self, name: &str) -> SempResult<ModeId> {
        if self.modes.contains_key(name) {
            return Err(SempError::Data(format!("duplicate mode of operation '{name}'")));
        }
        let id = ModeId::new(self.modes.len());
        self.modes.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn mode(&self, name: &str) -> SempResult<ModeId> {
        self.modes
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown mode of operation '{name}'")))
    }

    pub fn add_flexible_load(&mut self, name: &str) -> SempResult<LoadId> {
        if self.loads.contains_key(name) {
            return Err(SempError::Data(format!("duplicate flexible load '{name}'")));
        }
        let id = LoadId::new(self.loads.len());
        self.loads.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn flexible_load(&self, name: &str) -> SempResult<LoadId> {
        self.loads
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown flexible load '{name}'")))
    }

    pub fn add_conversion_out(
        &mut self,
        tech: TechId,
        carrier: CarrierId,
        mode: ModeId,
        efficiency: f64,
    ) -> SempResult<()> {
        if self
            .conversions_out
            .iter()
            .any(|c| c.tech == tech && c.carrier == carrier && c.mode == mode)
        {
            return Err(SempError::Data(
                "duplicate (technology, carrier, mode) output relation".into(),
            ));
        }
        self.conversions_out.push(Conversion { tech, carrier, mode, efficiency });
        Ok(())
    }

    pub fn add_conversion_in(
        &mut self,
        tech: TechId,
        carrier: CarrierId,
        mode: ModeId,
        efficiency: f64,
    ) -> SempResult<()> {
        if self
            .conversions_in
            .iter()
            .any(|c| c.tech == tech && c.carrier == carrier && c.mode == mode)
        {
            return Err(SempError::Data(
                "duplicate (technology, carrier, mode) input relation".into(),
            ));
        }
        self.conversions_in.push(Conversion { tech, carrier, mode, efficiency });
        Ok(())
    }

    pub fn add_load_carrier(&mut self, b: LoadId, e: CarrierId) -> SempResult<()> {
        if self.load_carrier_pairs.contains(&(b, e)) {
            return Err(SempError::Data("duplicate (flexible load, carrier) pair".into()));
        }
        self.load_carrier_pairs.push((b, e));
        Ok(())
    }

    pub fn mark_shiftable(&mut self, b: LoadId, e: CarrierId) -> SempResult<()> {
        if !self.load_carrier_pairs.contains(&(b, e)) {
            return Err(SempError::Data(
                "shiftable pair is not a declared (flexible load, carrier) pair".into(),
            ));
        }
        self.shiftable_pairs.insert((b, e));
        Ok(())
    }

    pub fn add_month(&mut self, name: &str) -> SempResult<MonthId> {
        if self.months.contains_key(name) {
            return Err(SempError::Data(format!("duplicate month '{name}'")));
        }
        let id = MonthId::new(self.months.len());
        self.months.insert(name.to_string(), id);
        self.time_in_month.push(Vec::new());
        Ok(id)
    }

    pub fn month(&self, name: &str) -> SempResult<MonthId> {
        self.months
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown month '{name}'")))
    }

    pub fn add_time_in_month(&mut self, m: MonthId, label: i64) -> SempResult<()> {
        let t = self.period_position(label)?;
        self.time_in_month[m.index()].push(t);
        Ok(())
    }

    pub fn add_shift_interval(&mut self, name: &str) -> SempResult<IntervalId> {
        if self.shift_intervals.contains_key(name) {
            return Err(SempError::Data(format!("duplicate load-shifting interval '{name}'")));
        }
        let id = IntervalId::new(self.shift_intervals.len());
        self.shift_intervals.insert(name.to_string(), id);
        self.shift_windows.push(Vec::new());
        Ok(id)
    }

    pub fn shift_interval(&self, name: &str) -> SempResult<IntervalId> {
        self.shift_intervals
            .get(name)
            .copied()
            .ok_or_else(|| SempError::Data(format!("unknown load-shifting interval '{name}'")))
    }

    pub fn add_shift_step(&mut self, iv: IntervalId, label: i64) -> SempResult<()> {
        let t = self.period_position(label)?;
        self.shift_windows[iv.index()].push(t);
        Ok(())
    }

    pub fn add_excess_heat_rule(&mut self, tech: TechId, carrier: CarrierId, mode: ModeId) {
        self.excess_heat_rules.push((tech, carrier, mode));
    }

    /// Validate and freeze the registry.
    pub fn finish(self) -> SempResult<Registry> {
        if self.periods.is_empty() {
            return Err(SempError::Data("time set is empty".into()));
        }

        // Mandatory per-load parameters.
        for (name, &b) in &self.loads {
            if !self.params.charge_efficiency.contains_key(&b) {
                return Err(SempError::Data(format!(
                    "missing charge efficiency for flexible load '{name}'"
                )));
            }
            match self.params.discharge_efficiency.get(&b) {
                None => {
                    return Err(SempError::Data(format!(
                        "missing discharge efficiency for flexible load '{name}'"
                    )))
                }
                Some(eta) if *eta <= 0.0 => {
                    return Err(SempError::Data(format!(
                        "discharge efficiency for flexible load '{name}' must be positive, got {eta}"
                    )))
                }
                Some(_) => {}
            }
        }

        // Mandatory node probabilities.
        for (name, &n) in &self.nodes {
            if !self.params.probability.contains_key(&n) {
                return Err(SempError::Data(format!("missing probability for node '{name}'")));
            }
        }

        // Shifting windows partition their covered periods: contiguous and
        // non-overlapping.
        let mut in_window = vec![false; self.periods.len()];
        for (name, &iv) in &self.shift_intervals {
            let window = &self.shift_windows[iv.index()];
            if window.is_empty() {
                return Err(SempError::Data(format!(
                    "load-shifting interval '{name}' has no time steps"
                )));
            }
            for pair in window.windows(2) {
                if pair[1] != pair[0] + 1 {
                    return Err(SempError::Data(format!(
                        "load-shifting interval '{name}' is not contiguous"
                    )));
                }
            }
            for &t in window {
                if in_window[t] {
                    return Err(SempError::Data(format!(
                        "time period {} belongs to more than one load-shifting interval",
                        self.periods[t]
                    )));
                }
                in_window[t] = true;
            }
        }

        let mut tech_mode_pairs: Vec<(TechId, ModeId)> = Vec::new();
        for c in self.conversions_out.iter().chain(self.conversions_in.iter()) {
            if !tech_mode_pairs.contains(&(c.tech, c.mode)) {
                tech_mode_pairs.push((c.tech, c.mode));
            }
        }

        let shiftable_loads: HashSet<LoadId> =
            self.shiftable_pairs.iter().map(|(b, _)| *b).collect();

        let electricity = self.carriers.get(ELECTRICITY).copied();
        let grid_tech = self.technologies.get(GRID_TECHNOLOGY).copied();

        Ok(Registry {
            periods: self.periods,
            period_index: self.period_index,
            nodes: self.nodes.into_keys().collect(),
            stages: self.stages,
            parent_links: self.parent_links,
            technologies: self.technologies.into_keys().collect(),
            carriers: self.carriers.into_keys().collect(),
            modes: self.modes.into_keys().collect(),
            loads: self.loads.into_keys().collect(),
            conversions_out: self.conversions_out,
            conversions_in: self.conversions_in,
            tech_mode_pairs,
            load_carrier_pairs: self.load_carrier_pairs,
            shiftable_pairs: self.shiftable_pairs,
            shiftable_loads,
            months: self.months.into_keys().collect(),
            time_in_month: self.time_in_month,
            shift_intervals: self.shift_intervals.into_keys().collect(),
            shift_windows: self.shift_windows,
            in_window,
            excess_heat_rules: self.excess_heat_rules,
            electricity,
            grid_tech,
            params: self.params,
        })
    }
}
