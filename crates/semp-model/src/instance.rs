//! Assembled problem instance.
//!
//! A [`ProblemInstance`] is the immutable (variables, objective,
//! constraints) tuple handed to the solver adapter. It is built once per
//! solve from the registry and scenario tree; no partially assembled
//! instance ever escapes a failed build.

use semp_core::{Registry, ScenarioTree, SempResult};

use crate::catalog::{CatalogOptions, VariableCatalog};
use crate::constraints;
use crate::expr::{ConstraintRow, LinearExpr};
use crate::objective::build_objective;

/// The assembled LP, opaque to the solver adapter.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    catalog: VariableCatalog,
    objective: LinearExpr,
    constraints: Vec<ConstraintRow>,
}

impl ProblemInstance {
    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn constraints(&self) -> &[ConstraintRow] {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.catalog.num_vars()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Builds a fresh [`ProblemInstance`] from immutable inputs.
pub struct ModelBuilder<'a> {
    reg: &'a Registry,
    tree: &'a ScenarioTree,
    options: CatalogOptions,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(reg: &'a Registry, tree: &'a ScenarioTree) -> Self {
        Self { reg, tree, options: CatalogOptions::default() }
    }

    pub fn options(mut self, options: CatalogOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> SempResult<ProblemInstance> {
        let catalog = VariableCatalog::build(self.reg, self.tree, self.options);
        let objective = build_objective(self.reg, self.tree, &catalog)?;
        let constraints = constraints::generate(self.reg, self.tree, &catalog)?;
        Ok(ProblemInstance { catalog, objective, constraints })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VarKey;
    use crate::expr::Family;
    use semp_core::{RegistryBuilder, Stage};

    fn two_stage_fixture() -> (Registry, ScenarioTree) {
        let mut rb = RegistryBuilder::new();
        for t in 1..=2 {
            rb.add_period(t).unwrap();
        }
        let root = rb.add_node("root").unwrap();
        let lo = rb.add_node("lo").unwrap();
        let hi = rb.add_node("hi").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.set_stage(lo, Stage::Intraday).unwrap();
        rb.set_stage(hi, Stage::Intraday).unwrap();
        rb.add_parent_link(lo, root);
        rb.add_parent_link(hi, root);
        rb.params.probability.insert(root, 1.0);
        rb.params.probability.insert(lo, 0.5);
        rb.params.probability.insert(hi, 0.5);
        let grid = rb.add_technology("Power_Grid").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(grid, elec, mode, 1.0).unwrap();
        for n in [lo, hi] {
            rb.params.demand.insert((n, 0, elec), 10.0);
            rb.params.demand.insert((n, 1, elec), 10.0);
        }
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        (reg, tree)
    }

    #[test]
    fn test_build_dimensions() {
        let (reg, tree) = two_stage_fixture();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        assert_eq!(instance.num_variables(), instance.catalog().num_vars());
        assert!(instance.num_constraints() > 0);
        // No months, no emission cap, no flexible loads: those families are
        // omitted, not emitted as trivial rows.
        assert!(!instance.constraints().iter().any(|r| r.family == Family::PeakDraw));
        assert!(!instance.constraints().iter().any(|r| r.family == Family::EmissionCap));
        assert!(!instance.constraints().iter().any(|r| r.family == Family::SocDynamics));
    }

    #[test]
    fn test_family_counts() {
        let (reg, tree) = two_stage_fixture();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let count = |family: Family| {
            instance.constraints().iter().filter(|r| r.family == family).count()
        };

        // 3 nodes × 2 periods × 1 carrier.
        assert_eq!(count(Family::EnergyBalance), 6);
        // Grid delivery at every node and period.
        assert_eq!(count(Family::MarketBalance), 6);
        // 2 intraday children × 2 periods.
        assert_eq!(count(Family::MarketBalanceIntraday), 4);
        assert_eq!(count(Family::MarketBalanceRealTime), 0);
        // Day-ahead tie per parent link and period; no loads, no RT stage.
        assert_eq!(count(Family::NonAnticipativity), 4);
        assert_eq!(count(Family::IntradayCap), 6);
        assert_eq!(count(Family::CapexTech), 1);
    }

    fn single_root() -> (RegistryBuilder, semp_core::NodeId) {
        let mut rb = RegistryBuilder::new();
        for t in 1..=2 {
            rb.add_period(t).unwrap();
        }
        let root = rb.add_node("root").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.params.probability.insert(root, 1.0);
        (rb, root)
    }

    #[test]
    fn test_labels_unique_for_multi_carrier_shiftable_load() {
        // One load shiftable for two carriers: window rows are emitted once
        // per load, cap rows once per (load, carrier).
        let (mut rb, _root) = single_root();
        let elec = rb.add_carrier("Electricity").unwrap();
        let heat = rb.add_carrier("HT").unwrap();
        let b = rb.add_flexible_load("DualLoad").unwrap();
        rb.add_load_carrier(b, elec).unwrap();
        rb.add_load_carrier(b, heat).unwrap();
        rb.mark_shiftable(b, elec).unwrap();
        rb.mark_shiftable(b, heat).unwrap();
        rb.params.charge_efficiency.insert(b, 1.0);
        rb.params.discharge_efficiency.insert(b, 1.0);
        let iv = rb.add_shift_interval("w1").unwrap();
        rb.add_shift_step(iv, 1).unwrap();
        rb.add_shift_step(iv, 2).unwrap();
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let mut seen = std::collections::HashSet::new();
        for row in instance.constraints() {
            assert!(seen.insert(row.label.as_str()), "duplicate label {}", row.label);
        }
        let count = |family: Family| {
            instance.constraints().iter().filter(|r| r.family == family).count()
        };
        // 1 node × 1 interval × 1 load.
        assert_eq!(count(Family::ShiftWindow), 1);
        // 1 node × 2 window steps × 2 (load, carrier) pairs.
        assert_eq!(count(Family::ShiftCap), 4);
    }

    #[test]
    fn test_ramping_coefficients() {
        let (mut rb, root) = single_root();
        let gen = rb.add_technology("Gen").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(gen, elec, mode, 1.0).unwrap();
        rb.params.ramping_factor.insert(gen, 0.3);
        rb.params.installed_capacity.insert(gen, 10.0);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let rows: Vec<_> = instance
            .constraints()
            .iter()
            .filter(|r| r.family == Family::Ramping)
            .collect();
        assert_eq!(rows.len(), 2);

        let cat = instance.catalog();
        let out_t0 =
            cat.column(VarKey::FlowOut { n: root, t: 0, i: gen, e: elec, o: mode }).unwrap();
        let out_t1 =
            cat.column(VarKey::FlowOut { n: root, t: 1, i: gen, e: elec, o: mode }).unwrap();
        let expand = cat.column(VarKey::TechExpansion { i: gen }).unwrap();
        let second = rows.iter().find(|r| r.label == "ramping[root,2,Gen,Electricity,m1]").unwrap();
        assert_eq!(second.expr.coefficient(out_t1), 1.0);
        assert_eq!(second.expr.coefficient(out_t0), -1.0);
        assert_eq!(second.expr.coefficient(expand), -0.3);
        assert_eq!(second.expr.constant(), -3.0);
    }

    #[test]
    fn test_supply_limit_only_where_configured() {
        let (mut rb, root) = single_root();
        let gen = rb.add_technology("Gen").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(gen, elec, mode, 1.0).unwrap();
        rb.params.installed_capacity.insert(gen, 10.0);
        // Availability only for the first period; the second gets no row.
        rb.params.availability.insert((root, 0, gen), 0.8);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let rows: Vec<_> = instance
            .constraints()
            .iter()
            .filter(|r| r.family == Family::SupplyLimit)
            .collect();
        assert_eq!(rows.len(), 1);
        let row = rows[0];
        assert_eq!(row.label, "supply_limit[root,1,Gen]");

        let cat = instance.catalog();
        let out = cat.column(VarKey::FlowOut { n: root, t: 0, i: gen, e: elec, o: mode }).unwrap();
        let expand = cat.column(VarKey::TechExpansion { i: gen }).unwrap();
        assert_eq!(row.expr.coefficient(out), 1.0);
        assert_eq!(row.expr.coefficient(expand), -0.8);
        assert_eq!(row.expr.constant(), -8.0);
    }

    #[test]
    fn test_peak_draw_links_grid_flow_to_monthly_peak() {
        let (mut rb, root) = single_root();
        let grid = rb.add_technology("Power_Grid").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(grid, elec, mode, 1.0).unwrap();
        let m = rb.add_month("M1").unwrap();
        rb.add_time_in_month(m, 1).unwrap();
        rb.add_time_in_month(m, 2).unwrap();
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let rows: Vec<_> = instance
            .constraints()
            .iter()
            .filter(|r| r.family == Family::PeakDraw)
            .collect();
        // 1 node × 2 periods in the month × 1 grid mode.
        assert_eq!(rows.len(), 2);

        let cat = instance.catalog();
        let out = cat.column(VarKey::FlowOut { n: root, t: 0, i: grid, e: elec, o: mode }).unwrap();
        let peak = cat.column(VarKey::PeakDraw { n: root, m }).unwrap();
        let first = rows.iter().find(|r| r.label.starts_with("peak_draw[root,1,")).unwrap();
        assert_eq!(first.expr.coefficient(out), 1.0);
        assert_eq!(first.expr.coefficient(peak), -1.0);
    }

    #[test]
    fn test_emission_cap_sums_activity_over_horizon() {
        let (mut rb, root) = single_root();
        let gen = rb.add_technology("Gen").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(gen, elec, mode, 1.0).unwrap();
        rb.params.carbon_intensity.insert((gen, mode), 2.0);
        rb.params.max_emission = Some(100.0);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let rows: Vec<_> = instance
            .constraints()
            .iter()
            .filter(|r| r.family == Family::EmissionCap)
            .collect();
        assert_eq!(rows.len(), 1);
        let row = rows[0];
        assert_eq!(row.label, "emission_cap[root]");

        let cat = instance.catalog();
        for t in 0..2 {
            let act = cat.column(VarKey::Activity { n: root, t, i: gen, o: mode }).unwrap();
            assert_eq!(row.expr.coefficient(act), 2.0);
        }
        assert_eq!(row.expr.constant(), -100.0);
    }

    #[test]
    fn test_reserve_soc_coupling_coefficients() {
        let (mut rb, root) = single_root();
        let elec = rb.add_carrier("Electricity").unwrap();
        let b = rb.add_flexible_load("ShiftLoad").unwrap();
        rb.add_load_carrier(b, elec).unwrap();
        rb.mark_shiftable(b, elec).unwrap();
        rb.params.charge_efficiency.insert(b, 1.0);
        rb.params.discharge_efficiency.insert(b, 0.8);
        rb.params.max_storage.insert(b, 100.0);
        rb.params.initial_soc.insert(b, 0.5);
        rb.params.up_shift_max = 0.5;
        rb.params.down_shift_max = 0.25;
        let iv = rb.add_shift_interval("w1").unwrap();
        rb.add_shift_step(iv, 1).unwrap();
        rb.add_shift_step(iv, 2).unwrap();
        rb.params.demand.insert((root, 0, elec), 10.0);
        rb.params.demand.insert((root, 1, elec), 10.0);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let count = |family: Family| {
            instance.constraints().iter().filter(|r| r.family == family).count()
        };
        // 1 node × 2 window steps, each direction.
        assert_eq!(count(Family::ShiftReserveSocUp), 2);
        assert_eq!(count(Family::ShiftReserveSocDwn), 2);

        let cat = instance.catalog();
        let up_res = cat.column(VarKey::ReserveUp { n: root, t: 0, b }).unwrap();
        let dwn_res = cat.column(VarKey::ReserveDwn { n: root, t: 0, b }).unwrap();
        let soc_last = cat.column(VarKey::StateOfCharge { n: root, t: 1, b }).unwrap();

        // Up headroom at the first step: initial SoC (0.5 · 100) plus the
        // remaining shiftable demand (0.5 · 10 per step).
        let up = instance
            .constraints()
            .iter()
            .find(|r| r.label == "shift_reserve_soc_up[root,1,ShiftLoad]")
            .unwrap();
        assert_eq!(up.expr.coefficient(up_res), 1.0 / 0.8);
        assert_eq!(up.expr.coefficient(soc_last), 1.0);
        assert_eq!(up.expr.constant(), -50.0 - 10.0);

        // Down headroom mirrors it with the down-shift fraction.
        let dwn = instance
            .constraints()
            .iter()
            .find(|r| r.label == "shift_reserve_soc_dwn[root,1,ShiftLoad]")
            .unwrap();
        assert_eq!(dwn.expr.coefficient(dwn_res), 1.0);
        assert_eq!(dwn.expr.coefficient(soc_last), -1.0);
        assert_eq!(dwn.expr.constant(), 50.0 - 5.0);
    }

    #[test]
    fn test_energy_balance_coefficients() {
        let (reg, tree) = two_stage_fixture();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let row = instance
            .constraints()
            .iter()
            .find(|r| r.label == "energy_balance[lo,1,Electricity]")
            .unwrap();
        // supply − export − demand, nothing else for a load-free carrier.
        assert_eq!(row.expr.num_terms(), 2);
        assert_eq!(row.expr.constant(), -10.0);
    }
}
