//! Solver adapter: lowers a [`ProblemInstance`] to good_lp's Clarabel
//! backend and maps the outcome back to typed results.
//!
//! The adapter is a single blocking call. It performs no retries; an
//! infeasible or unbounded model is reported verbatim so the caller can
//! distinguish a bad model from a bad solver call.

use good_lp::constraint::ConstraintReference;
use good_lp::solvers::clarabel::clarabel;
use good_lp::solvers::{DualValues, SolutionWithDual};
use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel};
use indexmap::IndexMap;

use semp_core::{SempError, SempResult};

use crate::catalog::VarKey;
use crate::expr::ComparisonOp;
use crate::instance::ProblemInstance;

/// Caller-supplied solve controls.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveOptions {
    /// Wall-clock limit in seconds; `None` lets the solver run to
    /// convergence.
    pub time_limit: Option<f64>,
    /// Emit the solver's own iteration log.
    pub verbose: bool,
}

/// Primal and dual values of a solved instance.
#[derive(Debug, Clone)]
pub struct SolvedModel<'a> {
    instance: &'a ProblemInstance,
    values: Vec<f64>,
    duals: Vec<f64>,
    objective_value: f64,
}

impl SolvedModel<'_> {
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// Primal value of one declared variable.
    pub fn value(&self, key: VarKey) -> SempResult<f64> {
        Ok(self.values[self.instance.catalog().column(key)?])
    }

    /// All primal values in catalog order.
    pub fn values(&self) -> impl Iterator<Item = (&VarKey, f64)> {
        self.instance.catalog().keys().map(|(col, key)| (key, self.values[col]))
    }

    /// Dual value per constraint, in row order.
    pub fn duals(&self) -> impl Iterator<Item = (&str, f64)> {
        self.instance
            .constraints()
            .iter()
            .zip(&self.duals)
            .map(|(row, &d)| (row.label.as_str(), d))
    }

    /// Dual value of one labelled constraint.
    pub fn dual(&self, label: &str) -> Option<f64> {
        self.instance
            .constraints()
            .iter()
            .position(|r| r.label == label)
            .map(|idx| self.duals[idx])
    }

    /// Variables with a value meaningfully away from zero, labelled in the
    /// input tables' naming convention.
    pub fn nonzero_values(
        &self,
        reg: &semp_core::Registry,
        tolerance: f64,
    ) -> IndexMap<String, f64> {
        self.values()
            .filter(|(_, v)| v.abs() > tolerance)
            .map(|(key, v)| (key.label(reg), v))
            .collect()
    }
}

/// Solve an assembled instance with Clarabel.
pub fn solve<'a>(
    instance: &'a ProblemInstance,
    options: &SolveOptions,
) -> SempResult<SolvedModel<'a>> {
    let mut vars = variables!();
    let mut columns = Vec::with_capacity(instance.num_variables());
    for col in 0..instance.num_variables() {
        let bounds = instance.catalog().bounds(col);
        let mut def = variable().min(bounds.min);
        if let Some(max) = bounds.max {
            def = def.max(max);
        }
        columns.push(vars.add(def));
    }

    let mut objective = Expression::from(instance.objective().constant());
    for (col, coef) in instance.objective().iter() {
        objective += coef * columns[col];
    }

    let mut model = vars.minimise(objective).using(clarabel);
    model.settings().verbose(options.verbose);
    if let Some(limit) = options.time_limit {
        model.settings().time_limit(limit);
    }

    let mut refs: Vec<ConstraintReference> = Vec::with_capacity(instance.num_constraints());
    for row in instance.constraints() {
        let mut lhs = Expression::from(row.expr.constant());
        for (col, coef) in row.expr.iter() {
            lhs += coef * columns[col];
        }
        let c = match row.op {
            ComparisonOp::Eq => constraint::eq(lhs, 0.0),
            ComparisonOp::Le => constraint::leq(lhs, 0.0),
            ComparisonOp::Ge => constraint::geq(lhs, 0.0),
        };
        refs.push(model.add_constraint(c));
    }

    let mut solution = model.solve().map_err(map_resolution_error)?;

    // Duals first: compute_dual borrows the solution mutably.
    let duals: Vec<f64> = {
        let dual_values = solution.compute_dual();
        refs.iter().map(|r| dual_values.dual(r.clone())).collect()
    };
    let values: Vec<f64> = columns.iter().map(|&v| solution.value(v)).collect();
    let objective_value = instance.objective().value_in(&values);

    Ok(SolvedModel { instance, values, duals, objective_value })
}

fn map_resolution_error(err: ResolutionError) -> SempError {
    match err {
        ResolutionError::Infeasible => SempError::Infeasible("reported by Clarabel".into()),
        ResolutionError::Unbounded => SempError::Unbounded("reported by Clarabel".into()),
        ResolutionError::Other(msg) => classify_solver_message(msg.to_string()),
        ResolutionError::Str(msg) => classify_solver_message(msg),
    }
}

fn classify_solver_message(msg: String) -> SempError {
    if msg.to_ascii_lowercase().contains("time") {
        SempError::Timeout(msg)
    } else {
        SempError::Solver(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogOptions;
    use crate::instance::ModelBuilder;
    use semp_core::{Registry, RegistryBuilder, ScenarioTree, Stage};

    const TOL: f64 = 1e-5;

    /// The two-stage scenario: one day-ahead root, two equally likely
    /// intraday children, grid import the only source, demand 10 in both
    /// periods at the children, spot prices 5 and 8 at the root and
    /// intraday trades priced like the spot.
    fn two_stage_registry() -> Registry {
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
        rb.params.spot_price.insert((root, 0), 5.0);
        rb.params.spot_price.insert((root, 1), 8.0);
        for n in [lo, hi] {
            rb.params.intraday_price.insert((n, 0), 5.0);
            rb.params.intraday_price.insert((n, 1), 8.0);
            rb.params.demand.insert((n, 0, elec), 10.0);
            rb.params.demand.insert((n, 1, elec), 10.0);
        }
        rb.finish().unwrap()
    }

    fn solve_two_stage() -> (Registry, ScenarioTree, f64, Vec<(String, f64)>) {
        let reg = two_stage_registry();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let solved = solve(&instance, &SolveOptions::default()).unwrap();
        let values: Vec<(String, f64)> =
            solved.values().map(|(k, v)| (k.label(&reg), v)).collect();
        (reg, tree, solved.objective_value(), values)
    }

    #[test]
    fn test_two_stage_expected_cost() {
        // The expected cost of meeting 10 units in both periods is
        // 5·10 + 8·10 = 130, regardless of how day-ahead and intraday
        // purchases split (both markets price identically here).
        let (_, _, objective, _) = solve_two_stage();
        assert!((objective - 130.0).abs() < 1e-3, "objective {objective}");
    }

    #[test]
    fn test_two_stage_non_anticipativity() {
        let (_, _, _, values) = solve_two_stage();
        let get = |label: &str| {
            values.iter().find(|(l, _)| l == label).map(|(_, v)| *v).unwrap()
        };
        for t in [1, 2] {
            let root = get(&format!("x_DA[root,{t}]"));
            assert!((get(&format!("x_DA[lo,{t}]")) - root).abs() < TOL);
            assert!((get(&format!("x_DA[hi,{t}]")) - root).abs() < TOL);
        }
    }

    #[test]
    fn test_two_stage_balance_residual() {
        let reg = two_stage_registry();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let solved = solve(&instance, &SolveOptions::default()).unwrap();

        let values: Vec<f64> = solved.values().map(|(_, v)| v).collect();
        for row in instance.constraints() {
            if row.family == crate::expr::Family::EnergyBalance {
                assert!(
                    row.expr.value_in(&values).abs() < TOL,
                    "{} violated",
                    row.label
                );
            }
        }
    }

    #[test]
    fn test_infeasible_demand_reported() {
        // Demand with no production path at the day-ahead root.
        let mut rb = RegistryBuilder::new();
        rb.add_period(1).unwrap();
        let root = rb.add_node("root").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.params.probability.insert(root, 1.0);
        let heat = rb.add_carrier("HT").unwrap();
        rb.params.demand.insert((root, 0, heat), 10.0);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();

        let err = solve(&instance, &SolveOptions::default()).unwrap_err();
        assert!(matches!(err, SempError::Infeasible(_)));
    }

    #[test]
    fn test_storage_round_trip_and_shift_window() {
        // Day-ahead root feeding one intraday child over four periods; the
        // child carries a shiftable load whose single window spans the
        // horizon. Real-time positions at the child net to zero through the
        // chained balance, so the only purchase paths are the priced ones.
        let mut rb = RegistryBuilder::new();
        for t in 1..=4 {
            rb.add_period(t).unwrap();
        }
        let root = rb.add_node("root").unwrap();
        let child = rb.add_node("id").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.set_stage(child, Stage::Intraday).unwrap();
        rb.add_parent_link(child, root);
        rb.params.probability.insert(root, 1.0);
        rb.params.probability.insert(child, 1.0);
        let grid = rb.add_technology("Power_Grid").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(grid, elec, mode, 1.0).unwrap();
        let shift = rb.add_flexible_load("ShiftLoad").unwrap();
        rb.add_load_carrier(shift, elec).unwrap();
        rb.mark_shiftable(shift, elec).unwrap();
        rb.params.charge_efficiency.insert(shift, 1.0);
        rb.params.discharge_efficiency.insert(shift, 1.0);
        rb.params.max_storage.insert(shift, 100.0);
        rb.params.initial_soc.insert(shift, 0.5);
        rb.params.up_shift_max = 0.5;
        rb.params.down_shift_max = 0.5;
        let iv = rb.add_shift_interval("w1").unwrap();
        for t in 1..=4i64 {
            rb.add_shift_step(iv, t).unwrap();
            let price = if t <= 2 { 1.0 } else { 10.0 };
            rb.params.spot_price.insert((root, (t - 1) as usize), price);
            rb.params.intraday_price.insert((child, (t - 1) as usize), price);
            rb.params.demand.insert((child, (t - 1) as usize, elec), 10.0);
        }
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let solved = solve(&instance, &SolveOptions::default()).unwrap();

        // Conservation: net shifted energy over the window is zero.
        let n = child;
        let mut net = 0.0;
        for t in 0..4 {
            net += solved.value(VarKey::Charge { n, t, b: shift }).unwrap()
                - solved.value(VarKey::Discharge { n, t, b: shift }).unwrap();
        }
        assert!(net.abs() < TOL, "window net {net}");

        // Round trip: final SoC returns to the initial level.
        let soc_end = solved.value(VarKey::StateOfCharge { n, t: 3, b: shift }).unwrap();
        assert!((soc_end - 0.5 * 100.0).abs() < TOL);

        // The shift cap allows moving 5 units per cheap hour into the
        // expensive hours: 15+15 at price 1 plus 5+5 at price 10 is 130,
        // down from the unshifted 220.
        assert!((solved.objective_value() - 130.0).abs() < 1e-3);
    }

    #[test]
    fn test_activation_realization_boundary() {
        // Full activation forces the battery to physically deliver the
        // reserved capacity.
        let mut rb = RegistryBuilder::new();
        for t in 1..=2 {
            rb.add_period(t).unwrap();
        }
        let root = rb.add_node("root").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.params.probability.insert(root, 1.0);
        let grid = rb.add_technology("Power_Grid").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(grid, elec, mode, 1.0).unwrap();
        let bat = rb.add_flexible_load("Battery").unwrap();
        rb.add_load_carrier(bat, elec).unwrap();
        rb.params.charge_efficiency.insert(bat, 1.0);
        rb.params.discharge_efficiency.insert(bat, 1.0);
        rb.params.max_storage.insert(bat, 50.0);
        rb.params.max_rate.insert(bat, 50.0);
        rb.params.initial_soc.insert(bat, 0.5);
        for t in 0..2 {
            rb.params.spot_price.insert((root, t), 5.0);
            rb.params.activation_up.insert((root, t), 1.0);
            // Paying handsomely for reserved capacity makes offering it
            // worthwhile.
            rb.params.afrr_up_cap_price.insert((root, t), 100.0);
        }
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let solved = solve(&instance, &SolveOptions::default()).unwrap();

        let n = tree.nodes().next().unwrap();
        for t in 0..2 {
            let reserved = solved.value(VarKey::ReserveUp { n, t, b: bat }).unwrap();
            let discharged = solved.value(VarKey::Discharge { n, t, b: bat }).unwrap();
            assert!(discharged + TOL >= reserved, "t={t}: {discharged} < {reserved}");
        }
        // The capacity payment dominates: some reserve is offered.
        let offered: f64 = (0..2)
            .map(|t| solved.value(VarKey::ReserveUp { n, t, b: bat }).unwrap())
            .sum();
        assert!(offered > TOL);
    }

    #[test]
    fn test_capex_cap_never_violated() {
        let mut rb = RegistryBuilder::new();
        rb.add_period(1).unwrap();
        let root = rb.add_node("root").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.params.probability.insert(root, 1.0);
        let gen = rb.add_technology("Generator").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(gen, elec, mode, 1.0).unwrap();
        // No installed capacity: serving demand requires expansion, capped
        // by CAPEX at 8 units of new capacity.
        rb.params.availability.insert((root, 0, gen), 1.0);
        rb.params.tech_expansion_cost.insert(gen, 2.0);
        rb.params.tech_capex_cap.insert(gen, 16.0);
        rb.params.demand.insert((root, 0, elec), 5.0);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree)
            .options(CatalogOptions { allow_tech_expansion: true, allow_storage_expansion: false })
            .build()
            .unwrap();
        let solved = solve(&instance, &SolveOptions::default()).unwrap();

        let built = solved.value(VarKey::TechExpansion { i: gen }).unwrap();
        assert!(2.0 * built <= 16.0 + TOL);
        assert!(built >= 5.0 - TOL, "expansion must cover demand, got {built}");
    }

    #[test]
    fn test_duals_expose_marginal_price() {
        // Marginal unit of demand at the intraday node costs 7 whether it
        // is bought day-ahead or intraday, so the energy-balance dual
        // carries that price.
        let mut rb = RegistryBuilder::new();
        rb.add_period(1).unwrap();
        let root = rb.add_node("root").unwrap();
        let child = rb.add_node("id").unwrap();
        rb.set_stage(root, Stage::DayAhead).unwrap();
        rb.set_stage(child, Stage::Intraday).unwrap();
        rb.add_parent_link(child, root);
        rb.params.probability.insert(root, 1.0);
        rb.params.probability.insert(child, 1.0);
        let grid = rb.add_technology("Power_Grid").unwrap();
        let elec = rb.add_carrier("Electricity").unwrap();
        let mode = rb.add_mode("m1").unwrap();
        rb.add_conversion_out(grid, elec, mode, 1.0).unwrap();
        rb.params.spot_price.insert((root, 0), 7.0);
        rb.params.intraday_price.insert((child, 0), 7.0);
        rb.params.demand.insert((child, 0, elec), 10.0);
        let reg = rb.finish().unwrap();
        let tree = ScenarioTree::build(&reg).unwrap();
        let instance = ModelBuilder::new(&reg, &tree).build().unwrap();
        let solved = solve(&instance, &SolveOptions::default()).unwrap();

        assert!((solved.objective_value() - 70.0).abs() < 1e-3);
        let dual = solved.dual("energy_balance[id,1,Electricity]").unwrap();
        assert!((dual.abs() - 7.0).abs() < 1e-3, "dual {dual}");
    }
}
