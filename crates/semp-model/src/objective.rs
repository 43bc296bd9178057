//! Expected-cost objective
//!
//! Costs attach to the stage where the corresponding uncertainty resolves:
//! day-ahead purchases and reserve-capacity revenue at day-ahead nodes,
//! intraday adjustments at intraday nodes, and everything
//! activation-contingent (reserve activation, conversion fuel and carbon
//! cost, balancing, imbalance, storage wear, grid tariff) at real-time
//! nodes. Investment cost is deterministic and enters unweighted.

use semp_core::{Registry, ScenarioTree, SempResult, Stage};

use crate::catalog::{VarKey, VariableCatalog};
use crate::expr::LinearExpr;

/// Fold prices and probabilities into the minimised expression.
pub fn build_objective(
    reg: &Registry,
    tree: &ScenarioTree,
    cat: &VariableCatalog,
) -> SempResult<LinearExpr> {
    let mut obj = LinearExpr::new();

    for i in reg.technologies() {
        obj.add(cat.column(VarKey::TechExpansion { i })?, reg.tech_expansion_cost(i));
    }
    for b in reg.flexible_loads() {
        obj.add(cat.column(VarKey::StorageExpansion { b })?, reg.storage_expansion_cost(b));
    }

    for t in 0..reg.num_periods() {
        for n in tree.stage_nodes(Stage::DayAhead) {
            let p = tree.probability(n);
            obj.add(cat.column(VarKey::DayAhead { n, t })?, p * reg.spot_price(n, t));
            obj.add(
                cat.column(VarKey::ReserveUpTotal { n, t })?,
                -p * reg.afrr_up_cap_price(n, t),
            );
            obj.add(
                cat.column(VarKey::ReserveDwnTotal { n, t })?,
                -p * reg.afrr_dwn_cap_price(n, t),
            );
        }

        for n in tree.stage_nodes(Stage::Intraday) {
            let p = tree.probability(n);
            let price = reg.intraday_price(n, t);
            obj.add(cat.column(VarKey::IntradayUp { n, t })?, p * price);
            obj.add(cat.column(VarKey::IntradayDwn { n, t })?, -p * price);
        }

        for n in tree.stage_nodes(Stage::RealTime) {
            let p = tree.probability(n);

            // Activation settlement: up-regulation is compensated, called
            // down-regulation is paid for.
            obj.add(
                cat.column(VarKey::ReserveUpTotal { n, t })?,
                -p * reg.activation_up(n, t) * reg.afrr_up_act_price(n, t),
            );
            obj.add(
                cat.column(VarKey::ReserveDwnTotal { n, t })?,
                p * reg.activation_dwn(n, t) * reg.afrr_dwn_act_price(n, t),
            );

            // Fuel and carbon cost per unit of conversion activity.
            for c in reg.conversions_out() {
                let unit_cost = reg.energy_cost(n, t, c.tech)
                    + reg.carbon_price() * reg.carbon_intensity(c.tech, c.mode);
                obj.add(
                    cat.column(VarKey::Activity { n, t, i: c.tech, o: c.mode })?,
                    p * unit_cost,
                );
            }
            for e in reg.carriers() {
                obj.add(cat.column(VarKey::Export { n, t, e })?, -p * reg.export_price(n, t, e));
            }

            // Real-time balancing settlement plus the imbalance penalty on
            // both directions.
            obj.add(
                cat.column(VarKey::RealTimeUp { n, t })?,
                p * (reg.rk_up_price(n, t) + reg.imbalance_cost()),
            );
            obj.add(
                cat.column(VarKey::RealTimeDwn { n, t })?,
                p * (reg.imbalance_cost() - reg.rk_dwn_price(n, t)),
            );

            for b in reg.flexible_loads() {
                obj.add(cat.column(VarKey::Discharge { n, t, b })?, p * reg.storage_cost(b));
            }
        }
    }

    // Demand-charge tariff: each month's peak is billed once per real-time
    // node, not once per hour.
    for n in tree.stage_nodes(Stage::RealTime) {
        let p = tree.probability(n);
        for m in reg.months() {
            obj.add(cat.column(VarKey::PeakDraw { n, m })?, p * reg.grid_tariff());
        }
    }

    Ok(obj)
}
