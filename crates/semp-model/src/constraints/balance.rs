//! Reserve aggregation and per-carrier energy balance.

use semp_core::SempResult;

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// `x_UP_Tot[n,t] = Σ_b x_UP[n,t,b]` over loads serving electricity, and the
/// same for down-regulation. With no electricity carrier the sums are empty
/// and the totals are pinned to zero, keeping the capacity-revenue terms of
/// the objective bounded.
pub(super) fn reserve_aggregation(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec_loads: Vec<_> = match reg.electricity() {
        Some(e) => reg.loads_for_carrier(e).collect(),
        None => Vec::new(),
    };

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            let mut up = LinearExpr::term(ctx.col(VarKey::ReserveUpTotal { n, t })?, 1.0);
            let mut dwn = LinearExpr::term(ctx.col(VarKey::ReserveDwnTotal { n, t })?, 1.0);
            for &b in &elec_loads {
                up.add(ctx.col(VarKey::ReserveUp { n, t, b })?, -1.0);
                dwn.add(ctx.col(VarKey::ReserveDwn { n, t, b })?, -1.0);
            }
            rows.push(ConstraintRow::new(
                Family::ReserveAggregation,
                format!("reserve_aggregation_up[{},{}]", ctx.node(n), ctx.period(t)),
                up,
                ComparisonOp::Eq,
            ));
            rows.push(ConstraintRow::new(
                Family::ReserveAggregation,
                format!("reserve_aggregation_dwn[{},{}]", ctx.node(n), ctx.period(t)),
                dwn,
                ComparisonOp::Eq,
            ));
        }
    }
    Ok(rows)
}

/// Supply minus export minus net storage draw equals demand, per
/// `(node, time, carrier)`. For electricity the demanded quantity is
/// adjusted by the net effect of activated reserve: called up-regulation
/// adds to what the site must deliver, called down-regulation subtracts.
pub(super) fn energy_balance(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let elec = reg.electricity();
    let mut rows = Vec::new();

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            for e in reg.carriers() {
                let mut expr = LinearExpr::new();

                for c in reg.conversions_out().iter().filter(|c| c.carrier == e) {
                    expr.add(
                        ctx.col(VarKey::FlowOut { n, t, i: c.tech, e, o: c.mode })?,
                        1.0,
                    );
                }
                for c in reg.conversions_in().iter().filter(|c| c.carrier == e) {
                    expr.add(ctx.col(VarKey::FlowIn { n, t, i: c.tech, e, o: c.mode })?, -1.0);
                }

                expr.add(ctx.col(VarKey::Export { n, t, e })?, -1.0);

                for b in reg.loads_for_carrier(e) {
                    expr.add(ctx.col(VarKey::Charge { n, t, b })?, -reg.charge_efficiency(b));
                    expr.add(ctx.col(VarKey::Discharge { n, t, b })?, 1.0);
                }

                expr.add_constant(-reg.demand(n, t, e));

                if Some(e) == elec {
                    let af_up = reg.activation_up(n, t);
                    let af_dwn = reg.activation_dwn(n, t);
                    for b in reg.loads_for_carrier(e) {
                        expr.add(ctx.col(VarKey::ReserveUp { n, t, b })?, -af_up);
                        expr.add(ctx.col(VarKey::ReserveDwn { n, t, b })?, af_dwn);
                    }
                }

                rows.push(ConstraintRow::new(
                    Family::EnergyBalance,
                    format!(
                        "energy_balance[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.carrier_name(e)
                    ),
                    expr,
                    ComparisonOp::Eq,
                ));
            }
        }
    }
    Ok(rows)
}
