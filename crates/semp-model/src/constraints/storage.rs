//! Storage dynamics and limits, generated once per flexible load.

use semp_core::SempResult;

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// State-of-charge recurrence, the end-of-horizon return condition and the
/// stored-energy limit.
///
/// `SoC[t] = SoC[t-1]·(1-σ) + charge[t] - discharge[t]/η`, seeded at the
/// first period with the initial fraction of (base + expanded) capacity.
/// The final period must return to that initial level so the model cannot
/// drain storage for free at the horizon boundary.
pub(super) fn storage_dynamics(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let horizon_end = reg.num_periods() - 1;

    for b in reg.flexible_loads() {
        let eta = reg.discharge_efficiency(b);
        let sigma = reg.self_discharge(b);
        let init = reg.initial_soc(b);

        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                let mut expr = LinearExpr::term(ctx.col(VarKey::StateOfCharge { n, t, b })?, 1.0);
                expr.add(ctx.col(VarKey::Charge { n, t, b })?, -1.0);
                expr.add(ctx.col(VarKey::Discharge { n, t, b })?, 1.0 / eta);
                if t == 0 {
                    expr.add_constant(-init * reg.max_storage(b) * (1.0 - sigma));
                    expr.add(
                        ctx.col(VarKey::StorageExpansion { b })?,
                        -init * (1.0 - sigma),
                    );
                } else {
                    expr.add(
                        ctx.col(VarKey::StateOfCharge { n, t: t - 1, b })?,
                        -(1.0 - sigma),
                    );
                }
                rows.push(ConstraintRow::new(
                    Family::SocDynamics,
                    format!(
                        "soc_dynamics[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                    expr,
                    ComparisonOp::Eq,
                ));

                let mut limit = LinearExpr::term(ctx.col(VarKey::StateOfCharge { n, t, b })?, 1.0);
                limit.add_constant(-reg.max_storage(b));
                limit.add(ctx.col(VarKey::StorageExpansion { b })?, -1.0);
                rows.push(ConstraintRow::new(
                    Family::SocLimit,
                    format!("soc_limit[{},{},{}]", ctx.node(n), ctx.period(t), reg.load_name(b)),
                    limit,
                    ComparisonOp::Le,
                ));
            }

            let mut end =
                LinearExpr::term(ctx.col(VarKey::StateOfCharge { n, t: horizon_end, b })?, 1.0);
            end.add_constant(-init * reg.max_storage(b));
            end.add(ctx.col(VarKey::StorageExpansion { b })?, -init);
            rows.push(ConstraintRow::new(
                Family::SocEndOfHorizon,
                format!("soc_end_of_horizon[{},{}]", ctx.node(n), reg.load_name(b)),
                end,
                ComparisonOp::Eq,
            ));
        }
    }
    Ok(rows)
}

/// Charge/discharge rate limit for loads outside the shifting scheme,
/// whose rates are bounded by the per-step shift caps instead.
pub(super) fn rate_limit(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    for &(b, e) in reg.load_carrier_pairs() {
        if reg.is_shiftable(b, e) {
            continue;
        }
        let eta = reg.discharge_efficiency(b);
        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                let mut expr = LinearExpr::term(ctx.col(VarKey::Charge { n, t, b })?, 1.0);
                expr.add(ctx.col(VarKey::Discharge { n, t, b })?, 1.0 / eta);
                expr.add_constant(-reg.max_rate(b));
                expr.add(ctx.col(VarKey::StorageExpansion { b })?, -reg.energy_to_power(b));
                rows.push(ConstraintRow::new(
                    Family::ChargeRateLimit,
                    format!(
                        "charge_rate_limit[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                    expr,
                    ComparisonOp::Le,
                ));
            }
        }
    }
    Ok(rows)
}
