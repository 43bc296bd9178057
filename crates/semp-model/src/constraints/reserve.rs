//! aFRR participation of flexible loads: rate limits for non-shiftable
//! loads, the stored-energy guard, and activation realization.

use semp_core::SempResult;

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// A non-shiftable load's reserve offer is limited by its charge/discharge
/// rating: `x_DWN + x_UP/η ≤ rate + e2p·expansion`.
pub(super) fn reserve_limits(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec = match reg.electricity() {
        Some(e) => e,
        None => return Ok(rows),
    };

    for &(b, e) in reg.load_carrier_pairs() {
        if e != elec || reg.is_shiftable(b, e) {
            continue;
        }
        let eta = reg.discharge_efficiency(b);
        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                let mut expr = LinearExpr::term(ctx.col(VarKey::ReserveDwn { n, t, b })?, 1.0);
                expr.add(ctx.col(VarKey::ReserveUp { n, t, b })?, 1.0 / eta);
                expr.add_constant(-reg.max_rate(b));
                expr.add(ctx.col(VarKey::StorageExpansion { b })?, -reg.energy_to_power(b));
                rows.push(ConstraintRow::new(
                    Family::ReserveLimit,
                    format!(
                        "reserve_limit[{},{},{}]",
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

/// Reserve must be physically backed by storage: up-regulation by energy
/// already stored at the end of the previous period, down-regulation by
/// the headroom left to full capacity. The first period uses the initial
/// state of charge of the (possibly expanded) capacity.
pub(super) fn storage_guard(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec = match reg.electricity() {
        Some(e) => e,
        None => return Ok(rows),
    };

    for &(b, e) in reg.load_carrier_pairs() {
        if e != elec || reg.is_shiftable(b, e) {
            continue;
        }
        let init = reg.initial_soc(b);
        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                // x_UP ≤ SoC[t-1]  (t=1: initial fraction of capacity)
                let mut up = LinearExpr::term(ctx.col(VarKey::ReserveUp { n, t, b })?, 1.0);
                if t == 0 {
                    up.add_constant(-init * reg.max_storage(b));
                    up.add(ctx.col(VarKey::StorageExpansion { b })?, -init);
                } else {
                    up.add(ctx.col(VarKey::StateOfCharge { n, t: t - 1, b })?, -1.0);
                }
                rows.push(ConstraintRow::new(
                    Family::ReserveStorageGuard,
                    format!(
                        "reserve_storage_guard_up[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                    up,
                    ComparisonOp::Le,
                ));

                // x_DWN ≤ capacity − SoC[t-1]
                let mut dwn = LinearExpr::term(ctx.col(VarKey::ReserveDwn { n, t, b })?, 1.0);
                if t == 0 {
                    dwn.add_constant(-(1.0 - init) * reg.max_storage(b));
                    dwn.add(ctx.col(VarKey::StorageExpansion { b })?, -(1.0 - init));
                } else {
                    dwn.add(ctx.col(VarKey::StateOfCharge { n, t: t - 1, b })?, 1.0);
                    dwn.add_constant(-reg.max_storage(b));
                    dwn.add(ctx.col(VarKey::StorageExpansion { b })?, -1.0);
                }
                rows.push(ConstraintRow::new(
                    Family::ReserveStorageGuard,
                    format!(
                        "reserve_storage_guard_dwn[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                    dwn,
                    ComparisonOp::Le,
                ));
            }
        }
    }
    Ok(rows)
}

/// Reserved capacity, once called, must be physically delivered: actual
/// discharge covers the activated up-regulation and actual charging covers
/// the activated down-regulation. With an activation factor of zero the
/// rule is vacuous; at one it forces full realization.
pub(super) fn activation_realization(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec = match reg.electricity() {
        Some(e) => e,
        None => return Ok(rows),
    };

    for &(b, e) in reg.load_carrier_pairs() {
        if e != elec {
            continue;
        }
        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                let mut up =
                    LinearExpr::term(ctx.col(VarKey::ReserveUp { n, t, b })?, reg.activation_up(n, t));
                up.add(ctx.col(VarKey::Discharge { n, t, b })?, -1.0);
                rows.push(ConstraintRow::new(
                    Family::ReserveActivation,
                    format!(
                        "activation_up[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                    up,
                    ComparisonOp::Le,
                ));

                let mut dwn = LinearExpr::term(
                    ctx.col(VarKey::ReserveDwn { n, t, b })?,
                    reg.activation_dwn(n, t),
                );
                dwn.add(ctx.col(VarKey::Charge { n, t, b })?, -reg.charge_efficiency(b));
                rows.push(ConstraintRow::new(
                    Family::ReserveActivation,
                    format!(
                        "activation_dwn[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                    dwn,
                    ComparisonOp::Le,
                ));
            }
        }
    }
    Ok(rows)
}
