//! Load-shifting windows: conservation inside each window, hard zeros
//! outside any window, per-step shift caps and the coupling between
//! reserved aFRR capacity and the window's state-of-charge trajectory.

use semp_core::{LoadId, SempResult};

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// Net energy moved within a shifting window is exactly zero: load is
/// shifted in time, never created or destroyed.
pub(super) fn window_balance(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    for b in shiftable_loads(ctx) {
        let eta = reg.discharge_efficiency(b);
        for iv in reg.shift_intervals() {
            for n in ctx.tree.nodes() {
                let mut expr = LinearExpr::new();
                for &t in reg.window(iv) {
                    expr.add(ctx.col(VarKey::Charge { n, t, b })?, 1.0);
                    expr.add(ctx.col(VarKey::Discharge { n, t, b })?, -1.0 / eta);
                }
                rows.push(ConstraintRow::new(
                    Family::ShiftWindow,
                    format!(
                        "shift_window[{},{},{}]",
                        ctx.node(n),
                        reg.interval_name(iv),
                        reg.load_name(b)
                    ),
                    expr,
                    ComparisonOp::Eq,
                ));
            }
        }
    }
    Ok(rows)
}

/// Outside every shifting window a shiftable load neither charges,
/// discharges nor offers reserve.
pub(super) fn zero_outside_windows(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    let pin = |rows: &mut Vec<ConstraintRow>, col: usize, label: String| {
        rows.push(ConstraintRow::new(
            Family::ShiftZeroOutside,
            label,
            LinearExpr::term(col, 1.0),
            ComparisonOp::Eq,
        ));
    };

    for b in shiftable_loads(ctx) {
        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                if reg.in_any_window(t) {
                    continue;
                }
                let at = |kind: &str| {
                    format!(
                        "shift_zero_{kind}[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    )
                };
                pin(&mut rows, ctx.col(VarKey::Charge { n, t, b })?, at("charge"));
                pin(&mut rows, ctx.col(VarKey::Discharge { n, t, b })?, at("discharge"));
                pin(&mut rows, ctx.col(VarKey::ReserveUp { n, t, b })?, at("reserve_up"));
                pin(&mut rows, ctx.col(VarKey::ReserveDwn { n, t, b })?, at("reserve_dwn"));
            }
        }
    }
    Ok(rows)
}

/// Per-step shifting caps: combined charge plus discharge inside a window,
/// and reserved capacity at every step, are both limited to the configured
/// fraction of that step's demand.
pub(super) fn shift_caps(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let elec = reg.electricity();
    let mut rows = Vec::new();

    for (b, e) in reg.shiftable_pairs() {
        let eta = reg.discharge_efficiency(b);
        for n in ctx.tree.nodes() {
            for iv in reg.shift_intervals() {
                for &t in reg.window(iv) {
                    let mut expr = LinearExpr::term(ctx.col(VarKey::Charge { n, t, b })?, 1.0);
                    expr.add(ctx.col(VarKey::Discharge { n, t, b })?, 1.0 / eta);
                    expr.add_constant(-reg.up_shift_max() * reg.demand(n, t, e));
                    rows.push(ConstraintRow::new(
                        Family::ShiftCap,
                        format!(
                            "shift_cap[{},{},{},{}]",
                            ctx.node(n),
                            ctx.period(t),
                            reg.load_name(b),
                            reg.carrier_name(e)
                        ),
                        expr,
                        ComparisonOp::Le,
                    ));
                }
            }

            if Some(e) == elec {
                for t in 0..reg.num_periods() {
                    let mut expr = LinearExpr::term(ctx.col(VarKey::ReserveDwn { n, t, b })?, 1.0);
                    expr.add(ctx.col(VarKey::ReserveUp { n, t, b })?, 1.0 / eta);
                    expr.add_constant(-reg.up_shift_max() * reg.demand(n, t, e));
                    rows.push(ConstraintRow::new(
                        Family::ShiftReserveDemandCap,
                        format!(
                            "shift_reserve_demand_cap[{},{},{}]",
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
    }
    Ok(rows)
}

/// Reserved aFRR capacity of a shiftable load is bounded by the headroom
/// its window trajectory still allows: up-regulation by the energy above
/// the window's terminal state of charge plus the remaining shiftable
/// demand, down-regulation symmetrically below it.
pub(super) fn reserve_soc_coupling(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec = match reg.electricity() {
        Some(e) => e,
        None => return Ok(rows),
    };

    for (b, e) in reg.shiftable_pairs() {
        if e != elec {
            continue;
        }
        let eta = reg.discharge_efficiency(b);
        for iv in reg.shift_intervals() {
            let window = reg.window(iv);
            let last = match window.last() {
                Some(&t) => t,
                None => continue,
            };
            for n in ctx.tree.nodes() {
                for (pos, &t) in window.iter().enumerate() {
                    let up_headroom: f64 =
                        window[pos..].iter().map(|&k| reg.up_shift_max() * reg.demand(n, k, e)).sum();
                    let dwn_headroom: f64 = window[pos..]
                        .iter()
                        .map(|&k| reg.down_shift_max() * reg.demand(n, k, e))
                        .sum();

                    // x_UP/η ≤ SoC(before t) − SoC(window end) + headroom
                    let mut up = LinearExpr::term(ctx.col(VarKey::ReserveUp { n, t, b })?, 1.0 / eta);
                    up.add(ctx.col(VarKey::StateOfCharge { n, t: last, b })?, 1.0);
                    prior_soc(ctx, &mut up, n, t, b, -1.0)?;
                    up.add_constant(-up_headroom);
                    rows.push(ConstraintRow::new(
                        Family::ShiftReserveSocUp,
                        format!(
                            "shift_reserve_soc_up[{},{},{}]",
                            ctx.node(n),
                            ctx.period(t),
                            reg.load_name(b)
                        ),
                        up,
                        ComparisonOp::Le,
                    ));

                    // x_DWN ≤ SoC(window end) − SoC(before t) + headroom
                    let mut dwn = LinearExpr::term(ctx.col(VarKey::ReserveDwn { n, t, b })?, 1.0);
                    dwn.add(ctx.col(VarKey::StateOfCharge { n, t: last, b })?, -1.0);
                    prior_soc(ctx, &mut dwn, n, t, b, 1.0)?;
                    dwn.add_constant(-dwn_headroom);
                    rows.push(ConstraintRow::new(
                        Family::ShiftReserveSocDwn,
                        format!(
                            "shift_reserve_soc_dwn[{},{},{}]",
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
    }
    Ok(rows)
}

/// Shiftable loads in pair order, each load once even when it is shiftable
/// for several carriers.
fn shiftable_loads(ctx: &Ctx) -> Vec<LoadId> {
    let mut loads = Vec::new();
    for (b, _) in ctx.reg.shiftable_pairs() {
        if !loads.contains(&b) {
            loads.push(b);
        }
    }
    loads
}

/// Add `sign × SoC(before t)` to `expr`: the previous period's state of
/// charge, or the configured initial level at the horizon start.
fn prior_soc(
    ctx: &Ctx,
    expr: &mut LinearExpr,
    n: semp_core::NodeId,
    t: usize,
    b: LoadId,
    sign: f64,
) -> SempResult<()> {
    if t == 0 {
        expr.add_constant(sign * ctx.reg.initial_soc(b) * ctx.reg.max_storage(b));
    } else {
        expr.add(ctx.col(VarKey::StateOfCharge { n, t: t - 1, b })?, sign);
    }
    Ok(())
}
