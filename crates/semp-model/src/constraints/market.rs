//! Market sequencing: grid delivery vs. market positions, the intraday
//! adjustment cap, non-anticipativity ties, the export cap and the monthly
//! peak-draw link.

use semp_core::{SempResult, Stage};

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// Grid-delivered electricity equals the day-ahead position plus the net
/// intraday and real-time adjustments, at every node. Only the grid
/// technology's electricity out-triples participate; the rule is omitted
/// when either distinguished entity is absent.
pub(super) fn market_balance(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let (grid, elec) = match (reg.grid_tech(), reg.electricity()) {
        (Some(g), Some(e)) => (g, e),
        _ => return Ok(rows),
    };

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            for c in grid_triples(ctx, grid, elec) {
                let mut expr =
                    LinearExpr::term(ctx.col(VarKey::FlowOut { n, t, i: grid, e: elec, o: c })?, 1.0);
                expr.add(ctx.col(VarKey::DayAhead { n, t })?, -1.0);
                expr.add(ctx.col(VarKey::IntradayUp { n, t })?, -1.0);
                expr.add(ctx.col(VarKey::IntradayDwn { n, t })?, 1.0);
                expr.add(ctx.col(VarKey::RealTimeUp { n, t })?, -1.0);
                expr.add(ctx.col(VarKey::RealTimeDwn { n, t })?, 1.0);
                rows.push(ConstraintRow::new(
                    Family::MarketBalance,
                    format!(
                        "market_balance[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.mode_name(c)
                    ),
                    expr,
                    ComparisonOp::Eq,
                ));
            }
        }
    }
    Ok(rows)
}

/// Stage-chained delivery along parent links: an intraday node delivers its
/// parent's day-ahead position plus its own intraday net, a real-time node
/// delivers its parent's delivery plus its own real-time net.
pub(super) fn market_balance_chained(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let tree = ctx.tree;
    let mut rows = Vec::new();
    let (grid, elec) = match (reg.grid_tech(), reg.electricity()) {
        (Some(g), Some(e)) => (g, e),
        _ => return Ok(rows),
    };

    for (n, p) in tree.parent_pairs() {
        for t in 0..reg.num_periods() {
            for c in grid_triples(ctx, grid, elec) {
                match tree.stage(n) {
                    Stage::Intraday => {
                        let mut expr = LinearExpr::term(
                            ctx.col(VarKey::FlowOut { n, t, i: grid, e: elec, o: c })?,
                            1.0,
                        );
                        expr.add(ctx.col(VarKey::DayAhead { n: p, t })?, -1.0);
                        expr.add(ctx.col(VarKey::IntradayUp { n, t })?, -1.0);
                        expr.add(ctx.col(VarKey::IntradayDwn { n, t })?, 1.0);
                        rows.push(ConstraintRow::new(
                            Family::MarketBalanceIntraday,
                            format!(
                                "market_balance_id[{},{},{}]",
                                ctx.node(n),
                                ctx.period(t),
                                reg.mode_name(c)
                            ),
                            expr,
                            ComparisonOp::Eq,
                        ));
                    }
                    Stage::RealTime => {
                        let mut expr = LinearExpr::term(
                            ctx.col(VarKey::FlowOut { n, t, i: grid, e: elec, o: c })?,
                            1.0,
                        );
                        expr.add(
                            ctx.col(VarKey::FlowOut { n: p, t, i: grid, e: elec, o: c })?,
                            -1.0,
                        );
                        expr.add(ctx.col(VarKey::RealTimeUp { n, t })?, -1.0);
                        expr.add(ctx.col(VarKey::RealTimeDwn { n, t })?, 1.0);
                        rows.push(ConstraintRow::new(
                            Family::MarketBalanceRealTime,
                            format!(
                                "market_balance_rt[{},{},{}]",
                                ctx.node(n),
                                ctx.period(t),
                                reg.mode_name(c)
                            ),
                            expr,
                            ComparisonOp::Eq,
                        ));
                    }
                    Stage::DayAhead => {}
                }
            }
        }
    }
    Ok(rows)
}

/// Total intraday adjustment is capped at 20% of the day-ahead position.
pub(super) fn intraday_cap(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            let mut expr = LinearExpr::term(ctx.col(VarKey::IntradayUp { n, t })?, 1.0);
            expr.add(ctx.col(VarKey::IntradayDwn { n, t })?, 1.0);
            expr.add(ctx.col(VarKey::DayAhead { n, t })?, -0.2);
            rows.push(ConstraintRow::new(
                Family::IntradayCap,
                format!("intraday_cap[{},{}]", ctx.node(n), ctx.period(t)),
                expr,
                ComparisonOp::Le,
            ));
        }
    }
    Ok(rows)
}

/// Decisions fixed before uncertainty resolves are equal across the
/// scenarios that later resolve it: day-ahead positions along every parent
/// link, intraday positions into the real-time stage, and per-load reserve
/// capacities along every parent link.
pub(super) fn non_anticipativity(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let tree = ctx.tree;
    let mut rows = Vec::new();
    let elec_loads: Vec<_> = match reg.electricity() {
        Some(e) => reg.loads_for_carrier(e).collect(),
        None => Vec::new(),
    };

    let tie = |rows: &mut Vec<ConstraintRow>, a: usize, b: usize, label: String| {
        let mut expr = LinearExpr::term(a, 1.0);
        expr.add(b, -1.0);
        rows.push(ConstraintRow::new(Family::NonAnticipativity, label, expr, ComparisonOp::Eq));
    };

    for (n, p) in tree.parent_pairs() {
        for t in 0..reg.num_periods() {
            tie(
                &mut rows,
                ctx.col(VarKey::DayAhead { n, t })?,
                ctx.col(VarKey::DayAhead { n: p, t })?,
                format!("na_day_ahead[{},{}]", ctx.node(n), ctx.period(t)),
            );

            if tree.stage(n) == Stage::RealTime {
                tie(
                    &mut rows,
                    ctx.col(VarKey::IntradayUp { n, t })?,
                    ctx.col(VarKey::IntradayUp { n: p, t })?,
                    format!("na_intraday_up[{},{}]", ctx.node(n), ctx.period(t)),
                );
                tie(
                    &mut rows,
                    ctx.col(VarKey::IntradayDwn { n, t })?,
                    ctx.col(VarKey::IntradayDwn { n: p, t })?,
                    format!("na_intraday_dwn[{},{}]", ctx.node(n), ctx.period(t)),
                );
            }

            for &b in &elec_loads {
                tie(
                    &mut rows,
                    ctx.col(VarKey::ReserveUp { n, t, b })?,
                    ctx.col(VarKey::ReserveUp { n: p, t, b })?,
                    format!(
                        "na_reserve_up[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                );
                tie(
                    &mut rows,
                    ctx.col(VarKey::ReserveDwn { n, t, b })?,
                    ctx.col(VarKey::ReserveDwn { n: p, t, b })?,
                    format!(
                        "na_reserve_dwn[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.load_name(b)
                    ),
                );
            }
        }
    }
    Ok(rows)
}

/// Electricity export is limited by the configured concession.
pub(super) fn export_cap(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec = match reg.electricity() {
        Some(e) => e,
        None => return Ok(rows),
    };

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            let mut expr = LinearExpr::term(ctx.col(VarKey::Export { n, t, e: elec })?, 1.0);
            expr.add_constant(-reg.max_export());
            rows.push(ConstraintRow::new(
                Family::ExportCap,
                format!("export_cap[{},{}]", ctx.node(n), ctx.period(t)),
                expr,
                ComparisonOp::Le,
            ));
        }
    }
    Ok(rows)
}

/// Grid delivery at every hour of a month stays below that month's peak
/// variable, which the objective bills once per real-time node.
pub(super) fn peak_draw(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let (grid, elec) = match (reg.grid_tech(), reg.electricity()) {
        (Some(g), Some(e)) => (g, e),
        _ => return Ok(rows),
    };

    for n in ctx.tree.nodes() {
        for m in reg.months() {
            for &t in reg.periods_in_month(m) {
                for c in grid_triples(ctx, grid, elec) {
                    let mut expr = LinearExpr::term(
                        ctx.col(VarKey::FlowOut { n, t, i: grid, e: elec, o: c })?,
                        1.0,
                    );
                    expr.add(ctx.col(VarKey::PeakDraw { n, m })?, -1.0);
                    rows.push(ConstraintRow::new(
                        Family::PeakDraw,
                        format!(
                            "peak_draw[{},{},{},{}]",
                            ctx.node(n),
                            ctx.period(t),
                            reg.mode_name(c),
                            reg.month_name(m)
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

/// Modes in which the grid technology outputs electricity.
fn grid_triples(
    ctx: &Ctx,
    grid: semp_core::TechId,
    elec: semp_core::CarrierId,
) -> Vec<semp_core::ModeId> {
    ctx.reg
        .conversions_out()
        .iter()
        .filter(|c| c.tech == grid && c.carrier == elec)
        .map(|c| c.mode)
        .collect()
}
