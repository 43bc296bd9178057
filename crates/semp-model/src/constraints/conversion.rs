//! Conversion balance, ramping, availability and excess-heat rules.

use semp_core::SempResult;

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// `y_out = efficiency × activity` and `y_in = efficiency × activity`:
/// activity is the single quantity tying a technology's simultaneous
/// inputs and outputs together.
pub(super) fn conversion_balance(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            for c in reg.conversions_out() {
                let mut expr = LinearExpr::term(
                    ctx.col(VarKey::FlowOut { n, t, i: c.tech, e: c.carrier, o: c.mode })?,
                    1.0,
                );
                expr.add(ctx.col(VarKey::Activity { n, t, i: c.tech, o: c.mode })?, -c.efficiency);
                rows.push(ConstraintRow::new(
                    Family::ConversionOut,
                    format!(
                        "conversion_out[{},{},{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.tech_name(c.tech),
                        reg.carrier_name(c.carrier),
                        reg.mode_name(c.mode)
                    ),
                    expr,
                    ComparisonOp::Eq,
                ));
            }
            for c in reg.conversions_in() {
                let mut expr = LinearExpr::term(
                    ctx.col(VarKey::FlowIn { n, t, i: c.tech, e: c.carrier, o: c.mode })?,
                    1.0,
                );
                expr.add(ctx.col(VarKey::Activity { n, t, i: c.tech, o: c.mode })?, -c.efficiency);
                rows.push(ConstraintRow::new(
                    Family::ConversionIn,
                    format!(
                        "conversion_in[{},{},{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.tech_name(c.tech),
                        reg.carrier_name(c.carrier),
                        reg.mode_name(c.mode)
                    ),
                    expr,
                    ComparisonOp::Eq,
                ));
            }
        }
    }
    Ok(rows)
}

/// Output may move at most `ramp_factor × (installed + expanded)` per hour;
/// the first period ramps against an implicit zero prior state. Omitted for
/// technologies with no ramping limit configured.
pub(super) fn ramping(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            for c in reg.conversions_out() {
                let rf = match reg.ramping_factor(c.tech) {
                    Some(rf) => rf,
                    None => continue,
                };
                let mut expr = LinearExpr::term(
                    ctx.col(VarKey::FlowOut { n, t, i: c.tech, e: c.carrier, o: c.mode })?,
                    1.0,
                );
                if t > 0 {
                    expr.add(
                        ctx.col(VarKey::FlowOut {
                            n,
                            t: t - 1,
                            i: c.tech,
                            e: c.carrier,
                            o: c.mode,
                        })?,
                        -1.0,
                    );
                }
                expr.add_constant(-rf * reg.installed_capacity(c.tech));
                expr.add(ctx.col(VarKey::TechExpansion { i: c.tech })?, -rf);
                rows.push(ConstraintRow::new(
                    Family::Ramping,
                    format!(
                        "ramping[{},{},{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.tech_name(c.tech),
                        reg.carrier_name(c.carrier),
                        reg.mode_name(c.mode)
                    ),
                    expr,
                    ComparisonOp::Le,
                ));
            }
        }
    }
    Ok(rows)
}

/// Total output of a technology across its carriers and modes is limited by
/// `availability × (installed + expanded)`. Omitted where no availability
/// was configured for `(node, time, technology)`.
pub(super) fn supply_limit(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    for n in ctx.tree.nodes() {
        for t in 0..reg.num_periods() {
            let mut seen: Vec<semp_core::TechId> = Vec::new();
            for c in reg.conversions_out() {
                if seen.contains(&c.tech) {
                    continue;
                }
                seen.push(c.tech);
                let av = match reg.availability(n, t, c.tech) {
                    Some(av) => av,
                    None => continue,
                };
                let mut expr = LinearExpr::new();
                for cc in reg.conversions_out().iter().filter(|cc| cc.tech == c.tech) {
                    expr.add(
                        ctx.col(VarKey::FlowOut { n, t, i: cc.tech, e: cc.carrier, o: cc.mode })?,
                        1.0,
                    );
                }
                expr.add_constant(-av * reg.installed_capacity(c.tech));
                expr.add(ctx.col(VarKey::TechExpansion { i: c.tech })?, -av);
                rows.push(ConstraintRow::new(
                    Family::SupplyLimit,
                    format!(
                        "supply_limit[{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.tech_name(c.tech)
                    ),
                    expr,
                    ComparisonOp::Le,
                ));
            }
        }
    }
    Ok(rows)
}

/// Heat recovered beyond the electricity drawn is bounded by the excess
/// heat available at usable temperature, expressed as a fraction of the
/// output carrier's demand. Applies to the configured excess-heat
/// technology rules; each rule's electricity in-triple must be declared.
pub(super) fn excess_heat(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let elec = match reg.electricity() {
        Some(e) => e,
        None => return Ok(rows),
    };

    for &(i, e, o) in reg.excess_heat_rules() {
        for n in ctx.tree.nodes() {
            for t in 0..reg.num_periods() {
                let mut expr = LinearExpr::term(ctx.col(VarKey::FlowOut { n, t, i, e, o })?, 1.0);
                expr.add(ctx.col(VarKey::FlowIn { n, t, i, e: elec, o })?, -1.0);
                expr.add_constant(-reg.excess_heat_fraction() * reg.demand(n, t, e));
                rows.push(ConstraintRow::new(
                    Family::ExcessHeat,
                    format!(
                        "excess_heat[{},{},{},{}]",
                        ctx.node(n),
                        ctx.period(t),
                        reg.tech_name(i),
                        reg.carrier_name(e)
                    ),
                    expr,
                    ComparisonOp::Le,
                ));
            }
        }
    }
    Ok(rows)
}
