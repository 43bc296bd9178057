//! Investment CAPEX caps and the per-node carbon emission cap.

use semp_core::SempResult;

use super::Ctx;
use crate::catalog::VarKey;
use crate::expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};

/// `unit_cost × new_capacity ≤ max CAPEX`, per technology and per storage.
pub(super) fn capex_caps(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();

    for i in reg.technologies() {
        let mut expr =
            LinearExpr::term(ctx.col(VarKey::TechExpansion { i })?, reg.tech_expansion_cost(i));
        expr.add_constant(-reg.tech_capex_cap(i));
        rows.push(ConstraintRow::new(
            Family::CapexTech,
            format!("capex_tech[{}]", reg.tech_name(i)),
            expr,
            ComparisonOp::Le,
        ));
    }
    for b in reg.flexible_loads() {
        let mut expr = LinearExpr::term(
            ctx.col(VarKey::StorageExpansion { b })?,
            reg.storage_expansion_cost(b),
        );
        expr.add_constant(-reg.storage_capex_cap(b));
        rows.push(ConstraintRow::new(
            Family::CapexStorage,
            format!("capex_storage[{}]", reg.load_name(b)),
            expr,
            ComparisonOp::Le,
        ));
    }
    Ok(rows)
}

/// Per-scenario emission cap: total activity-weighted carbon intensity over
/// the horizon stays under the configured annual limit. Omitted entirely
/// when no cap is configured.
pub(super) fn emission_cap(ctx: &Ctx) -> SempResult<Vec<ConstraintRow>> {
    let reg = ctx.reg;
    let mut rows = Vec::new();
    let cap = match reg.max_emission() {
        Some(cap) => cap,
        None => return Ok(rows),
    };

    for n in ctx.tree.nodes() {
        let mut expr = LinearExpr::new();
        for t in 0..reg.num_periods() {
            for c in reg.conversions_out() {
                expr.add(
                    ctx.col(VarKey::Activity { n, t, i: c.tech, o: c.mode })?,
                    reg.carbon_intensity(c.tech, c.mode),
                );
            }
        }
        expr.add_constant(-cap);
        rows.push(ConstraintRow::new(
            Family::EmissionCap,
            format!("emission_cap[{}]", ctx.node(n)),
            expr,
            ComparisonOp::Le,
        ));
    }
    Ok(rows)
}
