//! Constraint generation
//!
//! Each family function is side-effect-free: it reads the registry, tree
//! and catalog and returns its rows. Families run in parallel and are
//! concatenated in a fixed order, so the assembled instance is
//! deterministic regardless of scheduling.
//!
//! Omission policy: a rule whose domain restriction is not met (wrong
//! carrier, triple outside the declared relation, time step outside a
//! shifting window) is skipped entirely, never emitted as a trivial
//! equality. A *declared* domain member whose variable is missing from the
//! catalog is a generator bug and surfaces as a `ConstraintDomain` error.

use rayon::prelude::*;
use semp_core::{NodeId, Registry, ScenarioTree, SempResult};

use crate::catalog::{VarKey, VariableCatalog};
use crate::expr::ConstraintRow;

mod balance;
mod conversion;
mod investment;
mod market;
mod reserve;
mod shifting;
mod storage;

/// Read-only view shared by every family generator.
pub(crate) struct Ctx<'a> {
    pub reg: &'a Registry,
    pub tree: &'a ScenarioTree,
    pub cat: &'a VariableCatalog,
}

impl Ctx<'_> {
    fn col(&self, key: VarKey) -> SempResult<usize> {
        self.cat.column(key)
    }

    fn node(&self, n: NodeId) -> &str {
        self.reg.node_name(n)
    }

    fn period(&self, t: usize) -> i64 {
        self.reg.period_label(t)
    }
}

type FamilyFn = fn(&Ctx) -> SempResult<Vec<ConstraintRow>>;

/// Fixed generation order; also the row order of the assembled instance.
const GENERATORS: &[FamilyFn] = &[
    balance::reserve_aggregation,
    balance::energy_balance,
    market::market_balance,
    market::market_balance_chained,
    market::intraday_cap,
    market::non_anticipativity,
    conversion::conversion_balance,
    conversion::ramping,
    conversion::supply_limit,
    conversion::excess_heat,
    shifting::window_balance,
    shifting::zero_outside_windows,
    shifting::shift_caps,
    shifting::reserve_soc_coupling,
    reserve::reserve_limits,
    reserve::storage_guard,
    reserve::activation_realization,
    storage::storage_dynamics,
    storage::rate_limit,
    market::export_cap,
    market::peak_draw,
    investment::capex_caps,
    investment::emission_cap,
];

/// Generate every constraint family over the given model context.
pub fn generate(
    reg: &Registry,
    tree: &ScenarioTree,
    cat: &VariableCatalog,
) -> SempResult<Vec<ConstraintRow>> {
    let ctx = Ctx { reg, tree, cat };
    let batches: Vec<Vec<ConstraintRow>> =
        GENERATORS.par_iter().map(|family| family(&ctx)).collect::<SempResult<_>>()?;
    Ok(batches.into_iter().flatten().collect())
}
