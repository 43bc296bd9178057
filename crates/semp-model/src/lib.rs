//! # semp-model: Stochastic Dispatch and Expansion Model Assembly
//!
//! Turns a validated [`semp_core::Registry`] and [`semp_core::ScenarioTree`]
//! into a linear program and solves it with Clarabel through `good_lp`.
//!
//! ## Pipeline
//!
//! 1. [`VariableCatalog`] enumerates every decision variable over the
//!    scenario tree and time horizon, with its bounds, at a stable column
//!    index.
//! 2. [`objective::build_objective`] folds prices and node probabilities
//!    into the expected-cost expression.
//! 3. [`constraints::generate`] runs the constraint-family generators in
//!    parallel and concatenates their rows in a fixed order, so two builds
//!    of the same case produce identical matrices.
//! 4. [`solve`] lowers the assembled [`ProblemInstance`] to the solver,
//!    then maps primal values, duals and failure modes back to typed
//!    results.
//!
//! Steps 1-3 are pure; [`ModelBuilder`] is the front door that runs them in
//! sequence. Tuples outside a declared relation get no variable and no
//! constraint row, never a zero-filled placeholder, so a lookup for an
//! undeclared combination fails loudly instead of silently relaxing the
//! model.

pub mod catalog;
pub mod constraints;
pub mod expr;
pub mod instance;
pub mod objective;
pub mod solve;

pub use catalog::{Bounds, CatalogOptions, VarKey, VariableCatalog};
pub use expr::{ComparisonOp, ConstraintRow, Family, LinearExpr};
pub use instance::{ModelBuilder, ProblemInstance};
pub use solve::{solve, SolveOptions, SolvedModel};
