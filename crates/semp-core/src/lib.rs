//! # semp-core: Planning-Case Data Core
//!
//! Fundamental data structures for the SEMP stochastic energy market
//! planner: the [`Registry`] of typed sets and parameters, the validated
//! [`ScenarioTree`] over the registry's node set, and the unified
//! [`SempError`] taxonomy shared by every crate in the workspace.
//!
//! ## Design Philosophy
//!
//! - **Intern once, index everywhere.** Entity names are interned at load
//!   time; the rest of the system works with `Copy` newtype ids
//!   ([`NodeId`], [`TechId`], ...) and positional time indices. String
//!   lookups happen only at the I/O boundary.
//! - **Validate up front.** Data holes and malformed topology are load-time
//!   errors; by the time a registry and tree exist, model assembly can
//!   traverse them without defensive checks.
//! - **Read-only after construction.** Each solve builds a fresh problem
//!   instance from an immutable registry; there is no ambient mutable model
//!   state.

pub mod error;
pub mod registry;
pub mod tree;

pub use error::{SempError, SempResult};
pub use registry::{
    CarrierId, Conversion, IntervalId, LoadId, ModeId, MonthId, NodeId, Params, Registry,
    RegistryBuilder, TechId, ELECTRICITY, GRID_TECHNOLOGY,
};
pub use tree::{ScenarioTree, Stage};
