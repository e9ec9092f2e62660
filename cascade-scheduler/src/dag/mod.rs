//! Workflow dependency graph
//!
//! In-memory DAG of one workflow's jobs and dependency edges, plus the pure
//! validation functions (cycle detection, structural rules, topological
//! ordering) proving a candidate graph is safe to persist or trigger.

pub mod graph;
pub mod validate;

pub use graph::{JobSpec, WorkflowGraph};
pub use validate::{find_cycle, topological_order, validate};
