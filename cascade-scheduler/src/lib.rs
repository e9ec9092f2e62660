//! Cascade Scheduler
//!
//! Scheduling core for the Cascade workflow system.
//!
//! This crate contains:
//! - DAG model and validation: workflow graphs with cycle detection and
//!   validate-before-commit editing
//! - Executor registry and routing: component-typed executor pools with
//!   pluggable routing strategies
//! - Trigger dispatch: run state machines, retry with backoff, failure
//!   policies, and completion callbacks
//!
//! Storage and transport are ports; embedders supply implementations and
//! drive everything through [`Scheduler`].

pub mod config;
pub mod dag;
pub mod dispatch;
pub mod error;
pub mod ports;
pub mod registry;
pub mod route;
pub mod run;
pub mod scheduler;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SchedulerConfig;
pub use dag::{WorkflowGraph, validate};
pub use dispatch::TriggerDispatcher;
pub use error::{DagViolation, RouteResult, SchedulerError};
pub use registry::ExecutorRegistry;
pub use route::{ExecutorRouter, RouteStrategy, build_router};
pub use run::{CompletionOutcome, RunState};
pub use scheduler::Scheduler;
pub use service::WorkflowService;
