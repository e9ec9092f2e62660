//! Application services over the repository ports

pub mod workflow;

pub use workflow::WorkflowService;
