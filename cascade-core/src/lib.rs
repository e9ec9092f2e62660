//! Cascade Core
//!
//! Core types and abstractions for the Cascade job-scheduling system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Workflow, Job, WorkflowRun, etc.)
//! - DTOs: Data transfer objects crossing the scheduler boundary
//!
//! Note: Scheduling logic lives in cascade-scheduler; persistence and
//! transport are adapters supplied by the embedding application.

pub mod domain;
pub mod dto;
