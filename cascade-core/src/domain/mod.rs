//! Domain types shared across the Cascade system

pub mod executor;
pub mod job;
pub mod run;
pub mod trigger;
pub mod workflow;
