//! Data transfer objects crossing the scheduler boundary

pub mod run;
