//! Utility modules for the scaffolder.

pub mod exec;
pub mod log;
