//! Runtime module — process lifecycle: boot, progress reporting, run.

pub mod boot;
pub mod progress;
pub mod run;
