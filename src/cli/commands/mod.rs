//! CLI command implementations

pub mod run;
pub mod version;

pub use run::{execute as run, RunContext};
pub use version::execute as version;
