//! runx - self-deploying Ruby application launcher
//!
//! A runx launcher carries its interpreter runtime as a payload appended to
//! the executable. On start it unpacks that payload once per build into a
//! digest-named cache directory, points the interpreter's environment into
//! it, and runs the bundled application script with the caller's arguments.

pub mod bundle;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod launch;
pub mod runtime;
pub mod ui;

pub use error::{RunxError, RunxResult};
