//! Launcher entry flow
//!
//! The version check runs before anything touches the filesystem; every
//! other invocation resolves its collaborators, deploys and launches.

pub mod args;
pub mod commands;

pub use args::Invocation;
pub use commands::RunContext;

use crate::error::RunxResult;
use std::future::Future;

/// Handle `invocation`, building the run context only when launching
pub async fn dispatch<F, Fut>(invocation: Invocation, context: F) -> RunxResult<i32>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = RunxResult<RunContext>>,
{
    match invocation {
        Invocation::Version => Ok(commands::version()),
        Invocation::Run(args) => {
            let ctx = context().await?;
            commands::run(args, &ctx).await
        }
    }
}
