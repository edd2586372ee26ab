//! Terminal output for runx's own messages
//!
//! Spinners only appear on an interactive stderr; CI and redirected runs
//! get plain lines instead.

mod context;
pub mod output;
mod progress;

pub use context::UiContext;
pub use progress::{FirstUseNotice, FIRST_USE_MESSAGE};
