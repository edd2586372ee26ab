//! Diagnostic output on stderr
//!
//! stdout belongs to the launched program, so everything runx prints
//! itself goes to stderr.

use crate::error::RunxError;
use console::style;

/// Print a fatal error, with its hint when one exists
pub fn error(err: &RunxError) {
    eprintln!("{}", error_line(err));
    if let Some(hint) = err.hint() {
        eprintln!("{} {}", style("hint:").yellow(), hint);
    }
}

/// The single-line form of a fatal error
pub fn error_line(err: &RunxError) -> String {
    format!("{} {}", style("runx: error:").red().bold(), err)
}
