//! Launcher argument handling
//!
//! runx has no options of its own. Everything after the program name is
//! handed to the application script untouched, with a single exception: a
//! lone `-v` or `--version` prints runx's version instead.

use std::ffi::OsString;

/// What a launcher invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Print the launcher version and exit
    Version,
    /// Launch the application with these arguments
    Run(Vec<OsString>),
}

impl Invocation {
    /// Classify a full argv, program name included
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        Self::from_user_args(args.into_iter().skip(1).collect())
    }

    /// Classify the arguments after the program name
    pub fn from_user_args(args: Vec<OsString>) -> Self {
        match args.as_slice() {
            [only] if only == "-v" || only == "--version" => Self::Version,
            _ => Self::Run(args),
        }
    }
}
