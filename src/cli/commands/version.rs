//! Version command - print the launcher version

/// Source commit, baked in at build time
pub const COMMIT: Option<&str> = option_env!("RUNX_COMMIT");

/// `runx <version>`, plus the commit when known
pub fn version_string() -> String {
    format_version(env!("CARGO_PKG_VERSION"), COMMIT)
}

fn format_version(version: &str, commit: Option<&str>) -> String {
    match commit.filter(|c| !c.is_empty()) {
        Some(commit) => format!("runx {} ({})", version, commit),
        None => format!("runx {}", version),
    }
}

/// Execute the version command
pub fn execute() -> i32 {
    println!("{}", version_string());
    0
}
