//! Interpreter environment for a deployed runtime
//!
//! Each platform knows where the interpreter lives inside a deployment and
//! which variables it must point into it. Setup never touches the process
//! environment: it reads a snapshot and returns the changes, which the
//! launcher applies to the child command only.
//!
//! Variables that are overwritten are first copied to a prefixed shadow
//! (`ORIG_RUBYLIB`, `RUNX_RUBYLIB`, ...) so the runtime's
//! `restore_environment` hook can hand the original values to processes it
//! spawns.

pub mod darwin;
pub mod linux;
pub mod windows;

pub use darwin::DarwinRuntime;
pub use linux::LinuxRuntime;
pub use windows::WindowsRuntime;

use crate::error::{RunxError, RunxResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Ruby ABI version of the bundled runtime
pub const RUBY_VERSION: &str = "2.1.0";

/// Application entrypoint, relative to the deployment directory
pub const SCRIPT_PATH: &str = "runtime/lib/app/runx.rb";

/// Change to apply to one variable of the child environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    Set(String),
    Unset,
}

/// Everything the launcher needs to start the interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnv {
    /// Interpreter executable
    pub interpreter: PathBuf,
    /// Script passed as the interpreter's first argument
    pub script: PathBuf,
    /// Ordered changes on top of the inherited environment
    pub changes: Vec<(String, EnvChange)>,
}

impl RuntimeEnv {
    /// Final change for `name`, if any
    pub fn get(&self, name: &str) -> Option<&EnvChange> {
        self.changes
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, change)| change)
    }

    /// Final value for `name` if it is set
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(EnvChange::Set(value)) => Some(value),
            _ => None,
        }
    }
}

/// Read-only view of environment variables
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The current process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Platform-specific interpreter setup
pub trait RuntimeSetup: Send + Sync {
    /// Compute interpreter paths and environment for `deployment`
    fn setup(&self, deployment: &Path, env: &dyn EnvSource) -> RuntimeEnv;

    /// Ruby architecture triple of the bundled runtime
    fn arch(&self) -> &'static str;

    /// Human-readable platform name
    fn platform_name(&self) -> &'static str;
}

/// Detected platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
    Unsupported,
}

impl Platform {
    /// Detect the current platform
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            _ => Platform::Unsupported,
        }
    }
}

/// Create the runtime setup for `platform`
pub fn create_setup(platform: Platform) -> RunxResult<Box<dyn RuntimeSetup>> {
    match platform {
        Platform::Linux => Ok(Box::new(LinuxRuntime)),
        Platform::MacOS => Ok(Box::new(DarwinRuntime)),
        Platform::Windows => Ok(Box::new(WindowsRuntime)),
        Platform::Unsupported => Err(RunxError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        )),
    }
}

/// `<deployment>/runtime/lib/ruby`
pub(crate) fn runtime_root(deployment: &Path) -> PathBuf {
    deployment.join("runtime").join("lib").join("ruby")
}

pub(crate) fn script_path(deployment: &Path) -> PathBuf {
    deployment.join(SCRIPT_PATH)
}

pub(crate) fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Library search list: site, vendor, then core, each with its arch dir
pub(crate) fn ruby_lib(root: &Path, arch: &str, separator: &str) -> String {
    let lib = root.join("lib").join("ruby");
    let site = lib.join("site_ruby");
    let vendor = lib.join("vendor_ruby");

    [
        site.join(RUBY_VERSION),
        site.join(RUBY_VERSION).join(arch),
        site,
        vendor.join(RUBY_VERSION),
        vendor.join(RUBY_VERSION).join(arch),
        vendor,
        lib.join(RUBY_VERSION),
        lib.join(RUBY_VERSION).join(arch),
    ]
    .iter()
    .map(|p| path_str(p))
    .collect::<Vec<_>>()
    .join(separator)
}

/// Collects shadow copies and overwrites, shadows first
pub(crate) struct EnvBuilder<'a> {
    env: &'a dyn EnvSource,
    shadow_prefix: &'static str,
    shadows: Vec<(String, EnvChange)>,
    changes: Vec<(String, EnvChange)>,
}

impl<'a> EnvBuilder<'a> {
    pub(crate) fn new(env: &'a dyn EnvSource, shadow_prefix: &'static str) -> Self {
        Self {
            env,
            shadow_prefix,
            shadows: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Original value of `name`, empty when unset
    pub(crate) fn original(&self, name: &str) -> String {
        self.env.var(name).unwrap_or_default()
    }

    /// Record `name`'s current value under the shadow prefix
    pub(crate) fn shadow(&mut self, name: &str) -> &mut Self {
        let value = self.original(name);
        self.shadows.push((
            format!("{}{}", self.shadow_prefix, name),
            EnvChange::Set(value),
        ));
        self
    }

    pub(crate) fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.changes
            .push((name.to_string(), EnvChange::Set(value.into())));
        self
    }

    pub(crate) fn unset(&mut self, name: &str) -> &mut Self {
        self.changes.push((name.to_string(), EnvChange::Unset));
        self
    }

    /// Point certificates, options, gems and load path into `root`
    pub(crate) fn ruby_defaults(&mut self, root: &Path, arch: &str, separator: &str) -> &mut Self {
        let lib = root.join("lib");
        let gems = path_str(&lib.join("ruby").join("gems").join(RUBY_VERSION));

        self.unset("SSL_CERT_DIR")
            .set("SSL_CERT_FILE", path_str(&lib.join("ca-bundle.crt")))
            .set(
                "RUBYOPT",
                format!("-r{}", path_str(&lib.join("restore_environment"))),
            )
            .set("GEM_HOME", gems.clone())
            .set("GEM_PATH", gems)
            .set("RUBYLIB", ruby_lib(root, arch, separator))
    }

    pub(crate) fn finish(self) -> Vec<(String, EnvChange)> {
        let mut all = self.shadows;
        all.extend(self.changes);
        all
    }
}
