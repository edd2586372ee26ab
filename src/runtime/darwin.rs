//! macOS runtime layout

use super::{runtime_root, script_path, EnvBuilder, EnvSource, RuntimeEnv, RuntimeSetup};
use std::path::Path;

const ARCH: &str = "x86_64-darwin13.0";

/// The system terminal database; the bundled runtime ships none
const SYSTEM_TERMINFO: &str = "/usr/share/terminfo";

/// Variables copied to `RUNX_*` before being overwritten
pub const SHADOWED: &[&str] = &[
    "DYLD_LIBRARY_PATH",
    "TERMINFO",
    "SSL_CERT_DIR",
    "SSL_CERT_FILE",
    "RUBYOPT",
    "RUBYLIB",
    "GEM_HOME",
    "GEM_PATH",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DarwinRuntime;

impl RuntimeSetup for DarwinRuntime {
    fn setup(&self, deployment: &Path, env: &dyn EnvSource) -> RuntimeEnv {
        let root = runtime_root(deployment);

        let mut builder = EnvBuilder::new(env, "RUNX_");
        for name in SHADOWED {
            builder.shadow(name);
        }

        builder
            .unset("DYLD_LIBRARY_PATH")
            .set("TERMINFO", SYSTEM_TERMINFO)
            .ruby_defaults(&root, ARCH, ":");

        RuntimeEnv {
            interpreter: root.join("bin.real").join("ruby"),
            script: script_path(deployment),
            changes: builder.finish(),
        }
    }

    fn arch(&self) -> &'static str {
        ARCH
    }

    fn platform_name(&self) -> &'static str {
        "macOS"
    }
}
