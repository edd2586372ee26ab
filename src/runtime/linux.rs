//! Linux runtime layout

use super::{path_str, runtime_root, script_path, EnvBuilder, EnvSource, RuntimeEnv, RuntimeSetup};
use std::path::Path;

const ARCH: &str = "x86_64-linux";

/// Variables copied to `ORIG_*` before being overwritten
pub const SHADOWED: &[&str] = &[
    "LD_LIBRARY_PATH",
    "SSL_CERT_DIR",
    "SSL_CERT_FILE",
    "RUBYOPT",
    "RUBYLIB",
    "GEM_HOME",
    "GEM_PATH",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxRuntime;

impl RuntimeSetup for LinuxRuntime {
    fn setup(&self, deployment: &Path, env: &dyn EnvSource) -> RuntimeEnv {
        let root = runtime_root(deployment);
        let lib = path_str(&root.join("lib"));

        let mut builder = EnvBuilder::new(env, "ORIG_");
        for name in SHADOWED {
            builder.shadow(name);
        }

        // Appended, so a user's own library overrides still win
        let original = builder.original("LD_LIBRARY_PATH");
        let library_path = if original.is_empty() {
            lib
        } else {
            format!("{}:{}", original, lib)
        };

        builder
            .set("LD_LIBRARY_PATH", library_path)
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
        "Linux"
    }
}
