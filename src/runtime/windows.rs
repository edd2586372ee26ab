//! Windows runtime layout
//!
//! Only the load path needs redirecting; the mingw runtime finds its DLLs
//! and certificates relative to `ruby.exe`.

use super::{ruby_lib, runtime_root, script_path, EnvBuilder, EnvSource, RuntimeEnv, RuntimeSetup};
use std::path::Path;

const ARCH: &str = "i386-mingw32";

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsRuntime;

impl RuntimeSetup for WindowsRuntime {
    fn setup(&self, deployment: &Path, env: &dyn EnvSource) -> RuntimeEnv {
        let root = runtime_root(deployment);

        let mut builder = EnvBuilder::new(env, "RUNX_");
        builder
            .shadow("RUBYLIB")
            .set("RUBYLIB", ruby_lib(&root, ARCH, ";"));

        RuntimeEnv {
            interpreter: root.join("bin.real").join("ruby.exe"),
            script: script_path(deployment),
            changes: builder.finish(),
        }
    }

    fn arch(&self) -> &'static str {
        ARCH
    }

    fn platform_name(&self) -> &'static str {
        "Windows"
    }
}
