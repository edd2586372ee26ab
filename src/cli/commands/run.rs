//! Run command - deploy the runtime and launch the application

use crate::bundle::BundleRestorer;
use crate::cache::digest::current_executable;
use crate::cache::{CacheManager, CacheRoot, Deployer, Identity};
use crate::config::Config;
use crate::error::RunxResult;
use crate::launch::{launch, LaunchSpec};
use crate::runtime::{create_setup, EnvSource, Platform, ProcessEnv, RuntimeSetup};
use crate::ui::{FirstUseNotice, UiContext};
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Collaborators of a launch
pub struct RunContext {
    pub identity: Identity,
    pub deployer: Box<dyn Deployer>,
    pub setup: Box<dyn RuntimeSetup>,
    pub env: Box<dyn EnvSource + Send + Sync>,
}

impl RunContext {
    /// Wire up the running launcher from configuration
    pub fn from_config(config: &Config) -> RunxResult<Self> {
        let executable = current_executable()?;
        debug!("Launcher executable: {}", executable.display());

        let identity = Identity::resolve(&executable)?;
        debug!("Build identity {} ({:?})", identity, identity.source());

        let root = CacheRoot::from_config(&config.cache)?;
        debug!("Cache root: {}", root.path().display());

        let notice = FirstUseNotice::new(&UiContext::detect());
        let manager = CacheManager::new(root, Arc::new(BundleRestorer::new(executable)))
            .with_notice(
                Duration::from_millis(config.cache.notice_delay_ms),
                Arc::new(notice),
            );

        let setup = create_setup(Platform::detect())?;

        Ok(Self {
            identity,
            deployer: Box::new(manager),
            setup,
            env: Box::new(ProcessEnv),
        })
    }
}

/// Execute the run command, returning the exit code to report
pub async fn execute(args: Vec<OsString>, ctx: &RunContext) -> RunxResult<i32> {
    let deployment = ctx.deployer.deploy(&ctx.identity).await?;
    debug!(
        "Deployment ready at {} (restored: {})",
        deployment.path.display(),
        deployment.restored
    );

    let runtime = ctx.setup.setup(&deployment.path, &*ctx.env);
    debug!(
        "Configured {} environment for {} ({} changes)",
        ctx.setup.platform_name(),
        ctx.setup.arch(),
        runtime.changes.len()
    );

    let spec = LaunchSpec::new(&runtime, args);
    let outcome = launch(&spec).await?;
    debug!("Launch finished: {:?}", outcome);

    Ok(outcome.exit_code())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{Deployment, IdentitySource};
    use crate::error::RunxError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deployer returning a fixed directory and counting calls
    pub(crate) struct FixedDeployer {
        pub(crate) path: PathBuf,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Deployer for FixedDeployer {
        async fn deploy(&self, _identity: &Identity) -> RunxResult<Deployment> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Deployment {
                path: self.path.clone(),
                restored: false,
            })
        }
    }

    struct FailingDeployer;

    #[async_trait]
    impl Deployer for FailingDeployer {
        async fn deploy(&self, _identity: &Identity) -> RunxResult<Deployment> {
            Err(RunxError::PayloadMissing(PathBuf::from("/bin/runx")))
        }
    }

    pub(crate) fn context(deployer: Box<dyn Deployer>) -> RunContext {
        RunContext {
            identity: Identity::new("0123456789abcdef", IdentitySource::Build).unwrap(),
            deployer,
            setup: Box::new(crate::runtime::LinuxRuntime),
            env: Box::new(HashMap::<String, String>::new()),
        }
    }

    #[tokio::test]
    async fn deploy_failure_is_fatal() {
        let ctx = context(Box::new(FailingDeployer));
        let err = execute(Vec::new(), &ctx).await.unwrap_err();
        assert!(matches!(err, RunxError::PayloadMissing(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launches_deployed_interpreter() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let bin = temp.path().join("runtime/lib/ruby/bin.real");
        std::fs::create_dir_all(&bin).unwrap();
        let ruby = bin.join("ruby");
        std::fs::write(
            &ruby,
            "#!/bin/sh\ncase \"$1\" in */runtime/lib/app/runx.rb) ;; *) exit 90 ;; esac\n\
             [ \"$2\" = hello ] || exit 91\n\
             [ -n \"$RUBYLIB\" ] || exit 92\n\
             exit 42\n",
        )
        .unwrap();
        std::fs::set_permissions(&ruby, std::fs::Permissions::from_mode(0o755)).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = context(Box::new(FixedDeployer {
            path: temp.path().to_path_buf(),
            calls: Arc::clone(&calls),
        }));

        let code = execute(vec![OsString::from("hello")], &ctx).await.unwrap();
        assert_eq!(code, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
