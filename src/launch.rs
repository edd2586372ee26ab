//! Interpreter process launch
//!
//! The child inherits stdin/stdout/stderr untouched and gets the parent
//! environment plus the runtime's changes. An interrupt delivered to the
//! launcher kills the child; otherwise the launcher waits and mirrors the
//! child's exit status.

use crate::error::{RunxError, RunxResult};
use crate::runtime::{EnvChange, RuntimeEnv};
use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported when the child was stopped by an interrupt
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Fully resolved child command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(String, EnvChange)>,
}

impl LaunchSpec {
    /// `interpreter script user_args...` with the runtime's environment
    pub fn new<I>(runtime: &RuntimeEnv, user_args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args = vec![runtime.script.clone().into_os_string()];
        args.extend(user_args);
        Self {
            program: runtime.interpreter.clone(),
            args,
            env: runtime.changes.clone(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Build the command with inherited stdio
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        self.apply_env(&mut cmd);
        cmd
    }

    /// Apply the runtime's changes on top of whatever `cmd` inherits
    fn apply_env(&self, cmd: &mut Command) {
        for (name, change) in &self.env {
            match change {
                EnvChange::Set(value) => {
                    cmd.env(name, value);
                }
                EnvChange::Unset => {
                    cmd.env_remove(name);
                }
            }
        }
    }
}

/// How the child run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The child exited on its own
    Exited(ExitStatus),
    /// The launcher was interrupted and killed the child
    Interrupted,
}

impl Outcome {
    /// Exit code the launcher should report
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => INTERRUPTED_EXIT_CODE,
            Self::Exited(status) => status_code(status),
        }
    }
}

#[cfg(unix)]
fn status_code(status: &ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn status_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// The launcher's interrupt signal (SIGINT, or Ctrl-C on Windows)
pub struct Interrupt {
    #[cfg(unix)]
    signal: tokio::signal::unix::Signal,
    #[cfg(windows)]
    signal: tokio::signal::windows::CtrlC,
}

impl Interrupt {
    /// Install the handler. From here on the launcher no longer dies on
    /// interrupt; interrupts queue until [`recv`](Self::recv).
    pub fn register() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                signal: signal(SignalKind::interrupt())?,
            })
        }
        #[cfg(windows)]
        {
            Ok(Self {
                signal: tokio::signal::windows::ctrl_c()?,
            })
        }
        #[cfg(not(any(unix, windows)))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next interrupt
    pub async fn recv(&mut self) {
        #[cfg(any(unix, windows))]
        let received = self.signal.recv().await.is_some();
        #[cfg(not(any(unix, windows)))]
        let received = false;

        if !received {
            std::future::pending::<()>().await;
        }
    }
}

/// Run the child to completion, forwarding interrupts as a kill
pub async fn launch(spec: &LaunchSpec) -> RunxResult<Outcome> {
    // Registered before spawn so an early interrupt is not lost
    let mut interrupt =
        Interrupt::register().map_err(|e| RunxError::io("installing interrupt handler", e))?;
    run_until(spec, interrupt.recv()).await
}

/// Run the child until it exits or `interrupted` resolves
pub async fn run_until<F>(spec: &LaunchSpec, interrupted: F) -> RunxResult<Outcome>
where
    F: Future<Output = ()>,
{
    let mut child = spec.command().spawn().map_err(|source| RunxError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    debug!(
        "Started {} (pid {:?})",
        spec.program.display(),
        child.id()
    );

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| RunxError::io("waiting for interpreter", e))?;
            debug!("Interpreter exited: {}", status);
            Ok(Outcome::Exited(status))
        }
        _ = interrupted => {
            debug!("Interrupted, killing pid {:?}", child.id());
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill interpreter: {}", e);
            }
            if let Err(e) = child.wait().await {
                debug!("Failed to reap interpreter: {}", e);
            }
            Ok(Outcome::Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn runtime(interpreter: &str, script: &str) -> RuntimeEnv {
        RuntimeEnv {
            interpreter: PathBuf::from(interpreter),
            script: PathBuf::from(script),
            changes: vec![
                ("RUNX_TEST_SET".to_string(), EnvChange::Set("yes".to_string())),
                ("RUNX_TEST_UNSET".to_string(), EnvChange::Unset),
            ],
        }
    }

    #[test]
    fn script_comes_first() {
        let spec = LaunchSpec::new(
            &runtime("/d/ruby", "/d/app.rb"),
            vec![OsString::from("-v"), OsString::from("two words")],
        );

        assert_eq!(spec.program(), Path::new("/d/ruby"));
        assert_eq!(
            spec.args(),
            &[
                OsString::from("/d/app.rb"),
                OsString::from("-v"),
                OsString::from("two words"),
            ]
        );
    }

    #[tokio::test]
    async fn interrupt_registers_before_any_child() {
        let mut interrupt = Interrupt::register().unwrap();
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            interrupt.recv(),
        )
        .await;
        assert!(waited.is_err());
    }

    #[test]
    fn interrupted_exit_code() {
        assert_eq!(Outcome::Interrupted.exit_code(), 130);
    }

    #[tokio::test]
    async fn spawn_failure_names_program() {
        let spec = LaunchSpec::new(&runtime("/nonexistent/runx/ruby", "app.rb"), Vec::new());
        let err = run_until(&spec, std::future::pending()).await.unwrap_err();
        assert!(
            matches!(err, RunxError::Spawn { ref program, .. } if program == Path::new("/nonexistent/runx/ruby"))
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::time::{Duration, Instant};

        fn sh(script: &str) -> LaunchSpec {
            // `sh -c <script>` with the script path slot holding the command
            LaunchSpec::new(&runtime("/bin/sh", "-c"), vec![OsString::from(script)])
        }

        #[tokio::test]
        async fn exit_code_is_mirrored() {
            let outcome = run_until(&sh("exit 7"), std::future::pending()).await.unwrap();
            assert_eq!(outcome.exit_code(), 7);
        }

        #[tokio::test]
        async fn signal_death_maps_to_128_plus() {
            let outcome = run_until(&sh("kill -TERM $$"), std::future::pending())
                .await
                .unwrap();
            assert_eq!(outcome.exit_code(), 128 + 15);
        }

        #[tokio::test]
        async fn environment_changes_are_applied() {
            let spec = sh(r#"[ "$RUNX_TEST_SET" = yes ] && [ -z "${RUNX_TEST_UNSET+x}" ]"#);

            // Stands in for a value inherited from the parent environment
            let mut cmd = Command::new(spec.program());
            cmd.args(spec.args()).env("RUNX_TEST_UNSET", "present");
            spec.apply_env(&mut cmd);

            let status = cmd.status().await.unwrap();
            assert_eq!(status.code(), Some(0));
        }

        #[tokio::test]
        async fn interrupt_kills_child() {
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = tx.send(());
            });

            let started = Instant::now();
            let outcome = run_until(&sh("sleep 30"), async {
                let _ = rx.await;
            })
            .await
            .unwrap();

            assert_eq!(outcome, Outcome::Interrupted);
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }
}
