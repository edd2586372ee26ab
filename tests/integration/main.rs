//! Integration tests for runx

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated cache and config locations for one test
struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn cache(&self) -> PathBuf {
        self.path().join("cache")
    }

    /// Command for `program` that cannot see the user's config or cache
    fn command(&self, program: impl AsRef<std::ffi::OsStr>) -> Command {
        let mut cmd = Command::new(program);
        cmd.env("RUNX_CONFIG", self.path().join("no-config.toml"))
            .env("RUNX_CACHE_DIR", self.cache())
            .env_remove("RUNX_CACHE_LOCATION")
            .env_remove("RUNX_NOTICE_DELAY_MS")
            .env_remove("RUNX_LOG")
            .env_remove("RUNX_LOG_FORMAT");
        cmd
    }

    /// The plain launcher, without a payload
    fn runx(&self) -> Command {
        self.command(env!("CARGO_BIN_EXE_runx"))
    }

    /// Deployment directories currently in the cache
    fn deployments(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.cache()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

mod cli_tests {
    use super::*;
    use predicates::prelude::*;

    #[test]
    fn version_displays() {
        let fx = Fixture::new();
        for flag in ["-v", "--version"] {
            fx.runx()
                .arg(flag)
                .assert()
                .success()
                .stdout(predicate::str::starts_with(format!(
                    "runx {}",
                    env!("CARGO_PKG_VERSION")
                )));
        }
    }

    #[test]
    fn version_touches_no_cache() {
        let fx = Fixture::new();
        fx.runx().arg("--version").assert().success();
        assert!(!fx.cache().exists());
    }

    #[test]
    fn missing_payload_is_fatal() {
        let fx = Fixture::new();
        fx.runx()
            .arg("hello")
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("runx: error:"))
            .stderr(predicate::str::contains("No payload bundled"));

        // Nothing half-restored is left to be mistaken for a deployment
        assert!(fx.deployments().is_empty());
    }

    #[test]
    fn version_flag_with_arguments_is_not_a_version_request() {
        let fx = Fixture::new();
        fx.runx()
            .args(["--version", "extra"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No payload bundled"));
    }

    #[test]
    fn invalid_cache_location() {
        let fx = Fixture::new();
        fx.runx()
            .env("RUNX_CACHE_LOCATION", "cloud")
            .arg("hello")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("RUNX_CACHE_LOCATION"));
    }

    #[test]
    fn pack_help() {
        Command::new(env!("CARGO_BIN_EXE_runx-pack"))
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--payload"));
    }
}

#[cfg(unix)]
mod launch_tests {
    use super::*;
    use predicates::prelude::*;
    use runx::cache::digest::{digest_file, BUILD_DIGEST};
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    impl Fixture {
        /// Pack a launcher whose interpreter is the shell script `ruby`
        fn packed(&self, name: &str, ruby: &str) -> PathBuf {
            let payload = self.path().join(format!("{}-payload", name));
            fs::create_dir_all(payload.join("lib/app")).unwrap();
            fs::create_dir_all(payload.join("lib/ruby/bin.real")).unwrap();
            fs::write(payload.join("lib/app/runx.rb"), "puts 'hello'\n").unwrap();

            let interpreter = payload.join("lib/ruby/bin.real/ruby");
            fs::write(&interpreter, format!("#!/bin/sh\n{}\n", ruby)).unwrap();
            fs::set_permissions(&interpreter, fs::Permissions::from_mode(0o755)).unwrap();

            let output = self.path().join(name);
            runx::bundle::pack(Path::new(env!("CARGO_BIN_EXE_runx")), &payload, &output)
                .unwrap();
            output
        }
    }

    #[test]
    #[serial]
    fn arguments_pass_through() {
        let fx = Fixture::new();
        let app = fx.packed("app", r#"printf '%s\n' "$@""#);

        fx.command(&app)
            .args(["hello", "--version", "two words", ""])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "runtime/lib/app/runx.rb\nhello\n--version\ntwo words\n\n",
            ));
    }

    #[test]
    #[serial]
    fn stdio_is_inherited() {
        let fx = Fixture::new();
        let app = fx.packed("app", "cat; echo done >&2");

        fx.command(&app)
            .write_stdin("piped input")
            .assert()
            .success()
            .stdout("piped input")
            .stderr(predicate::str::contains("done"));
    }

    #[test]
    #[serial]
    fn exit_code_is_mirrored() {
        let fx = Fixture::new();
        let app = fx.packed("app", "exit 7");

        fx.command(&app).assert().code(7);
    }

    #[test]
    #[serial]
    fn environment_points_into_deployment() {
        let fx = Fixture::new();
        let app = fx.packed(
            "app",
            r#"printf '%s\n' "$GEM_HOME" "$ORIG_RUBYLIB$RUNX_RUBYLIB""#,
        );

        fx.command(&app)
            .env("RUBYLIB", "/user/lib")
            .env_remove("ORIG_RUBYLIB")
            .env_remove("RUNX_RUBYLIB")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                fx.cache().to_string_lossy().into_owned(),
            ))
            .stdout(predicate::str::contains("gems/2.1.0\n"))
            .stdout(predicate::str::contains("/user/lib\n"));
    }

    #[test]
    #[serial]
    fn deploys_once_per_build() {
        let fx = Fixture::new();
        let app = fx.packed("app", "exit 0");

        fx.command(&app).assert().success();
        let deployments = fx.deployments();
        assert_eq!(deployments.len(), 1);
        if BUILD_DIGEST.is_none() {
            assert_eq!(deployments[0], digest_file(&app).unwrap());
        }

        let sentinel = fx.cache().join(&deployments[0]).join("sentinel");
        fs::write(&sentinel, "kept").unwrap();

        // A cached run restores nothing and shows no notice
        fx.command(&app)
            .assert()
            .success()
            .stderr(predicate::str::is_empty());
        assert!(sentinel.exists());
        assert_eq!(fx.deployments(), deployments);
    }

    #[test]
    #[serial]
    fn new_build_prunes_old_deployment() {
        let fx = Fixture::new();
        let old = fx.packed("old", "exit 0");
        let new = fx.packed("new", "exit 0 # rebuilt");

        fx.command(&old).assert().success();
        fx.command(&new).assert().success();

        let deployments = fx.deployments();
        assert_eq!(deployments.len(), 1);
        if BUILD_DIGEST.is_none() {
            assert_eq!(deployments[0], digest_file(&new).unwrap());
        }
    }

    #[test]
    #[serial]
    fn interrupt_stops_child() {
        let fx = Fixture::new();
        let pid_file = fx.path().join("child.pid");
        let app = fx.packed("app", r#"echo $$ > "$RUNX_TEST_PID_FILE"; exec sleep 30"#);

        let mut launcher = std::process::Command::new(&app)
            .env("RUNX_CONFIG", fx.path().join("no-config.toml"))
            .env("RUNX_CACHE_DIR", fx.cache())
            .env("RUNX_TEST_PID_FILE", &pid_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(20);
        let child_pid: libc::pid_t = loop {
            if let Some(pid) = fs::read_to_string(&pid_file)
                .ok()
                .and_then(|s| s.trim().parse().ok())
            {
                break pid;
            }
            assert!(Instant::now() < deadline, "interpreter never started");
            std::thread::sleep(Duration::from_millis(20));
        };

        let started = Instant::now();
        // SAFETY: signalling a child process this test spawned
        unsafe {
            libc::kill(launcher.id() as libc::pid_t, libc::SIGINT);
        }

        let status = loop {
            if let Some(status) = launcher.try_wait().unwrap() {
                break status;
            }
            assert!(
                started.elapsed() < Duration::from_secs(10),
                "launcher did not exit after interrupt"
            );
            std::thread::sleep(Duration::from_millis(20));
        };

        assert_eq!(status.code(), Some(130));
        assert!(started.elapsed() < Duration::from_secs(10));
        // SAFETY: signal 0 only probes for existence
        let alive = unsafe { libc::kill(child_pid, 0) } == 0;
        assert!(!alive, "interpreter survived the interrupt");
    }
}
