//! External process invocation.
//!
//! Every tool the pipeline calls goes through [`ProcessRunner`]. The production
//! [`SystemRunner`] waits on the child inside a current-thread tokio runtime so
//! a per-step timeout can kill the whole process group. Tests substitute a
//! scripted runner; nothing in the steps touches `std::process` directly.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::ProcessError;

/// Lines of tool output kept in failure messages.
pub const OUTPUT_TAIL_LINES: usize = 5;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// One synchronous call of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    /// Run under this user's identity instead of the current one.
    pub run_as: Option<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: &Path, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            run_as: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn run_as(mut self, user: Option<String>) -> Self {
        self.run_as = user;
        self
    }

    /// Short program name for messages (`grunt`, not `/repo/node_modules/.bin/grunt`).
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Human-readable command line.
    pub fn display(&self) -> String {
        let mut line = self.program_name();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// `exit code N` or `a signal`.
    pub fn status_label(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "a signal".to_string(),
        }
    }

    /// Last few non-empty lines of stderr, or stdout when stderr is empty.
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let kept: Vec<&str> = source
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        let start = kept.len().saturating_sub(lines);
        kept[start..].join(" | ")
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Runner trait
// ---------------------------------------------------------------------------

/// Process-invocation seam.
pub trait ProcessRunner {
    /// Run `invocation` to completion (or timeout).
    ///
    /// A non-zero exit is *not* an error here; callers inspect
    /// [`ProcessOutput::success`].
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;

    /// Whether the current process runs with root privileges.
    fn is_privileged(&self) -> bool;

    /// Hand `path` to `user` so a de-privileged tool can write into it.
    fn grant_ownership(&self, path: &Path, user: &str) -> Result<(), ProcessError>;
}

/// Pick the identity for de-privileged sub-invocations.
///
/// An explicitly configured user always wins. Otherwise, when running as root
/// under `sudo`, tools that write into the tree run as the invoking user so no
/// root-owned files are left behind.
pub fn resolve_run_as(
    configured: Option<&str>,
    privileged: bool,
    sudo_user: Option<&str>,
) -> Option<String> {
    if let Some(user) = configured.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(user.to_string());
    }
    if !privileged {
        return None;
    }
    sudo_user
        .map(str::trim)
        .filter(|u| !u.is_empty() && *u != "root")
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// System runner
// ---------------------------------------------------------------------------

/// Runs real processes.
pub struct SystemRunner {
    runtime: tokio::runtime::Runtime,
}

impl SystemRunner {
    pub fn new() -> Result<Self, ProcessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
            .map_err(ProcessError::Runtime)?;
        Ok(Self { runtime })
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program_name();
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            // Own process group so a timeout can take down grandchildren too.
            cmd.process_group(0);
            if let Some(user) = &invocation.run_as {
                let identity = lookup_user(user)?;
                cmd.uid(identity.uid).gid(identity.gid).env("HOME", &identity.home);
            }
        }

        tracing::info!(command = %invocation.display(), cwd = %invocation.cwd.display(), run_as = ?invocation.run_as, "running");

        self.runtime.block_on(async {
            let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;
            let pid = child.id();

            match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => Ok(ProcessOutput::from(output)),
                Ok(Err(source)) => Err(ProcessError::Wait { program, source }),
                Err(_) => {
                    if let Some(pid) = pid {
                        kill_process_group(pid);
                    }
                    tracing::warn!(command = %invocation.display(), "timed out");
                    Err(ProcessError::TimedOut {
                        program,
                        after: invocation.timeout,
                    })
                }
            }
        })
    }

    fn is_privileged(&self) -> bool {
        current_user_is_root()
    }

    #[cfg(unix)]
    fn grant_ownership(&self, path: &Path, user: &str) -> Result<(), ProcessError> {
        use nix::unistd::{chown, Gid, Uid};

        let identity = lookup_user(user)?;
        chown(
            path,
            Some(Uid::from_raw(identity.uid)),
            Some(Gid::from_raw(identity.gid)),
        )
        .map_err(|err| ProcessError::Ownership {
            path: path.to_path_buf(),
            user: user.to_string(),
            message: err.to_string(),
        })
    }

    #[cfg(not(unix))]
    fn grant_ownership(&self, _path: &Path, _user: &str) -> Result<(), ProcessError> {
        Ok(())
    }
}

#[cfg(unix)]
struct UserIdentity {
    uid: u32,
    gid: u32,
    home: PathBuf,
}

#[cfg(unix)]
fn lookup_user(user: &str) -> Result<UserIdentity, ProcessError> {
    match nix::unistd::User::from_name(user) {
        Ok(Some(found)) => Ok(UserIdentity {
            uid: found.uid.as_raw(),
            gid: found.gid.as_raw(),
            home: found.dir,
        }),
        Ok(None) => Err(ProcessError::UnknownUser {
            user: user.to_string(),
        }),
        Err(err) => Err(ProcessError::UserLookup {
            user: user.to_string(),
            message: err.to_string(),
        }),
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else { return };
    if let Err(err) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        tracing::debug!(pid, error = %err, "process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[cfg(unix)]
fn current_user_is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn current_user_is_root() -> bool {
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_user_wins() {
        assert_eq!(
            resolve_run_as(Some("deploy"), true, Some("alice")).as_deref(),
            Some("deploy")
        );
        assert_eq!(
            resolve_run_as(Some("deploy"), false, None).as_deref(),
            Some("deploy")
        );
    }

    #[test]
    fn root_under_sudo_drops_to_invoking_user() {
        assert_eq!(resolve_run_as(None, true, Some("alice")).as_deref(), Some("alice"));
        assert_eq!(resolve_run_as(None, true, Some("root")), None);
        assert_eq!(resolve_run_as(None, true, None), None);
    }

    #[test]
    fn unprivileged_runs_as_self() {
        assert_eq!(resolve_run_as(None, false, Some("alice")), None);
    }

    #[test]
    fn display_uses_program_file_name() {
        let inv = Invocation::new("/repo/node_modules/.bin/grunt", Path::new("/repo"), Duration::from_secs(1))
            .arg("build")
            .arg("--force");
        assert_eq!(inv.display(), "grunt build --force");
    }

    #[test]
    fn tail_prefers_stderr_and_keeps_last_lines() {
        let out = ProcessOutput {
            code: Some(1),
            stdout: "ignored\n".to_string(),
            stderr: "a\n\nb\nc\n".to_string(),
        };
        assert_eq!(out.tail(2), "b | c");
        assert_eq!(out.status_label(), "exit code 1");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_exit_code_and_output() {
        let runner = SystemRunner::new().expect("runner");
        let dir = tempfile::TempDir::new().expect("tempdir");
        let inv = Invocation::new("sh", dir.path(), Duration::from_secs(10))
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let out = runner.run(&inv).expect("run");
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_kills_on_timeout() {
        let runner = SystemRunner::new().expect("runner");
        let dir = tempfile::TempDir::new().expect("tempdir");
        let inv = Invocation::new("sh", dir.path(), Duration::from_millis(200))
            .arg("-c")
            .arg("sleep 30");
        let started = std::time::Instant::now();
        let err = runner.run(&inv).unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }), "got: {err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = SystemRunner::new().expect("runner");
        let dir = tempfile::TempDir::new().expect("tempdir");
        let inv = Invocation::new("plugpack-no-such-tool", dir.path(), Duration::from_secs(5));
        let err = runner.run(&inv).unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }), "got: {err}");
    }
}
