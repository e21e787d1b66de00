//! Verification toolchain subprocess.
//!
//! Runs `<program> <args...> --network <net> [--contract <fqn>] <impl> <ctor args...>`
//! in the contracts workspace and returns the combined output. The child
//! inherits the environment so the toolchain finds its API keys. On Unix it
//! leads its own process group, which is killed as a whole on timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use chainverify_core::error::VerifyError;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub program: String,
    /// Leading arguments, e.g. `["hardhat", "verify"]`.
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// Fully-qualified contract name, passed as `--contract`.
    pub contract: Option<String>,
    pub timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            program: "npx".into(),
            args: vec!["hardhat".into(), "verify".into()],
            workdir: PathBuf::from("../smart-contract"),
            contract: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// What the verifier printed and how it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
    /// stdout followed by stderr.
    pub output: String,
}

#[async_trait]
pub trait VerificationRunner: Send + Sync {
    async fn run(
        &self,
        network: &str,
        implementation: &str,
        constructor_args: &[String],
    ) -> Result<RunOutput, VerifyError>;
}

/// Strings are passed verbatim, anything else as its JSON text.
pub fn serialize_constructor_args(args: &[Value]) -> Vec<String> {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Arguments after the program name.
pub fn build_args(
    config: &VerifierConfig,
    network: &str,
    implementation: &str,
    constructor_args: &[String],
) -> Vec<String> {
    let mut argv = config.args.clone();
    argv.push("--network".into());
    argv.push(network.into());
    if let Some(contract) = &config.contract {
        argv.push("--contract".into());
        argv.push(contract.clone());
    }
    argv.push(implementation.into());
    argv.extend(constructor_args.iter().cloned());
    argv
}

/// Spawns the configured program with `tokio::process`.
pub struct CommandRunner {
    config: VerifierConfig,
}

impl CommandRunner {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }
}

#[async_trait]
impl VerificationRunner for CommandRunner {
    #[tracing::instrument(skip(self, constructor_args))]
    async fn run(
        &self,
        network: &str,
        implementation: &str,
        constructor_args: &[String],
    ) -> Result<RunOutput, VerifyError> {
        let argv = build_args(&self.config, network, implementation, constructor_args);
        tracing::debug!(program = %self.config.program, ?argv, workdir = %self.config.workdir.display(), "spawning verifier");

        let mut std_command = std::process::Command::new(&self.config.program);
        std_command
            .args(&argv)
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timeout takes down `node` under `npx` too.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut std_command, 0);

        let child = Command::from(std_command)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VerifyError::Spawn(format!("{}: {e}", self.config.program)))?;
        let pid = child.id();

        let started = Instant::now();
        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(VerifyError::Spawn(format!("waiting for verifier: {e}"))),
            Err(_) => {
                kill_process_group(pid);
                tracing::warn!(timeout_secs = self.config.timeout.as_secs(), ?pid, "verifier killed after timeout");
                return Err(VerifyError::VerificationTimeout(self.config.timeout));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        tracing::debug!(
            code = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "verifier exited"
        );
        Ok(RunOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}

/// SIGKILL every process in the verifier's group. The direct child is also
/// covered by `kill_on_drop` when the wait future is dropped.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created at spawn.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
