// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subprocess invocation: witness-gen then proof, each under a timeout, with
//! stderr captured for the error path and the scratch dir cleaned up on
//! every exit via `tempfile::TempDir`'s `Drop`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use zka_error::{AgentError, ErrorCode};
use zka_tee::ProverDriver;

use crate::toml_input::to_circuit_toml;

/// Per-stage subprocess timeout.
pub const STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Paths to the two prover binaries this driver shells out to.
#[derive(Debug, Clone)]
pub struct ProverBinaries {
    /// Witness generation binary, invoked first.
    pub witness_gen: PathBuf,
    /// Proof generation binary, invoked against the witness-gen's output.
    pub prove: PathBuf,
}

/// Drives the two-stage witness-gen/prove subprocess pipeline for every
/// registered circuit.
pub struct SubprocessProverDriver {
    binaries: ProverBinaries,
}

impl SubprocessProverDriver {
    /// Construct a driver invoking `binaries` for every `prove` call.
    #[must_use]
    pub fn new(binaries: ProverBinaries) -> Self {
        Self { binaries }
    }

    async fn run_pipeline(&self, circuit_id: &str, inputs: &Value, scratch: &Path) -> Result<(String, String), AgentError> {
        zka_core::circuit::lookup(circuit_id)?;

        let toml = to_circuit_toml(inputs)?;
        let toml_path = scratch.join("Prover.toml");
        tokio::fs::write(&toml_path, toml)
            .await
            .map_err(|e| AgentError::transient(ErrorCode::ProverFailed, format!("failed to write Prover.toml: {e}")))?;

        run_stage(&self.binaries.witness_gen, &["execute"], scratch).await?;
        run_stage(&self.binaries.prove, &["prove", "--oracle-hash", "keccak"], scratch).await?;

        let proof = read_output_file(scratch, "proof").await?;
        let public_inputs = read_output_file(scratch, "public_inputs").await?;
        Ok((hex::encode(proof), hex::encode(public_inputs)))
    }
}

async fn read_output_file(scratch: &Path, name: &str) -> Result<Vec<u8>, AgentError> {
    tokio::fs::read(scratch.join(name))
        .await
        .map_err(|e| AgentError::permanent(ErrorCode::ProverFailed, format!("prover did not produce {name}: {e}")))
}

async fn capture_stderr(stderr: tokio::process::ChildStderr) -> String {
    let mut reader = BufReader::new(stderr);
    let mut captured = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => captured.push_str(&line),
        }
    }
    captured
}

async fn run_stage(binary: &Path, args: &[&str], cwd: &Path) -> Result<(), AgentError> {
    let mut cmd = Command::new(binary);
    cmd.args(args).current_dir(cwd).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| AgentError::transient(ErrorCode::ProverFailed, format!("failed to spawn {}: {e}", binary.display())))?;

    let mut stdout = child.stdout.take();
    let stdout_drain = tokio::spawn(async move {
        if let Some(mut out) = stdout.take() {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf).await;
        }
    });
    let stderr_capture = tokio::spawn(capture_stderr(child.stderr.take().expect("stderr piped")));

    let status = match tokio::time::timeout(STAGE_TIMEOUT, child.wait()).await {
        Ok(result) => result.map_err(|e| AgentError::transient(ErrorCode::ProverFailed, format!("subprocess wait failed: {e}")))?,
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            return Err(AgentError::transient(
                ErrorCode::ProverFailed,
                format!("{} timed out after {}s", binary.display(), STAGE_TIMEOUT.as_secs()),
            ));
        }
    };

    let _ = stdout_drain.await;
    let captured_stderr = stderr_capture.await.unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(AgentError::permanent(
            ErrorCode::ProverFailed,
            format!("{} exited with {status}: {captured_stderr}", binary.display()),
        ))
    }
}

#[async_trait]
impl ProverDriver for SubprocessProverDriver {
    async fn prove(&self, circuit_id: &str, inputs: &Value) -> Result<(String, String), AgentError> {
        let scratch = tempfile::tempdir()
            .map_err(|e| AgentError::transient(ErrorCode::ProverFailed, format!("failed to create scratch dir: {e}")))?;
        self.run_pipeline(circuit_id, inputs, scratch.path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binaries_for(script: &str) -> ProverBinaries {
        ProverBinaries { witness_gen: PathBuf::from(script), prove: PathBuf::from(script) }
    }

    #[tokio::test]
    async fn unknown_circuit_fails_before_spawning_anything() {
        let driver = SubprocessProverDriver::new(binaries_for("/bin/true"));
        let err = driver.prove("not_a_circuit", &json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownCircuit);
    }

    #[tokio::test]
    async fn missing_required_input_fails_before_spawning_anything() {
        let driver = SubprocessProverDriver::new(binaries_for("/bin/true"));
        let err = driver.prove("coinbase_attestation", &json!({})).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParam);
    }
}
