//! Transcoder subprocess adapter
//!
//! One external transcoder process per pipeline cycle. Compressed audio goes
//! in on stdin, fixed-format PCM comes out on stdout. The adapter owns the
//! process handle: spawn, input writes, and the close/wait/kill shutdown
//! sequence. The output stream is handed to the decode loop for the lifetime
//! of the cycle.

use crate::config::TranscodeConfig;
use anyhow::{Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{info, warn};

pub struct Transcoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl Transcoder {
    pub fn spawn(config: &TranscodeConfig) -> Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn transcoder '{}'", config.command))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        info!(
            "Spawned transcoder '{}' (pid {})",
            config.command,
            child.id().unwrap_or(0)
        );

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Take the PCM output stream. The decode loop owns it for the cycle.
    pub fn take_output(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Write compressed audio to the transcoder input. Suspends until the
    /// pipe accepts every byte; nothing is dropped or buffered beyond the
    /// pipe itself.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .context("transcoder input is closed")?;
        stdin
            .write_all(bytes)
            .await
            .context("transcoder input write failed")?;
        Ok(())
    }

    /// Close the input so the process can drain, wait up to `grace` for it
    /// to exit, then kill it. A forced kill is a normal stop outcome, not an
    /// error.
    pub async fn shutdown(mut self, grace: Duration) -> Result<()> {
        drop(self.stdin.take());

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status.context("Failed to wait for transcoder exit")?;
                info!("Transcoder exited with {}", status);
            }
            Err(_) => {
                warn!("Transcoder still running after {:?}, killing it", grace);
                self.child
                    .kill()
                    .await
                    .context("Failed to kill transcoder")?;
            }
        }

        Ok(())
    }
}
