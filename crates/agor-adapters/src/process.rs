// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Shared plumbing for the vendor adapters: spawn the vendor's own CLI as a
//! subprocess, write the prompt to its stdin, and stream back its stdout
//! lines for each adapter to parse in its own vendor-specific format.
//!
//! Every supported vendor (`claude`, `codex`, `gemini`, `opencode`) ships a
//! local CLI with a newline-delimited-JSON streaming mode; driving that CLI
//! as a subprocess is the adapter boundary, not a network SDK call, so this
//! is the one place that owns process lifecycle and cancellation, mirroring
//! `agor-scheduler`'s own spawn/cancel-grace pattern at one level down.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use agor_model::AgorError;

pub struct VendorProcess {
    child: tokio::process::Child,
    stdout: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
}

impl VendorProcess {
    /// Spawn `binary args...`, writing `prompt` to stdin and closing it
    /// immediately after (every supported vendor CLI reads the whole prompt
    /// before producing output, so there is no interactive stdin use).
    pub async fn spawn(binary: &str, args: &[String], prompt: &str) -> Result<Self, AgorError> {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgorError::transient(format!("failed to spawn {binary}: {e}")))?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| AgorError::transient(format!("failed to write prompt to {binary}: {e}")))?;
        drop(stdin);

        let stdout = child.stdout.take().expect("piped stdout");
        let stdout = BufReader::new(stdout).lines();
        Ok(Self { child, stdout })
    }

    /// Next non-empty stdout line, or `None` at EOF.
    pub async fn next_line(&mut self) -> Result<Option<String>, AgorError> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(|e| AgorError::transient(format!("reading vendor stdout: {e}")))?;
            match line {
                Some(l) if l.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    /// Wait for the process to exit and treat a non-zero status as a
    /// transient failure.
    pub async fn wait(&mut self) -> Result<(), AgorError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| AgorError::transient(format!("waiting for vendor process: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(AgorError::transient(format!("vendor process exited with {status}")))
        }
    }

    /// SIGTERM then kill, matching the scheduler's own grace-window
    /// teardown of the outer executor subprocess.
    pub async fn terminate(&mut self) -> Result<(), AgorError> {
        if let Some(pid) = self.child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        if tokio::time::timeout(std::time::Duration::from_secs(5), self.child.wait())
            .await
            .is_err()
        {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
        Err(AgorError::cancelled("task cancelled"))
    }
}
