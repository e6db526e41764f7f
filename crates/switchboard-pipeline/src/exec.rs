//! Subprocess-backed collaborators.
//!
//! The default deployment shells out for the two opaque compute steps:
//! a transcription command (audio on stdin, text on stdout) and an
//! assistant command (prompt on stdin, reply on stdout). Anything that
//! speaks that contract can be dropped in without touching the bridge.

use crate::error::PipelineError;
use crate::traits::{Assistant, Transcriber};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum audio input size (10 MiB). Prevents OOM from oversized payloads.
const MAX_AUDIO_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Maximum prompt size (64 KiB).
const MAX_PROMPT_BYTES: usize = 64 * 1024;

/// Timeout for transcription process execution.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for assistant process execution.
const ASSISTANT_TIMEOUT: Duration = Duration::from_secs(120);

async fn run_stdin_stdout(
    binary: &PathBuf,
    args: &[String],
    input: &[u8],
    timeout: Duration,
    label: &'static str,
) -> Result<String, String> {
    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| format!("failed to spawn {} binary: {}", label, e))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| format!("failed to open {} stdin", label))?;

    let input = input.to_vec();
    // Write on a separate task to avoid deadlock if the output buffer fills.
    let write_task = tokio::spawn(async move { stdin.write_all(&input).await });

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| format!("{} process timed out after {} seconds", label, timeout.as_secs()))?
        .map_err(|e| format!("failed to read {} output: {}", label, e))?;

    match write_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(format!("failed to write to {} stdin: {}", label, e)),
        Err(e) => return Err(format!("{} stdin task failed: {}", label, e)),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} binary failed: {}", label, stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// A [`Transcriber`] that pipes audio through an external command.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    binary: PathBuf,
    args: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, PipelineError> {
        if audio.len() > MAX_AUDIO_INPUT_BYTES {
            return Err(PipelineError::Transcription(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_AUDIO_INPUT_BYTES
            )));
        }

        run_stdin_stdout(&self.binary, &self.args, audio, TRANSCRIBE_TIMEOUT, "stt")
            .await
            .map_err(PipelineError::Transcription)
    }
}

/// An [`Assistant`] that pipes the prompt through an external command.
#[derive(Debug, Clone)]
pub struct CommandAssistant {
    binary: PathBuf,
    args: Vec<String>,
}

impl CommandAssistant {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

#[async_trait]
impl Assistant for CommandAssistant {
    async fn reply(&self, prompt: &str) -> Result<String, PipelineError> {
        if prompt.len() > MAX_PROMPT_BYTES {
            return Err(PipelineError::Assistant(format!(
                "prompt exceeds maximum size: {} bytes (limit: {} bytes)",
                prompt.len(),
                MAX_PROMPT_BYTES
            )));
        }

        run_stdin_stdout(
            &self.binary,
            &self.args,
            prompt.as_bytes(),
            ASSISTANT_TIMEOUT,
            "assistant",
        )
        .await
        .map_err(PipelineError::Assistant)
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    async fn write_script(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        tokio::fs::write(&path, body).await.expect("write script");
        let mut perms = tokio::fs::metadata(&path)
            .await
            .expect("script metadata")
            .permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&path, perms)
            .await
            .expect("set script permissions");
        path
    }

    #[tokio::test]
    async fn command_transcriber_captures_stdout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script =
            write_script(&dir, "mock_stt.sh", "#!/bin/sh\ncat > /dev/null\nprintf 'hello world'\n")
                .await;

        let transcriber = CommandTranscriber::new(&script, vec![]);
        let text = transcriber
            .transcribe(b"fake audio bytes")
            .await
            .expect("transcription should succeed");
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn command_assistant_echoes_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(&dir, "mock_assistant.sh", "#!/bin/sh\ncat\n").await;

        let assistant = CommandAssistant::new(&script, vec![]);
        let reply = assistant
            .reply("what did I say")
            .await
            .expect("assistant should succeed");
        assert_eq!(reply, "what did I say");
    }

    #[tokio::test]
    async fn failing_binary_surfaces_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            &dir,
            "mock_fail.sh",
            "#!/bin/sh\ncat > /dev/null\necho 'model not loaded' >&2\nexit 1\n",
        )
        .await;

        let transcriber = CommandTranscriber::new(&script, vec![]);
        let err = transcriber
            .transcribe(b"audio")
            .await
            .expect_err("should fail");
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn oversized_audio_is_rejected_without_spawning() {
        let transcriber = CommandTranscriber::new("/nonexistent", vec![]);
        let audio = vec![0u8; MAX_AUDIO_INPUT_BYTES + 1];
        let err = transcriber
            .transcribe(&audio)
            .await
            .expect_err("should reject oversized input");
        assert!(err.to_string().contains("maximum size"));
    }
}
