use std::process::Stdio;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;

use crate::translate::{GenerationParams, Generator};

/// Runs an external program per attempt: prompt on stdin, translation on stdout.
///
/// The model identifier is exported as `NOVELIFY_MODEL` so one script can
/// stand in for several models.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> anyhow::Result<String> {
        tracing::debug!(command = %self.program, model, "run translator command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("NOVELIFY_MODEL", model)
            .env("NOVELIFY_TEMPERATURE", params.temperature.to_string())
            .env("NOVELIFY_MAX_OUTPUT_TOKENS", params.max_output_tokens.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn translator command: {}", self.program))?;

        // Written while stdout is drained; the child may answer before it has read everything.
        let mut stdin = child.stdin.take().context("open translator stdin")?;
        let feed_prompt = async move {
            let written = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed_prompt, child.wait_with_output());
        let output = output.context("wait translator process")?;
        if !output.status.success() {
            anyhow::bail!(
                "translator command failed: {} ({})",
                self.program,
                output.status
            );
        }

        if let Err(err) = written
            && err.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(err).context("write translator stdin");
        }

        String::from_utf8(output.stdout).context("translator stdout is not valid UTF-8")
    }
}
