use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use yakki_core::{ModelParams, TextGenerator, YakkiError};

#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub model: String,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CliOutput {
    pub response: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Text generator backed by the `claude` command-line client
#[derive(Clone)]
pub struct CliRunner {
    claude_path: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl CliRunner {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            claude_path: PathBuf::from("claude"),
            working_dir,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_claude_path(mut self, path: PathBuf) -> Self {
        self.claude_path = path;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn claude_path(&self) -> &Path {
        &self.claude_path
    }

    /// Run claude CLI non-interactively with the given prompt
    pub async fn run(&self, prompt: &str, options: &CliOptions) -> Result<CliOutput> {
        let mut cmd = Command::new(&self.claude_path);
        cmd.current_dir(&self.working_dir);

        cmd.arg("--print");
        cmd.arg("--model").arg(&options.model);

        if let Some(ref system_prompt) = options.system_prompt {
            cmd.arg("--system-prompt").arg(system_prompt);
        }

        // Prompt as positional argument (must be last)
        cmd.arg(prompt);

        // Close stdin to prevent blocking; kill the child if the caller gives up
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            "Running claude CLI (model: {}, prompt: {} chars)",
            options.model,
            prompt.chars().count()
        );

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.claude_path.display()))?;

        let response = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.is_empty() {
            tracing::warn!("claude stderr: {}", stderr.trim());
        }

        Ok(CliOutput {
            response,
            stderr,
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl TextGenerator for CliRunner {
    fn is_available(&self) -> bool {
        resolve_executable(&self.claude_path).is_some()
    }

    async fn invoke(
        &self,
        system: &str,
        user: &str,
        params: &ModelParams,
    ) -> yakki_core::Result<String> {
        // The CLI has no sampling flags; max_tokens and temperature stay advisory
        let options = CliOptions {
            model: params.model.clone(),
            system_prompt: Some(system.to_string()),
        };

        let output = match tokio::time::timeout(self.timeout, self.run(user, &options)).await {
            Err(_) => {
                return Err(YakkiError::Timeout {
                    timeout_seconds: self.timeout.as_secs(),
                    context: format!("claude --model {}", params.model),
                })
            }
            Ok(Err(e)) => return Err(YakkiError::Generation(format!("{:#}", e))),
            Ok(Ok(output)) => output,
        };

        if output.exit_code != 0 {
            return Err(YakkiError::Generation(format!(
                "claude exited with code {}: {}",
                output.exit_code,
                last_line(&output.stderr)
            )));
        }
        if output.response.trim().is_empty() {
            return Err(YakkiError::Generation("claude returned an empty response".to_string()));
        }

        Ok(output.response)
    }
}

/// Locate `program` either as a path or on `PATH`
fn resolve_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn last_line(text: &str) -> &str {
    text.trim().lines().last().unwrap_or("")
}
