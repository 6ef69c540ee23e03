use super::capability::Capability;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;

pub const SYSTEM_COMMANDS: [&str; 4] = ["mute", "unmute", "volume up", "volume down"];

/// Runs an external program built from an argv template.
///
/// `{payload}` expands to the payload verbatim and `{payload_url}` to its
/// URL-encoded form. Arguments are passed directly, never through a shell.
pub struct CommandCapability {
    label: String,
    argv: Vec<String>,
}

impl CommandCapability {
    pub fn new(label: impl Into<String>, argv: Vec<String>) -> Result<Self> {
        let label = label.into();
        anyhow::ensure!(!argv.is_empty(), "[{}] command template is empty", label);
        Ok(Self { label, argv })
    }

    pub fn expand(&self, payload: &str) -> Vec<String> {
        let encoded = urlencoding::encode(payload);
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{payload_url}", &encoded)
                    .replace("{payload}", payload)
            })
            .collect()
    }
}

#[async_trait]
impl Capability for CommandCapability {
    async fn invoke(&self, payload: &str) -> Result<bool> {
        run_argv(&self.label, &self.expand(payload)).await
    }
}

/// Volume and mute control restricted to a fixed command set.
pub struct SystemControl {
    actions: HashMap<String, Vec<String>>,
}

impl SystemControl {
    pub fn new(actions: HashMap<String, Vec<String>>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl Capability for SystemControl {
    async fn invoke(&self, payload: &str) -> Result<bool> {
        if !SYSTEM_COMMANDS.contains(&payload) {
            anyhow::bail!("unsupported system command: {payload:?}");
        }
        let argv = self
            .actions
            .get(payload)
            .with_context(|| format!("no action configured for system command {payload:?}"))?;
        run_argv("system", argv).await
    }
}

async fn run_argv(label: &str, argv: &[String]) -> Result<bool> {
    let (program, args) = argv
        .split_first()
        .with_context(|| format!("[{label}] empty command"))?;

    tracing::info!("[{}] Running: {:?}", label, argv);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("[{label}] failed to spawn {program}"))?;

    if output.status.success() {
        return Ok(true);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    tracing::warn!("[{}] Command exited with {}: {}", label, output.status, stderr);
    if stderr.is_empty() {
        anyhow::bail!("[{label}] {program} exited with {}", output.status);
    }
    anyhow::bail!("[{label}] {program}: {stderr}")
}
