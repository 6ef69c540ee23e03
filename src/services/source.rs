use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Where the backend gets an utterance from once the microphone is requested.
///
/// `Ok(None)` means the source is exhausted and the backend should stop.
#[async_trait]
pub trait CommandSource: Send {
    async fn capture(&mut self) -> Result<Option<String>>;
}

/// Reads one line per capture from standard input.
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandSource for StdinSource {
    async fn capture(&mut self) -> Result<Option<String>> {
        tracing::info!("Listening... type a command and press Enter");
        self.lines
            .next_line()
            .await
            .context("Failed to read command from stdin")
    }
}
