use super::error::{ChannelError, Result};
use futures::Stream;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest interval `poll` will tick at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A channel value together with the channel revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub value: String,
    pub revision: u64,
}

/// A named, file-backed slot holding a single string value.
///
/// Writers replace the whole file through a temp-file rename, so a reader in
/// any process sees either the previous or the next complete value. Every
/// publish also bumps a revision kept in a `<file>.rev` sidecar, leaving the
/// value file itself plain text for other front ends.
#[derive(Debug, Clone)]
pub struct StateChannel {
    name: String,
    path: PathBuf,
    revision_path: PathBuf,
    default: String,
}

impl StateChannel {
    pub fn new(dir: &Path, name: &str, file_name: &str, default: &str) -> Self {
        Self {
            name: name.to_string(),
            path: dir.join(file_name),
            revision_path: dir.join(format!("{file_name}.rev")),
            default: default.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file with the default value if it does not exist yet.
    ///
    /// A value published concurrently by another process is never replaced.
    pub fn ensure(&self) -> Result<()> {
        let temp = self.stage(&self.path, &self.default)?;
        match temp.persist_noclobber(&self.path) {
            Ok(_) => {
                tracing::debug!(channel = %self.name, "Created channel with default value");
                Ok(())
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(self.write_error(&self.path, e.error)),
        }
    }

    /// Atomically replace the channel's value and bump its revision.
    pub fn publish(&self, value: &str) -> Result<()> {
        let revision = self.revision() + 1;

        // Revision lands first, so a reader that sees the new value also sees
        // a revision at least as new.
        self.replace(&self.revision_path, &revision.to_string())?;
        self.replace(&self.path, value)?;

        tracing::trace!(channel = %self.name, revision, len = value.len(), "Published value");
        Ok(())
    }

    /// Current value, or the default when the store is missing or unreadable.
    pub fn read(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(e) if e.kind() == ErrorKind::NotFound => self.default.clone(),
            Err(e) => {
                tracing::warn!(
                    channel = %self.name,
                    "Failed to read {:?}, using default: {}",
                    self.path,
                    e
                );
                self.default.clone()
            }
        }
    }

    /// Number of publishes recorded for this channel; 0 before the first one.
    pub fn revision(&self) -> u64 {
        match std::fs::read_to_string(&self.revision_path) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
                tracing::warn!(channel = %self.name, "Ignoring corrupt revision {:?}: {}", raw, e);
                0
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(channel = %self.name, "Failed to read revision: {}", e);
                0
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let value = self.read();
        Snapshot {
            value,
            revision: self.revision(),
        }
    }

    /// Read the channel every `interval` until `cancel` fires.
    ///
    /// The stream yields once per tick. Revisions never go backwards within
    /// one stream. Cancellation is checked at each tick boundary; dropping the
    /// stream also stops polling. Intervals below [`MIN_POLL_INTERVAL`] are
    /// raised to it.
    pub fn poll(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Snapshot> + Send + 'static {
        let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = PollState {
            channel: self.clone(),
            ticker,
            cancel,
            last_revision: 0,
        };

        futures::stream::unfold(state, |mut state| async move {
            tokio::select! {
                biased;
                _ = state.cancel.cancelled() => {
                    tracing::debug!(channel = %state.channel.name, "Poll cancelled");
                    None
                }
                _ = state.ticker.tick() => {
                    let snapshot = state.observe();
                    Some((snapshot, state))
                }
            }
        })
    }

    fn replace(&self, path: &Path, contents: &str) -> Result<()> {
        let temp = self.stage(path, contents)?;
        temp.persist(path)
            .map_err(|e| self.write_error(path, e.error))?;
        Ok(())
    }

    /// Write `contents` to a synced temp file next to `path`.
    fn stage(&self, path: &Path, contents: &str) -> Result<NamedTempFile> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        // Same directory, so the final rename stays on one filesystem.
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", self.name))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| self.write_error(path, e))?;

        temp.write_all(contents.as_bytes())
            .map_err(|e| self.write_error(path, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.write_error(path, e))?;
        Ok(temp)
    }

    fn write_error(&self, path: &Path, source: std::io::Error) -> ChannelError {
        ChannelError::Write {
            channel: self.name.clone(),
            path: path.to_path_buf(),
            source,
        }
    }
}

struct PollState {
    channel: StateChannel,
    ticker: tokio::time::Interval,
    cancel: CancellationToken,
    last_revision: u64,
}

impl PollState {
    fn observe(&mut self) -> Snapshot {
        let mut snapshot = self.channel.snapshot();
        // A racing writer can leave an older sidecar behind; keep the stream monotonic.
        snapshot.revision = snapshot.revision.max(self.last_revision);
        self.last_revision = snapshot.revision;
        snapshot
    }
}
