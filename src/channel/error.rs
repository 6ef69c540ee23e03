use std::path::PathBuf;

/// Storage failure on a named channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel `{channel}`: failed to write {path}: {source}")]
    Write {
        channel: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("channel store {path} could not be prepared: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
