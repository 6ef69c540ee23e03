pub mod error;
pub mod registry;
pub mod state_channel;
pub mod values;

pub use error::ChannelError;
pub use registry::{ChannelRegistry, StateView};
pub use state_channel::{Snapshot, StateChannel};
pub use values::{AssistantStatus, ImageRequest, MicrophoneFlag};
