use super::error::{ChannelError, Result};
use super::state_channel::StateChannel;
use super::values::{AssistantStatus, ImageRequest, MicrophoneFlag};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

pub const ASSISTANT_STATUS: &str = "assistant_status";
pub const MICROPHONE: &str = "microphone";
pub const RESPONSE_TEXT: &str = "response_text";
pub const DATABASE_TEXT: &str = "database_text";
pub const IMAGE_REQUEST: &str = "image_request";

/// Wire-encoded view of the channels a front end renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub assistant_status: String,
    pub mic: String,
    pub database: String,
    pub responses: String,
}

/// The fixed set of channels shared by every process, with typed accessors.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    dir: PathBuf,
    status: StateChannel,
    microphone: StateChannel,
    response: StateChannel,
    database: StateChannel,
    image: StateChannel,
}

impl ChannelRegistry {
    /// Open the store at `dir`, creating it and any missing channel files.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ChannelError::Store {
            path: dir.clone(),
            source,
        })?;

        let registry = Self {
            status: StateChannel::new(
                &dir,
                ASSISTANT_STATUS,
                "Status.data",
                &AssistantStatus::default().encode(),
            ),
            microphone: StateChannel::new(
                &dir,
                MICROPHONE,
                "Mic.data",
                MicrophoneFlag::default().encode(),
            ),
            response: StateChannel::new(&dir, RESPONSE_TEXT, "Responses.data", ""),
            database: StateChannel::new(&dir, DATABASE_TEXT, "Database.data", ""),
            image: StateChannel::new(
                &dir,
                IMAGE_REQUEST,
                "ImageGeneration.data",
                &ImageRequest::default().encode(),
            ),
            dir,
        };

        for channel in registry.channels() {
            channel.ensure()?;
        }

        tracing::info!("Channel store ready at {:?}", registry.dir);
        Ok(registry)
    }

    pub fn channels(&self) -> [&StateChannel; 5] {
        [
            &self.status,
            &self.microphone,
            &self.response,
            &self.database,
            &self.image,
        ]
    }

    pub fn channel(&self, name: &str) -> Option<&StateChannel> {
        self.channels().into_iter().find(|c| c.name() == name)
    }

    pub fn assistant_status(&self) -> AssistantStatus {
        decode_or_default(&self.status)
    }

    pub fn set_assistant_status(&self, status: AssistantStatus) -> Result<()> {
        tracing::debug!(status = %status, "Assistant status");
        self.status.publish(&status.encode())
    }

    pub fn microphone(&self) -> MicrophoneFlag {
        decode_or_default(&self.microphone)
    }

    pub fn set_microphone(&self, flag: MicrophoneFlag) -> Result<()> {
        self.microphone.publish(flag.encode())
    }

    /// Set the microphone flag from free-form input, coercing anything
    /// unrecognized to `Idle`.
    pub fn set_microphone_raw(&self, raw: &str) -> Result<MicrophoneFlag> {
        let flag = raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Coercing microphone value to Idle: {}", e);
            MicrophoneFlag::Idle
        });
        self.set_microphone(flag)?;
        Ok(flag)
    }

    pub fn response_text(&self) -> String {
        self.response.read()
    }

    pub fn set_response_text(&self, text: &str) -> Result<()> {
        self.response.publish(text)
    }

    pub fn database_text(&self) -> String {
        self.database.read()
    }

    pub fn set_database_text(&self, text: &str) -> Result<()> {
        self.database.publish(text)
    }

    pub fn image_request(&self) -> ImageRequest {
        decode_or_default(&self.image)
    }

    pub fn set_image_request(&self, request: &ImageRequest) -> Result<()> {
        self.image.publish(&request.encode())
    }

    pub fn status_channel(&self) -> &StateChannel {
        &self.status
    }

    pub fn microphone_channel(&self) -> &StateChannel {
        &self.microphone
    }

    pub fn response_channel(&self) -> &StateChannel {
        &self.response
    }

    pub fn image_channel(&self) -> &StateChannel {
        &self.image
    }

    pub fn view(&self) -> StateView {
        StateView {
            assistant_status: self.assistant_status().encode(),
            mic: self.microphone().encode().to_string(),
            database: self.database_text(),
            responses: self.response_text(),
        }
    }
}

fn decode_or_default<T>(channel: &StateChannel) -> T
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let raw = channel.read();
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!(channel = channel.name(), "Using default value: {}", e);
        T::default()
    })
}
