use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind} value: {value:?}")]
pub struct InvalidValue {
    kind: &'static str,
    value: String,
}

impl InvalidValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Assistant status label shown by every front end (last write wins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AssistantStatus {
    #[default]
    Available,
    Listening,
    Thinking,
    Searching,
    Answering,
}

impl AssistantStatus {
    pub const ALL: [AssistantStatus; 5] = [
        Self::Available,
        Self::Listening,
        Self::Thinking,
        Self::Searching,
        Self::Answering,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Listening => "Listening",
            Self::Thinking => "Thinking",
            Self::Searching => "Searching",
            Self::Answering => "Answering",
        }
    }

    /// On-disk form, e.g. `Listening...`
    pub fn encode(self) -> String {
        format!("{}...", self.label())
    }
}

impl fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssistantStatus {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().trim_end_matches('.').trim_end();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(label))
            .ok_or_else(|| InvalidValue::new("assistant status", s))
    }
}

/// Whether a front end has asked the backend to capture a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MicrophoneFlag {
    Requested,
    #[default]
    Idle,
}

impl MicrophoneFlag {
    pub fn encode(self) -> &'static str {
        match self {
            Self::Requested => "True",
            Self::Idle => "False",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Requested => Self::Idle,
            Self::Idle => Self::Requested,
        }
    }
}

impl FromStr for MicrophoneFlag {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "requested" => Ok(Self::Requested),
            "false" | "0" | "off" | "idle" => Ok(Self::Idle),
            _ => Err(InvalidValue::new("microphone flag", s)),
        }
    }
}

/// Prompt plus trigger flag consumed by the image worker.
///
/// Encoded as `<prompt>,<True|False>`; the prompt is everything before the
/// last comma so prompts may contain commas themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub trigger: MicrophoneFlag,
}

impl ImageRequest {
    pub fn pending(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            trigger: MicrophoneFlag::Requested,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger == MicrophoneFlag::Requested
    }

    pub fn consumed(self) -> Self {
        Self {
            prompt: self.prompt,
            trigger: MicrophoneFlag::Idle,
        }
    }

    pub fn encode(&self) -> String {
        format!("{},{}", self.prompt, self.trigger.encode())
    }
}

impl FromStr for ImageRequest {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let (prompt, flag) = trimmed
            .rsplit_once(',')
            .ok_or_else(|| InvalidValue::new("image request", s))?;
        let trigger = flag
            .parse()
            .map_err(|_| InvalidValue::new("image request", s))?;

        Ok(Self {
            prompt: prompt.trim().to_string(),
            trigger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_labels_with_or_without_ellipsis() {
        assert_eq!("Available...".parse::<AssistantStatus>().unwrap(), AssistantStatus::Available);
        assert_eq!("listening".parse::<AssistantStatus>().unwrap(), AssistantStatus::Listening);
        assert_eq!(" Thinking... \n".parse::<AssistantStatus>().unwrap(), AssistantStatus::Thinking);
        assert!("Sleeping...".parse::<AssistantStatus>().is_err());
        assert!("".parse::<AssistantStatus>().is_err());
    }

    #[test]
    fn status_encoding_is_readable_back() {
        for status in AssistantStatus::ALL {
            assert_eq!(status.encode().parse::<AssistantStatus>().unwrap(), status);
        }
        assert_eq!(AssistantStatus::Searching.encode(), "Searching...");
    }

    #[test]
    fn microphone_flag_is_lenient() {
        assert_eq!("True".parse::<MicrophoneFlag>().unwrap(), MicrophoneFlag::Requested);
        assert_eq!("on".parse::<MicrophoneFlag>().unwrap(), MicrophoneFlag::Requested);
        assert_eq!("False\n".parse::<MicrophoneFlag>().unwrap(), MicrophoneFlag::Idle);
        assert!("maybe".parse::<MicrophoneFlag>().is_err());
        assert_eq!(MicrophoneFlag::Idle.toggled(), MicrophoneFlag::Requested);
    }

    #[test]
    fn image_request_splits_on_last_comma() {
        let req: ImageRequest = "a cat, a dog,True".parse().unwrap();
        assert_eq!(req.prompt, "a cat, a dog");
        assert!(req.is_triggered());

        let consumed = req.consumed();
        assert_eq!(consumed.encode(), "a cat, a dog,False");
    }

    #[test]
    fn image_request_rejects_missing_flag() {
        assert!("just a prompt".parse::<ImageRequest>().is_err());
        assert!("prompt,perhaps".parse::<ImageRequest>().is_err());
        assert_eq!("".parse::<ImageRequest>().unwrap(), ImageRequest::default());
    }
}
