//! Classification of command strings into typed intents.
//!
//! Commands are matched against an ordered prefix table; the first matching
//! prefix wins and the rest of the string (trimmed) becomes the payload.
//! Matching is case-sensitive and purely textual.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verb {
    Open,
    Close,
    Play,
    Content,
    GoogleSearch,
    YoutubeSearch,
    System,
    /// Explicitly ignored commands.
    Noop,
    Unrecognized,
}

impl Verb {
    pub const DISPATCHABLE: [Verb; 7] = [
        Self::Open,
        Self::Close,
        Self::Play,
        Self::Content,
        Self::GoogleSearch,
        Self::YoutubeSearch,
        Self::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Play => "play",
            Self::Content => "content",
            Self::GoogleSearch => "google-search",
            Self::YoutubeSearch => "youtube-search",
            Self::System => "system",
            Self::Noop => "noop",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Whether a capability can be registered for this verb.
    pub fn is_dispatchable(self) -> bool {
        !matches!(self, Self::Noop | Self::Unrecognized)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown verb: {0}")]
pub struct UnknownVerb(String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::DISPATCHABLE
            .into_iter()
            .chain([Self::Noop, Self::Unrecognized])
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub verb: Verb,
    pub payload: String,
}

struct PrefixRule {
    prefix: &'static str,
    verb: Verb,
}

const RULES: &[PrefixRule] = &[
    PrefixRule { prefix: "open ", verb: Verb::Open },
    PrefixRule { prefix: "close ", verb: Verb::Close },
    PrefixRule { prefix: "play ", verb: Verb::Play },
    PrefixRule { prefix: "content ", verb: Verb::Content },
    PrefixRule { prefix: "google search ", verb: Verb::GoogleSearch },
    PrefixRule { prefix: "youtube search ", verb: Verb::YoutubeSearch },
    PrefixRule { prefix: "system ", verb: Verb::System },
    // Handled by the conversational collaborator, not this dispatcher.
    PrefixRule { prefix: "general ", verb: Verb::Noop },
    PrefixRule { prefix: "realtime ", verb: Verb::Noop },
];

/// Classify a raw command. Never fails: unmatched input becomes
/// `Unrecognized` carrying the whole string.
pub fn parse(command: &str) -> Intent {
    for rule in RULES {
        let Some(rest) = command.strip_prefix(rule.prefix) else {
            continue;
        };

        let verb = if rule.verb == Verb::Open && is_ignored_open(command) {
            Verb::Noop
        } else {
            rule.verb
        };

        return Intent {
            verb,
            payload: rest.trim().to_string(),
        };
    }

    Intent {
        verb: Verb::Unrecognized,
        payload: command.to_string(),
    }
}

// "open it" refers back to something we cannot resolve; "open file" has no target.
fn is_ignored_open(command: &str) -> bool {
    command == "open file" || command.trim_end() == "open it"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(verb: Verb, payload: &str) -> Intent {
        Intent {
            verb,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn each_prefix_maps_to_its_verb() {
        let cases = [
            ("open notepad", Verb::Open, "notepad"),
            ("close chrome", Verb::Close, "chrome"),
            ("play afsanay by ys", Verb::Play, "afsanay by ys"),
            ("content application for sick leave", Verb::Content, "application for sick leave"),
            ("google search rust atomics", Verb::GoogleSearch, "rust atomics"),
            ("youtube search lofi beats", Verb::YoutubeSearch, "lofi beats"),
            ("system volume up", Verb::System, "volume up"),
            ("general how are you", Verb::Noop, "how are you"),
            ("realtime who won today", Verb::Noop, "who won today"),
        ];

        for (command, verb, payload) in cases {
            assert_eq!(parse(command), intent(verb, payload), "command: {command}");
        }
    }

    #[test]
    fn payload_is_trimmed() {
        assert_eq!(parse("open   spotify  "), intent(Verb::Open, "spotify"));
        assert_eq!(parse("system "), intent(Verb::System, ""));
    }

    #[test]
    fn open_it_and_open_file_are_ignored() {
        assert_eq!(parse("open it").verb, Verb::Noop);
        assert_eq!(parse("open file").verb, Verb::Noop);
        // Only the exact phrase is ignored.
        assert_eq!(parse("open file manager"), intent(Verb::Open, "file manager"));
        assert_eq!(parse("open items"), intent(Verb::Open, "items"));
    }

    #[test]
    fn unknown_command_keeps_whole_input() {
        assert_eq!(parse("unknown command"), intent(Verb::Unrecognized, "unknown command"));
        assert_eq!(parse(""), intent(Verb::Unrecognized, ""));
    }

    #[test]
    fn matching_is_case_sensitive_and_prefix_only() {
        assert_eq!(parse("Open notepad").verb, Verb::Unrecognized);
        assert_eq!(parse("please open notepad").verb, Verb::Unrecognized);
        assert_eq!(parse("open close notes"), intent(Verb::Open, "close notes"));
        // The verb needs its trailing space.
        assert_eq!(parse("opennotepad").verb, Verb::Unrecognized);
    }

    #[test]
    fn earlier_rules_win() {
        assert_eq!(parse("google search youtube search x"), intent(Verb::GoogleSearch, "youtube search x"));
    }

    #[test]
    fn verb_names_round_trip_through_from_str() {
        for verb in Verb::DISPATCHABLE {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
            assert!(verb.is_dispatchable());
        }
        assert!(!Verb::Noop.is_dispatchable());
        assert!("search".parse::<Verb>().is_err());
    }
}
