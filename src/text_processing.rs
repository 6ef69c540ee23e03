use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;

/// Turns a captured utterance into a batch of command strings
///
/// This handles the gap between what the user said and what the intent
/// parser expects:
/// - Word overrides: Replace specific words/phrases (case-insensitive)
/// - Normalization: collapse whitespace, lowercase, drop trailing punctuation
/// - Splitting: one utterance may hold several commands
pub struct TextProcessor {
    word_overrides: Vec<(Regex, String)>,
    separator: Regex,
}

impl TextProcessor {
    pub fn new(overrides: &HashMap<String, String>, separator: &str) -> Result<Self> {
        // Compile word overrides into regexes
        let word_overrides = overrides
            .iter()
            .filter_map(|(k, v)| {
                // Case-insensitive word boundary match
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(k)))
                    .ok()
                    .map(|re| (re, v.clone()))
            })
            .collect();

        let separator = Regex::new(separator)
            .with_context(|| format!("Invalid command separator: {separator:?}"))?;

        Ok(Self {
            word_overrides,
            separator,
        })
    }

    /// Normalize a single query
    pub fn normalize(&self, text: &str) -> String {
        let mut result = text.to_string();

        for (re, replacement) in &self.word_overrides {
            result = re.replace_all(&result, replacement.as_str()).to_string();
        }

        let result = query_modifier(&result).to_lowercase();
        result
            .trim_end_matches(['.', '!', '?'])
            .trim_end()
            .to_string()
    }

    /// Split a normalized query into individual commands
    pub fn split_commands(&self, text: &str) -> Vec<String> {
        let normalized = self.normalize(text);
        self.separator
            .split(&normalized)
            .map(|part| part.trim_matches(|c: char| c.is_whitespace() || c == '.'))
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn query_modifier(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim every line of a response and drop the blank ones.
pub fn answer_modifier(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
