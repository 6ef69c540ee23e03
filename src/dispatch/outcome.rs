use crate::intent::Verb;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed(String),
    Skipped(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Result of one command in a dispatch batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub command: String,
    pub verb: Verb,
    pub outcome: Outcome,
}

/// Summary of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchReport {
    pub fn from_outcomes(outcomes: &[DispatchOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut report, o| {
                match o.outcome {
                    Outcome::Succeeded => report.succeeded += 1,
                    Outcome::Failed(_) => report.failed += 1,
                    Outcome::Skipped(_) => report.skipped += 1,
                }
                report
            })
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// Share of non-skipped commands that succeeded; `None` if nothing ran.
    pub fn success_ratio(&self) -> Option<f64> {
        let attempted = self.succeeded + self.failed;
        (attempted > 0).then(|| self.succeeded as f64 / attempted as f64)
    }
}

/// Text written to the response channel: a summary line followed by one
/// diagnostic line per failed command.
pub fn render(outcomes: &[DispatchOutcome]) -> String {
    let report = DispatchReport::from_outcomes(outcomes);
    let mut lines = vec![format!(
        "Done: {} succeeded, {} failed, {} skipped.",
        report.succeeded, report.failed, report.skipped
    )];

    lines.extend(outcomes.iter().filter_map(|o| match &o.outcome {
        Outcome::Failed(reason) => Some(format!("Could not run \"{}\": {}", o.command, reason)),
        _ => None,
    }));

    lines.join("\n")
}
