use super::capability::{ActionRegistry, Capability};
use super::outcome::{DispatchOutcome, Outcome};
use crate::channel::{AssistantStatus, ChannelRegistry};
use crate::intent::{self, Intent, Verb};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;

pub const NO_HANDLER: &str = "no handler";
pub const IGNORED: &str = "ignored";

/// Parses a batch of commands and runs the mapped capabilities concurrently.
///
/// A batch never fails as a whole: every input command yields exactly one
/// outcome, in completion order rather than input order.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    actions: Arc<ActionRegistry>,
    channels: Option<Arc<ChannelRegistry>>,
}

struct Scheduled {
    index: usize,
    command: String,
    verb: Verb,
}

impl Dispatcher {
    pub fn new(actions: ActionRegistry) -> Self {
        Self {
            actions: Arc::new(actions),
            channels: None,
        }
    }

    /// Publish `Thinking`/`Searching` to the status channel while a batch runs.
    pub fn with_status_channel(mut self, channels: Arc<ChannelRegistry>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub async fn run<I, S>(&self, commands: I) -> Vec<DispatchOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_status(AssistantStatus::Thinking);

        let mut outcomes = Vec::new();
        let mut pending: Vec<Scheduled> = Vec::new();
        let mut tasks = JoinSet::new();

        for (index, command) in commands.into_iter().map(Into::into).enumerate() {
            let Intent { verb, payload } = intent::parse(&command);

            match verb {
                Verb::Noop => {
                    tracing::debug!(command = %command, "Ignoring command");
                    outcomes.push(DispatchOutcome {
                        command,
                        verb,
                        outcome: Outcome::Skipped(IGNORED.to_string()),
                    });
                }
                Verb::Unrecognized => {
                    tracing::warn!(command = %command, "No function found for command");
                    outcomes.push(DispatchOutcome {
                        command,
                        verb,
                        outcome: Outcome::Failed(NO_HANDLER.to_string()),
                    });
                }
                _ => match self.actions.get(verb) {
                    Some(capability) => {
                        tracing::debug!(command = %command, verb = %verb, "Scheduling capability");
                        tasks.spawn(invoke(index, capability, payload));
                        pending.push(Scheduled { index, command, verb });
                    }
                    None => {
                        tracing::warn!(command = %command, verb = %verb, "No capability registered");
                        outcomes.push(DispatchOutcome {
                            command,
                            verb,
                            outcome: Outcome::Failed(NO_HANDLER.to_string()),
                        });
                    }
                },
            }
        }

        if !tasks.is_empty() {
            self.set_status(AssistantStatus::Searching);
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // Panics are caught inside the task, so this only happens
                    // when the runtime is shutting down. Leftovers are reported below.
                    tracing::error!("Capability task did not complete: {}", e);
                    continue;
                }
            };
            if let Some(pos) = pending.iter().position(|s| s.index == index) {
                let Scheduled { command, verb, .. } = pending.swap_remove(pos);
                log_outcome(&command, &outcome);
                outcomes.push(DispatchOutcome { command, verb, outcome });
            }
        }

        outcomes.extend(pending.into_iter().map(|s| DispatchOutcome {
            command: s.command,
            verb: s.verb,
            outcome: Outcome::Failed("capability task aborted".to_string()),
        }));

        outcomes
    }

    fn set_status(&self, status: AssistantStatus) {
        let Some(channels) = &self.channels else {
            return;
        };
        if let Err(e) = channels.set_assistant_status(status) {
            tracing::warn!("Failed to publish status {}: {}", status, e);
        }
    }
}

async fn invoke(index: usize, capability: Arc<dyn Capability>, payload: String) -> (usize, Outcome) {
    let call = AssertUnwindSafe(capability.invoke(&payload)).catch_unwind();
    let outcome = match call.await {
        Ok(Ok(true)) => Outcome::Succeeded,
        Ok(Ok(false)) => Outcome::Failed("capability reported failure".to_string()),
        Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
        Err(_) => Outcome::Failed("capability panicked".to_string()),
    };
    (index, outcome)
}

fn log_outcome(command: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Failed(reason) => tracing::warn!(command = %command, "Command failed: {}", reason),
        _ => tracing::info!(command = %command, "Command {}", outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::capability::BlockingCapability;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Records every payload it receives and answers from a fixed table.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        delay: Duration,
    }

    #[async_trait]
    impl Capability for Recorder {
        async fn invoke(&self, payload: &str) -> anyhow::Result<bool> {
            tokio::time::sleep(self.delay).await;
            self.calls.lock().unwrap().push(payload.to_string());
            match payload {
                "missing" => anyhow::bail!("application not found"),
                "refuse" => Ok(false),
                "explode" => panic!("capability blew up"),
                _ => Ok(true),
            }
        }
    }

    fn by_command(outcomes: Vec<DispatchOutcome>) -> HashMap<String, Outcome> {
        outcomes.into_iter().map(|o| (o.command, o.outcome)).collect()
    }

    #[tokio::test]
    async fn mixed_batch_yields_one_outcome_per_command() {
        let open = Arc::new(Recorder::default());
        let system = Arc::new(Recorder::default());
        let actions = ActionRegistry::new()
            .with(Verb::Open, open.clone())
            .unwrap()
            .with(Verb::System, system.clone())
            .unwrap();
        let dispatcher = Dispatcher::new(actions);

        let outcomes = dispatcher
            .run(["open notepad", "system volume up", "flibbertigibbet"])
            .await;
        assert_eq!(outcomes.len(), 3);

        let outcomes = by_command(outcomes);
        assert_eq!(outcomes["open notepad"], Outcome::Succeeded);
        assert_eq!(outcomes["system volume up"], Outcome::Succeeded);
        assert_eq!(outcomes["flibbertigibbet"], Outcome::Failed(NO_HANDLER.into()));
        assert_eq!(*open.calls.lock().unwrap(), vec!["notepad".to_string()]);
        assert_eq!(*system.calls.lock().unwrap(), vec!["volume up".to_string()]);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let actions = ActionRegistry::new()
            .with(Verb::Open, Arc::new(Recorder::default()))
            .unwrap();
        let dispatcher = Dispatcher::new(actions);

        let outcomes = dispatcher
            .run(vec![
                "open missing",
                "open word",
                "open refuse",
                "open explode",
                "open excel",
                "open it",
            ])
            .await;
        assert_eq!(outcomes.len(), 6);

        let outcomes = by_command(outcomes);
        assert_eq!(
            outcomes["open missing"],
            Outcome::Failed("application not found".into())
        );
        assert_eq!(
            outcomes["open refuse"],
            Outcome::Failed("capability reported failure".into())
        );
        assert_eq!(
            outcomes["open explode"],
            Outcome::Failed("capability panicked".into())
        );
        assert_eq!(outcomes["open word"], Outcome::Succeeded);
        assert_eq!(outcomes["open excel"], Outcome::Succeeded);
        assert_eq!(outcomes["open it"], Outcome::Skipped(IGNORED.into()));
    }

    #[tokio::test]
    async fn capabilities_run_concurrently() {
        let slow = Arc::new(Recorder {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let actions = ActionRegistry::new()
            .with(Verb::Play, slow.clone())
            .unwrap()
            .with(Verb::GoogleSearch, slow.clone())
            .unwrap()
            .with(Verb::YoutubeSearch, slow.clone())
            .unwrap();
        let dispatcher = Dispatcher::new(actions);

        let started = Instant::now();
        let outcomes = dispatcher
            .run(["play a", "google search b", "youtube search c"])
            .await;
        let elapsed = started.elapsed();

        assert!(outcomes.iter().all(|o| o.outcome == Outcome::Succeeded));
        assert!(elapsed < Duration::from_millis(550), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn blocking_capabilities_do_not_serialize_the_batch() {
        let sleepy = Arc::new(BlockingCapability::new(|_: &str| {
            std::thread::sleep(Duration::from_millis(150));
            Ok(true)
        }));
        let actions = ActionRegistry::new().with(Verb::Close, sleepy).unwrap();
        let dispatcher = Dispatcher::new(actions);

        let started = Instant::now();
        let outcomes = dispatcher.run(["close a", "close b", "close c"]).await;
        assert_eq!(outcomes.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn unmapped_verb_fails_with_no_handler() {
        let dispatcher = Dispatcher::new(ActionRegistry::new());
        let outcomes = dispatcher
            .run(["content leave letter", "general hello", "realtime news"])
            .await;

        let outcomes = by_command(outcomes);
        assert_eq!(outcomes["content leave letter"], Outcome::Failed(NO_HANDLER.into()));
        assert_eq!(outcomes["general hello"], Outcome::Skipped(IGNORED.into()));
        assert_eq!(outcomes["realtime news"], Outcome::Skipped(IGNORED.into()));
    }

    #[tokio::test]
    async fn empty_batch_returns_nothing() {
        let dispatcher = Dispatcher::new(ActionRegistry::new());
        let outcomes = dispatcher.run(Vec::<String>::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn duplicate_commands_each_get_an_outcome() {
        let recorder = Arc::new(Recorder::default());
        let actions = ActionRegistry::new().with(Verb::Open, recorder.clone()).unwrap();
        let dispatcher = Dispatcher::new(actions);

        let outcomes = dispatcher.run(["open notepad", "open notepad"]).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(recorder.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn status_channel_reflects_searching_phase() {
        let dir = tempfile::tempdir().unwrap();
        let channels = Arc::new(ChannelRegistry::open(dir.path()).unwrap());

        struct StatusSnooper(Arc<ChannelRegistry>);

        #[async_trait]
        impl Capability for StatusSnooper {
            async fn invoke(&self, _: &str) -> anyhow::Result<bool> {
                Ok(self.0.assistant_status() == AssistantStatus::Searching)
            }
        }

        let actions = ActionRegistry::new()
            .with(Verb::GoogleSearch, Arc::new(StatusSnooper(channels.clone())))
            .unwrap();
        let dispatcher = Dispatcher::new(actions).with_status_channel(channels.clone());

        let outcomes = dispatcher.run(["google search weather"]).await;
        assert_eq!(outcomes[0].outcome, Outcome::Succeeded);
    }
}
