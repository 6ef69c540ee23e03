use super::source::CommandSource;
use crate::bridge::UiBridge;
use crate::channel::{AssistantStatus, ChannelRegistry, MicrophoneFlag};
use crate::dispatch::{Dispatcher, outcome};
use crate::text_processing::{self, TextProcessor};
use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

enum Cycle {
    Continue,
    Stop,
}

/// Consumer side of the microphone channel
///
/// This service:
/// - Polls the microphone flag
/// - Captures an utterance from its CommandSource when requested
/// - Dispatches the resulting commands and publishes the response
/// - Returns the flag to Idle after every cycle
pub struct Backend {
    channels: Arc<ChannelRegistry>,
    bridge: Arc<UiBridge>,
    dispatcher: Dispatcher,
    text_processor: TextProcessor,
    source: Box<dyn CommandSource>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Backend {
    pub fn new(
        bridge: Arc<UiBridge>,
        dispatcher: Dispatcher,
        text_processor: TextProcessor,
        source: Box<dyn CommandSource>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let channels = Arc::clone(bridge.channels());
        Self {
            dispatcher: dispatcher.with_status_channel(Arc::clone(&channels)),
            channels,
            bridge,
            text_processor,
            source,
            poll_interval,
            cancel,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut microphone = Box::pin(
            self.channels
                .microphone_channel()
                .poll(self.poll_interval, self.cancel.clone()),
        );

        tracing::info!("Backend ready, waiting for microphone requests");

        while let Some(snapshot) = microphone.next().await {
            let flag: MicrophoneFlag = snapshot.value.parse().unwrap_or_default();
            if flag != MicrophoneFlag::Requested {
                continue;
            }

            tracing::debug!(revision = snapshot.revision, "Microphone requested");
            let cycle = match self.handle_request().await {
                Ok(cycle) => cycle,
                Err(e) => {
                    tracing::error!("Error handling request: {:#}", e);
                    self.set_status(AssistantStatus::Available);
                    Cycle::Continue
                }
            };

            if let Err(e) = self.bridge.finish_capture() {
                tracing::error!("Failed to reset microphone: {}", e);
            }

            if let Cycle::Stop = cycle {
                break;
            }
        }

        tracing::info!("Backend stopped");
        Ok(())
    }

    async fn handle_request(&mut self) -> Result<Cycle> {
        self.set_status(AssistantStatus::Listening);

        let captured = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(Cycle::Stop),
            captured = self.source.capture() => captured?,
        };

        let Some(text) = captured else {
            tracing::info!("Command source closed");
            self.set_status(AssistantStatus::Available);
            return Ok(Cycle::Stop);
        };

        let query = self.text_processor.normalize(&text);
        if query.is_empty() {
            tracing::debug!("Nothing captured");
            self.set_status(AssistantStatus::Available);
            return Ok(Cycle::Continue);
        }

        tracing::info!("Query: {}", query);
        self.channels.set_database_text(&query)?;

        let commands = self.text_processor.split_commands(&text);
        let outcomes = self.dispatcher.run(commands).await;

        self.set_status(AssistantStatus::Answering);
        let response = text_processing::answer_modifier(&outcome::render(&outcomes));
        self.channels.set_response_text(&response)?;
        self.set_status(AssistantStatus::Available);

        Ok(Cycle::Continue)
    }

    fn set_status(&self, status: AssistantStatus) {
        if let Err(e) = self.channels.set_assistant_status(status) {
            tracing::warn!("Failed to publish status {}: {}", status, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ActionRegistry, Capability};
    use crate::intent::Verb;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const SEPARATOR: &str = r"\s*(?:[,;]|\band then\b)\s*";

    struct Scripted(VecDeque<String>);

    #[async_trait]
    impl CommandSource for Scripted {
        async fn capture(&mut self) -> Result<Option<String>> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct Opener(Mutex<Vec<String>>);

    #[async_trait]
    impl Capability for Opener {
        async fn invoke(&self, payload: &str) -> Result<bool> {
            self.0.lock().unwrap().push(payload.to_string());
            Ok(true)
        }
    }

    fn backend(
        dir: &std::path::Path,
        script: &[&str],
        opener: Arc<Opener>,
        cancel: CancellationToken,
    ) -> (Backend, Arc<UiBridge>) {
        let channels = Arc::new(ChannelRegistry::open(dir).unwrap());
        let bridge = Arc::new(UiBridge::new(channels, Duration::from_secs(30)));
        let actions = ActionRegistry::new().with(Verb::Open, opener).unwrap();
        let source = Scripted(script.iter().map(|s| s.to_string()).collect());

        let backend = Backend::new(
            Arc::clone(&bridge),
            Dispatcher::new(actions),
            TextProcessor::new(&HashMap::new(), SEPARATOR).unwrap(),
            Box::new(source),
            Duration::from_millis(10),
            cancel,
        );
        (backend, bridge)
    }

    #[tokio::test]
    async fn requested_flag_runs_one_capture_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let opener = Arc::new(Opener::default());
        let cancel = CancellationToken::new();
        let (backend, bridge) = backend(
            dir.path(),
            &["Open notepad, flibbertigibbet"],
            opener.clone(),
            cancel.clone(),
        );

        bridge.toggle_microphone().unwrap();
        let task = tokio::spawn(backend.run());

        let channels = Arc::clone(bridge.channels());
        tokio::time::timeout(Duration::from_secs(2), async {
            while channels.response_text().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*opener.0.lock().unwrap(), vec!["notepad".to_string()]);
        assert_eq!(channels.database_text(), "open notepad, flibbertigibbet");
        let response = channels.response_text();
        assert!(response.starts_with("Done: 1 succeeded, 1 failed"), "{response}");
        assert!(response.contains("flibbertigibbet"));

        // Wait for the cycle to finish resetting the flag.
        tokio::time::timeout(Duration::from_secs(2), async {
            while channels.microphone() != MicrophoneFlag::Idle {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(channels.assistant_status(), AssistantStatus::Available);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn idle_flag_never_captures() {
        let dir = tempfile::tempdir().unwrap();
        let opener = Arc::new(Opener::default());
        let cancel = CancellationToken::new();
        let (backend, _bridge) =
            backend(dir.path(), &["open notepad"], opener.clone(), cancel.clone());

        let task = tokio::spawn(backend.run());
        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert!(opener.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_source_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let (backend, bridge) = backend(dir.path(), &[], Arc::new(Opener::default()), cancel);

        bridge.toggle_microphone().unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), backend.run()).await;
        assert!(result.unwrap().is_ok());
        assert_eq!(bridge.microphone(), MicrophoneFlag::Idle);
    }
}
