use crate::channel::{ChannelRegistry, ImageRequest};
use crate::dispatch::Capability;
use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Watches the image-request channel and runs the image capability once per
/// trigger.
pub struct ImageWorker {
    channels: Arc<ChannelRegistry>,
    generator: Arc<dyn Capability>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl ImageWorker {
    pub fn new(
        channels: Arc<ChannelRegistry>,
        generator: Arc<dyn Capability>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channels,
            generator,
            poll_interval,
            cancel,
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut requests = Box::pin(
            self.channels
                .image_channel()
                .poll(self.poll_interval, self.cancel.clone()),
        );

        tracing::info!("Watching for image generation requests");

        while let Some(snapshot) = requests.next().await {
            let request: ImageRequest = match snapshot.value.parse() {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Ignoring image request: {}", e);
                    continue;
                }
            };
            if !request.is_triggered() {
                continue;
            }

            // Store faults are reported and the worker keeps watching.
            if let Err(e) = self.generate(request).await {
                tracing::error!("Error handling image request: {:#}", e);
            }
        }

        tracing::info!("Image worker stopped");
        Ok(())
    }

    async fn generate(&self, request: ImageRequest) -> Result<()> {
        tracing::info!(prompt = %request.prompt, "Generating images");

        match self.generator.invoke(&request.prompt).await {
            Ok(true) => tracing::info!(prompt = %request.prompt, "Images generated"),
            Ok(false) => tracing::warn!(prompt = %request.prompt, "Image generation reported failure"),
            Err(e) => tracing::warn!(prompt = %request.prompt, "Image generation failed: {:#}", e),
        }

        // Consume the trigger whatever the outcome so it is not retried forever.
        self.channels.set_image_request(&request.consumed())?;
        Ok(())
    }
}
