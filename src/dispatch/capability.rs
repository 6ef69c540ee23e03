use crate::intent::Verb;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// An external action invoked with an intent's payload.
///
/// Implementations must tolerate being called concurrently with any other
/// capability. `Ok(false)` and `Err(_)` are both reported as a failed outcome.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(&self, payload: &str) -> Result<bool>;
}

/// Adapts a synchronous function by running it on the blocking pool.
pub struct BlockingCapability<F> {
    func: Arc<F>,
}

impl<F> BlockingCapability<F>
where
    F: Fn(&str) -> Result<bool> + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func: Arc::new(func) }
    }
}

#[async_trait]
impl<F> Capability for BlockingCapability<F>
where
    F: Fn(&str) -> Result<bool> + Send + Sync + 'static,
{
    async fn invoke(&self, payload: &str) -> Result<bool> {
        let func = Arc::clone(&self.func);
        let payload = payload.to_string();
        tokio::task::spawn_blocking(move || func(&payload)).await?
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("verb `{0}` cannot carry a capability")]
    NotDispatchable(Verb),
}

/// Verb to capability table consulted by the dispatcher.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    capabilities: HashMap<Verb, Arc<dyn Capability>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the capability for `verb`.
    pub fn register(
        &mut self,
        verb: Verb,
        capability: Arc<dyn Capability>,
    ) -> Result<(), RegistryError> {
        if !verb.is_dispatchable() {
            return Err(RegistryError::NotDispatchable(verb));
        }
        if self.capabilities.insert(verb, capability).is_some() {
            tracing::debug!(verb = %verb, "Replaced capability");
        }
        Ok(())
    }

    pub fn with(mut self, verb: Verb, capability: Arc<dyn Capability>) -> Result<Self, RegistryError> {
        self.register(verb, capability)?;
        Ok(self)
    }

    pub fn get(&self, verb: Verb) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(&verb).cloned()
    }

    pub fn verbs(&self) -> impl Iterator<Item = Verb> + '_ {
        self.capabilities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut verbs: Vec<_> = self.verbs().map(Verb::as_str).collect();
        verbs.sort_unstable();
        f.debug_struct("ActionRegistry").field("verbs", &verbs).finish()
    }
}
