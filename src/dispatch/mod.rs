pub mod capability;
pub mod command;
pub mod dispatcher;
pub mod outcome;

pub use capability::{ActionRegistry, BlockingCapability, Capability, RegistryError};
pub use command::{CommandCapability, SystemControl};
pub use dispatcher::Dispatcher;
pub use outcome::{DispatchOutcome, DispatchReport, Outcome};

use crate::config::Config;
use crate::intent::Verb;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Build the capability table described by the configuration.
pub fn actions_from_config(config: &Config) -> Result<ActionRegistry> {
    let mut actions = ActionRegistry::new();

    for (key, argv) in &config.capabilities {
        let verb: Verb = key
            .parse()
            .with_context(|| format!("invalid capability key {key:?}"))?;
        if verb == Verb::System {
            tracing::warn!("Ignoring `system` capability template; use system_controls");
            continue;
        }
        let capability = CommandCapability::new(verb.as_str(), argv.clone())?;
        actions.register(verb, Arc::new(capability))?;
    }

    if !config.system_controls.is_empty() {
        actions.register(
            Verb::System,
            Arc::new(SystemControl::new(config.system_controls.clone())),
        )?;
    }

    if actions.is_empty() {
        tracing::warn!("No capabilities configured, every command will fail with no handler");
    } else {
        tracing::info!(count = actions.len(), "Registered capabilities: {:?}", actions);
    }
    Ok(actions)
}
