//! Capture-engine registry.
//!
//! Agents ship with a varying set of optional capture/injection engines;
//! the registry maps a capability name to whichever engines were compiled
//! in. An unavailable engine is a normal, logged outcome, not a failure.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine was not compiled into this binary.
    #[error("engine is not compiled within this binary")]
    Unavailable,
    #[error("{0}")]
    Init(String),
}

/// One concrete capture/injection backend.
pub trait CaptureEngine: Send + Sync {
    fn name(&self) -> &str;
}

pub type EngineConstructor = fn() -> Result<Arc<dyn CaptureEngine>, EngineError>;

/// Registry of available engines keyed by capability name.
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn CaptureEngine>>,
}

impl EngineRegistry {
    /// Build a registry from a constructor list, skipping engines that are
    /// not available in this build.
    pub fn build(constructors: &[(&str, EngineConstructor)]) -> Self {
        let mut engines = HashMap::new();
        for (name, constructor) in constructors {
            match constructor() {
                Ok(engine) => {
                    engines.insert(name.to_string(), engine);
                }
                Err(EngineError::Unavailable) => {
                    info!("Not compiled with {} support, skipping it", name);
                }
                Err(EngineError::Init(reason)) => {
                    error!("Failed to create {} engine: {}", name, reason);
                }
            }
        }
        info!("Capture engines: {:?}", engines.keys().collect::<Vec<_>>());
        Self { engines }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CaptureEngine>> {
        self.engines.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.engines.keys().cloned().collect()
    }
}
