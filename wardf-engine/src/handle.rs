//! Copy-on-write configuration handle
//!
//! ```text
//!  operator ──apply(candidate)──▶ validate ──▶ swap Arc ──▶ generation += 1
//!                                    │                          │
//!                              Err: nothing changes        notify engine
//!
//!  engine   ──get()──▶ Arc<DfConfiguration>   (held for a whole cycle)
//! ```
//!
//! Readers clone the `Arc` and never see a half-written configuration; the
//! lock is held only for the pointer swap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{info, warn};
use tokio::sync::Notify;

use wardf_hal::HardwareRegistry;

use crate::config::DfConfiguration;
use crate::error::ConfigError;

/// Shared, atomically swappable configuration
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<DfConfiguration>>,
    generation: AtomicU64,
    pending: Notify,
    registry: Option<HardwareRegistry>,
}

impl ConfigHandle {
    /// Validate `initial` and wrap it
    pub fn new(initial: DfConfiguration) -> Result<Self, ConfigError> {
        initial.validate()?;
        Ok(Self::unchecked(initial, None))
    }

    /// Like [`new`](Self::new), also resolving every antenna in `registry`
    ///
    /// Later candidates are checked against the same registry.
    pub fn with_registry(initial: DfConfiguration, registry: HardwareRegistry) -> Result<Self, ConfigError> {
        initial.validate_with(&registry)?;
        Ok(Self::unchecked(initial, Some(registry)))
    }

    fn unchecked(initial: DfConfiguration, registry: Option<HardwareRegistry>) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(0),
            pending: Notify::new(),
            registry,
        }
    }

    /// Active configuration
    pub fn get(&self) -> Arc<DfConfiguration> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Validate `candidate` and make it active
    ///
    /// On error the active configuration is untouched.
    pub fn apply(&self, candidate: DfConfiguration) -> Result<(), ConfigError> {
        let checked = match &self.registry {
            Some(registry) => candidate.validate_with(registry),
            None => candidate.validate(),
        };
        if let Err(e) = checked {
            warn!("configuration rejected: {}", e);
            return Err(e);
        }

        let candidate = Arc::new(candidate);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = candidate;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("configuration generation {} applied", generation);
        self.pending.notify_one();
        Ok(())
    }

    /// Number of successful swaps so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Resolves after the next successful [`apply`](Self::apply)
    ///
    /// A swap made while nobody waits is remembered, so the engine cannot
    /// miss one between cycles.
    pub async fn changed(&self) {
        self.pending.notified().await;
    }

    /// Registry candidates are resolved against, if any
    pub fn registry(&self) -> Option<&HardwareRegistry> {
        self.registry.as_ref()
    }
}
