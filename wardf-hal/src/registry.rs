//! Hardware registry: antenna id → antenna
//!
//! The engine resolves the antennas of a configuration here when the
//! configuration is applied, and asks it whether any antenna is still usable.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::info;

use wardf_core::AntennaId;

use crate::antenna::{Antenna, Health};
use crate::error::{HalResult, HardwareFault};

/// Registered antennas, shared with collector tasks
#[derive(Debug, Default, Clone)]
pub struct HardwareRegistry {
    antennas: HashMap<AntennaId, Arc<Antenna>>,
}

impl HardwareRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `antenna` under its own id, replacing any previous one
    pub fn register(&mut self, antenna: Antenna) -> Arc<Antenna> {
        let antenna = Arc::new(antenna);
        self.antennas.insert(antenna.id().to_string(), Arc::clone(&antenna));
        antenna
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, antenna: Antenna) -> Self {
        self.register(antenna);
        self
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.antennas.contains_key(id)
    }

    /// Antenna registered under `id`
    pub fn get(&self, id: &str) -> Option<Arc<Antenna>> {
        self.antennas.get(id).cloned()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<AntennaId> {
        let mut ids: Vec<_> = self.antennas.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered antennas
    pub fn len(&self) -> usize {
        self.antennas.len()
    }

    /// Nothing registered
    pub fn is_empty(&self) -> bool {
        self.antennas.is_empty()
    }

    /// Look up every id, failing on the first unknown one
    pub fn resolve<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> HalResult<Vec<Arc<Antenna>>> {
        ids.into_iter()
            .map(|id| self.get(id).ok_or_else(|| HardwareFault::UnknownAntenna(id.to_string())))
            .collect()
    }

    /// Whether the antenna registered under `id` cannot deliver readings
    ///
    /// That is the case once it is marked offline after exhausting retries,
    /// and also while its backend reports `Offline` health (absent hardware).
    /// Unknown ids are not down: they have no hardware to fail.
    pub fn is_down(&self, id: &str) -> bool {
        self.get(id)
            .is_some_and(|a| a.is_offline() || !a.health().is_usable())
    }

    /// True when `ids` is non-empty and every one of them is down or unknown
    pub fn all_offline<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let mut any = false;
        for id in ids {
            any = true;
            if self.contains(id) && !self.is_down(id) {
                return false;
            }
        }
        any
    }

    /// Clear every offline mark
    pub fn reset_offline(&self) {
        for antenna in self.antennas.values() {
            antenna.reset();
        }
    }

    /// Re-probe offline antennas; returns how many came back
    pub async fn reprobe_all(&self) -> usize {
        let mut recovered = 0;
        for antenna in self.antennas.values().filter(|a| a.is_offline()) {
            if antenna.reprobe().await {
                recovered += 1;
            }
        }
        if recovered > 0 {
            info!("{} antenna(s) recovered on re-probe", recovered);
        }
        recovered
    }

    /// Cached health of every antenna, by id
    pub fn health_report(&self) -> BTreeMap<AntennaId, Health> {
        self.antennas
            .iter()
            .map(|(id, antenna)| (id.clone(), antenna.health()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::{SimOutcome, SimulatedBackend};
    use std::time::Duration;

    fn registry() -> (HardwareRegistry, SimulatedBackend) {
        let flaky = SimulatedBackend::scripted([SimOutcome::Fault, SimOutcome::Fault]);
        let registry = HardwareRegistry::new()
            .with(Antenna::new("a", SimulatedBackend::scripted([])))
            .with(Antenna::new("b", flaky.clone()));
        (registry, flaky)
    }

    #[test]
    fn resolve_reports_unknown_ids() {
        let (registry, _) = registry();
        assert_eq!(registry.resolve(["a", "b"]).unwrap().len(), 2);
        assert_eq!(
            registry.resolve(["a", "zz"]).unwrap_err(),
            HardwareFault::UnknownAntenna("zz".into())
        );
        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_tracking_and_reprobe() {
        let (registry, flaky) = registry();
        let b = registry.get("b").unwrap();
        assert!(b.poll(Duration::from_millis(10)).await.is_err());

        assert!(registry.all_offline(["b"]));
        assert!(!registry.all_offline(["a", "b"]));
        assert!(!registry.all_offline(std::iter::empty()));
        assert_eq!(registry.health_report()["b"], Health::Offline);

        flaky.set_present(false);
        assert_eq!(registry.reprobe_all().await, 0);
        flaky.set_present(true);
        assert_eq!(registry.reprobe_all().await, 1);
        assert!(!b.is_offline());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_offline() {
        let (registry, _) = registry();
        let b = registry.get("b").unwrap();
        let _ = b.poll(Duration::from_millis(10)).await;
        registry.reset_offline();
        assert!(!registry.all_offline(["b"]));
    }

    #[tokio::test]
    async fn absent_hardware_is_down_without_faulting() {
        let absent = SimulatedBackend::scripted(Vec::<SimOutcome>::new());
        let registry = HardwareRegistry::new()
            .with(Antenna::new("a", absent.clone()))
            .with(Antenna::new("b", absent.clone()));
        absent.set_present(false);
        assert!(!registry.all_offline(["a", "b"]));

        for id in ["a", "b"] {
            assert_eq!(registry.get(id).unwrap().refresh_health().await, Health::Offline);
        }
        assert!(registry.is_down("a"));
        assert!(!registry.get("a").unwrap().is_offline());
        assert!(registry.all_offline(["a", "b"]));
        assert!(!registry.is_down("unknown"));

        absent.set_present(true);
        registry.get("b").unwrap().refresh_health().await;
        assert!(!registry.all_offline(["a", "b"]));
    }
}
