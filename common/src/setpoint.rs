use tracing::{debug, info, warn};

use crate::{
    config::TemperatureBounds,
    store::{PreferenceBackend, SetpointStore},
    types::OperatingMode,
};

/// Last setpoint the user chose in each climate-controlling mode, the way the
/// unit's own remote remembers them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeSetpointCache {
    pub heat: Option<f32>,
    pub cool: Option<f32>,
    pub auto: Option<f32>,
}

impl ModeSetpointCache {
    pub fn get(&self, mode: OperatingMode) -> Option<f32> {
        match mode {
            OperatingMode::Heat => self.heat,
            OperatingMode::Cool => self.cool,
            OperatingMode::Auto => self.auto,
            OperatingMode::Off | OperatingMode::Dry | OperatingMode::Fan => None,
        }
    }

    pub fn set(&mut self, mode: OperatingMode, value: f32) {
        match mode {
            OperatingMode::Heat => self.heat = Some(value),
            OperatingMode::Cool => self.cool = Some(value),
            OperatingMode::Auto => self.auto = Some(value),
            OperatingMode::Off | OperatingMode::Dry | OperatingMode::Fan => {}
        }
    }
}

#[derive(Debug)]
pub struct ModeSetpointManager<B> {
    store: SetpointStore<B>,
    cache: ModeSetpointCache,
    bounds: TemperatureBounds,
    // Modes whose latest cached value has not reached the store yet.
    pending: Vec<OperatingMode>,
}

impl<B: PreferenceBackend> ModeSetpointManager<B> {
    pub fn new(store: SetpointStore<B>, bounds: TemperatureBounds) -> Self {
        Self {
            store,
            cache: ModeSetpointCache::default(),
            bounds,
            pending: Vec::new(),
        }
    }

    pub fn cache(&self) -> &ModeSetpointCache {
        &self.cache
    }

    pub fn bounds(&self) -> TemperatureBounds {
        self.bounds
    }

    pub fn store(&self) -> &SetpointStore<B> {
        &self.store
    }

    pub fn has_pending_saves(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Best effort: anything missing or corrupt stays absent. A stored value
    /// outside the current bounds is clamped and queued for rewrite, so the
    /// next [`flush_pending`](Self::flush_pending) brings the store in line.
    pub fn load_from_store(&mut self) {
        for mode in [OperatingMode::Heat, OperatingMode::Cool, OperatingMode::Auto] {
            match self.store.load(mode) {
                Some(stored) => {
                    let value = self.bounds.clamp(stored);
                    self.cache.set(mode, value);
                    if value != stored {
                        info!(
                            "stored {} setpoint {stored:.1} outside bounds, restoring {value:.1}",
                            mode.as_str()
                        );
                        self.pending.retain(|pending| *pending != mode);
                        self.pending.push(mode);
                    } else {
                        info!("restored {} setpoint {value:.1}", mode.as_str());
                    }
                }
                None => debug!("no stored {} setpoint", mode.as_str()),
            }
        }
    }

    /// Cached setpoint for `mode`, else whatever the unit supplies. Never
    /// borrows another mode's entry.
    pub fn on_mode_activated(
        &self,
        mode: OperatingMode,
        device_default: Option<f32>,
    ) -> Option<f32> {
        self.cache.get(mode).or(device_default)
    }

    pub fn on_setpoint_requested(&mut self, mode: OperatingMode, value: f32) -> f32 {
        let accepted = self.bounds.clamp(value);
        if accepted != value {
            info!(
                "requested setpoint {value} outside {:.1}..={:.1}, using {accepted:.1}",
                self.bounds.min, self.bounds.max
            );
        }

        if !mode.is_climate_controlling() {
            return accepted;
        }

        self.cache.set(mode, accepted);
        self.pending.retain(|pending| *pending != mode);
        if let Err(err) = self.store.save(mode, accepted) {
            warn!("failed to persist {} setpoint: {err}", mode.as_str());
            self.pending.push(mode);
        }

        accepted
    }

    /// Writes every cached value the store does not hold yet, one attempt per
    /// mode. Called once per update cycle, which keeps the store from lagging
    /// the cache by more than one cycle.
    pub fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let mut still_pending = Vec::new();
        for mode in std::mem::take(&mut self.pending) {
            let Some(value) = self.cache.get(mode) else {
                continue;
            };
            match self.store.save(mode, value) {
                Ok(()) => info!("persisted deferred {} setpoint {value:.1}", mode.as_str()),
                Err(err) => {
                    warn!("deferred {} setpoint save failed: {err}", mode.as_str());
                    still_pending.push(mode);
                }
            }
        }
        self.pending = still_pending;
    }
}
