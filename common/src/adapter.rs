use std::fmt::Write as _;

use tracing::{debug, info, warn};

use crate::{
    command::CommandTranslator,
    config::AdapterConfig,
    driver::{DriverEvent, HeatPumpDriver, SerialTransport},
    error::AdapterError,
    setpoint::ModeSetpointManager,
    store::{PreferenceBackend, SetpointStore},
    sync::{StatusSynchronizer, SyncAction},
    types::{
        ClimateCall, ClimateState, ClimateStatePayload, ClimateTraits, DeviceSettings, FanSpeed,
        OperatingMode,
    },
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Received(usize),
    Idle,
    /// The unit did not answer; the last known state stands.
    Missed,
}

enum Link<D: HeatPumpDriver> {
    Pending(D::Transport),
    Connected(D),
    // Transport was consumed by a failed connect.
    Failed,
}

pub struct HeatPumpAdapter<D: HeatPumpDriver, B> {
    config: AdapterConfig,
    link: Link<D>,
    setpoints: ModeSetpointManager<B>,
    sync: StatusSynchronizer,
    state: ClimateState,
    missed_updates: u32,
    last_status_ms: Option<u64>,
}

impl<D: HeatPumpDriver, B: PreferenceBackend> HeatPumpAdapter<D, B> {
    pub fn new(config: AdapterConfig, transport: D::Transport, backend: B) -> Self {
        let bounds = config.bounds();
        let resend_ms = config.remote_temperature_resend_ms;
        Self {
            config,
            link: Link::Pending(transport),
            setpoints: ModeSetpointManager::new(SetpointStore::new(backend), bounds),
            sync: StatusSynchronizer::new(resend_ms),
            state: ClimateState::default(),
            missed_updates: 0,
            last_status_ms: None,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn state(&self) -> &ClimateState {
        &self.state
    }

    pub fn setpoints(&self) -> &ModeSetpointManager<B> {
        &self.setpoints
    }

    pub fn is_set_up(&self) -> bool {
        !matches!(self.link, Link::Pending(_))
    }

    pub fn missed_updates(&self) -> u32 {
        self.missed_updates
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), AdapterError> {
        if self.is_set_up() {
            return Err(AdapterError::AlreadySetUp);
        }
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    pub fn setup(&mut self) -> Result<(), AdapterError> {
        if self.is_set_up() {
            return Err(AdapterError::AlreadySetUp);
        }
        self.config.validate()?;

        info!("heat pump adapter version {VERSION}");
        self.setpoints.load_from_store();

        let Link::Pending(mut transport) = std::mem::replace(&mut self.link, Link::Failed) else {
            return Err(AdapterError::AlreadySetUp);
        };
        if !transport.is_open() {
            if let Err(err) = transport.open(self.config.baud_rate) {
                self.link = Link::Pending(transport);
                return Err(err.into());
            }
        }
        let driver = D::connect(transport, self.config.baud_rate)?;
        self.link = Link::Connected(driver);

        info!(
            "connected to heat pump at {} baud, polling every {} ms",
            self.config.baud_rate, self.config.poll_interval_ms
        );
        Ok(())
    }

    /// One poll cycle. Driver failures degrade to a missed update.
    pub fn update(&mut self, now_ms: u64) -> PollOutcome {
        self.setpoints.flush_pending();

        let Link::Connected(driver) = &mut self.link else {
            self.missed_updates = self.missed_updates.saturating_add(1);
            return PollOutcome::Missed;
        };

        let events = match driver.read_status() {
            Ok(events) => events,
            Err(err) => {
                self.missed_updates = self.missed_updates.saturating_add(1);
                warn!("missed heat pump update: {err}");
                return PollOutcome::Missed;
            }
        };

        if events.is_empty() {
            return PollOutcome::Idle;
        }

        let count = events.len();
        let mut actions = Vec::new();
        for event in events {
            match event {
                DriverEvent::SettingsChanged(change) => {
                    self.sync.on_settings_changed(&mut self.state, &change);
                }
                DriverEvent::StatusChanged(status) => {
                    self.last_status_ms = Some(now_ms);
                    actions.extend(self.sync.on_status_changed(&mut self.state, &status, now_ms));
                }
            }
        }
        self.missed_updates = 0;
        self.execute_sync_actions(actions);

        PollOutcome::Received(count)
    }

    pub fn control(&mut self, call: &ClimateCall) -> Result<Option<DeviceSettings>, AdapterError> {
        let Link::Connected(driver) = &mut self.link else {
            return Err(AdapterError::NotSetUp);
        };

        let Some(settings) =
            CommandTranslator::translate(&mut self.setpoints, &mut self.state, call)
        else {
            debug!("ignoring empty climate call");
            return Ok(None);
        };

        driver.write_settings(&settings)?;
        info!(
            "sent mode {} fan {} setpoint {:?}",
            settings.mode.as_str(),
            settings.fan_speed.as_str(),
            settings.setpoint
        );
        Ok(Some(settings))
    }

    /// Pass `None` to go back to the unit's internal sensor.
    pub fn set_remote_temperature(&mut self, value: Option<f32>, now_ms: u64) {
        let actions = self
            .sync
            .set_remote_temperature(&mut self.state, value, now_ms);
        self.execute_sync_actions(actions);
    }

    pub fn traits(&self) -> ClimateTraits {
        ClimateTraits {
            supported_modes: OperatingMode::ALL.to_vec(),
            supported_fan_speeds: FanSpeed::ALL.to_vec(),
            visual_min_temperature: self.config.min_temperature,
            visual_max_temperature: self.config.max_temperature,
            temperature_step: self.config.temperature_step,
            supports_current_temperature: true,
            supports_action: true,
        }
    }

    pub fn state_payload(&self) -> ClimateStatePayload {
        ClimateStatePayload {
            mode: self.state.mode.as_str(),
            fan_speed: self.state.fan_speed.as_str(),
            action: self.state.action.as_str(),
            target_temp: self.state.target_temperature,
            current_temp: self.state.current_temperature,
            remote_override: self.state.remote_override,
            missed_updates: self.missed_updates,
        }
    }

    pub fn dump_config(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Heat pump adapter {VERSION}");
        let _ = writeln!(out, "  baud rate: {}", self.config.baud_rate);
        let _ = writeln!(out, "  poll interval: {} ms", self.config.poll_interval_ms);
        let _ = writeln!(
            out,
            "  temperature range: {:.1}..={:.1} step {:.1}",
            self.config.min_temperature, self.config.max_temperature, self.config.temperature_step
        );
        let _ = writeln!(
            out,
            "  remote temperature resend: {} ms",
            self.config.remote_temperature_resend_ms
        );
        let _ = writeln!(out, "  set up: {}", self.is_set_up());
        out
    }

    pub fn dump_state(&self) -> String {
        let cache = self.setpoints.cache();
        let mut out = String::new();
        let _ = writeln!(out, "mode: {}", self.state.mode.as_str());
        let _ = writeln!(out, "fan: {}", self.state.fan_speed.as_str());
        let _ = writeln!(out, "action: {}", self.state.action.as_str());
        let _ = writeln!(out, "target: {}", fmt_temp(self.state.target_temperature));
        let _ = writeln!(out, "current: {}", fmt_temp(self.state.current_temperature));
        let _ = writeln!(out, "internal sensor: {}", fmt_temp(self.sync.device_temperature()));
        let _ = writeln!(out, "remote sensor: {}", fmt_temp(self.sync.remote_temperature()));
        let _ = writeln!(
            out,
            "stored setpoints: heat {} cool {} auto {}",
            fmt_temp(cache.heat),
            fmt_temp(cache.cool),
            fmt_temp(cache.auto)
        );
        let _ = writeln!(out, "pending saves: {}", self.setpoints.has_pending_saves());
        let _ = writeln!(out, "missed updates: {}", self.missed_updates);
        match self.last_status_ms {
            Some(ms) => {
                let _ = writeln!(out, "last status at: {ms} ms");
            }
            None => {
                let _ = writeln!(out, "last status at: never");
            }
        }
        out
    }

    // A send that does not reach the unit leaves the override due, so the
    // next status report carries it. That covers overrides set before setup.
    fn execute_sync_actions(&mut self, actions: Vec<SyncAction>) {
        for action in actions {
            match action {
                SyncAction::SendRemoteTemperature(value) => {
                    let Link::Connected(driver) = &mut self.link else {
                        debug!("remote temperature queued until the unit is connected");
                        self.sync.remote_send_failed();
                        continue;
                    };
                    if let Err(err) = driver.set_remote_temperature(value) {
                        warn!("failed to send remote temperature: {err}");
                        self.sync.remote_send_failed();
                    }
                }
            }
        }
    }
}

fn fmt_temp(value: Option<f32>) -> String {
    value
        .map(|value| format!("{value:.1}"))
        .unwrap_or_else(|| "-".to_string())
}
