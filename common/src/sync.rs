use tracing::{debug, info};

use crate::types::{ClimateAction, ClimateState, DeviceStatus, SettingsChange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncAction {
    SendRemoteTemperature(Option<f32>),
}

/// Folds unit reports into [`ClimateState`]. Never writes setpoints back to
/// the store: status echoes are not user intent.
#[derive(Debug, Clone)]
pub struct StatusSynchronizer {
    remote_temperature: Option<f32>,
    last_remote_send_ms: Option<u64>,
    resend_interval_ms: u64,
    operating: bool,
    device_temperature: Option<f32>,
}

impl StatusSynchronizer {
    pub fn new(resend_interval_ms: u64) -> Self {
        Self {
            remote_temperature: None,
            last_remote_send_ms: None,
            resend_interval_ms,
            operating: false,
            device_temperature: None,
        }
    }

    pub fn remote_temperature(&self) -> Option<f32> {
        self.remote_temperature
    }

    /// Room temperature as read by the unit's own sensor.
    pub fn device_temperature(&self) -> Option<f32> {
        self.device_temperature
    }

    pub fn on_settings_changed(&mut self, state: &mut ClimateState, change: &SettingsChange) {
        if let Some(mode) = change.mode {
            state.mode = mode;
        }
        if let Some(fan_speed) = change.fan_speed {
            state.fan_speed = fan_speed;
        }
        if let Some(setpoint) = change.setpoint {
            state.target_temperature = Some(setpoint);
        }
        self.refresh_action(state);
        debug!("settings changed: {change:?}");
    }

    pub fn on_status_changed(
        &mut self,
        state: &mut ClimateState,
        status: &DeviceStatus,
        now_ms: u64,
    ) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        state.mode = status.mode;
        state.fan_speed = status.fan_speed;
        if status.setpoint.is_some() {
            state.target_temperature = status.setpoint;
        }
        self.device_temperature = status.room_temperature;
        self.operating = status.operating;

        match self.remote_temperature {
            Some(remote) => {
                state.current_temperature = Some(remote);
                state.remote_override = true;
                if self.resend_due(now_ms) {
                    self.last_remote_send_ms = Some(now_ms);
                    actions.push(SyncAction::SendRemoteTemperature(Some(remote)));
                }
            }
            None => {
                state.current_temperature = status.room_temperature;
                state.remote_override = false;
            }
        }

        self.refresh_action(state);
        actions
    }

    /// Non-finite readings are treated as a clear.
    pub fn set_remote_temperature(
        &mut self,
        state: &mut ClimateState,
        value: Option<f32>,
        now_ms: u64,
    ) -> Vec<SyncAction> {
        let value = value.filter(|value| value.is_finite());

        match value {
            Some(remote) => {
                if self.remote_temperature.is_none() {
                    info!("using remote temperature sensor");
                }
                self.remote_temperature = Some(remote);
                self.last_remote_send_ms = Some(now_ms);
                state.current_temperature = Some(remote);
                state.remote_override = true;
            }
            None => {
                if self.remote_temperature.is_some() {
                    info!("switching back to internal temperature sensor");
                }
                self.remote_temperature = None;
                self.last_remote_send_ms = None;
                state.current_temperature = self.device_temperature;
                state.remote_override = false;
            }
        }

        self.refresh_action(state);
        vec![SyncAction::SendRemoteTemperature(value)]
    }

    /// The unit never received the override: the next status report sends it
    /// again instead of waiting out the resend interval.
    pub fn remote_send_failed(&mut self) {
        if self.remote_temperature.is_some() {
            self.last_remote_send_ms = None;
        }
    }

    fn resend_due(&self, now_ms: u64) -> bool {
        self.last_remote_send_ms
            .map(|last| now_ms.saturating_sub(last) >= self.resend_interval_ms)
            .unwrap_or(true)
    }

    fn refresh_action(&self, state: &mut ClimateState) {
        state.action = ClimateAction::derive(
            state.mode,
            self.operating,
            state.current_temperature,
            state.target_temperature,
        );
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{FanSpeed, OperatingMode};

    fn status(mode: OperatingMode, setpoint: f32, room: f32) -> DeviceStatus {
        DeviceStatus {
            mode,
            fan_speed: FanSpeed::Low,
            setpoint: Some(setpoint),
            room_temperature: Some(room),
            operating: true,
            compressor_frequency: Some(32),
        }
    }

    #[test]
    fn status_updates_normalized_state() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState::default();

        let actions = sync.on_status_changed(&mut state, &status(OperatingMode::Heat, 21.0, 18.5), 0);

        assert!(actions.is_empty());
        assert_eq!(
            state,
            ClimateState {
                mode: OperatingMode::Heat,
                fan_speed: FanSpeed::Low,
                target_temperature: Some(21.0),
                current_temperature: Some(18.5),
                remote_override: false,
                action: ClimateAction::Heating,
            }
        );
    }

    #[test]
    fn remote_override_replaces_internal_reading() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState::default();

        let actions = sync.set_remote_temperature(&mut state, Some(21.5), 0);
        assert_eq!(actions, vec![SyncAction::SendRemoteTemperature(Some(21.5))]);

        sync.on_status_changed(&mut state, &status(OperatingMode::Heat, 22.0, 19.0), 1_000);

        assert_eq!(state.current_temperature, Some(21.5));
        assert!(state.remote_override);
        assert_eq!(sync.device_temperature(), Some(19.0));
    }

    #[test]
    fn failed_remote_send_is_retried_on_next_report() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState::default();
        sync.set_remote_temperature(&mut state, Some(20.0), 0);
        let report = status(OperatingMode::Heat, 22.0, 18.0);

        sync.remote_send_failed();

        assert_eq!(
            sync.on_status_changed(&mut state, &report, 500),
            vec![SyncAction::SendRemoteTemperature(Some(20.0))]
        );
        assert!(sync.on_status_changed(&mut state, &report, 1_000).is_empty());
    }

    #[test]
    fn remote_override_is_resent_periodically() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState::default();
        sync.set_remote_temperature(&mut state, Some(20.0), 0);
        let report = status(OperatingMode::Cool, 24.0, 26.0);

        assert!(sync.on_status_changed(&mut state, &report, 29_999).is_empty());
        assert_eq!(
            sync.on_status_changed(&mut state, &report, 30_000),
            vec![SyncAction::SendRemoteTemperature(Some(20.0))]
        );
        assert!(sync.on_status_changed(&mut state, &report, 45_000).is_empty());
    }

    #[test]
    fn clearing_override_restores_device_reading() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState::default();
        sync.on_status_changed(&mut state, &status(OperatingMode::Heat, 22.0, 19.0), 0);
        sync.set_remote_temperature(&mut state, Some(21.5), 10);

        let actions = sync.set_remote_temperature(&mut state, None, 20);

        assert_eq!(actions, vec![SyncAction::SendRemoteTemperature(None)]);
        assert_eq!(state.current_temperature, Some(19.0));
        assert!(!state.remote_override);
    }

    #[test]
    fn non_finite_remote_reading_clears_override() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState::default();
        sync.set_remote_temperature(&mut state, Some(21.5), 0);

        let actions = sync.set_remote_temperature(&mut state, Some(f32::NAN), 5);

        assert_eq!(actions, vec![SyncAction::SendRemoteTemperature(None)]);
        assert_eq!(sync.remote_temperature(), None);
    }

    #[test]
    fn settings_change_applies_only_reported_fields() {
        let mut sync = StatusSynchronizer::new(30_000);
        let mut state = ClimateState {
            mode: OperatingMode::Cool,
            target_temperature: Some(24.0),
            ..ClimateState::default()
        };

        sync.on_settings_changed(
            &mut state,
            &SettingsChange {
                fan_speed: Some(FanSpeed::High),
                ..SettingsChange::default()
            },
        );

        assert_eq!(state.mode, OperatingMode::Cool);
        assert_eq!(state.fan_speed, FanSpeed::High);
        assert_eq!(state.target_temperature, Some(24.0));
    }
}
