use tracing::{debug, warn};

use crate::{
    setpoint::ModeSetpointManager,
    store::PreferenceBackend,
    types::{ClimateAction, ClimateCall, ClimateState, DeviceSettings, OperatingMode},
};

/// Turns a user request into one settings write and applies it to the state
/// ahead of the unit confirming it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTranslator;

impl CommandTranslator {
    pub fn translate<B: PreferenceBackend>(
        manager: &mut ModeSetpointManager<B>,
        state: &mut ClimateState,
        call: &ClimateCall,
    ) -> Option<DeviceSettings> {
        let call = ClimateCall {
            target_temperature: match call.target_temperature {
                Some(value) if !value.is_finite() => {
                    warn!("ignoring non-finite target temperature {value}");
                    None
                }
                other => other,
            },
            ..call.clone()
        };
        if call.is_empty() {
            return None;
        }

        let mode_changed = call.mode.is_some_and(|mode| mode != state.mode);
        let effective_mode = call.mode.unwrap_or(state.mode);
        let fan_speed = call.fan_speed.unwrap_or(state.fan_speed);

        let setpoint = match call.target_temperature {
            Some(value) => Some(manager.on_setpoint_requested(effective_mode, value)),
            None if mode_changed && effective_mode.is_climate_controlling() => {
                // No device default here: the unit keeps its own setpoint for
                // this mode until status reports it.
                manager.on_mode_activated(effective_mode, None)
            }
            None if effective_mode.is_climate_controlling() => {
                manager.on_mode_activated(effective_mode, state.target_temperature)
            }
            None => None,
        };

        let settings = DeviceSettings {
            mode: effective_mode,
            fan_speed,
            setpoint,
        };

        state.mode = effective_mode;
        state.fan_speed = fan_speed;
        if setpoint.is_some() || (mode_changed && effective_mode.is_climate_controlling()) {
            state.target_temperature = setpoint;
        }
        if effective_mode == OperatingMode::Off {
            state.action = ClimateAction::Off;
        }

        debug!("translated {call:?} into {settings:?}");
        Some(settings)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::AdapterConfig,
        store::{MemoryBackend, SetpointStore},
        types::FanSpeed,
    };

    fn manager() -> ModeSetpointManager<MemoryBackend> {
        ModeSetpointManager::new(
            SetpointStore::new(MemoryBackend::new()),
            AdapterConfig::default().bounds(),
        )
    }

    #[test]
    fn temperature_request_is_clamped_and_persisted() {
        let mut manager = manager();
        let mut state = ClimateState {
            mode: OperatingMode::Heat,
            ..ClimateState::default()
        };

        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                target_temperature: Some(35.0),
                ..ClimateCall::default()
            },
        )
        .unwrap();

        assert_eq!(settings.setpoint, Some(31.0));
        assert_eq!(state.target_temperature, Some(31.0));
        assert_eq!(manager.store().load(OperatingMode::Heat), Some(31.0));
    }

    #[test]
    fn mode_switch_recalls_that_modes_setpoint() {
        let mut manager = manager();
        manager.on_setpoint_requested(OperatingMode::Heat, 20.0);
        let mut state = ClimateState {
            mode: OperatingMode::Cool,
            target_temperature: Some(24.0),
            ..ClimateState::default()
        };

        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                mode: Some(OperatingMode::Heat),
                ..ClimateCall::default()
            },
        )
        .unwrap();

        assert_eq!(
            settings,
            DeviceSettings {
                mode: OperatingMode::Heat,
                fan_speed: FanSpeed::Auto,
                setpoint: Some(20.0),
            }
        );
        assert_eq!(state.target_temperature, Some(20.0));
    }

    #[test]
    fn mode_switch_without_memory_defers_to_unit() {
        let mut manager = manager();
        let mut state = ClimateState::default();

        CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                mode: Some(OperatingMode::Cool),
                target_temperature: Some(22.0),
                ..ClimateCall::default()
            },
        );
        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                mode: Some(OperatingMode::Heat),
                ..ClimateCall::default()
            },
        )
        .unwrap();

        assert_eq!(settings.setpoint, None);
        assert_eq!(state.target_temperature, None);
        assert_eq!(manager.cache().heat, None);
    }

    #[test]
    fn explicit_temperature_wins_over_recalled_one() {
        let mut manager = manager();
        manager.on_setpoint_requested(OperatingMode::Auto, 21.0);
        let mut state = ClimateState::default();

        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                mode: Some(OperatingMode::Auto),
                target_temperature: Some(23.0),
                fan_speed: Some(FanSpeed::Quiet),
            },
        )
        .unwrap();

        assert_eq!(settings.setpoint, Some(23.0));
        assert_eq!(settings.fan_speed, FanSpeed::Quiet);
        assert_eq!(manager.cache().auto, Some(23.0));
    }

    #[test]
    fn dry_mode_temperature_is_sent_but_not_persisted() {
        let mut manager = manager();
        let mut state = ClimateState::default();

        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                mode: Some(OperatingMode::Dry),
                target_temperature: Some(12.0),
                ..ClimateCall::default()
            },
        )
        .unwrap();

        assert_eq!(settings.setpoint, Some(16.0));
        assert!(manager.store().backend().is_empty());
    }

    #[test]
    fn empty_or_nan_request_produces_no_write() {
        let mut manager = manager();
        let mut state = ClimateState::default();

        assert_eq!(
            CommandTranslator::translate(&mut manager, &mut state, &ClimateCall::default()),
            None
        );
        assert_eq!(
            CommandTranslator::translate(
                &mut manager,
                &mut state,
                &ClimateCall {
                    target_temperature: Some(f32::NAN),
                    ..ClimateCall::default()
                },
            ),
            None
        );
        assert_eq!(state, ClimateState::default());
    }

    #[test]
    fn nan_temperature_does_not_block_fan_change() {
        let mut manager = manager();
        let mut state = ClimateState {
            mode: OperatingMode::Heat,
            target_temperature: Some(21.0),
            ..ClimateState::default()
        };

        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                target_temperature: Some(f32::NAN),
                fan_speed: Some(FanSpeed::High),
                ..ClimateCall::default()
            },
        )
        .unwrap();

        assert_eq!(settings.fan_speed, FanSpeed::High);
        assert_eq!(settings.setpoint, Some(21.0));
        assert!(manager.store().backend().is_empty());
    }

    #[test]
    fn turning_off_keeps_target_for_display() {
        let mut manager = manager();
        let mut state = ClimateState {
            mode: OperatingMode::Heat,
            target_temperature: Some(21.0),
            action: ClimateAction::Heating,
            ..ClimateState::default()
        };

        let settings = CommandTranslator::translate(
            &mut manager,
            &mut state,
            &ClimateCall {
                mode: Some(OperatingMode::Off),
                ..ClimateCall::default()
            },
        )
        .unwrap();

        assert_eq!(settings.setpoint, None);
        assert_eq!(state.target_temperature, Some(21.0));
        assert_eq!(state.action, ClimateAction::Off);
    }
}
