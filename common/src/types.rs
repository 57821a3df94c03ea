use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingMode {
    Off,
    Heat,
    Cool,
    Auto,
    Dry,
    Fan,
}

impl OperatingMode {
    pub const ALL: [OperatingMode; 6] = [
        Self::Off,
        Self::Heat,
        Self::Cool,
        Self::Auto,
        Self::Dry,
        Self::Fan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
            Self::Auto => "AUTO",
            Self::Dry => "DRY",
            Self::Fan => "FAN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OFF" => Some(Self::Off),
            "HEAT" => Some(Self::Heat),
            "COOL" => Some(Self::Cool),
            "AUTO" | "HEAT_COOL" => Some(Self::Auto),
            "DRY" => Some(Self::Dry),
            "FAN" | "FAN_ONLY" => Some(Self::Fan),
            _ => None,
        }
    }

    /// Heat, Cool and Auto regulate against a setpoint; the rest ignore it.
    pub fn is_climate_controlling(self) -> bool {
        matches!(self, Self::Heat | Self::Cool | Self::Auto)
    }

    pub fn storage_key(self) -> Option<&'static str> {
        match self {
            Self::Heat => Some("setpoint_heat"),
            Self::Cool => Some("setpoint_cool"),
            Self::Auto => Some("setpoint_auto"),
            Self::Off | Self::Dry | Self::Fan => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanSpeed {
    Auto,
    Quiet,
    Low,
    Medium,
    Middle,
    High,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 6] = [
        Self::Auto,
        Self::Quiet,
        Self::Low,
        Self::Medium,
        Self::Middle,
        Self::High,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Quiet => "QUIET",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::Middle => "MIDDLE",
            Self::High => "HIGH",
        }
    }

    // The unit itself numbers its fixed speeds 1 through 4.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Some(Self::Auto),
            "QUIET" => Some(Self::Quiet),
            "LOW" | "1" => Some(Self::Low),
            "MEDIUM" | "2" => Some(Self::Medium),
            "MIDDLE" | "3" => Some(Self::Middle),
            "HIGH" | "4" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClimateAction {
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
    Fan,
}

impl ClimateAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Idle => "IDLE",
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
            Self::Drying => "DRYING",
            Self::Fan => "FAN",
        }
    }

    pub fn derive(
        mode: OperatingMode,
        operating: bool,
        current: Option<f32>,
        target: Option<f32>,
    ) -> Self {
        if mode == OperatingMode::Off {
            return Self::Off;
        }
        if !operating {
            return Self::Idle;
        }

        match mode {
            OperatingMode::Off => Self::Off,
            OperatingMode::Heat => Self::Heating,
            OperatingMode::Cool => Self::Cooling,
            OperatingMode::Dry => Self::Drying,
            OperatingMode::Fan => Self::Fan,
            OperatingMode::Auto => match (current, target) {
                (Some(current), Some(target)) if current < target => Self::Heating,
                (Some(current), Some(target)) if current > target => Self::Cooling,
                _ => Self::Idle,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClimateState {
    pub mode: OperatingMode,
    pub fan_speed: FanSpeed,
    pub target_temperature: Option<f32>,
    pub current_temperature: Option<f32>,
    pub remote_override: bool,
    pub action: ClimateAction,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Off,
            fan_speed: FanSpeed::Auto,
            target_temperature: None,
            current_temperature: None,
            remote_override: false,
            action: ClimateAction::Off,
        }
    }
}

/// A user request. Absent fields leave the corresponding setting alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateCall {
    #[serde(default)]
    pub mode: Option<OperatingMode>,
    #[serde(rename = "targetTemperature", default)]
    pub target_temperature: Option<f32>,
    #[serde(rename = "fanSpeed", default)]
    pub fan_speed: Option<FanSpeed>,
}

impl ClimateCall {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.target_temperature.is_none() && self.fan_speed.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    pub mode: OperatingMode,
    pub fan_speed: FanSpeed,
    /// `None` leaves the unit on its own setpoint.
    pub setpoint: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsChange {
    pub mode: Option<OperatingMode>,
    pub fan_speed: Option<FanSpeed>,
    pub setpoint: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    pub mode: OperatingMode,
    pub fan_speed: FanSpeed,
    pub setpoint: Option<f32>,
    pub room_temperature: Option<f32>,
    pub operating: bool,
    pub compressor_frequency: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClimateTraits {
    #[serde(rename = "supportedModes")]
    pub supported_modes: Vec<OperatingMode>,
    #[serde(rename = "supportedFanSpeeds")]
    pub supported_fan_speeds: Vec<FanSpeed>,
    #[serde(rename = "visualMinTemperature")]
    pub visual_min_temperature: f32,
    #[serde(rename = "visualMaxTemperature")]
    pub visual_max_temperature: f32,
    #[serde(rename = "temperatureStep")]
    pub temperature_step: f32,
    #[serde(rename = "supportsCurrentTemperature")]
    pub supports_current_temperature: bool,
    #[serde(rename = "supportsAction")]
    pub supports_action: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClimateStatePayload {
    pub mode: &'static str,
    #[serde(rename = "fanSpeed")]
    pub fan_speed: &'static str,
    pub action: &'static str,
    #[serde(rename = "targetTemp")]
    pub target_temp: Option<f32>,
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "remoteOverride")]
    pub remote_override: bool,
    #[serde(rename = "missedUpdates")]
    pub missed_updates: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_accepts_aliases() {
        assert_eq!(OperatingMode::parse("heat_cool"), Some(OperatingMode::Auto));
        assert_eq!(OperatingMode::parse(" fan_only "), Some(OperatingMode::Fan));
        assert_eq!(OperatingMode::parse("cool"), Some(OperatingMode::Cool));
        assert_eq!(OperatingMode::parse("boost"), None);
    }

    #[test]
    fn only_climate_modes_have_storage_keys() {
        for mode in OperatingMode::ALL {
            assert_eq!(
                mode.storage_key().is_some(),
                mode.is_climate_controlling(),
                "{mode:?}"
            );
        }
    }

    #[test]
    fn fan_speed_parses_unit_numbers() {
        assert_eq!(FanSpeed::parse("1"), Some(FanSpeed::Low));
        assert_eq!(FanSpeed::parse("4"), Some(FanSpeed::High));
        assert_eq!(FanSpeed::parse("quiet"), Some(FanSpeed::Quiet));
        assert_eq!(FanSpeed::parse("5"), None);
    }

    #[test]
    fn auto_action_follows_room_against_target() {
        let heating = ClimateAction::derive(OperatingMode::Auto, true, Some(18.0), Some(21.0));
        let cooling = ClimateAction::derive(OperatingMode::Auto, true, Some(25.0), Some(21.0));
        let unknown = ClimateAction::derive(OperatingMode::Auto, true, None, Some(21.0));

        assert_eq!(heating, ClimateAction::Heating);
        assert_eq!(cooling, ClimateAction::Cooling);
        assert_eq!(unknown, ClimateAction::Idle);
    }

    #[test]
    fn idle_when_not_operating_and_off_when_off() {
        assert_eq!(
            ClimateAction::derive(OperatingMode::Heat, false, None, None),
            ClimateAction::Idle
        );
        assert_eq!(
            ClimateAction::derive(OperatingMode::Off, true, None, None),
            ClimateAction::Off
        );
    }

    #[test]
    fn climate_call_reads_camel_case_json() {
        let call: ClimateCall =
            serde_json::from_str(r#"{"mode":"COOL","targetTemperature":22.5}"#).unwrap();

        assert_eq!(call.mode, Some(OperatingMode::Cool));
        assert_eq!(call.target_temperature, Some(22.5));
        assert_eq!(call.fan_speed, None);
        assert!(!call.is_empty());
        assert!(ClimateCall::default().is_empty());
    }
}
