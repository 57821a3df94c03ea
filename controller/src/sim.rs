//! Stand-in heat pump for host builds.
//!
//! Hardware integration point: a real build swaps [`SimulatedHeatPump`] for
//! the unit's protocol driver over a UART transport.

use heatpump_common::{
    DeviceSettings, DeviceStatus, DriverError, DriverEvent, FanSpeed, HeatPumpDriver,
    OperatingMode, SerialTransport, SettingsChange,
};

const AMBIENT_C: f32 = 18.0;
const DRIFT_PER_POLL_C: f32 = 0.05;
const DEFAULT_SETPOINT_C: f32 = 22.0;

#[derive(Debug, Clone)]
pub struct SimulatedLink {
    port: String,
    baud_rate: Option<u32>,
}

impl SimulatedLink {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: None,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl SerialTransport for SimulatedLink {
    fn open(&mut self, baud_rate: u32) -> Result<(), DriverError> {
        if baud_rate == 0 {
            return Err(DriverError::Transport(format!(
                "cannot open {} at 0 baud",
                self.port
            )));
        }
        self.baud_rate = Some(baud_rate);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.baud_rate.is_some()
    }
}

#[derive(Debug)]
pub struct SimulatedHeatPump {
    link: SimulatedLink,
    settings: DeviceSettings,
    room_c: f32,
    remote_c: Option<f32>,
    pending_change: Option<SettingsChange>,
    last_reported: Option<DeviceStatus>,
}

impl SimulatedHeatPump {
    fn sensed_c(&self) -> f32 {
        self.remote_c.unwrap_or(self.room_c)
    }

    fn is_operating(&self) -> bool {
        let sensed = self.sensed_c();
        let setpoint = self.settings.setpoint.unwrap_or(DEFAULT_SETPOINT_C);
        match self.settings.mode {
            OperatingMode::Off => false,
            OperatingMode::Heat => sensed < setpoint - 0.5,
            OperatingMode::Cool => sensed > setpoint + 0.5,
            OperatingMode::Auto => (sensed - setpoint).abs() > 0.5,
            OperatingMode::Dry | OperatingMode::Fan => true,
        }
    }

    fn drift(&mut self) {
        let target = if self.is_operating() {
            self.settings.setpoint.unwrap_or(DEFAULT_SETPOINT_C)
        } else {
            AMBIENT_C
        };
        let delta = (target - self.room_c).clamp(-DRIFT_PER_POLL_C, DRIFT_PER_POLL_C);
        self.room_c += delta;
    }

    fn status(&self) -> DeviceStatus {
        let operating = self.is_operating();
        DeviceStatus {
            mode: self.settings.mode,
            fan_speed: self.settings.fan_speed,
            setpoint: self.settings.setpoint,
            // The unit reports room temperature in half degrees.
            room_temperature: Some((self.room_c * 2.0).round() / 2.0),
            operating,
            compressor_frequency: operating.then_some(40),
        }
    }
}

impl HeatPumpDriver for SimulatedHeatPump {
    type Transport = SimulatedLink;

    fn connect(transport: SimulatedLink, _baud_rate: u32) -> Result<Self, DriverError> {
        if !transport.is_open() {
            return Err(DriverError::Disconnected);
        }

        Ok(Self {
            link: transport,
            settings: DeviceSettings {
                mode: OperatingMode::Off,
                fan_speed: FanSpeed::Auto,
                setpoint: Some(DEFAULT_SETPOINT_C),
            },
            room_c: 20.0,
            remote_c: None,
            pending_change: None,
            last_reported: None,
        })
    }

    fn read_status(&mut self) -> Result<Vec<DriverEvent>, DriverError> {
        if !self.link.is_open() {
            return Err(DriverError::Disconnected);
        }

        let mut events = Vec::new();
        if let Some(change) = self.pending_change.take() {
            events.push(DriverEvent::SettingsChanged(change));
        }

        self.drift();
        let status = self.status();
        if self.last_reported != Some(status) {
            self.last_reported = Some(status);
            events.push(DriverEvent::StatusChanged(status));
        }

        Ok(events)
    }

    fn write_settings(&mut self, settings: &DeviceSettings) -> Result<(), DriverError> {
        if let Some(setpoint) = settings.setpoint {
            if !setpoint.is_finite() {
                return Err(DriverError::Rejected(format!("setpoint {setpoint}")));
            }
        }

        self.settings.mode = settings.mode;
        self.settings.fan_speed = settings.fan_speed;
        if settings.setpoint.is_some() {
            self.settings.setpoint = settings.setpoint;
        }
        self.pending_change = Some(SettingsChange {
            mode: Some(self.settings.mode),
            fan_speed: Some(self.settings.fan_speed),
            setpoint: self.settings.setpoint,
        });
        Ok(())
    }

    fn set_remote_temperature(&mut self, value: Option<f32>) -> Result<(), DriverError> {
        self.remote_c = value;
        Ok(())
    }
}
