//! The heat pump driver seam.
//!
//! The byte-level protocol lives behind [`HeatPumpDriver`]. The adapter owns
//! the [`SerialTransport`] until setup and then hands it to the driver, so the
//! driver never reaches back into adapter state.

use crate::{
    error::DriverError,
    types::{DeviceSettings, DeviceStatus, SettingsChange},
};

pub trait SerialTransport {
    fn open(&mut self, baud_rate: u32) -> Result<(), DriverError>;
    fn is_open(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    SettingsChanged(SettingsChange),
    StatusChanged(DeviceStatus),
}

pub trait HeatPumpDriver: Sized {
    type Transport: SerialTransport;

    fn connect(transport: Self::Transport, baud_rate: u32) -> Result<Self, DriverError>;

    /// Services the link once. Change notifications raised while doing so are
    /// returned in the order the unit produced them.
    fn read_status(&mut self) -> Result<Vec<DriverEvent>, DriverError>;

    fn write_settings(&mut self, settings: &DeviceSettings) -> Result<(), DriverError>;

    /// `None` hands room sensing back to the unit's internal sensor.
    fn set_remote_temperature(&mut self, value: Option<f32>) -> Result<(), DriverError>;
}
