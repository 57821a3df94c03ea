pub mod adapter;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod setpoint;
pub mod store;
pub mod sync;
pub mod topics;
pub mod types;

pub use adapter::{HeatPumpAdapter, PollOutcome, VERSION};
pub use command::CommandTranslator;
pub use config::{AdapterConfig, TemperatureBounds, POLL_INTERVAL_DEFAULT_MS, POLL_INTERVAL_MAX_MS};
pub use driver::{DriverEvent, HeatPumpDriver, SerialTransport};
pub use error::{AdapterError, ConfigError, DriverError, StoreError};
pub use setpoint::{ModeSetpointCache, ModeSetpointManager};
pub use store::{MemoryBackend, PreferenceBackend, SetpointStore};
pub use sync::{StatusSynchronizer, SyncAction};
pub use topics::*;
pub use types::{
    ClimateAction, ClimateCall, ClimateState, ClimateStatePayload, ClimateTraits, DeviceSettings,
    DeviceStatus, FanSpeed, OperatingMode, SettingsChange,
};
