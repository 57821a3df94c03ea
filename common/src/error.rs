use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("poll interval {0} ms is outside 1..=9000 ms")]
    PollInterval(u32),
    #[error("baud rate must be non-zero")]
    BaudRate,
    #[error("temperature bounds must be finite with min below max")]
    TemperatureBounds,
    #[error("temperature step must be positive")]
    TemperatureStep,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("heat pump did not respond within the poll window")]
    Unavailable,
    #[error("serial link is not connected")]
    Disconnected,
    #[error("heat pump rejected the request: {0}")]
    Rejected(String),
    #[error("serial transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("preference io error: {0}")]
    Io(String),
    #[error("preference backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("baud rate must be set before setup()")]
    AlreadySetUp,
    #[error("adapter has not been set up")]
    NotSetUp,
    #[error(transparent)]
    Driver(#[from] DriverError),
}
