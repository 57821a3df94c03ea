pub const TOPIC_SENSOR_TEMP: &str = "heatpump/sensor/temperature";
pub const TOPIC_SENSOR_STATUS: &str = "heatpump/sensor/status";

pub const TOPIC_CONTROLLER_STATE: &str = "heatpump/controller/state";

pub const TOPIC_CMD_MODE: &str = "heatpump/cmnd/mode";
pub const TOPIC_CMD_TARGET: &str = "heatpump/cmnd/target";
pub const TOPIC_CMD_FAN: &str = "heatpump/cmnd/fan";
pub const TOPIC_CMD_CONTROL: &str = "heatpump/cmnd/control";
pub const TOPIC_CMD_REMOTE_TEMP: &str = "heatpump/cmnd/remote_temperature";
