use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::Mutex, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use heatpump_common::{
    AdapterConfig, AdapterError, ClimateCall, ClimateStatePayload, FanSpeed, HeatPumpAdapter,
    OperatingMode, PollOutcome, TOPIC_CMD_CONTROL, TOPIC_CMD_FAN, TOPIC_CMD_MODE,
    TOPIC_CMD_REMOTE_TEMP, TOPIC_CMD_TARGET, TOPIC_CONTROLLER_STATE, TOPIC_SENSOR_STATUS,
    TOPIC_SENSOR_TEMP,
};

use crate::{
    sim::{SimulatedHeatPump, SimulatedLink},
    store::FileBackend,
};

type Adapter = HeatPumpAdapter<SimulatedHeatPump, FileBackend>;

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const STATE_PUBLISH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct AppState {
    adapter: Arc<Mutex<Adapter>>,
    mqtt: AsyncClient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct MqttConfig {
    host: String,
    port: u16,
    user: String,
    pass: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RuntimeConfig {
    adapter: AdapterConfig,
    serial_port: String,
    http_port: u16,
    mqtt: MqttConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            serial_port: "/dev/ttyUSB0".to_string(),
            http_port: 8080,
            mqtt: MqttConfig::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PublishedState {
    #[serde(flatten)]
    state: ClimateStatePayload,
    #[serde(rename = "updatedEpoch")]
    updated_epoch: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("HEATPUMP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.heatpump"));

    let runtime = load_runtime_config(&data_dir).await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });

    let link = SimulatedLink::new(runtime.serial_port.clone());
    let backend = FileBackend::new(data_dir.join("preferences"));
    info!(
        "using serial port {} and preferences in {}",
        link.port(),
        backend.dir().display()
    );

    let mut adapter = Adapter::new(runtime.adapter.clone(), link, backend);
    adapter
        .setup()
        .context("failed to set up heat pump adapter")?;
    for line in adapter.dump_config().lines() {
        info!("{line}");
    }

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.mqtt.host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.mqtt.port);

    let mut mqtt_options = MqttOptions::new("heatpump-controller-rust", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.mqtt.user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.mqtt.pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        adapter: Arc::new(Mutex::new(adapter)),
        mqtt,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_poll_loop(
        app_state.clone(),
        Duration::from_millis(u64::from(runtime.adapter.poll_interval_ms)),
    );
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/control", post(handle_control))
        .route("/api/remote-temperature", post(handle_remote_temperature))
        .route("/api/traits", get(handle_get_traits))
        .route("/api/config", get(handle_dump_config))
        .route("/api/state", get(handle_dump_state))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.http_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn load_runtime_config(data_dir: &Path) -> anyhow::Result<RuntimeConfig> {
    let path = data_dir.join("runtime.json");
    match tokio::fs::read(&path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid runtime config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let topics = [
        TOPIC_SENSOR_TEMP,
        TOPIC_SENSOR_STATUS,
        TOPIC_CMD_MODE,
        TOPIC_CMD_TARGET,
        TOPIC_CMD_FAN,
        TOPIC_CMD_CONTROL,
        TOPIC_CMD_REMOTE_TEMP,
    ];

    for topic in topics {
        mqtt.subscribe(topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, message.topic, message.payload.to_vec())
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn spawn_poll_loop(app_state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let outcome = {
                let mut adapter = app_state.adapter.lock().await;
                adapter.update(monotonic_ms())
            };

            match outcome {
                PollOutcome::Received(count) => {
                    debug!("processed {count} heat pump events");
                    publish_state(&app_state).await;
                }
                PollOutcome::Idle => {}
                PollOutcome::Missed => debug!("poll cycle missed, retrying next tick"),
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_PUBLISH_INTERVAL);
        loop {
            interval.tick().await;
            publish_state(&app_state).await;
        }
    });
}

async fn publish_state(app_state: &AppState) {
    let payload = {
        let adapter = app_state.adapter.lock().await;
        serde_json::to_vec(&published_state(&adapter))
    };

    match payload {
        Ok(body) => {
            if let Err(err) = app_state
                .mqtt
                .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("controller state publish failed: {err}");
            }
        }
        Err(err) => warn!("controller state serialization failed: {err}"),
    }
}

fn published_state(adapter: &Adapter) -> PublishedState {
    PublishedState {
        state: adapter.state_payload(),
        updated_epoch: Utc::now().timestamp(),
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: String,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;
    let now_ms = monotonic_ms();

    match topic.as_str() {
        TOPIC_SENSOR_TEMP => {
            if let Ok(temp) = message.trim().parse::<f32>() {
                if temp.is_finite() && (-40.0..=60.0).contains(&temp) {
                    let mut adapter = app_state.adapter.lock().await;
                    adapter.set_remote_temperature(Some(temp), now_ms);
                }
            }
        }
        TOPIC_SENSOR_STATUS => {
            if message.trim().eq_ignore_ascii_case("offline") {
                let mut adapter = app_state.adapter.lock().await;
                adapter.set_remote_temperature(None, now_ms);
            }
        }
        TOPIC_CMD_REMOTE_TEMP => match parse_remote_temperature(&message) {
            Ok(value) => {
                let mut adapter = app_state.adapter.lock().await;
                adapter.set_remote_temperature(value, now_ms);
            }
            Err(reason) => warn!("ignoring remote temperature command: {reason}"),
        },
        TOPIC_CMD_MODE => {
            if let Some(mode) = OperatingMode::parse(&message) {
                apply_call(
                    app_state,
                    &ClimateCall {
                        mode: Some(mode),
                        ..ClimateCall::default()
                    },
                )
                .await?;
            }
        }
        TOPIC_CMD_TARGET => {
            if let Ok(target) = message.trim().parse::<f32>() {
                apply_call(
                    app_state,
                    &ClimateCall {
                        target_temperature: Some(target),
                        ..ClimateCall::default()
                    },
                )
                .await?;
            }
        }
        TOPIC_CMD_FAN => {
            if let Some(fan_speed) = FanSpeed::parse(&message) {
                apply_call(
                    app_state,
                    &ClimateCall {
                        fan_speed: Some(fan_speed),
                        ..ClimateCall::default()
                    },
                )
                .await?;
            }
        }
        TOPIC_CMD_CONTROL => {
            let call = serde_json::from_str::<ClimateCall>(&message)
                .context("invalid climate call payload")?;
            apply_call(app_state, &call).await?;
        }
        _ => {}
    }

    Ok(())
}

async fn apply_call(app_state: &AppState, call: &ClimateCall) -> Result<(), AdapterError> {
    {
        let mut adapter = app_state.adapter.lock().await;
        adapter.control(call)?;
    }
    publish_state(app_state).await;
    Ok(())
}

/// `off`, `none`, an empty payload or `0` hand sensing back to the unit.
fn parse_remote_temperature(value: &str) -> Result<Option<f32>, &'static str> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none")
    {
        return Ok(None);
    }

    let parsed = value
        .parse::<f32>()
        .map_err(|_| "invalid temperature value")?;
    if parsed == 0.0 {
        return Ok(None);
    }
    if !parsed.is_finite() || !(-40.0..=60.0).contains(&parsed) {
        return Err("temperature out of range (-40 to 60)");
    }
    Ok(Some(parsed))
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let adapter = state.adapter.lock().await;
    Json(published_state(&adapter))
}

async fn handle_control(
    State(state): State<AppState>,
    Json(call): Json<ClimateCall>,
) -> impl IntoResponse {
    if let Err(err) = apply_call(&state, &call).await {
        warn!("failed to apply climate call: {err}");
        let status = match &err {
            AdapterError::Driver(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        };
        return error_response(status, &err.to_string());
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_remote_temperature(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let value = match parse_remote_temperature(value) {
        Ok(value) => value,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, reason),
    };

    {
        let mut adapter = state.adapter.lock().await;
        adapter.set_remote_temperature(value, monotonic_ms());
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_get_traits(State(state): State<AppState>) -> impl IntoResponse {
    let adapter = state.adapter.lock().await;
    Json(adapter.traits())
}

async fn handle_dump_config(State(state): State<AppState>) -> impl IntoResponse {
    let adapter = state.adapter.lock().await;
    adapter.dump_config()
}

async fn handle_dump_state(State(state): State<AppState>) -> impl IntoResponse {
    let adapter = state.adapter.lock().await;
    adapter.dump_state()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_temperature_clear_spellings() {
        for value in ["", "off", "NONE", "0", " 0.0 "] {
            assert_eq!(parse_remote_temperature(value), Ok(None), "{value:?}");
        }
    }

    #[test]
    fn remote_temperature_accepts_plausible_readings() {
        assert_eq!(parse_remote_temperature("21.5"), Ok(Some(21.5)));
        assert!(parse_remote_temperature("95").is_err());
        assert!(parse_remote_temperature("warm").is_err());
    }

    #[test]
    fn runtime_config_tolerates_partial_json() {
        let runtime: RuntimeConfig =
            serde_json::from_str(r#"{"serial_port":"/dev/ttyS1","adapter":{"baud_rate":4800}}"#)
                .unwrap();

        assert_eq!(runtime.serial_port, "/dev/ttyS1");
        assert_eq!(runtime.adapter.baud_rate, 4_800);
        assert_eq!(runtime.adapter.poll_interval_ms, 500);
        assert_eq!(runtime.mqtt.port, 1883);
    }

    #[tokio::test]
    async fn missing_runtime_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let runtime = load_runtime_config(dir.path()).await.unwrap();

        assert_eq!(runtime.http_port, 8080);
        assert_eq!(runtime.adapter.baud_rate, 2_400);
    }

    #[tokio::test]
    async fn runtime_config_is_read_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("runtime.json"), r#"{"http_port":9090}"#).unwrap();

        let runtime = load_runtime_config(dir.path()).await.unwrap();

        assert_eq!(runtime.http_port, 9_090);
        assert!(load_runtime_config(&dir.path().join("missing")).await.is_ok());
    }

    #[tokio::test]
    async fn malformed_runtime_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("runtime.json"), "{not json").unwrap();

        assert!(load_runtime_config(dir.path()).await.is_err());
    }
}
