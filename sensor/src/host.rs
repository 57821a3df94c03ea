//! Room sensor publisher. Feeds the controller's remote temperature override
//! over MQTT and announces itself on a retained status topic.

use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use tracing::{debug, info, warn};

use heatpump_common::{TOPIC_SENSOR_STATUS, TOPIC_SENSOR_TEMP};

const CLIENT_ID: &str = "heatpump-room-sensor";
const DEFAULT_PUBLISH_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
struct SensorSettings {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    publish_every: Duration,
}

impl SensorSettings {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("MQTT_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(1883);
        let publish_secs = lookup("SENSOR_PUBLISH_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PUBLISH_SECS);

        Self {
            host: lookup("MQTT_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            credentials: lookup("MQTT_USER")
                .map(|user| (user, lookup("MQTT_PASS").unwrap_or_default())),
            publish_every: Duration::from_secs(publish_secs),
        }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(CLIENT_ID, self.host.clone(), self.port);
        // The controller drops the remote reading when this fires.
        options.set_last_will(LastWill::new(
            TOPIC_SENSOR_STATUS,
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        if let Some((user, pass)) = &self.credentials {
            options.set_credentials(user.clone(), pass.clone());
        }
        options
    }
}

/// Hardware integration point: a real build reads the room sensor here.
fn simulated_reading(tick: u64) -> f32 {
    20.0 + (tick % 8) as f32 * 0.25
}

fn drive_eventloop(mut eventloop: EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(event) => debug!("sensor mqtt event: {event:?}"),
                Err(err) => {
                    warn!("sensor mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn publish_reading(mqtt: &AsyncClient, tick: u64) -> anyhow::Result<()> {
    let reading = simulated_reading(tick);
    mqtt.publish(TOPIC_SENSOR_TEMP, QoS::AtLeastOnce, true, format!("{reading:.1}"))
        .await
        .context("failed to publish room temperature")?;
    debug!("published room temperature {reading:.1}");
    Ok(())
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = SensorSettings::from_env();
    let (mqtt, eventloop) = AsyncClient::new(settings.mqtt_options(), 32);
    drive_eventloop(eventloop);

    mqtt.publish(TOPIC_SENSOR_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish sensor online status")?;
    info!(
        "room sensor publishing to {}:{} every {}s",
        settings.host,
        settings.port,
        settings.publish_every.as_secs()
    );

    let mut interval = tokio::time::interval(settings.publish_every);
    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick = tick.saturating_add(1);
                publish_reading(&mqtt, tick).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("room sensor shutting down");
    mqtt.publish(TOPIC_SENSOR_STATUS, QoS::AtLeastOnce, true, "offline")
        .await
        .context("failed to publish sensor offline status")?;
    Ok(())
}
