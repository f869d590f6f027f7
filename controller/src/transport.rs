use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use heaterctl_common::{downlink_topic, uplink_topic, Downlink, RuntimeConfig};

const MAX_MQTT_PAYLOAD_BYTES: usize = 4096;
const EVENT_QUEUE_DEPTH: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Sensor,
    Relay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Uplink {
        device: DeviceKind,
        port: u8,
        payload: Vec<u8>,
    },
}

/// Uplink as forwarded by the LoRa network server.
#[derive(Debug, Deserialize)]
struct UplinkEnvelope {
    #[serde(default)]
    data: Option<String>,
    #[serde(rename = "fPort")]
    f_port: u8,
}

#[derive(Debug, Serialize)]
struct DownlinkEnvelope {
    confirmed: bool,
    #[serde(rename = "fPort")]
    f_port: u8,
    data: String,
}

/// Extracts port and raw payload bytes from an uplink message.
pub fn parse_uplink(message: &[u8]) -> anyhow::Result<(u8, Vec<u8>)> {
    let envelope: UplinkEnvelope =
        serde_json::from_slice(message).context("malformed uplink envelope")?;
    let payload = match envelope.data {
        Some(data) => STANDARD
            .decode(data.as_bytes())
            .context("uplink data is not valid base64")?,
        None => Vec::new(),
    };
    Ok((envelope.f_port, payload))
}

pub fn encode_downlink(downlink: &Downlink) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&DownlinkEnvelope {
        confirmed: true,
        f_port: downlink.port,
        data: STANDARD.encode(&downlink.payload),
    })
}

#[derive(Debug, Clone)]
pub struct TopicRouter {
    sensor_rx: String,
    relay_rx: String,
    relay_tx: String,
}

impl TopicRouter {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            sensor_rx: uplink_topic(&config.devices.sensor),
            relay_rx: uplink_topic(&config.devices.relay),
            relay_tx: downlink_topic(&config.devices.relay),
        }
    }

    pub fn route(&self, topic: &str) -> Option<DeviceKind> {
        if topic == self.sensor_rx {
            Some(DeviceKind::Sensor)
        } else if topic == self.relay_rx {
            Some(DeviceKind::Relay)
        } else {
            None
        }
    }

    fn subscriptions(&self) -> [&str; 2] {
        [self.relay_rx.as_str(), self.sensor_rx.as_str()]
    }
}

/// Publishing half of the MQTT link to the LoRa network server.
pub struct LoraTransport {
    mqtt: AsyncClient,
    router: TopicRouter,
    connected: bool,
}

impl LoraTransport {
    /// Creates the client and spawns the event loop task feeding `events`.
    pub fn connect(config: &RuntimeConfig) -> (Self, mpsc::Receiver<TransportEvent>) {
        let network = &config.network;
        let mut mqtt_options = MqttOptions::new(
            network.client_id.clone(),
            network.mqtt_host.clone(),
            network.mqtt_port,
        );
        mqtt_options.set_keep_alive(Duration::from_secs(60));

        if !network.mqtt_user.is_empty() || !network.mqtt_pass.is_empty() {
            mqtt_options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
        }
        if network.mqtt_tls {
            mqtt_options.set_transport(Transport::tls_with_default_config());
        }

        info!("connecting to {}:{}", network.mqtt_host, network.mqtt_port);
        let (mqtt, eventloop) = AsyncClient::new(mqtt_options, EVENT_QUEUE_DEPTH);
        let router = TopicRouter::new(config);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        spawn_mqtt_loop(eventloop, router.clone(), events_tx);

        (
            Self {
                mqtt,
                router,
                connected: false,
            },
            events_rx,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub async fn subscribe(&self) -> anyhow::Result<()> {
        for topic in self.router.subscriptions() {
            self.mqtt
                .subscribe(topic, QoS::ExactlyOnce)
                .await
                .with_context(|| format!("failed to subscribe to {topic}"))?;
        }
        Ok(())
    }

    /// Best-effort send; nothing is queued while disconnected.
    pub async fn send_relay_downlink(&self, downlink: &Downlink) -> anyhow::Result<()> {
        if !self.connected {
            error!("not connected, omitting relay downlink {:02x?}", downlink.payload);
            return Ok(());
        }

        let body = encode_downlink(downlink).context("downlink serialization failed")?;
        self.mqtt
            .publish(self.router.relay_tx.as_str(), QoS::AtMostOnce, false, body)
            .await
            .context("relay downlink publish failed")?;
        debug!("relay downlink {:02x?} on port {}", downlink.payload, downlink.port);
        Ok(())
    }
}

fn spawn_mqtt_loop(
    mut eventloop: EventLoop,
    router: TopicRouter,
    events: mpsc::Sender<TransportEvent>,
) {
    tokio::spawn(async move {
        let mut connected = false;
        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("connected");
                    connected = true;
                    Some(TransportEvent::Connected)
                }
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    uplink_event(&router, &message.topic, &message.payload)
                }
                Ok(_) => None,
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    let event = connected.then_some(TransportEvent::Disconnected);
                    connected = false;
                    if let Some(event) = event {
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            if let Some(event) = event {
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }
    });
}

fn uplink_event(router: &TopicRouter, topic: &str, message: &[u8]) -> Option<TransportEvent> {
    if message.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            message.len()
        );
        return None;
    }

    let Some(device) = router.route(topic) else {
        warn!("unexpected message received on {topic}");
        return None;
    };

    match parse_uplink(message) {
        Ok((port, payload)) => {
            info!("{device:?} uplink data on port {port}: {payload:02x?}");
            Some(TransportEvent::Uplink {
                device,
                port,
                payload,
            })
        }
        Err(err) => {
            error!("failed to extract payload from {topic}: {err:#}");
            None
        }
    }
}
