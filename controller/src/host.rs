use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{info, warn};

use heaterctl_common::{config::NetworkConfig, ControllerStatus, Downlink, RuntimeConfig};

use crate::{
    api,
    climate::ClimateController,
    transport::{LoraTransport, TransportEvent},
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("HEATERCTL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./heaterctl.json"));
    let mut runtime = load_runtime_config(&config_path).await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime.network);
    runtime.sanitize();

    let (status_tx, status_rx) = watch::channel(ControllerStatus::default());
    api::spawn_status_server(runtime.http_port, status_rx);

    let (mut transport, mut events) = LoraTransport::connect(&runtime);
    let mut climate = ClimateController::new(&runtime);

    let mut interval = tokio::time::interval(Duration::from_millis(runtime.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "heater controller started, driving relay channel {}",
        runtime.relay.channel
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                return Ok(());
            }
            event = events.recv() => {
                let Some(event) = event else {
                    bail!("mqtt event loop terminated");
                };
                handle_transport_event(&mut transport, &mut climate, event).await?;
            }
            _ = interval.tick() => {
                let now_ms = monotonic_ms();
                let downlinks = climate.tick(now_ms);
                send_downlinks(&transport, downlinks).await;
                status_tx.send_replace(climate.status(now_ms, transport.is_connected()));
            }
        }
    }
}

async fn handle_transport_event(
    transport: &mut LoraTransport,
    climate: &mut ClimateController,
    event: TransportEvent,
) -> anyhow::Result<()> {
    match event {
        TransportEvent::Connected => {
            transport.set_connected(true);
            transport.subscribe().await?;
            if let Some(query) = climate.on_connected() {
                send_downlinks(transport, vec![query]).await;
            }
        }
        TransportEvent::Disconnected => {
            warn!("lost connection to LoRa network server");
            transport.set_connected(false);
        }
        TransportEvent::Uplink {
            device,
            port,
            payload,
        } => climate.on_uplink(device, port, &payload, monotonic_ms()),
    }
    Ok(())
}

async fn send_downlinks(transport: &LoraTransport, downlinks: Vec<Downlink>) {
    for downlink in downlinks {
        if let Err(err) = transport.send_relay_downlink(&downlink).await {
            warn!("{err:#}");
        }
    }
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid runtime config in {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no config at {}, using defaults", path.display());
            Ok(RuntimeConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env_overrides(network: &mut NetworkConfig) {
    if let Ok(host) = std::env::var("MQTT_HOST") {
        network.mqtt_host = host;
    }
    if let Some(port) = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        network.mqtt_port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        network.mqtt_pass = pass;
    }
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
