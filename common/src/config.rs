use serde::{Deserialize, Serialize};

use crate::relay::CHANNEL_COUNT;

pub const MINUTE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    pub min_temp_c: f32,
    pub temp_hysteresis_c: f32,
    pub max_humidity: f32,
    pub humidity_hysteresis: f32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            min_temp_c: -5.0,
            temp_hysteresis_c: 3.0,
            max_humidity: 80.0,
            humidity_hysteresis: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub max_age_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 65 * MINUTE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay channel driven by the thermostat output.
    pub channel: u8,
    /// The relay controller reports far less often than the sensor.
    pub max_age_ms: u64,
    pub retry_interval_ms: u64,
    pub max_retries: u32,
    pub internal_temp_warn_c: f32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            max_age_ms: 190 * MINUTE_MS,
            retry_interval_ms: 5 * MINUTE_MS,
            max_retries: 5,
            internal_temp_warn_c: 55.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub application: String,
    pub dev_eui: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub sensor: DeviceAddress,
    pub relay: DeviceAddress,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            sensor: DeviceAddress {
                application: "application/6".to_string(),
                dev_eui: "70b3d5d7201c0029".to_string(),
            },
            relay: DeviceAddress {
                application: "application/20".to_string(),
                dev_eui: "70b3d5d72ffc8000".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub mqtt_tls: bool,
    pub client_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            mqtt_tls: false,
            client_id: "heaterctl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub sensor: SensorConfig,
    pub relay: RelayConfig,
    pub devices: DevicesConfig,
    pub network: NetworkConfig,
    pub tick_interval_ms: u64,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // Deployment values: frost guard at -15 C, dry air below 75 %RH.
            thermostat: ThermostatConfig {
                min_temp_c: -15.0,
                max_humidity: 75.0,
                ..ThermostatConfig::default()
            },
            sensor: SensorConfig::default(),
            relay: RelayConfig::default(),
            devices: DevicesConfig::default(),
            network: NetworkConfig::default(),
            tick_interval_ms: 1_000,
            http_port: 8080,
        }
    }
}

impl ThermostatConfig {
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.min_temp_c.is_finite() {
            self.min_temp_c = defaults.min_temp_c;
        }
        if !self.max_humidity.is_finite() {
            self.max_humidity = defaults.max_humidity;
        }
        if !self.temp_hysteresis_c.is_finite() {
            self.temp_hysteresis_c = defaults.temp_hysteresis_c;
        }
        if !self.humidity_hysteresis.is_finite() {
            self.humidity_hysteresis = defaults.humidity_hysteresis;
        }
        self.temp_hysteresis_c = self.temp_hysteresis_c.max(0.0);
        self.humidity_hysteresis = self.humidity_hysteresis.max(0.0);
    }
}

impl RelayConfig {
    pub fn sanitize(&mut self) {
        if !(1..=CHANNEL_COUNT).contains(&self.channel) {
            self.channel = 1;
        }
        self.retry_interval_ms = self.retry_interval_ms.max(1_000);
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.thermostat.sanitize();
        self.relay.sanitize();
        // Polling must outpace the retry interval or retries drift late.
        self.tick_interval_ms = self
            .tick_interval_ms
            .clamp(100, MINUTE_MS.min(self.relay.retry_interval_ms));
    }
}
