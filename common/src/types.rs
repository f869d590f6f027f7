use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub channel: u8,
    pub actual: Option<bool>,
    pub requested: Option<bool>,
}

/// Snapshot of the control loop, published for the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    #[serde(rename = "sensorObservedAtMs")]
    pub sensor_observed_at_ms: Option<u64>,
    #[serde(rename = "outputActive")]
    pub output_active: bool,
    #[serde(rename = "heatRequested")]
    pub heat_requested: bool,
    #[serde(rename = "relayChannels")]
    pub relay_channels: Vec<ChannelStatus>,
    #[serde(rename = "relayTemperature")]
    pub relay_temperature: Option<f32>,
    #[serde(rename = "commandState")]
    pub command_state: &'static str,
    #[serde(rename = "pendingCommand")]
    pub pending_command: Option<u32>,
    #[serde(rename = "pendingRetries")]
    pub pending_retries: u32,
    #[serde(rename = "mqttConnected")]
    pub mqtt_connected: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}
