use tracing::{info, warn};

use heaterctl_common::{
    ChannelStatus, ControllerStatus, Downlink, RelayController, RuntimeConfig, SensorDecoder,
    Thermostat, UplinkHandler,
};

use crate::transport::DeviceKind;

/// Ties the sensor, thermostat and relay controller together.
///
/// Pure and synchronous: the host loop feeds it uplinks and ticks with a
/// monotonic timestamp and publishes whatever downlinks it hands back.
pub struct ClimateController {
    sensor: SensorDecoder,
    relay: RelayController,
    thermostat: Thermostat,
    relay_channel: u8,
    internal_temp_warn_c: f32,
    relay_overheated: bool,
    relay_queried: bool,
}

impl ClimateController {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            sensor: SensorDecoder::new(&config.sensor),
            relay: RelayController::new(&config.relay),
            thermostat: Thermostat::new(config.thermostat.clone()),
            relay_channel: config.relay.channel,
            internal_temp_warn_c: config.relay.internal_temp_warn_c,
            relay_overheated: false,
            relay_queried: false,
        }
    }

    /// Relay-state query to send once the broker link first comes up.
    pub fn on_connected(&mut self) -> Option<Downlink> {
        if self.relay_queried {
            return None;
        }
        self.relay_queried = true;
        Some(self.relay.request_relay_states())
    }

    pub fn on_uplink(&mut self, device: DeviceKind, port: u8, payload: &[u8], now_ms: u64) {
        let result = match device {
            DeviceKind::Sensor => self
                .sensor
                .handle_uplink(port, payload, now_ms)
                .map(|_| ()),
            DeviceKind::Relay => self.relay.handle_uplink(port, payload, now_ms).map(|_| {
                info!("{}", self.relay.relay_states_description(now_ms));
            }),
        };

        if let Err(err) = result {
            warn!("{device:?} uplink ignored: {err}");
        }
    }

    /// One pass of the control loop.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Downlink> {
        let mut downlinks = Vec::new();

        self.thermostat
            .evaluate(self.sensor.temperature(now_ms), self.sensor.humidity(now_ms));

        if self.thermostat.output_active() {
            match self
                .relay
                .set_channel_state(&[(self.relay_channel, self.thermostat.output())], now_ms)
            {
                Ok(Some(downlink)) => downlinks.push(downlink),
                Ok(None) => {}
                Err(err) => warn!("relay request rejected: {err}"),
            }
        }

        match self.relay.periodic_poll(now_ms) {
            Ok(Some(downlink)) => downlinks.push(downlink),
            Ok(None) => {}
            Err(err) => warn!("{err}"),
        }

        self.check_relay_temperature(now_ms);
        downlinks
    }

    fn check_relay_temperature(&mut self, now_ms: u64) {
        let overheated = self
            .relay
            .temperature(now_ms)
            .is_some_and(|temp| temp > self.internal_temp_warn_c);

        if overheated && !self.relay_overheated {
            warn!("relay controller internal temp high!");
        } else if !overheated && self.relay_overheated {
            info!("relay controller internal temp back to normal");
        }
        self.relay_overheated = overheated;
    }

    pub fn status(&mut self, now_ms: u64, mqtt_connected: bool) -> ControllerStatus {
        let reading = self.sensor.reading(now_ms);
        let relay_temperature = self.relay.temperature(now_ms);
        let relay_channels = self
            .relay
            .channels(now_ms)
            .iter()
            .map(|channel| ChannelStatus {
                channel: channel.id(),
                actual: channel.actual(),
                requested: channel.requested(),
            })
            .collect();
        let pending = self.relay.pending_command();

        ControllerStatus {
            temperature: reading.map(|reading| reading.temperature),
            humidity: reading.map(|reading| reading.humidity),
            sensor_observed_at_ms: self.sensor.observed_at_ms(),
            output_active: self.thermostat.output_active(),
            heat_requested: self.thermostat.output(),
            relay_channels,
            relay_temperature,
            command_state: self.relay.command_state().as_str(),
            pending_command: pending.map(|pending| pending.command()),
            pending_retries: pending.map_or(0, |pending| pending.retries()),
            mqtt_connected,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
