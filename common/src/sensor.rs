use tracing::info;

use crate::{
    codec::{decode_sensor_uplink, SensorReading, SensorUplink},
    config::SensorConfig,
    error::DecodeError,
    staleness::Stale,
    uplink::UplinkHandler,
};

/// Latest temperature/humidity pair reported by the RH/T sensor.
///
/// Temperature and humidity are stored and expired together, so callers see
/// either both or neither.
#[derive(Debug, Clone)]
pub struct SensorDecoder {
    reading: Stale<SensorReading>,
}

impl SensorDecoder {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            reading: Stale::new("sensor temperature/humidity", config.max_age_ms),
        }
    }

    /// Decodes one uplink. On error the previous reading is kept.
    pub fn decode(
        &mut self,
        port: u8,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Option<SensorReading>, DecodeError> {
        match decode_sensor_uplink(port, payload)? {
            SensorUplink::Reading(reading) => {
                info!(
                    "temperature: {:.1} humidity: {:.1}",
                    reading.temperature, reading.humidity
                );
                self.reading.set(reading, now_ms);
                Ok(Some(reading))
            }
            SensorUplink::ProtocolResponse => Ok(None),
        }
    }

    pub fn reading(&mut self, now_ms: u64) -> Option<SensorReading> {
        self.reading.get(now_ms).copied()
    }

    pub fn temperature(&mut self, now_ms: u64) -> Option<f32> {
        self.reading(now_ms).map(|reading| reading.temperature)
    }

    pub fn humidity(&mut self, now_ms: u64) -> Option<f32> {
        self.reading(now_ms).map(|reading| reading.humidity)
    }

    pub fn observed_at_ms(&self) -> Option<u64> {
        self.reading.updated_ms()
    }
}

impl UplinkHandler for SensorDecoder {
    type Update = Option<SensorReading>;

    fn handle_uplink(
        &mut self,
        port: u8,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Self::Update, DecodeError> {
        self.decode(port, payload, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{codec::PORT_PERIODIC, config::MINUTE_MS};

    use super::*;

    fn decoder() -> SensorDecoder {
        SensorDecoder::new(&SensorConfig::default())
    }

    #[test]
    fn stores_decoded_reading() {
        let mut sensor = decoder();

        let reading = sensor
            .handle_uplink(PORT_PERIODIC, &[0x3F, 0x2B, 0x7C], 5_000)
            .unwrap();

        assert_eq!(
            reading,
            Some(SensorReading {
                temperature: 21.5,
                humidity: 45.0,
            })
        );
        assert_eq!(sensor.temperature(6_000), Some(21.5));
        assert_eq!(sensor.humidity(6_000), Some(45.0));
        assert_eq!(sensor.observed_at_ms(), Some(5_000));
    }

    #[test]
    fn bad_length_keeps_previous_reading() {
        let mut sensor = decoder();
        sensor.decode(PORT_PERIODIC, &[0x3F, 0x2B, 0x7C], 0).unwrap();

        let result = sensor.decode(PORT_PERIODIC, &[0x00, 0x00, 0x00, 0x00], 1_000);

        assert!(matches!(result, Err(DecodeError::WrongLength { .. })));
        assert_eq!(sensor.temperature(1_000), Some(21.5));
        assert_eq!(sensor.observed_at_ms(), Some(0));
    }

    #[test]
    fn protocol_port_is_a_no_op() {
        let mut sensor = decoder();

        assert_eq!(sensor.decode(1, &[0x01, 0x02], 0), Ok(None));
        assert_eq!(sensor.reading(0), None);
        assert_eq!(sensor.decode(5, &[0x01, 0x02, 0x03], 0), Err(DecodeError::UnknownPort(5)));
    }

    #[test]
    fn both_values_expire_together() {
        let mut sensor = decoder();
        sensor.decode(PORT_PERIODIC, &[0x3F, 0x2B, 0x7C], 0).unwrap();

        assert!(sensor.reading(65 * MINUTE_MS).is_some());
        assert_eq!(sensor.temperature(65 * MINUTE_MS + 1), None);
        assert_eq!(sensor.humidity(65 * MINUTE_MS + 1), None);
    }
}
