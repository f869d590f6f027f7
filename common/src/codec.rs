//! Binary payload formats of the RH/temperature sensor and the two-channel
//! relay controller.
//!
//! Sensor periodic uplink, port 2, 3 bytes:
//! ```text
//! b0 = temp[11:4]   b1 = humi[11:4]   b2 = temp[3:0] << 4 | humi[3:0]
//! temperature = (temp - 800) / 10     humidity = (humi - 250) / 10
//! ```
//!
//! Relay periodic uplink, port 2, 4 bytes: big-endian relay bits followed by
//! big-endian internal temperature (`raw / 10 - 80`). Protocol responses and
//! all downlinks travel on port 1.

use crate::error::{DecodeError, EncodeError};

pub const PORT_PROTOCOL: u8 = 1;
pub const PORT_PERIODIC: u8 = 2;

const SENSOR_PAYLOAD_LEN: usize = 3;
const RELAY_PAYLOAD_LEN: usize = 4;
const RELAY_SET_LEN: usize = 6;

const OP_DATA: u8 = 0x01;
const OP_QUERY: u8 = 0x02;
const INDEX_RELAY_STATE: u8 = 0x22;

const TEMP_OFFSET: i32 = 800;
const HUMIDITY_OFFSET: i32 = 250;
const RAW_12BIT_MAX: i32 = 0x0FFF;

/// Mask bits of a set command start at bit 16, one per channel.
pub const CHANGE_MASK_SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f32,
    pub humidity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorUplink {
    Reading(SensorReading),
    /// Port 1 traffic; the sensor protocol responses carry nothing we act on.
    ProtocolResponse,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayUplink {
    /// Periodic report: authoritative relay state plus internal temperature.
    Periodic { relay_bits: u16, internal_temp: f32 },
    /// Port 1 data report for the relay-state index.
    RelayStatus { relay_bits: u16 },
    /// Port 1 frame with a sub-type we do not decode.
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downlink {
    pub port: u8,
    pub payload: Vec<u8>,
}

/// Whether `channel` (1-based) is active in a relay bit field.
pub fn channel_active(relay_bits: u16, channel: u8) -> bool {
    (1..=16).contains(&channel) && relay_bits & (1 << (channel - 1)) != 0
}

pub fn decode_sensor_uplink(port: u8, payload: &[u8]) -> Result<SensorUplink, DecodeError> {
    match port {
        PORT_PERIODIC => {
            let &[b0, b1, b2] = payload else {
                return Err(DecodeError::WrongLength {
                    port,
                    expected: SENSOR_PAYLOAD_LEN,
                    actual: payload.len(),
                });
            };

            let raw_temp = i32::from(b0) << 4 | i32::from(b2 >> 4);
            let raw_humi = i32::from(b1) << 4 | i32::from(b2 & 0x0F);

            Ok(SensorUplink::Reading(SensorReading {
                temperature: (raw_temp - TEMP_OFFSET) as f32 / 10.0,
                humidity: (raw_humi - HUMIDITY_OFFSET) as f32 / 10.0,
            }))
        }
        PORT_PROTOCOL => Ok(SensorUplink::ProtocolResponse),
        other => Err(DecodeError::UnknownPort(other)),
    }
}

/// Inverse of [`decode_sensor_uplink`], rounding to the 0.1 resolution of
/// the wire format.
pub fn encode_sensor_reading(reading: &SensorReading) -> Result<[u8; 3], EncodeError> {
    let raw_temp = to_raw_12bit("temperature", reading.temperature, TEMP_OFFSET)?;
    let raw_humi = to_raw_12bit("humidity", reading.humidity, HUMIDITY_OFFSET)?;

    Ok([
        (raw_temp >> 4) as u8,
        (raw_humi >> 4) as u8,
        ((raw_temp & 0x0F) << 4 | (raw_humi & 0x0F)) as u8,
    ])
}

fn to_raw_12bit(field: &'static str, value: f32, offset: i32) -> Result<u16, EncodeError> {
    let raw = (value * 10.0).round() + offset as f32;
    if !(0.0..=RAW_12BIT_MAX as f32).contains(&raw) {
        return Err(EncodeError::OutOfRange { field, value });
    }
    Ok(raw as u16)
}

pub fn decode_relay_uplink(port: u8, payload: &[u8]) -> Result<RelayUplink, DecodeError> {
    match port {
        PORT_PERIODIC => {
            let &[b0, b1, b2, b3] = payload else {
                return Err(DecodeError::WrongLength {
                    port,
                    expected: RELAY_PAYLOAD_LEN,
                    actual: payload.len(),
                });
            };

            let raw_temp = u16::from_be_bytes([b2, b3]);
            Ok(RelayUplink::Periodic {
                relay_bits: u16::from_be_bytes([b0, b1]),
                internal_temp: f32::from(raw_temp) / 10.0 - 80.0,
            })
        }
        PORT_PROTOCOL => match payload {
            [OP_DATA, INDEX_RELAY_STATE, hi, lo, ..] => Ok(RelayUplink::RelayStatus {
                relay_bits: u16::from_be_bytes([*hi, *lo]),
            }),
            [OP_DATA, INDEX_RELAY_STATE, ..] => Err(DecodeError::WrongLength {
                port,
                expected: RELAY_PAYLOAD_LEN,
                actual: payload.len(),
            }),
            _ => Ok(RelayUplink::Unhandled),
        },
        other => Err(DecodeError::UnknownPort(other)),
    }
}

/// Set command: `[0x01, 0x22, cmd as big-endian u32]` where the low half holds
/// target values and the high half the change mask.
pub fn encode_relay_set(command: u32) -> Downlink {
    let mut payload = Vec::with_capacity(RELAY_SET_LEN);
    payload.extend_from_slice(&[OP_DATA, INDEX_RELAY_STATE]);
    payload.extend_from_slice(&command.to_be_bytes());
    Downlink {
        port: PORT_PROTOCOL,
        payload,
    }
}

/// Asks the relay controller to report its relay states unconditionally.
pub fn encode_relay_query() -> Downlink {
    Downlink {
        port: PORT_PROTOCOL,
        payload: vec![OP_QUERY, INDEX_RELAY_STATE],
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decodes_sensor_reading() {
        let uplink = decode_sensor_uplink(PORT_PERIODIC, &[0x3F, 0x2B, 0x7C]).unwrap();

        assert_eq!(
            uplink,
            SensorUplink::Reading(SensorReading {
                temperature: 21.5,
                humidity: 45.0,
            })
        );
    }

    #[test]
    fn decodes_negative_sensor_temperature() {
        // raw temp 660 -> -14.0, raw humi 750 -> 50.0
        let bytes = encode_sensor_reading(&SensorReading {
            temperature: -14.0,
            humidity: 50.0,
        })
        .unwrap();
        assert_eq!(bytes, [0x29, 0x2E, 0x4E]);

        let SensorUplink::Reading(reading) = decode_sensor_uplink(PORT_PERIODIC, &bytes).unwrap()
        else {
            panic!("expected a reading");
        };
        assert_eq!(reading.temperature, -14.0);
        assert_eq!(reading.humidity, 50.0);
    }

    #[test]
    fn sensor_payload_length_is_checked() {
        assert_eq!(
            decode_sensor_uplink(PORT_PERIODIC, &[0x3F, 0x2B]),
            Err(DecodeError::WrongLength {
                port: PORT_PERIODIC,
                expected: 3,
                actual: 2,
            })
        );
        assert!(decode_sensor_uplink(PORT_PERIODIC, &[0; 6]).is_err());
    }

    #[test]
    fn sensor_ports() {
        assert_eq!(
            decode_sensor_uplink(PORT_PROTOCOL, &[0x01, 0x02, 0x03]),
            Ok(SensorUplink::ProtocolResponse)
        );
        assert_eq!(
            decode_sensor_uplink(7, &[0x3F, 0x2B, 0x7C]),
            Err(DecodeError::UnknownPort(7))
        );
    }

    #[test]
    fn sensor_encode_rejects_unrepresentable_values() {
        assert!(encode_sensor_reading(&SensorReading {
            temperature: -81.0,
            humidity: 40.0,
        })
        .is_err());
        assert!(encode_sensor_reading(&SensorReading {
            temperature: 20.0,
            humidity: f32::NAN,
        })
        .is_err());
    }

    #[test]
    fn sensor_encode_rejects_huge_finite_values() {
        assert_eq!(
            encode_sensor_reading(&SensorReading {
                temperature: 3.0e9,
                humidity: 40.0,
            }),
            Err(EncodeError::OutOfRange {
                field: "temperature",
                value: 3.0e9,
            })
        );
        assert!(encode_sensor_reading(&SensorReading {
            temperature: 20.0,
            humidity: -f32::MAX,
        })
        .is_err());
        // Upper edge of the 12-bit field still encodes.
        assert_eq!(
            encode_sensor_reading(&SensorReading {
                temperature: 329.5,
                humidity: 384.5,
            }),
            Ok([0xFF, 0xFF, 0xFF])
        );
    }

    #[test]
    fn decodes_periodic_relay_uplink() {
        let uplink = decode_relay_uplink(PORT_PERIODIC, &[0x00, 0x03, 0x03, 0x20]).unwrap();

        let RelayUplink::Periodic {
            relay_bits,
            internal_temp,
        } = uplink
        else {
            panic!("expected periodic uplink, got {uplink:?}");
        };
        assert!(channel_active(relay_bits, 1));
        assert!(channel_active(relay_bits, 2));
        assert_eq!(internal_temp, 0.0);
    }

    #[test]
    fn decodes_relay_internal_temperature() {
        // 0x0435 = 1077 -> 27.7
        let uplink = decode_relay_uplink(PORT_PERIODIC, &[0x00, 0x02, 0x04, 0x35]).unwrap();
        let RelayUplink::Periodic {
            relay_bits,
            internal_temp,
        } = uplink
        else {
            panic!("expected periodic uplink");
        };
        assert!(!channel_active(relay_bits, 1));
        assert!(channel_active(relay_bits, 2));
        assert!((internal_temp - 27.7).abs() < 1e-4);
    }

    #[test]
    fn relay_periodic_length_is_checked() {
        assert_eq!(
            decode_relay_uplink(PORT_PERIODIC, &[0x00, 0x03, 0x03]),
            Err(DecodeError::WrongLength {
                port: PORT_PERIODIC,
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn decodes_relay_status_response() {
        assert_eq!(
            decode_relay_uplink(PORT_PROTOCOL, &[0x01, 0x22, 0x00, 0x01]),
            Ok(RelayUplink::RelayStatus { relay_bits: 0x0001 })
        );
        assert_eq!(
            decode_relay_uplink(PORT_PROTOCOL, &[0x01, 0x22, 0x00]),
            Err(DecodeError::WrongLength {
                port: PORT_PROTOCOL,
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn other_protocol_frames_are_ignored() {
        assert_eq!(
            decode_relay_uplink(PORT_PROTOCOL, &[0x01, 0x10, 0x00, 0x01]),
            Ok(RelayUplink::Unhandled)
        );
        assert_eq!(
            decode_relay_uplink(PORT_PROTOCOL, &[0x03]),
            Ok(RelayUplink::Unhandled)
        );
        assert_eq!(
            decode_relay_uplink(9, &[0x01, 0x22]),
            Err(DecodeError::UnknownPort(9))
        );
    }

    #[test]
    fn encodes_set_command_big_endian() {
        // channel 1 on, channel 2 off, both included in the mask
        let downlink = encode_relay_set(0x0003_0001);

        assert_eq!(downlink.port, PORT_PROTOCOL);
        assert_eq!(downlink.payload, vec![0x01, 0x22, 0x00, 0x03, 0x00, 0x01]);
    }

    #[test]
    fn encodes_query_command() {
        assert_eq!(
            encode_relay_query(),
            Downlink {
                port: PORT_PROTOCOL,
                payload: vec![0x02, 0x22],
            }
        );
    }
}
