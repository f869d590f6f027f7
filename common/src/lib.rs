pub mod codec;
pub mod config;
pub mod error;
pub mod relay;
pub mod sensor;
pub mod staleness;
pub mod thermostat;
pub mod topics;
pub mod types;
pub mod uplink;

pub use codec::{Downlink, RelayUplink, SensorReading, SensorUplink};
pub use config::{DeviceAddress, RelayConfig, RuntimeConfig, SensorConfig, ThermostatConfig};
pub use error::{DecodeError, EncodeError, RelayError};
pub use relay::{CommandState, PendingCommand, RelayChannel, RelayController, CHANNEL_COUNT};
pub use sensor::SensorDecoder;
pub use staleness::Stale;
pub use thermostat::{OutputTransition, Thermostat, ThermostatDecision};
pub use topics::*;
pub use types::{ChannelStatus, ControllerStatus};
pub use uplink::UplinkHandler;
