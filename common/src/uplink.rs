use crate::error::DecodeError;

/// Capability of a device-side component to consume its own uplinks.
///
/// The orchestrator routes each uplink to the handler owning the device it
/// came from and calls it synchronously; no callbacks are registered.
pub trait UplinkHandler {
    type Update;

    fn handle_uplink(
        &mut self,
        port: u8,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Self::Update, DecodeError>;
}
