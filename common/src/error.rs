use thiserror::Error;

/// Uplink payload could not be turned into a reading or relay update.
///
/// Always recoverable: the decoder that raised it keeps its previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected payload length on port {port}: expected {expected}, got {actual}")]
    WrongLength {
        port: u8,
        expected: usize,
        actual: usize,
    },
    #[error("unknown port in uplink data: {0}")]
    UnknownPort(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EncodeError {
    #[error("{field} {value} cannot be represented in the sensor payload")]
    OutOfRange { field: &'static str, value: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid relay channel requested: {0}")]
    InvalidChannel(u8),
    #[error("relay set command {command:#010x} dropped after {attempts} retries")]
    RetriesExhausted { command: u32, attempts: u32 },
}
