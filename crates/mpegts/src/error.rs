use thiserror::Error;

/// Errors produced while parsing transport-stream structures.
#[derive(Debug, Error)]
pub enum TsError {
    #[error("invalid packet size: {0} bytes (expected 188)")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: {0:#04x} (expected 0x47)")]
    InvalidSyncByte(u8),

    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("invalid table id: expected {expected:#04x}, got {actual:#04x}")]
    InvalidTableId { expected: u8, actual: u8 },

    #[error("PSI section CRC-32 mismatch")]
    CrcMismatch,

    #[error("invalid PES start code prefix")]
    InvalidPesStartCode,

    #[error("invalid PTS/DTS flags: {0:#04b}")]
    InvalidPtsDtsFlags(u8),

    #[error("invalid SCTE-35 section: {0}")]
    InvalidScte35(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
