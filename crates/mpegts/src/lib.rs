//! MPEG-2 Transport Stream parsing primitives.
//!
//! This crate provides the packet-level building blocks used by the capture
//! analyzer: 188-byte packet framing, adaptation fields with PCR and
//! transport private data, PSI tables (PAT/PMT), descriptors, PES headers,
//! SCTE-35 splice information, and a positioned file reader.

pub mod adaptation_field;
pub mod crc32;
pub mod descriptor;
pub mod error;
pub mod packet;
pub mod pat;
pub mod pes;
pub mod pmt;
pub mod reader;
pub mod scte35;

pub use adaptation_field::{AdaptationField, Pcr, PrivateDataItem, parse_private_data_items};
pub use crc32::{mpeg2_crc32, validate_section_crc32};
pub use descriptor::{Descriptor, DescriptorIterator, TAG_REGISTRATION, registration_identifier};
pub use error::TsError;
pub use packet::{PID_CAT, PID_NULL, PID_PAT, TsPacket};
pub use pat::{Pat, PatProgram};
pub use pes::PesHeader;
pub use pmt::{Pmt, PmtStream, StreamType};
pub use reader::{PacketSource, PositionedPacket};
pub use scte35::{
    BreakDuration, SpliceCommand, SpliceCommandType, SpliceInfoSection, SpliceInsert, TimeSignal,
};

/// Result type for TS parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
