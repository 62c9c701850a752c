use crate::{
    Result, TsError,
    crc32::validate_section_crc32,
    descriptor::{Descriptor, DescriptorIterator, TAG_REGISTRATION, registration_identifier},
};
use bytes::Bytes;
use std::fmt;

/// PMT table id
pub const PMT_TABLE_ID: u8 = 0x02;

/// Stream kind announced by a PMT elementary-stream entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Mpeg1Video,
    Mpeg2Video,
    Mpeg4Video,
    H264,
    H265,
    Mpeg1Audio,
    Mpeg2Audio,
    Aac,
    Ac3,
    Scte35,
    PrivateData,
    Other(u8),
}

impl StreamType {
    /// Map a raw stream_type byte. Registration-descriptor upgrades (CUEI)
    /// are applied by [`Pmt::parse`], not here.
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x01 => StreamType::Mpeg1Video,
            0x02 => StreamType::Mpeg2Video,
            0x10 => StreamType::Mpeg4Video,
            0x1B => StreamType::H264,
            0x24 => StreamType::H265,
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x0F => StreamType::Aac,
            0x81 => StreamType::Ac3,
            0x86 => StreamType::Scte35,
            0x06 => StreamType::PrivateData,
            v => StreamType::Other(v),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self,
            StreamType::Mpeg1Video
                | StreamType::Mpeg2Video
                | StreamType::Mpeg4Video
                | StreamType::H264
                | StreamType::H265
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            StreamType::Mpeg1Audio | StreamType::Mpeg2Audio | StreamType::Aac | StreamType::Ac3
        )
    }

    pub fn is_scte35(&self) -> bool {
        matches!(self, StreamType::Scte35)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamType::Mpeg1Video => "MPEG-1 Video",
            StreamType::Mpeg2Video => "MPEG-2 Video",
            StreamType::Mpeg4Video => "MPEG-4 Video",
            StreamType::H264 => "MPEG-4 AVC Video",
            StreamType::H265 => "HEVC Video",
            StreamType::Mpeg1Audio => "MPEG-1 Audio",
            StreamType::Mpeg2Audio => "MPEG-2 Audio",
            StreamType::Aac => "AAC Audio",
            StreamType::Ac3 => "AC-3 Audio",
            StreamType::Scte35 => "SCTE-35",
            StreamType::PrivateData => "Private Data",
            StreamType::Other(v) => return write!(f, "Other ({v:#04x})"),
        };
        f.write_str(name)
    }
}

/// One elementary-stream entry from a PMT.
#[derive(Debug, Clone)]
pub struct PmtStream {
    pub stream_type: StreamType,
    pub raw_stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<Descriptor>,
}

/// Program Map Table.
#[derive(Debug, Clone)]
pub struct Pmt {
    pub program_number: u16,
    pub version_number: u8,
    pub pcr_pid: u16,
    pub streams: Vec<PmtStream>,
}

impl Pmt {
    /// Parse a PMT section from PSI payload bytes (starting at table_id).
    ///
    /// Streams carrying a "CUEI" registration descriptor are classified as
    /// SCTE-35 regardless of the raw stream_type byte.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(TsError::InsufficientData {
                expected: 16,
                actual: data.len(),
            });
        }

        let table_id = data[0];
        if table_id != PMT_TABLE_ID {
            return Err(TsError::InvalidTableId {
                expected: PMT_TABLE_ID,
                actual: table_id,
            });
        }

        let section_length = (((data[1] & 0x0F) as usize) << 8) | data[2] as usize;
        let section_end = 3 + section_length;
        if section_end > data.len() {
            return Err(TsError::InsufficientData {
                expected: section_end,
                actual: data.len(),
            });
        }
        // Section must hold at least the fixed header and the CRC
        if section_end < 16 {
            return Err(TsError::InsufficientData {
                expected: 16,
                actual: section_end,
            });
        }

        let program_number = ((data[3] as u16) << 8) | data[4] as u16;
        let version_number = (data[5] >> 1) & 0x1F;
        let pcr_pid = ((data[8] as u16 & 0x1F) << 8) | data[9] as u16;
        let program_info_length = (((data[10] & 0x0F) as usize) << 8) | data[11] as usize;

        let mut streams = Vec::new();
        let mut offset = 12 + program_info_length;
        let loop_end = section_end - 4;
        while offset + 5 <= loop_end {
            let raw_stream_type = data[offset];
            let elementary_pid = ((data[offset + 1] as u16 & 0x1F) << 8) | data[offset + 2] as u16;
            let es_info_length = (((data[offset + 3] & 0x0F) as usize) << 8) | data[offset + 4] as usize;
            offset += 5;

            let es_end = (offset + es_info_length).min(loop_end);
            let descriptors: Vec<Descriptor> =
                DescriptorIterator::new(Bytes::copy_from_slice(&data[offset..es_end])).collect();
            offset = es_end;

            let mut stream_type = StreamType::from_byte(raw_stream_type);
            if !matches!(stream_type, StreamType::Scte35) {
                let cuei = descriptors.iter().any(|d| {
                    d.tag == TAG_REGISTRATION && registration_identifier(&d.data) == Some(*b"CUEI")
                });
                if cuei {
                    stream_type = StreamType::Scte35;
                }
            }

            streams.push(PmtStream {
                stream_type,
                raw_stream_type,
                elementary_pid,
                descriptors,
            });
        }

        Ok(Pmt {
            program_number,
            version_number,
            pcr_pid,
            streams,
        })
    }

    /// Parse a PMT section, validating its CRC-32 first.
    pub fn parse_with_crc(data: &[u8]) -> Result<Self> {
        let pmt = Self::parse(data)?;
        let section_length = (((data[1] & 0x0F) as usize) << 8) | data[2] as usize;
        if !validate_section_crc32(&data[..3 + section_length]) {
            return Err(TsError::CrcMismatch);
        }
        Ok(pmt)
    }
}
