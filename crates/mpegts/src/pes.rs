use crate::{Result, TsError};

/// Parse a 33-bit PTS/DTS from 5 bytes.
///
/// Layout: `[marker(4) | ts32..30 | 1][ts29..22][ts21..15 | 1][ts14..7][ts6..0 | 1]`
fn parse_timestamp(data: &[u8]) -> Option<u64> {
    if data.len() < 5 {
        return None;
    }
    let ts = (((data[0] as u64 >> 1) & 0x07) << 30)
        | ((data[1] as u64) << 22)
        | (((data[2] as u64 >> 1) & 0x7F) << 15)
        | ((data[3] as u64) << 7)
        | ((data[4] as u64 >> 1) & 0x7F);
    Some(ts)
}

/// Whether a stream_id carries the optional PES header (PTS/DTS fields).
///
/// Per ISO 13818-1 Table 2-18.
fn has_optional_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        0xBC   // program_stream_map
        | 0xBE // padding_stream
        | 0xBF // private_stream_2
        | 0xF0 // ECM_stream
        | 0xF1 // EMM_stream
        | 0xFF // program_stream_directory
        | 0xF2 // DSMCC_stream
        | 0xF8 // ITU-T Rec. H.222.1 type E
    )
}

/// Parsed PES packet header.
#[derive(Debug, Clone)]
pub struct PesHeader {
    pub stream_id: u8,
    pub pes_packet_length: u16,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    pub data_alignment_indicator: bool,
    /// Offset to elementary-stream data, past the header
    pub payload_offset: usize,
}

impl PesHeader {
    /// Parse a PES header from bytes starting with the 0x000001 start code.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(TsError::InsufficientData {
                expected: 6,
                actual: data.len(),
            });
        }
        if data[0] != 0x00 || data[1] != 0x00 || data[2] != 0x01 {
            return Err(TsError::InvalidPesStartCode);
        }

        let stream_id = data[3];
        let pes_packet_length = ((data[4] as u16) << 8) | data[5] as u16;

        if !has_optional_header(stream_id) {
            return Ok(PesHeader {
                stream_id,
                pes_packet_length,
                pts: None,
                dts: None,
                data_alignment_indicator: false,
                payload_offset: 6,
            });
        }

        if data.len() < 9 {
            return Err(TsError::InsufficientData {
                expected: 9,
                actual: data.len(),
            });
        }

        let data_alignment_indicator = (data[6] & 0x04) != 0;
        let pts_dts_flags = (data[7] >> 6) & 0x03;
        let pes_header_data_length = data[8] as usize;
        let payload_offset = 9 + pes_header_data_length;

        let (pts, dts) = match pts_dts_flags {
            0b00 => (None, None),
            0b01 => return Err(TsError::InvalidPtsDtsFlags(pts_dts_flags)),
            0b10 => {
                if data.len() < 14 {
                    return Err(TsError::InsufficientData {
                        expected: 14,
                        actual: data.len(),
                    });
                }
                (parse_timestamp(&data[9..14]), None)
            }
            _ => {
                if data.len() < 19 {
                    return Err(TsError::InsufficientData {
                        expected: 19,
                        actual: data.len(),
                    });
                }
                (
                    parse_timestamp(&data[9..14]),
                    parse_timestamp(&data[14..19]),
                )
            }
        };

        Ok(PesHeader {
            stream_id,
            pes_packet_length,
            pts,
            dts,
            data_alignment_indicator,
            payload_offset,
        })
    }
}
