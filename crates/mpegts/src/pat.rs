use crate::{Result, TsError, crc32::validate_section_crc32};

/// PAT table id
pub const PAT_TABLE_ID: u8 = 0x00;

/// One program entry from the PAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// Program Association Table.
#[derive(Debug, Clone)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub programs: Vec<PatProgram>,
}

impl Pat {
    /// Parse a PAT section from PSI payload bytes (starting at table_id).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(TsError::InsufficientData {
                expected: 12,
                actual: data.len(),
            });
        }

        let table_id = data[0];
        if table_id != PAT_TABLE_ID {
            return Err(TsError::InvalidTableId {
                expected: PAT_TABLE_ID,
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
        if section_end < 12 {
            return Err(TsError::InsufficientData {
                expected: 12,
                actual: section_end,
            });
        }

        let transport_stream_id = ((data[3] as u16) << 8) | data[4] as u16;
        let version_number = (data[5] >> 1) & 0x1F;

        // Program loop runs from byte 8 to the CRC.
        let mut programs = Vec::new();
        let mut offset = 8;
        let loop_end = section_end - 4;
        while offset + 4 <= loop_end {
            let program_number = ((data[offset] as u16) << 8) | data[offset + 1] as u16;
            let pid = ((data[offset + 2] as u16 & 0x1F) << 8) | data[offset + 3] as u16;
            offset += 4;
            // program_number 0 announces the network PID, not a program
            if program_number != 0 {
                programs.push(PatProgram {
                    program_number,
                    pmt_pid: pid,
                });
            }
        }

        Ok(Pat {
            transport_stream_id,
            version_number,
            programs,
        })
    }

    /// Parse a PAT section, validating its CRC-32 first.
    pub fn parse_with_crc(data: &[u8]) -> Result<Self> {
        let pat = Self::parse(data)?;
        let section_length = (((data[1] & 0x0F) as usize) << 8) | data[2] as usize;
        if !validate_section_crc32(&data[..3 + section_length]) {
            return Err(TsError::CrcMismatch);
        }
        Ok(pat)
    }
}
