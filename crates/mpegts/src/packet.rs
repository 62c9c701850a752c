use crate::{Result, TsError, adaptation_field::AdaptationField};
use bytes::Bytes;

/// Transport packet size in bytes
pub const PACKET_SIZE: usize = 188;

/// PAT PID (always 0x0000)
pub const PID_PAT: u16 = 0x0000;

/// CAT PID (always 0x0001)
pub const PID_CAT: u16 = 0x0001;

/// NULL PID (always 0x1FFF)
pub const PID_NULL: u16 = 0x1FFF;

/// A parsed 188-byte transport packet.
#[derive(Debug, Clone)]
pub struct TsPacket {
    /// Transport Error Indicator
    pub transport_error_indicator: bool,
    /// Payload Unit Start Indicator
    pub payload_unit_start_indicator: bool,
    /// Transport Priority
    pub transport_priority: bool,
    /// Packet Identifier
    pub pid: u16,
    /// Transport Scrambling Control
    pub transport_scrambling_control: u8,
    /// Adaptation Field Control
    pub adaptation_field_control: u8,
    /// Continuity Counter
    pub continuity_counter: u8,
    /// Adaptation field bytes (after the length byte), if present
    pub adaptation_field: Option<Bytes>,
    /// Payload bytes, if present
    pub payload: Option<Bytes>,
}

impl TsPacket {
    /// Parse a TS packet from exactly 188 bytes.
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() != PACKET_SIZE {
            return Err(TsError::InvalidPacketSize(data.len()));
        }
        if data[0] != 0x47 {
            return Err(TsError::InvalidSyncByte(data[0]));
        }

        let transport_error_indicator = (data[1] & 0x80) != 0;
        let payload_unit_start_indicator = (data[1] & 0x40) != 0;
        let transport_priority = (data[1] & 0x20) != 0;
        let pid = ((data[1] as u16 & 0x1F) << 8) | data[2] as u16;

        let transport_scrambling_control = (data[3] >> 6) & 0x03;
        let adaptation_field_control = (data[3] >> 4) & 0x03;
        let continuity_counter = data[3] & 0x0F;

        let mut offset = 4;
        let mut adaptation_field = None;

        if adaptation_field_control == 0x02 || adaptation_field_control == 0x03 {
            let adaptation_field_length = data[offset] as usize;
            offset += 1;

            if adaptation_field_length > 0 {
                if offset + adaptation_field_length > data.len() {
                    return Err(TsError::InsufficientData {
                        expected: offset + adaptation_field_length,
                        actual: data.len(),
                    });
                }
                adaptation_field = Some(data.slice(offset..offset + adaptation_field_length));
                offset += adaptation_field_length;
            }
        }

        let payload = if (adaptation_field_control == 0x01 || adaptation_field_control == 0x03)
            && offset < data.len()
        {
            Some(data.slice(offset..))
        } else {
            None
        };

        Ok(TsPacket {
            transport_error_indicator,
            payload_unit_start_indicator,
            transport_priority,
            pid,
            transport_scrambling_control,
            adaptation_field_control,
            continuity_counter,
            adaptation_field,
            payload,
        })
    }

    /// Check if this packet carries a payload
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control == 0x01 || self.adaptation_field_control == 0x03
    }

    /// Check if this packet carries an adaptation field
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control == 0x02 || self.adaptation_field_control == 0x03
    }

    /// Check if the adaptation field marks a random access point
    pub fn has_random_access_indicator(&self) -> bool {
        if let Some(af) = &self.adaptation_field
            && !af.is_empty()
        {
            return (af[0] & 0x40) != 0;
        }
        false
    }

    /// Get the PSI payload, skipping the pointer field when PUSI is set.
    ///
    /// Returns the full payload for continuation packets.
    pub fn get_psi_payload(&self) -> Option<Bytes> {
        let payload = self.payload.as_ref()?;
        if self.payload_unit_start_indicator {
            if payload.is_empty() {
                return None;
            }
            let pointer_field = payload[0] as usize;
            if 1 + pointer_field < payload.len() {
                return Some(payload.slice(1 + pointer_field..));
            }
            None
        } else {
            Some(payload.clone())
        }
    }

    /// Parse the adaptation field into a structured type.
    pub fn parse_adaptation_field(&self) -> Option<AdaptationField> {
        self.adaptation_field
            .as_ref()
            .and_then(|af| AdaptationField::parse(af))
    }
}
