/// Program Clock Reference: 33-bit base at 90 kHz plus 9-bit extension at 27 MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    /// 33-bit base value at 90 kHz
    pub base: u64,
    /// 9-bit extension value at 27 MHz
    pub extension: u16,
}

impl Pcr {
    /// Parse a PCR from exactly 6 bytes.
    ///
    /// Layout: `[base32..25][base24..17][base16..9][base8..1][base0 | reserved(6) | ext8][ext7..0]`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 6 {
            return None;
        }
        let base = ((data[0] as u64) << 25)
            | ((data[1] as u64) << 17)
            | ((data[2] as u64) << 9)
            | ((data[3] as u64) << 1)
            | ((data[4] as u64) >> 7);
        let extension = (((data[4] & 0x01) as u16) << 8) | data[5] as u16;
        Some(Pcr { base, extension })
    }

    /// Full PCR value at 27 MHz resolution.
    pub fn as_27mhz(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }

    /// PCR as seconds.
    pub fn as_seconds(&self) -> f64 {
        self.as_27mhz() as f64 / 27_000_000.0
    }
}

/// Parsed adaptation field.
#[derive(Debug, Clone)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub elementary_stream_priority_indicator: bool,
    pub pcr: Option<Pcr>,
    pub opcr: Option<Pcr>,
    pub splice_countdown: Option<i8>,
    pub transport_private_data: Option<Vec<u8>>,
}

impl AdaptationField {
    /// Parse an adaptation field from its data bytes (after the length byte).
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let flags = data[0];
        let discontinuity_indicator = (flags & 0x80) != 0;
        let random_access_indicator = (flags & 0x40) != 0;
        let elementary_stream_priority_indicator = (flags & 0x20) != 0;
        let pcr_flag = (flags & 0x10) != 0;
        let opcr_flag = (flags & 0x08) != 0;
        let splicing_point_flag = (flags & 0x04) != 0;
        let transport_private_data_flag = (flags & 0x02) != 0;

        let mut offset = 1;

        let pcr = if pcr_flag {
            let pcr = Pcr::parse(data.get(offset..).unwrap_or(&[]));
            offset += 6;
            pcr
        } else {
            None
        };

        let opcr = if opcr_flag {
            let opcr = Pcr::parse(data.get(offset..).unwrap_or(&[]));
            offset += 6;
            opcr
        } else {
            None
        };

        let splice_countdown = if splicing_point_flag {
            let val = data.get(offset).map(|&b| b as i8);
            offset += 1;
            val
        } else {
            None
        };

        let transport_private_data = if transport_private_data_flag && offset < data.len() {
            let length = data[offset] as usize;
            offset += 1;
            data.get(offset..offset + length).map(|d| d.to_vec())
        } else {
            None
        };

        Some(AdaptationField {
            discontinuity_indicator,
            random_access_indicator,
            elementary_stream_priority_indicator,
            pcr,
            opcr,
            splice_countdown,
            transport_private_data,
        })
    }
}

/// One decoded transport-private-data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateDataItem {
    /// Item tag; 0 for an opaque blob that did not fit the tag/length layout.
    pub tag: u8,
    pub data: Vec<u8>,
}

/// Decode a transport-private-data blob into zero or more tagged items.
///
/// Items are laid out as `tag(1) length(1) data(length)`. A blob that does
/// not round-trip through that layout is returned as a single raw item so
/// the bytes are never silently lost.
pub fn parse_private_data_items(data: &[u8]) -> Vec<PrivateDataItem> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut offset = 0;
    while offset + 2 <= data.len() {
        let tag = data[offset];
        let length = data[offset + 1] as usize;
        let end = offset + 2 + length;
        if end > data.len() {
            break;
        }
        items.push(PrivateDataItem {
            tag,
            data: data[offset + 2..end].to_vec(),
        });
        offset = end;
    }

    if offset != data.len() {
        // Not a clean tag/length sequence; treat the whole blob as one item.
        return vec![PrivateDataItem {
            tag: 0,
            data: data.to_vec(),
        }];
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcr_parse_zero() {
        let data = [0x00; 6];
        let pcr = Pcr::parse(&data).unwrap();
        assert_eq!(pcr.base, 0);
        assert_eq!(pcr.extension, 0);
        assert_eq!(pcr.as_27mhz(), 0);
    }

    #[test]
    fn pcr_parse_max() {
        let data = [0xFF; 6];
        let pcr = Pcr::parse(&data).unwrap();
        assert_eq!(pcr.base, 0x1_FFFF_FFFF);
        assert_eq!(pcr.extension, 0x1FF);
    }

    #[test]
    fn pcr_one_second() {
        // base 90000 ticks at 90 kHz = 1 second
        let pcr = Pcr {
            base: 90_000,
            extension: 0,
        };
        assert!((pcr.as_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flags_only_field() {
        let af = AdaptationField::parse(&[0x40]).unwrap();
        assert!(af.random_access_indicator);
        assert!(!af.discontinuity_indicator);
        assert!(af.pcr.is_none());
        assert!(af.transport_private_data.is_none());
    }

    #[test]
    fn field_with_pcr() {
        // PCR base = 90000, extension = 0
        let mut data = vec![0x10];
        data.extend_from_slice(&[0x00, 0x00, 0xAF, 0xC8, 0x7E, 0x00]);
        let af = AdaptationField::parse(&data).unwrap();
        let pcr = af.pcr.unwrap();
        assert_eq!(pcr.base, 90_000);
        assert_eq!(pcr.extension, 0);
    }

    #[test]
    fn field_with_private_data() {
        let mut data = vec![0x02];
        data.push(3);
        data.extend_from_slice(&[0xDE, 0xAD, 0xBE]);
        let af = AdaptationField::parse(&data).unwrap();
        assert_eq!(
            af.transport_private_data.as_deref(),
            Some(&[0xDE, 0xAD, 0xBE][..])
        );
    }

    #[test]
    fn empty_field_is_none() {
        assert!(AdaptationField::parse(&[]).is_none());
    }

    #[test]
    fn private_items_tag_length() {
        // Two well-formed items
        let blob = [0x01, 0x02, 0xAA, 0xBB, 0x7F, 0x01, 0xCC];
        let items = parse_private_data_items(&blob);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tag, 0x01);
        assert_eq!(items[0].data, vec![0xAA, 0xBB]);
        assert_eq!(items[1].tag, 0x7F);
        assert_eq!(items[1].data, vec![0xCC]);
    }

    #[test]
    fn private_items_raw_fallback() {
        // Length byte overruns the blob
        let blob = [0x01, 0x10, 0xAA];
        let items = parse_private_data_items(&blob);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tag, 0);
        assert_eq!(items[0].data, blob.to_vec());
    }

    #[test]
    fn private_items_empty() {
        assert!(parse_private_data_items(&[]).is_empty());
    }
}
