use bytes::Bytes;

/// Registration descriptor tag (format_identifier, e.g. "CUEI" for SCTE-35)
pub const TAG_REGISTRATION: u8 = 0x05;

/// A single descriptor from a PMT descriptor loop.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Bytes,
}

/// Iterator over a descriptor loop.
#[derive(Debug, Clone)]
pub struct DescriptorIterator {
    data: Bytes,
    offset: usize,
}

impl DescriptorIterator {
    pub fn new(data: Bytes) -> Self {
        DescriptorIterator { data, offset: 0 }
    }
}

impl Iterator for DescriptorIterator {
    type Item = Descriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + 2 > self.data.len() {
            return None;
        }
        let tag = self.data[self.offset];
        let length = self.data[self.offset + 1] as usize;
        let start = self.offset + 2;
        let end = start + length;
        if end > self.data.len() {
            return None;
        }
        self.offset = end;
        Some(Descriptor {
            tag,
            data: self.data.slice(start..end),
        })
    }
}

/// Extract the 4-byte format identifier from a registration descriptor body.
pub fn registration_identifier(data: &[u8]) -> Option<[u8; 4]> {
    if data.len() < 4 {
        return None;
    }
    Some([data[0], data[1], data[2], data[3]])
}
