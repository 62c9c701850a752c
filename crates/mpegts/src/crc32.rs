/// MPEG-2 CRC-32 (ITU-T H.222.0 / ISO 13818-1).
///
/// Polynomial 0x04C11DB7, init 0xFFFFFFFF, no reflection, no final XOR.
/// Not interchangeable with the zlib/ISO 3309 CRC-32.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// Compute the MPEG-2 CRC-32 over a byte slice.
pub fn mpeg2_crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc = (crc << 8) ^ CRC32_TABLE[((crc >> 24) ^ byte as u32) as usize];
    }
    crc
}

/// Validate a full PSI section: the CRC over the section including its
/// stored 4-byte CRC must come out zero.
pub fn validate_section_crc32(section_data: &[u8]) -> bool {
    mpeg2_crc32(section_data) == 0
}
