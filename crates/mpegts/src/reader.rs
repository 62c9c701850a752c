use crate::{
    Result, TsError,
    adaptation_field::{Pcr, PrivateDataItem, parse_private_data_items},
    packet::{PACKET_SIZE, TsPacket},
};
use bytes::Bytes;
use memchr::memchr;
use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
};
use tracing::trace;

/// A transport packet together with the byte offset of its sync byte
/// in the source file.
#[derive(Debug, Clone)]
pub struct PositionedPacket {
    pub pos: u64,
    pub packet: TsPacket,
}

impl PositionedPacket {
    pub fn pid(&self) -> u16 {
        self.packet.pid
    }

    /// PCR carried in the adaptation field, if any.
    pub fn pcr(&self) -> Option<Pcr> {
        self.packet.parse_adaptation_field().and_then(|af| af.pcr)
    }

    /// Decoded transport-private-data items from the adaptation field.
    pub fn private_data_items(&self) -> Vec<PrivateDataItem> {
        self.packet
            .parse_adaptation_field()
            .and_then(|af| af.transport_private_data)
            .map(|data| parse_private_data_items(&data))
            .unwrap_or_default()
    }
}

/// Ordered, re-openable packet source over a capture file.
///
/// Locks onto the first sync byte within the first 188 bytes; after that
/// every frame must start with 0x47 and framing errors are fatal. A
/// trailing partial frame ends iteration cleanly.
pub struct PacketSource {
    reader: BufReader<File>,
    pos: u64,
}

impl PacketSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;

        let mut probe = [0u8; PACKET_SIZE];
        let filled = read_full(&mut file, &mut probe)?;
        let offset = if filled == 0 {
            0
        } else {
            memchr(0x47, &probe[..filled]).ok_or(TsError::InvalidSyncByte(probe[0]))?
        };
        if offset > 0 {
            trace!(offset, "skipping bytes before first sync byte");
        }
        file.seek(SeekFrom::Start(offset as u64))?;

        Ok(PacketSource {
            reader: BufReader::with_capacity(PACKET_SIZE * 512, file),
            pos: offset as u64,
        })
    }
}

impl Iterator for PacketSource {
    type Item = Result<PositionedPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = [0u8; PACKET_SIZE];
        let filled = match read_full(&mut self.reader, &mut buf) {
            Ok(n) => n,
            Err(e) => return Some(Err(e)),
        };
        if filled == 0 {
            return None;
        }
        if filled < PACKET_SIZE {
            trace!(pos = self.pos, bytes = filled, "dropping trailing partial frame");
            return None;
        }

        let pos = self.pos;
        self.pos += PACKET_SIZE as u64;
        match TsPacket::parse(Bytes::copy_from_slice(&buf)) {
            Ok(packet) => Some(Ok(PositionedPacket { pos, packet })),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Read until the buffer is full or EOF. Returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
