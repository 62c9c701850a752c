use crate::{OutputContext, Result};
use mpegts::{PositionedPacket, PrivateDataItem};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
};
use tracing::debug;

/// One logged private-data event: byte position plus decoded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivDataEvent {
    pub pos: u64,
    pub content: PrivContent,
}

/// Decoded private-data item, mirrored into a serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivContent {
    pub tag: u8,
    pub data: Vec<u8>,
}

impl From<PrivateDataItem> for PrivContent {
    fn from(item: PrivateDataItem) -> Self {
        PrivContent {
            tag: item.tag,
            data: item.data,
        }
    }
}

/// Per-PID append-only log of adaptation-field private data.
///
/// The log file is created lazily on the first qualifying packet; creation
/// failure is fatal for the run. One JSON object per line.
#[derive(Debug)]
pub struct PrivDataLogger {
    pid: u16,
    log: Option<BufWriter<File>>,
}

impl PrivDataLogger {
    pub fn new(pid: u16) -> Self {
        PrivDataLogger { pid, log: None }
    }

    /// Log any private-data items carried by this packet. No-op when the
    /// packet has no adaptation field or no private data.
    pub fn log(&mut self, pkt: &PositionedPacket, out: &OutputContext) -> Result<()> {
        let items = pkt.private_data_items();
        if items.is_empty() {
            return Ok(());
        }

        if self.log.is_none() {
            debug!(pid = self.pid, "opening private-data log");
            let file = out.create(&format!("{}-tspriv.jsonl", self.pid))?;
            self.log = Some(BufWriter::new(file));
        }
        let Some(log) = &mut self.log else {
            return Ok(());
        };

        for item in items {
            let event = PrivDataEvent {
                pos: pkt.pos,
                content: item.into(),
            };
            serde_json::to_writer(&mut *log, &event)?;
            log.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flush the log, if one was ever opened.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(log) = &mut self.log {
            log.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mpegts::TsPacket;

    fn packet_with_private_data(pid: u16, pos: u64, items: &[u8]) -> PositionedPacket {
        let mut data = vec![0u8; 188];
        data[0] = 0x47;
        data[1] = ((pid >> 8) as u8) & 0x1F;
        data[2] = (pid & 0xFF) as u8;
        data[3] = 0x20;
        data[4] = 183;
        data[5] = 0x02; // transport_private_data flag
        data[6] = items.len() as u8;
        data[7..7 + items.len()].copy_from_slice(items);
        for byte in &mut data[7 + items.len()..] {
            *byte = 0xFF;
        }
        PositionedPacket {
            pos,
            packet: TsPacket::parse(Bytes::from(data)).unwrap(),
        }
    }

    fn plain_packet(pid: u16) -> PositionedPacket {
        let mut data = vec![0u8; 188];
        data[0] = 0x47;
        data[1] = ((pid >> 8) as u8) & 0x1F;
        data[2] = (pid & 0xFF) as u8;
        data[3] = 0x10;
        PositionedPacket {
            pos: 0,
            packet: TsPacket::parse(Bytes::from(data)).unwrap(),
        }
    }

    #[test]
    fn lazily_creates_log_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputContext::new(dir.path()).unwrap();
        let mut logger = PrivDataLogger::new(0x31);

        // No private data: no file
        logger.log(&plain_packet(0x31), &out).unwrap();
        assert!(!out.path("49-tspriv.jsonl").exists());

        logger
            .log(&packet_with_private_data(0x31, 376, &[0x07, 0x02, 0xAA, 0xBB]), &out)
            .unwrap();
        logger.finish().unwrap();

        let content = out.read_to_string("49-tspriv.jsonl").unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: PrivDataEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(
            event,
            PrivDataEvent {
                pos: 376,
                content: PrivContent {
                    tag: 0x07,
                    data: vec![0xAA, 0xBB],
                },
            }
        );
    }

    #[test]
    fn appends_one_line_per_item() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputContext::new(dir.path()).unwrap();
        let mut logger = PrivDataLogger::new(0x33);

        let items = [0x01, 0x01, 0xAA, 0x02, 0x01, 0xBB];
        logger
            .log(&packet_with_private_data(0x33, 0, &items), &out)
            .unwrap();
        logger
            .log(&packet_with_private_data(0x33, 188, &[0x03, 0x00]), &out)
            .unwrap();
        logger.finish().unwrap();

        let content = out.read_to_string("51-tspriv.jsonl").unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
