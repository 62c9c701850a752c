use crate::{OutputContext, Result};
use mpegts::{PesHeader, PositionedPacket, SpliceCommand, SpliceInfoSection, StreamType};
use std::{collections::BTreeMap, io::Write};
use tracing::debug;

/// Per-PID accumulator, one variant per stream kind.
///
/// Every variant implements the same four operations: accept a packet,
/// accept a time notification, flush, write a report.
#[derive(Debug)]
pub enum StreamRecord {
    Video(VideoRecord),
    Audio(AudioRecord),
    Scte35(Scte35Record),
    Data(DataRecord),
}

impl StreamRecord {
    pub fn for_stream(pid: u16, stream_type: StreamType) -> Self {
        if stream_type.is_video() {
            StreamRecord::Video(VideoRecord::new(pid))
        } else if stream_type.is_scte35() {
            StreamRecord::Scte35(Scte35Record::new(pid))
        } else if stream_type.is_audio() {
            StreamRecord::Audio(AudioRecord::new(pid))
        } else {
            StreamRecord::Data(DataRecord::new(pid))
        }
    }

    pub fn process(&mut self, pkt: &PositionedPacket) {
        match self {
            StreamRecord::Video(r) => r.process(pkt),
            StreamRecord::Audio(r) => r.process(pkt),
            StreamRecord::Scte35(r) => r.process(pkt),
            StreamRecord::Data(r) => r.process(pkt),
        }
    }

    /// Deliver the latest clock sample observed for this record's program.
    pub fn notify_time(&mut self, pcr: u64, pos: u64) {
        match self {
            StreamRecord::Video(r) => r.last_pcr = Some((pcr, pos)),
            StreamRecord::Audio(r) => r.last_pcr = Some((pcr, pos)),
            StreamRecord::Scte35(r) => r.last_pcr = Some((pcr, pos)),
            StreamRecord::Data(_) => {}
        }
    }

    /// Finalize buffered state. Called exactly once, before `write_report`.
    pub fn flush(&mut self) {
        if let StreamRecord::Scte35(r) = self
            && r.section.take().is_some()
        {
            debug!(pid = r.pid, "dropping incomplete SCTE-35 section at end of stream");
        }
    }

    pub fn write_report(&self, out: &OutputContext) -> Result<()> {
        match self {
            StreamRecord::Video(r) => r.write_report(out),
            StreamRecord::Audio(r) => r.write_report(out),
            StreamRecord::Scte35(r) => r.write_report(out),
            StreamRecord::Data(r) => r.write_report(out),
        }
    }
}

/// Video record: collects keyframe events.
///
/// A keyframe is a payload-unit start whose adaptation field sets the
/// random-access indicator; its timestamp is the PES PTS of that unit.
#[derive(Debug)]
pub struct VideoRecord {
    pid: u16,
    last_pcr: Option<(u64, u64)>,
    keyframes: Vec<(u64, u64, u64)>, // (pos, pts, pcr)
}

impl VideoRecord {
    fn new(pid: u16) -> Self {
        VideoRecord {
            pid,
            last_pcr: None,
            keyframes: Vec::new(),
        }
    }

    fn process(&mut self, pkt: &PositionedPacket) {
        if !pkt.packet.payload_unit_start_indicator || !pkt.packet.has_random_access_indicator() {
            return;
        }
        let Some(payload) = &pkt.packet.payload else {
            return;
        };
        match PesHeader::parse(payload) {
            Ok(header) => {
                if let Some(pts) = header.pts {
                    let pcr = self.last_pcr.map(|(pcr, _)| pcr).unwrap_or(0);
                    self.keyframes.push((pkt.pos, pts, pcr));
                }
            }
            Err(e) => debug!(pid = self.pid, pos = pkt.pos, "unparsable video PES header: {e}"),
        }
    }

    fn write_report(&self, out: &OutputContext) -> Result<()> {
        let mut file = out.create(&format!("{}-iframe.csv", self.pid))?;
        writeln!(file, "pos, pts, pcr")?;
        for (pos, pts, pcr) in &self.keyframes {
            writeln!(file, "{pos}, {pts}, {pcr}")?;
        }
        Ok(())
    }
}

/// Audio record: one event per PES access unit with a PTS.
#[derive(Debug)]
pub struct AudioRecord {
    pid: u16,
    last_pcr: Option<(u64, u64)>,
    units: Vec<(u64, u64, u64)>, // (pos, pts, pcr)
}

impl AudioRecord {
    fn new(pid: u16) -> Self {
        AudioRecord {
            pid,
            last_pcr: None,
            units: Vec::new(),
        }
    }

    fn process(&mut self, pkt: &PositionedPacket) {
        if !pkt.packet.payload_unit_start_indicator {
            return;
        }
        let Some(payload) = &pkt.packet.payload else {
            return;
        };
        match PesHeader::parse(payload) {
            Ok(header) => {
                if let Some(pts) = header.pts {
                    let pcr = self.last_pcr.map(|(pcr, _)| pcr).unwrap_or(0);
                    self.units.push((pkt.pos, pts, pcr));
                }
            }
            Err(e) => debug!(pid = self.pid, pos = pkt.pos, "unparsable audio PES header: {e}"),
        }
    }

    fn write_report(&self, out: &OutputContext) -> Result<()> {
        let mut file = out.create(&format!("{}.csv", self.pid))?;
        writeln!(file, "pos, pts, pcr")?;
        for (pos, pts, pcr) in &self.units {
            writeln!(file, "{pos}, {pts}, {pcr}")?;
        }
        Ok(())
    }
}

/// One recorded splice event.
#[derive(Debug, Clone)]
struct SpliceEvent {
    pos: u64,
    command: &'static str,
    event_id: u32,
    pts: u64,
    pts_adjustment: u64,
}

/// SCTE-35 record: assembles splice info sections and logs splice events.
#[derive(Debug)]
pub struct Scte35Record {
    pid: u16,
    last_pcr: Option<(u64, u64)>,
    /// In-progress section: (start position, buffered bytes)
    section: Option<(u64, Vec<u8>)>,
    events: Vec<SpliceEvent>,
}

impl Scte35Record {
    fn new(pid: u16) -> Self {
        Scte35Record {
            pid,
            last_pcr: None,
            section: None,
            events: Vec::new(),
        }
    }

    fn process(&mut self, pkt: &PositionedPacket) {
        if pkt.packet.payload_unit_start_indicator {
            if self.section.is_some() {
                debug!(pid = self.pid, pos = pkt.pos, "discarding incomplete SCTE-35 section");
            }
            if let Some(psi) = pkt.packet.get_psi_payload() {
                self.section = Some((pkt.pos, psi.to_vec()));
            }
        } else if let Some((_, buffer)) = &mut self.section
            && let Some(payload) = &pkt.packet.payload
        {
            buffer.extend_from_slice(payload);
        }
        self.try_complete();
    }

    fn try_complete(&mut self) {
        let Some((pos, buffer)) = &self.section else {
            return;
        };
        if buffer.len() < 3 {
            return;
        }
        let section_length = (((buffer[1] & 0x0F) as usize) << 8) | buffer[2] as usize;
        let total = 3 + section_length;
        if buffer.len() < total {
            return;
        }

        let pos = *pos;
        let section = &buffer[..total];
        match SpliceInfoSection::parse(section) {
            Ok(info) => {
                let event = match &info.splice_command {
                    SpliceCommand::SpliceInsert(si) => Some(SpliceEvent {
                        pos,
                        command: "splice_insert",
                        event_id: si.splice_event_id,
                        pts: si.splice_time.unwrap_or(0),
                        pts_adjustment: info.pts_adjustment,
                    }),
                    SpliceCommand::TimeSignal(ts) => Some(SpliceEvent {
                        pos,
                        command: "time_signal",
                        event_id: 0,
                        pts: ts.splice_time.unwrap_or(0),
                        pts_adjustment: info.pts_adjustment,
                    }),
                    SpliceCommand::SpliceNull | SpliceCommand::Other(_) => None,
                };
                if let Some(event) = event {
                    self.events.push(event);
                }
            }
            Err(e) => debug!(pid = self.pid, pos, "unparsable SCTE-35 section: {e}"),
        }
        self.section = None;
    }

    fn write_report(&self, out: &OutputContext) -> Result<()> {
        let mut file = out.create(&format!("{}.csv", self.pid))?;
        writeln!(file, "pos, command, event_id, pts, pts_adjustment")?;
        for e in &self.events {
            writeln!(
                file,
                "{}, {}, {}, {}, {}",
                e.pos, e.command, e.event_id, e.pts, e.pts_adjustment
            )?;
        }
        Ok(())
    }
}

/// Fallback record for data/other streams: packet and byte counters.
#[derive(Debug)]
pub struct DataRecord {
    pid: u16,
    packets: u64,
    bytes: u64,
}

impl DataRecord {
    fn new(pid: u16) -> Self {
        DataRecord {
            pid,
            packets: 0,
            bytes: 0,
        }
    }

    fn process(&mut self, pkt: &PositionedPacket) {
        self.packets += 1;
        self.bytes += pkt.packet.payload.as_ref().map(|p| p.len() as u64).unwrap_or(0);
    }

    fn write_report(&self, out: &OutputContext) -> Result<()> {
        let mut file = out.create(&format!("{}.csv", self.pid))?;
        writeln!(file, "packets, bytes")?;
        writeln!(file, "{}, {}", self.packets, self.bytes)?;
        Ok(())
    }
}

/// The identifier -> record map for the main pass.
///
/// One record per stream PID known to discovery; packets for any other PID
/// are ignored.
#[derive(Debug, Default)]
pub struct RecordSet {
    records: BTreeMap<u16, StreamRecord>,
}

impl RecordSet {
    pub fn new(streams: &BTreeMap<u16, StreamType>) -> Self {
        let records = streams
            .iter()
            .map(|(&pid, &stream_type)| (pid, StreamRecord::for_stream(pid, stream_type)))
            .collect();
        RecordSet { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Route a packet to its record; packets for unknown PIDs are ignored.
    pub fn process(&mut self, pkt: &PositionedPacket) {
        if let Some(record) = self.records.get_mut(&pkt.pid()) {
            record.process(pkt);
        }
    }

    /// Deliver a time notification to the record for `pid`, if one exists.
    pub fn notify_time(&mut self, pid: u16, pcr: u64, pos: u64) {
        if let Some(record) = self.records.get_mut(&pid) {
            record.notify_time(pcr, pos);
        }
    }

    /// Flush every record, then write every report. Flush strictly precedes
    /// report generation for each record.
    pub fn flush_and_report(&mut self, out: &OutputContext) -> Result<()> {
        for record in self.records.values_mut() {
            record.flush();
        }
        for record in self.records.values() {
            record.write_report(out)?;
        }
        Ok(())
    }
}
