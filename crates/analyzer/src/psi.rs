use crate::{OutputContext, Result};
use mpegts::{PID_PAT, Pat, Pmt, PositionedPacket, StreamType};
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};
use tracing::{debug, info};

/// Finalized metadata for one program, as learned by discovery.
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub program_number: u16,
    pub pmt_pid: u16,
    pub pcr_pid: u16,
    pub streams: BTreeMap<u16, StreamType>,
}

/// Discovery pass over the capture: accumulates versioned PAT/PMT tables
/// until the program structure is fully known.
///
/// Discovery is best-effort: if the source ends before every announced
/// program has a PMT, the partial map is used as-is.
#[derive(Debug, Default)]
pub struct PsiDiscovery {
    pat: Option<Pat>,
    pat_version: Option<u8>,
    /// program_number -> PMT
    pmts: HashMap<u16, Pmt>,
    pmt_versions: HashMap<u16, u8>,
}

impl PsiDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet. Returns true once the program structure is complete.
    ///
    /// Only payload-unit-start packets are inspected; PSI sections are
    /// assumed to fit in one packet. Sections that fail to parse are
    /// skipped, discovery stays best-effort.
    pub fn feed(&mut self, pkt: &PositionedPacket) -> bool {
        if pkt.packet.payload_unit_start_indicator
            && let Some(psi) = pkt.packet.get_psi_payload()
            && !psi.is_empty()
        {
            let table_id = psi[0];
            match pkt.pid() {
                PID_PAT if table_id == 0x00 => match Pat::parse(&psi) {
                    Ok(pat) => self.process_pat(pat),
                    Err(e) => debug!(pos = pkt.pos, "skipping unparsable PAT: {e}"),
                },
                pid if self.is_pmt_pid(pid) && table_id == 0x02 => match Pmt::parse(&psi) {
                    Ok(pmt) => self.process_pmt(pmt),
                    Err(e) => debug!(pos = pkt.pos, pid, "skipping unparsable PMT: {e}"),
                },
                _ => {}
            }
        }
        self.is_complete()
    }

    fn process_pat(&mut self, pat: Pat) {
        if self.pat_version != Some(pat.version_number) {
            debug!(version = pat.version_number, programs = pat.programs.len(), "new PAT");
            self.pat_version = Some(pat.version_number);
            self.pmts.clear();
            self.pmt_versions.clear();
            self.pat = Some(pat);
        }
    }

    fn process_pmt(&mut self, pmt: Pmt) {
        let is_new = self
            .pmt_versions
            .get(&pmt.program_number)
            .is_none_or(|&v| v != pmt.version_number);
        if is_new {
            debug!(
                program = pmt.program_number,
                version = pmt.version_number,
                streams = pmt.streams.len(),
                "new PMT"
            );
            self.pmt_versions.insert(pmt.program_number, pmt.version_number);
            self.pmts.insert(pmt.program_number, pmt);
        }
    }

    fn is_pmt_pid(&self, pid: u16) -> bool {
        self.pat
            .as_ref()
            .is_some_and(|pat| pat.programs.iter().any(|p| p.pmt_pid == pid))
    }

    /// True once the PAT and a PMT for every announced program are known.
    pub fn is_complete(&self) -> bool {
        match &self.pat {
            Some(pat) => {
                !pat.programs.is_empty()
                    && pat
                        .programs
                        .iter()
                        .all(|p| self.pmts.contains_key(&p.program_number))
            }
            None => false,
        }
    }

    /// Log a summary of what discovery learned.
    pub fn finish(&self) {
        let streams: usize = self.pmts.values().map(|p| p.streams.len()).sum();
        info!(
            programs = self.pmts.len(),
            streams,
            complete = self.is_complete(),
            "discovery finished"
        );
    }

    /// Finalized stream map: elementary PID -> stream kind.
    pub fn streams(&self) -> BTreeMap<u16, StreamType> {
        let mut map = BTreeMap::new();
        for pmt in self.pmts.values() {
            for stream in &pmt.streams {
                map.insert(stream.elementary_pid, stream.stream_type);
            }
        }
        map
    }

    /// Finalized clock-reference map: PCR PID -> member stream PIDs.
    pub fn pcr_pids(&self) -> BTreeMap<u16, Vec<u16>> {
        let mut map: BTreeMap<u16, Vec<u16>> = BTreeMap::new();
        for pmt in self.pmts.values() {
            let members = map.entry(pmt.pcr_pid).or_default();
            members.extend(pmt.streams.iter().map(|s| s.elementary_pid));
        }
        for members in map.values_mut() {
            members.sort_unstable();
            members.dedup();
        }
        map
    }

    /// Per-program metadata, ordered by program number.
    pub fn programs(&self) -> Vec<ProgramInfo> {
        let Some(pat) = &self.pat else {
            return Vec::new();
        };
        let mut programs: Vec<ProgramInfo> = pat
            .programs
            .iter()
            .filter_map(|p| {
                self.pmts.get(&p.program_number).map(|pmt| ProgramInfo {
                    program_number: p.program_number,
                    pmt_pid: p.pmt_pid,
                    pcr_pid: pmt.pcr_pid,
                    streams: pmt
                        .streams
                        .iter()
                        .map(|s| (s.elementary_pid, s.stream_type))
                        .collect(),
                })
            })
            .collect();
        programs.sort_by_key(|p| p.program_number);
        programs
    }

    /// Write the discovery report: one row per stream, grouped by program.
    pub fn write_report(&self, out: &OutputContext) -> Result<()> {
        let mut file = out.create("psi.csv")?;
        writeln!(file, "program, pmt_pid, pcr_pid, pid, stream_type")?;
        for prog in self.programs() {
            for (pid, stream_type) in &prog.streams {
                writeln!(
                    file,
                    "{}, {}, {}, {}, {}",
                    prog.program_number, prog.pmt_pid, prog.pcr_pid, pid, stream_type
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mpegts::{TsPacket, mpeg2_crc32};

    fn psi_packet(pid: u16, section: &[u8]) -> PositionedPacket {
        let mut data = vec![0u8; 188];
        data[0] = 0x47;
        data[1] = 0x40 | (((pid >> 8) as u8) & 0x1F);
        data[2] = (pid & 0xFF) as u8;
        data[3] = 0x10;
        data[4] = 0x00; // pointer field
        data[5..5 + section.len()].copy_from_slice(section);
        for byte in &mut data[5 + section.len()..] {
            *byte = 0xFF;
        }
        PositionedPacket {
            pos: 0,
            packet: TsPacket::parse(Bytes::from(data)).unwrap(),
        }
    }

    fn pat_section(programs: &[(u16, u16)]) -> Vec<u8> {
        let section_length = 5 + programs.len() * 4 + 4;
        let mut data = vec![
            0x00,
            0xB0 | ((section_length >> 8) as u8 & 0x0F),
            (section_length & 0xFF) as u8,
            0x00,
            0x01,
            0xC1,
            0x00,
            0x00,
        ];
        for &(num, pid) in programs {
            data.extend_from_slice(&[
                (num >> 8) as u8,
                (num & 0xFF) as u8,
                0xE0 | ((pid >> 8) as u8 & 0x1F),
                (pid & 0xFF) as u8,
            ]);
        }
        let crc = mpeg2_crc32(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data
    }

    fn pmt_section(program: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
        let section_length = 9 + streams.len() * 5 + 4;
        let mut data = vec![
            0x02,
            0xB0 | ((section_length >> 8) as u8 & 0x0F),
            (section_length & 0xFF) as u8,
            (program >> 8) as u8,
            (program & 0xFF) as u8,
            0xC1,
            0x00,
            0x00,
            0xE0 | ((pcr_pid >> 8) as u8 & 0x1F),
            (pcr_pid & 0xFF) as u8,
            0xF0,
            0x00,
        ];
        for &(stype, pid) in streams {
            data.extend_from_slice(&[
                stype,
                0xE0 | ((pid >> 8) as u8 & 0x1F),
                (pid & 0xFF) as u8,
                0xF0,
                0x00,
            ]);
        }
        let crc = mpeg2_crc32(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data
    }

    #[test]
    fn completes_after_pat_and_all_pmts() {
        let mut discovery = PsiDiscovery::new();
        assert!(!discovery.feed(&psi_packet(0, &pat_section(&[(1, 0x0100)]))));
        assert!(discovery.feed(&psi_packet(
            0x0100,
            &pmt_section(1, 0x0031, &[(0x1B, 0x0031), (0x86, 0x0033)])
        )));
        assert!(discovery.is_complete());

        let streams = discovery.streams();
        assert_eq!(streams.len(), 2);
        assert!(streams[&0x0031].is_video());
        assert!(streams[&0x0033].is_scte35());

        let pcrs = discovery.pcr_pids();
        assert_eq!(pcrs[&0x0031], vec![0x0031, 0x0033]);
    }

    #[test]
    fn incomplete_until_every_program_mapped() {
        let mut discovery = PsiDiscovery::new();
        discovery.feed(&psi_packet(0, &pat_section(&[(1, 0x0100), (2, 0x0200)])));
        discovery.feed(&psi_packet(0x0100, &pmt_section(1, 0x0031, &[(0x1B, 0x0031)])));
        assert!(!discovery.is_complete());
        discovery.feed(&psi_packet(0x0200, &pmt_section(2, 0x0041, &[(0x0F, 0x0042)])));
        assert!(discovery.is_complete());
        assert_eq!(discovery.programs().len(), 2);
    }

    #[test]
    fn skips_undersized_pat_section() {
        // section_length = 0 is unparsable; discovery must skip it and
        // accept a valid PAT afterwards
        let mut discovery = PsiDiscovery::new();
        discovery.feed(&psi_packet(0, &[0x00, 0xB0, 0x00, 0x00, 0x01, 0xC1]));
        assert!(discovery.pat.is_none());

        discovery.feed(&psi_packet(0, &pat_section(&[(1, 0x0100)])));
        assert!(discovery.feed(&psi_packet(0x0100, &pmt_section(1, 0x0031, &[(0x1B, 0x0031)]))));
    }

    #[test]
    fn pat_version_bump_resets_pmts() {
        let mut discovery = PsiDiscovery::new();
        discovery.feed(&psi_packet(0, &pat_section(&[(1, 0x0100)])));
        discovery.feed(&psi_packet(0x0100, &pmt_section(1, 0x0031, &[(0x02, 0x0031)])));
        assert!(discovery.is_complete());

        // New PAT version announces a different PMT PID
        let mut pat = pat_section(&[(1, 0x0101)]);
        pat[5] = 0xC3; // version 1
        discovery.feed(&psi_packet(0, &pat));
        assert!(!discovery.is_complete());
    }

    #[test]
    fn writes_report_rows() {
        let dir = tempfile::tempdir().unwrap();
        let out = OutputContext::new(dir.path()).unwrap();
        let mut discovery = PsiDiscovery::new();
        discovery.feed(&psi_packet(0, &pat_section(&[(1, 0x0100)])));
        discovery.feed(&psi_packet(0x0100, &pmt_section(1, 0x0031, &[(0x1B, 0x0031)])));
        discovery.write_report(&out).unwrap();

        let report = out.read_to_string("psi.csv").unwrap();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines[0], "program, pmt_pid, pcr_pid, pid, stream_type");
        assert_eq!(lines[1], "1, 256, 49, 49, MPEG-4 AVC Video");
    }
}
