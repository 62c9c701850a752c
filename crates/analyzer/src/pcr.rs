use crate::{OutputContext, Result, record::RecordSet};
use mpegts::PositionedPacket;
use std::{collections::BTreeMap, io::Write};
use tracing::debug;

/// Maximum expected spacing between consecutive PCR samples: 100 ms of
/// 27 MHz ticks (ISO 13818-1 PCR cadence).
pub const MAX_PCR_INTERVAL_27MHZ: u64 = 2_700_000;

/// One observed clock sample: byte position and 27 MHz PCR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrSample {
    pub pos: u64,
    pub pcr: u64,
}

/// Tracks clock samples per PCR PID and fans time notifications out to the
/// records of that PID's program members.
#[derive(Debug, Default)]
pub struct PcrTracker {
    /// PCR PID -> samples in arrival order (strictly increasing position)
    samples: BTreeMap<u16, Vec<PcrSample>>,
    /// PCR PID -> member stream PIDs, from discovery
    members: BTreeMap<u16, Vec<u16>>,
}

impl PcrTracker {
    pub fn new(members: BTreeMap<u16, Vec<u16>>) -> Self {
        let samples = members.keys().map(|&pid| (pid, Vec::new())).collect();
        PcrTracker { samples, members }
    }

    /// Inspect one packet: if it carries a PCR on a tracked PID, append the
    /// sample and notify every member record. PCR PIDs with no members
    /// still accumulate samples but notify nobody.
    pub fn observe(&mut self, pkt: &PositionedPacket, records: &mut RecordSet) {
        let Some(pcr) = pkt.pcr() else {
            return;
        };
        let Some(samples) = self.samples.get_mut(&pkt.pid()) else {
            return;
        };
        let pcr = pcr.as_27mhz();
        samples.push(PcrSample { pos: pkt.pos, pcr });

        if let Some(members) = self.members.get(&pkt.pid()) {
            for &pid in members {
                records.notify_time(pid, pcr, pkt.pos);
            }
        }
    }

    /// Finalized sample lists, read-only after the main pass.
    pub fn samples(&self) -> &BTreeMap<u16, Vec<PcrSample>> {
        &self.samples
    }
}

/// A pair of consecutive samples whose spacing exceeds the expected bound.
#[derive(Debug, Clone, Copy)]
pub struct PcrViolation {
    pub prev: PcrSample,
    pub next: PcrSample,
    pub interval_ms: f64,
}

/// Check inter-sample spacing over a finalized sample list.
///
/// A pair violates when its PCR delta exceeds 100 ms, or when its byte
/// distance exceeds what 100 ms implies at the capture's nominal byte rate
/// (derived from the first and last sample). Pairs where the clock runs
/// backwards are skipped; wraparound is not handled.
pub fn check_intervals(samples: &[PcrSample]) -> Vec<PcrViolation> {
    let mut violations = Vec::new();
    if samples.len() < 2 {
        return violations;
    }

    let first = samples[0];
    let last = samples[samples.len() - 1];
    let total_pcr = last.pcr.saturating_sub(first.pcr);
    let total_pos = last.pos.saturating_sub(first.pos);

    for pair in samples.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.pcr < prev.pcr {
            debug!(prev = prev.pcr, next = next.pcr, "skipping backwards PCR pair");
            continue;
        }
        let pcr_delta = next.pcr - prev.pcr;
        let pos_delta = next.pos - prev.pos;

        let time_violation = pcr_delta > MAX_PCR_INTERVAL_27MHZ;
        // pos_delta / nominal_rate > 100ms, rearranged to integer math
        let pos_violation = total_pcr > 0
            && (pos_delta as u128) * (total_pcr as u128)
                > (total_pos as u128) * (MAX_PCR_INTERVAL_27MHZ as u128);

        if time_violation || pos_violation {
            violations.push(PcrViolation {
                prev,
                next,
                interval_ms: pcr_delta as f64 / 27_000.0,
            });
        }
    }
    violations
}

/// Write the interval report for one PCR PID: one row per violating pair.
pub fn write_interval_report(out: &OutputContext, pid: u16, samples: &[PcrSample]) -> Result<()> {
    let violations = check_intervals(samples);
    let mut file = out.create(&format!("{pid}-pcr.csv"))?;
    writeln!(file, "prev_pos, pos, prev_pcr, pcr, interval_ms")?;
    for v in &violations {
        writeln!(
            file,
            "{}, {}, {}, {}, {:.3}",
            v.prev.pos, v.next.pos, v.prev.pcr, v.next.pcr, v.interval_ms
        )?;
    }
    Ok(())
}
