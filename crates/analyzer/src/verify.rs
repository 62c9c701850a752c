use crate::{OutputContext, Result, psi::ProgramInfo};
use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};
use tracing::info;

/// program number -> "scte_pid:video_pid" -> effective splice pts -> matched
pub type VerifyReport = BTreeMap<String, BTreeMap<String, BTreeMap<String, bool>>>;

/// Verify that splice events align with video keyframes, per program.
///
/// Runs strictly after all per-PID reports are written: splice and keyframe
/// events are read back from the report files, not from memory. For every
/// (SCTE-35 PID, video PID) pair, each effective splice timestamp
/// (pts + pts_adjustment) is flagged matched iff an identical keyframe
/// timestamp exists. Matching is exact, with no tolerance window.
///
/// Programs without a SCTE-35 PID or without a video PID produce no entry.
/// The combined result is persisted to `verified.json`.
pub fn verify(out: &OutputContext, programs: &[ProgramInfo]) -> Result<VerifyReport> {
    let mut report = VerifyReport::new();

    for prog in programs {
        let scte_pids: Vec<u16> = prog
            .streams
            .iter()
            .filter(|(_, t)| t.is_scte35())
            .map(|(&pid, _)| pid)
            .collect();
        if scte_pids.is_empty() {
            continue;
        }
        let Some(video_pid) = prog
            .streams
            .iter()
            .find(|(_, t)| t.is_video())
            .map(|(&pid, _)| pid)
        else {
            continue;
        };

        let mut pairs = BTreeMap::new();
        for scte_pid in scte_pids {
            pairs.insert(
                format!("{scte_pid}:{video_pid}"),
                verify_pair(out, scte_pid, video_pid)?,
            );
        }
        report.insert(prog.program_number.to_string(), pairs);
    }

    info!(programs = report.len(), "splice/keyframe verification done");
    let mut file = out.create("verified.json")?;
    serde_json::to_writer_pretty(&mut file, &report)?;
    writeln!(file)?;
    Ok(report)
}

/// Cross-reference one SCTE-35 report against one keyframe report.
fn verify_pair(
    out: &OutputContext,
    scte_pid: u16,
    video_pid: u16,
) -> Result<BTreeMap<String, bool>> {
    // Splice report columns: pos, command, event_id, pts, pts_adjustment
    let mut splices: BTreeMap<String, bool> = BTreeMap::new();
    for fields in read_report_rows(out, &format!("{scte_pid}.csv"))? {
        if fields.len() > 4 {
            let pts = lenient_u64(&fields[3]);
            let adjustment = lenient_u64(&fields[4]);
            splices.insert((pts + adjustment).to_string(), false);
        }
    }

    // Keyframe report columns: pos, pts, pcr
    let mut keyframes = BTreeSet::new();
    for fields in read_report_rows(out, &format!("{video_pid}-iframe.csv"))? {
        if fields.len() > 1 {
            keyframes.insert(lenient_u64(&fields[1]).to_string());
        }
    }

    for (ts, matched) in splices.iter_mut() {
        *matched = keyframes.contains(ts);
    }
    Ok(splices)
}

/// Read a CSV report back: skip the header line, split rows on `", "`.
fn read_report_rows(out: &OutputContext, name: &str) -> Result<Vec<Vec<String>>> {
    let content = out.read_to_string(name)?;
    Ok(content
        .lines()
        .skip(1)
        .map(|line| line.split(", ").map(str::to_string).collect())
        .collect())
}

/// Lenient numeric field parsing: malformed values become 0. Documented
/// behavior inherited from the report format contract, not an oversight.
fn lenient_u64(field: &str) -> u64 {
    field.trim().parse().unwrap_or(0)
}
