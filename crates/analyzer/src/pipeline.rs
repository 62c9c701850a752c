use crate::{
    OutputContext, Result,
    pcr::{PcrTracker, write_interval_report},
    privdata::PrivDataLogger,
    psi::PsiDiscovery,
    record::RecordSet,
    verify::verify,
};
use mpegts::PacketSource;
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info, warn};

/// Options for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Stop after discovery and the discovery report; allocate no records
    /// and skip the main pass. A documented early exit, not an error path.
    pub metadata_only: bool,
    /// Write the discovery report before the completion check instead of
    /// after it.
    pub report_partial_psi: bool,
}

/// Run the full two-pass analysis over a capture file.
///
/// Pass one discovers the program structure; pass two routes every packet
/// through the per-PID records, the PCR tracker, and the private-data
/// logger, strictly in arrival order. Post-pass stages check PCR intervals,
/// flush and report every record, then verify splice/keyframe alignment by
/// reading the reports back. Any output I/O failure aborts the run.
pub fn analyze(source: &Path, out: &OutputContext, opts: &AnalyzeOptions) -> Result<()> {
    // Pass 1: discovery
    let mut discovery = PsiDiscovery::new();
    for pkt in PacketSource::open(source)? {
        if discovery.feed(&pkt?) {
            break;
        }
    }
    discovery.finish();

    if opts.report_partial_psi {
        discovery.write_report(out)?;
    }
    if !discovery.is_complete() {
        warn!("source exhausted before program structure stabilized; continuing with partial map");
    }
    if !opts.report_partial_psi {
        discovery.write_report(out)?;
    }

    if opts.metadata_only {
        info!("metadata-only run, skipping main pass");
        return Ok(());
    }

    let streams = discovery.streams();
    let mut records = RecordSet::new(&streams);
    let mut loggers: BTreeMap<u16, PrivDataLogger> = streams
        .keys()
        .map(|&pid| (pid, PrivDataLogger::new(pid)))
        .collect();
    let mut tracker = PcrTracker::new(discovery.pcr_pids());
    info!(streams = records.len(), "starting main pass");

    // Pass 2: the main pass, single-threaded, in arrival order
    for pkt in PacketSource::open(source)? {
        let pkt = pkt?;

        if let Some(logger) = loggers.get_mut(&pkt.pid()) {
            logger.log(&pkt, out)?;
        }
        tracker.observe(&pkt, &mut records);
        records.process(&pkt);
    }

    // Post-pass: all per-PID state is final from here on
    for (&pid, samples) in tracker.samples() {
        debug!(pid, samples = samples.len(), "checking PCR intervals");
        write_interval_report(out, pid, samples)?;
    }

    for logger in loggers.values_mut() {
        logger.finish()?;
    }
    records.flush_and_report(out)?;

    // Verification reads the reports just written, not in-memory state
    verify(out, &discovery.programs())?;
    Ok(())
}
