use crate::{OutputContext, Result};
use mpegts::PacketSource;
use std::{
    io::{BufWriter, Write},
    path::Path,
};
use tracing::info;

/// Extract one elementary stream: append the raw payload bytes of every
/// packet matching `pid`, in arrival order, to `<pid>.es`.
///
/// Independent of the analysis pipeline: single pass, no time correlation,
/// no record state.
pub fn extract(source: &Path, out: &OutputContext, pid: u16) -> Result<()> {
    let file = out.create(&format!("{pid}.es"))?;
    let mut writer = BufWriter::new(file);

    let mut packets = 0u64;
    let mut bytes = 0u64;
    for pkt in PacketSource::open(source)? {
        let pkt = pkt?;
        if pkt.pid() == pid
            && let Some(payload) = &pkt.packet.payload
        {
            writer.write_all(payload)?;
            packets += 1;
            bytes += payload.len() as u64;
        }
    }
    writer.flush()?;

    info!(pid, packets, bytes, "extraction done");
    Ok(())
}
