//! End-to-end pipeline tests over a synthesized capture file.

use mpegts::mpeg2_crc32;
use std::io::Write;
use tsprobe_engine::{AnalyzeOptions, OutputContext, analyze};

const VIDEO_PID: u16 = 0x31; // 49
const AUDIO_PID: u16 = 0x32; // 50
const SCTE_PID: u16 = 0x33; // 51
const PMT_PID: u16 = 0x100; // 256

/// Build a packet carrying a PSI section (pointer field + section + stuffing).
fn psi_packet(pid: u16, cc: u8, section: &[u8]) -> [u8; 188] {
    let mut data = [0xFFu8; 188];
    data[0] = 0x47;
    data[1] = 0x40 | (((pid >> 8) as u8) & 0x1F);
    data[2] = (pid & 0xFF) as u8;
    data[3] = 0x10 | (cc & 0x0F);
    data[4] = 0x00; // pointer field
    data[5..5 + section.len()].copy_from_slice(section);
    data
}

/// Build a packet with an adaptation field and a PES payload.
fn pes_packet(pid: u16, cc: u8, stream_id: u8, pts: u64, rai: bool) -> [u8; 188] {
    let mut payload = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
    payload.extend_from_slice(&[
        0x21 | (((pts >> 30) as u8 & 0x07) << 1),
        (pts >> 22) as u8,
        (((pts >> 15) as u8 & 0x7F) << 1) | 0x01,
        (pts >> 7) as u8,
        ((pts as u8 & 0x7F) << 1) | 0x01,
    ]);
    payload.extend_from_slice(&[0xAB; 16]);

    let mut data = [0xFFu8; 188];
    data[0] = 0x47;
    data[1] = 0x40 | (((pid >> 8) as u8) & 0x1F);
    data[2] = (pid & 0xFF) as u8;
    data[3] = 0x30 | (cc & 0x0F);
    let af_length = 188 - 4 - 1 - payload.len();
    data[4] = af_length as u8;
    data[5] = if rai { 0x40 } else { 0x00 };
    data[188 - payload.len()..].copy_from_slice(&payload);
    data
}

/// Build an adaptation-field-only packet carrying a PCR.
fn pcr_packet(pid: u16, cc: u8, base: u64, extension: u16) -> [u8; 188] {
    let mut data = [0xFFu8; 188];
    data[0] = 0x47;
    data[1] = ((pid >> 8) as u8) & 0x1F;
    data[2] = (pid & 0xFF) as u8;
    data[3] = 0x20 | (cc & 0x0F);
    data[4] = 183;
    data[5] = 0x10;
    data[6] = (base >> 25) as u8;
    data[7] = (base >> 17) as u8;
    data[8] = (base >> 9) as u8;
    data[9] = (base >> 1) as u8;
    data[10] = (((base & 0x01) as u8) << 7) | 0x7E | ((extension >> 8) as u8 & 0x01);
    data[11] = (extension & 0xFF) as u8;
    data
}

/// Build an adaptation-field-only packet with transport private data.
fn privdata_packet(pid: u16, cc: u8, items: &[u8]) -> [u8; 188] {
    let mut data = [0xFFu8; 188];
    data[0] = 0x47;
    data[1] = ((pid >> 8) as u8) & 0x1F;
    data[2] = (pid & 0xFF) as u8;
    data[3] = 0x20 | (cc & 0x0F);
    data[4] = 183;
    data[5] = 0x02;
    data[6] = items.len() as u8;
    data[7..7 + items.len()].copy_from_slice(items);
    data
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

/// splice_insert section with a program splice time and a pts adjustment.
fn splice_insert_section(event_id: u32, pts: u64, pts_adjustment: u64) -> Vec<u8> {
    let mut cmd = Vec::new();
    cmd.extend_from_slice(&event_id.to_be_bytes());
    cmd.push(0x00); // not cancelled
    cmd.push(0x40); // program_splice, not immediate
    cmd.extend_from_slice(&[
        0x80 | ((pts >> 32) as u8 & 0x01),
        (pts >> 24) as u8,
        (pts >> 16) as u8,
        (pts >> 8) as u8,
        pts as u8,
    ]);
    cmd.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);

    let section_length = 11 + cmd.len() + 4;
    let mut data = vec![
        0xFC,
        0x30 | ((section_length >> 8) as u8 & 0x0F),
        (section_length & 0xFF) as u8,
        0x00,
        ((pts_adjustment >> 32) as u8) & 0x01,
        (pts_adjustment >> 24) as u8,
        (pts_adjustment >> 16) as u8,
        (pts_adjustment >> 8) as u8,
        pts_adjustment as u8,
        0x00,
        0xFF,
        0xF0 | ((cmd.len() >> 8) as u8 & 0x0F),
        (cmd.len() & 0xFF) as u8,
        0x05,
    ];
    data.extend_from_slice(&cmd);
    let crc = mpeg2_crc32(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    data
}

/// One program: H.264 video on 0x31 (also the PCR PID), AAC on 0x32,
/// SCTE-35 on 0x33. Keyframes at {1000, 2000, 4000}; splices at
/// (1000, 0) and (1500, 500).
fn build_capture() -> Vec<u8> {
    let mut capture = Vec::new();
    let mut add = |pkt: [u8; 188]| capture.extend_from_slice(&pkt);

    add(psi_packet(0, 0, &pat_section(&[(1, PMT_PID)])));
    add(psi_packet(
        PMT_PID,
        0,
        &pmt_section(1, VIDEO_PID, &[(0x1B, VIDEO_PID), (0x0F, AUDIO_PID), (0x86, SCTE_PID)]),
    ));
    add(pcr_packet(VIDEO_PID, 0, 900, 0));
    add(pes_packet(VIDEO_PID, 1, 0xE0, 1000, true));
    add(pes_packet(AUDIO_PID, 0, 0xC0, 1100, false));
    add(psi_packet(SCTE_PID, 0, &splice_insert_section(1, 1000, 0)));
    add(pcr_packet(VIDEO_PID, 2, 1000, 0));
    add(pes_packet(VIDEO_PID, 3, 0xE0, 2000, true));
    add(psi_packet(SCTE_PID, 1, &splice_insert_section(2, 1500, 500)));
    add(pes_packet(VIDEO_PID, 4, 0xE0, 4000, true));
    add(privdata_packet(VIDEO_PID, 5, &[0x07, 0x02, 0xAA, 0xBB]));
    add(psi_packet(0x99, 0, &[0xFF; 10])); // unknown PID, ignored
    capture
}

fn write_capture(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn full_run_produces_all_reports() {
    let source = write_capture(&build_capture());
    let dir = tempfile::tempdir().unwrap();
    let out = OutputContext::new(dir.path()).unwrap();

    analyze(source.path(), &out, &AnalyzeOptions::default()).unwrap();

    let psi = out.read_to_string("psi.csv").unwrap();
    assert_eq!(
        psi,
        "program, pmt_pid, pcr_pid, pid, stream_type\n\
         1, 256, 49, 49, MPEG-4 AVC Video\n\
         1, 256, 49, 50, AAC Audio\n\
         1, 256, 49, 51, SCTE-35\n"
    );

    let iframe = out.read_to_string("49-iframe.csv").unwrap();
    assert_eq!(
        iframe,
        "pos, pts, pcr\n\
         564, 1000, 270000\n\
         1316, 2000, 300000\n\
         1692, 4000, 300000\n"
    );

    let scte = out.read_to_string("51.csv").unwrap();
    assert_eq!(
        scte,
        "pos, command, event_id, pts, pts_adjustment\n\
         940, splice_insert, 1, 1000, 0\n\
         1504, splice_insert, 2, 1500, 500\n"
    );

    let audio = out.read_to_string("50.csv").unwrap();
    assert_eq!(audio, "pos, pts, pcr\n752, 1100, 270000\n");

    // Two closely spaced samples: no interval violations
    let pcr = out.read_to_string("49-pcr.csv").unwrap();
    assert_eq!(pcr, "prev_pos, pos, prev_pcr, pcr, interval_ms\n");

    let priv_log = out.read_to_string("49-tspriv.jsonl").unwrap();
    let event: serde_json::Value = serde_json::from_str(priv_log.trim()).unwrap();
    assert_eq!(event["pos"], 1880);
    assert_eq!(event["content"]["tag"], 7);
    assert_eq!(event["content"]["data"], serde_json::json!([0xAA, 0xBB]));

    let verified: serde_json::Value =
        serde_json::from_str(&out.read_to_string("verified.json").unwrap()).unwrap();
    assert_eq!(
        verified,
        serde_json::json!({ "1": { "51:49": { "1000": true, "2000": true } } })
    );
}

#[test]
fn reruns_are_byte_identical() {
    let source = write_capture(&build_capture());

    let dir_a = tempfile::tempdir().unwrap();
    let out_a = OutputContext::new(dir_a.path()).unwrap();
    analyze(source.path(), &out_a, &AnalyzeOptions::default()).unwrap();

    let dir_b = tempfile::tempdir().unwrap();
    let out_b = OutputContext::new(dir_b.path()).unwrap();
    analyze(source.path(), &out_b, &AnalyzeOptions::default()).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir_a.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert!(!names.is_empty());
    for name in names {
        let a = std::fs::read(dir_a.path().join(&name)).unwrap();
        let b = std::fs::read(dir_b.path().join(&name)).unwrap();
        assert_eq!(a, b, "report {name} differs between runs");
    }
}

#[test]
fn metadata_only_stops_after_discovery() {
    let source = write_capture(&build_capture());
    let dir = tempfile::tempdir().unwrap();
    let out = OutputContext::new(dir.path()).unwrap();

    let opts = AnalyzeOptions {
        metadata_only: true,
        ..Default::default()
    };
    analyze(source.path(), &out, &opts).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["psi.csv".to_string()]);
}

#[test]
fn partial_discovery_is_best_effort() {
    // PAT announces a program whose PMT never arrives
    let mut capture = Vec::new();
    capture.extend_from_slice(&psi_packet(0, 0, &pat_section(&[(1, PMT_PID)])));
    capture.extend_from_slice(&pes_packet(VIDEO_PID, 0, 0xE0, 1000, true));
    let source = write_capture(&capture);

    let dir = tempfile::tempdir().unwrap();
    let out = OutputContext::new(dir.path()).unwrap();
    let opts = AnalyzeOptions {
        report_partial_psi: true,
        ..Default::default()
    };
    analyze(source.path(), &out, &opts).unwrap();

    // Header-only discovery report, empty verification result
    assert_eq!(
        out.read_to_string("psi.csv").unwrap(),
        "program, pmt_pid, pcr_pid, pid, stream_type\n"
    );
    let verified: serde_json::Value =
        serde_json::from_str(&out.read_to_string("verified.json").unwrap()).unwrap();
    assert_eq!(verified, serde_json::json!({}));
}
