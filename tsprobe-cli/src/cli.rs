use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tsprobe", version, about = "MPEG-TS capture file analyzer")]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a capture file and write per-PID reports
    Analyze {
        /// Path to the MPEG-TS capture file
        source: PathBuf,

        /// Directory the reports are written into
        output_dir: PathBuf,

        /// Stop after program discovery and the discovery report
        #[arg(long)]
        metadata_only: bool,

        /// Write the discovery report even when discovery is incomplete
        #[arg(long)]
        report_partial_psi: bool,
    },

    /// Extract one elementary stream's payload bytes
    Extract {
        /// Path to the MPEG-TS capture file
        source: PathBuf,

        /// Directory the extracted stream is written into
        output_dir: PathBuf,

        /// PID to extract, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_pid)]
        pid: u16,
    },
}

/// Accept decimal or 0x-prefixed hex, bounded to the 13-bit PID space.
pub fn parse_pid(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    match parsed {
        Ok(pid) if pid <= 0x1FFF => Ok(pid),
        Ok(pid) => Err(format!("PID {pid} out of range (max 0x1FFF)")),
        Err(_) => Err(format!("invalid PID '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_accepts_decimal_and_hex() {
        assert_eq!(parse_pid("49").unwrap(), 49);
        assert_eq!(parse_pid("0x31").unwrap(), 0x31);
        assert_eq!(parse_pid("0X1FFF").unwrap(), 0x1FFF);
    }

    #[test]
    fn pid_rejects_out_of_range_and_garbage() {
        assert!(parse_pid("0x2000").is_err());
        assert!(parse_pid("8192").is_err());
        assert!(parse_pid("pid").is_err());
        assert!(parse_pid("").is_err());
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from(["tsprobe", "analyze", "cap.ts", "out", "--metadata-only"]);
        match args.command {
            Commands::Analyze { metadata_only, .. } => assert!(metadata_only),
            _ => panic!("expected analyze"),
        }

        let args = Args::parse_from(["tsprobe", "-v", "extract", "cap.ts", "out", "0x31"]);
        assert!(args.verbose);
        match args.command {
            Commands::Extract { pid, .. } => assert_eq!(pid, 0x31),
            _ => panic!("expected extract"),
        }
    }
}
