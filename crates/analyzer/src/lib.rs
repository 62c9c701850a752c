//! Two-pass MPEG-TS capture analysis pipeline.
//!
//! A first pass over the capture discovers the program/stream structure
//! (PAT/PMT); the second pass routes every packet through per-PID record
//! accumulators, correlates them with the program clock reference, and logs
//! adaptation-field private data. After the main pass, PCR intervals are
//! checked and SCTE-35 splice points are verified against video keyframes
//! by reading the just-written reports back from disk.

pub mod error;
pub mod extract;
pub mod output;
pub mod pcr;
pub mod pipeline;
pub mod privdata;
pub mod psi;
pub mod record;
pub mod verify;

pub use error::{AnalyzerError, Result};
pub use extract::extract;
pub use output::OutputContext;
pub use pcr::{PcrSample, PcrTracker, PcrViolation, check_intervals};
pub use pipeline::{AnalyzeOptions, analyze};
pub use privdata::{PrivDataEvent, PrivDataLogger};
pub use psi::{ProgramInfo, PsiDiscovery};
pub use record::{RecordSet, StreamRecord};
pub use verify::{VerifyReport, verify};
