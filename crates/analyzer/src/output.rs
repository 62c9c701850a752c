use crate::Result;
use std::{
    fs::{self, File},
    path::PathBuf,
};

/// Output location shared by every pipeline stage.
///
/// All report files of a run live under one directory; stages receive this
/// context explicitly instead of consulting ambient state. Failure to
/// create a file here is fatal for the run.
#[derive(Debug, Clone)]
pub struct OutputContext {
    root: PathBuf,
}

impl OutputContext {
    /// Create the context, creating the output directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(OutputContext { root })
    }

    /// Path of a report file under the output directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create (truncate) a report file.
    pub fn create(&self, name: &str) -> Result<File> {
        Ok(File::create(self.path(name))?)
    }

    /// Read a report file back, for post-run stages that consume reports
    /// produced earlier in the same run.
    pub fn read_to_string(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path(name))?)
    }
}
