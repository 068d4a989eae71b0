use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::batch::BatchSummary;
use crate::error::{Result, RiskError};

/// Written next to the scored table when a report path is given.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub infile: PathBuf,
    pub outfile: PathBuf,
    pub workers: usize,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub summary: BatchSummary,
}

impl RunReport {
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| RiskError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
