use std::ops::Range;

use log::{debug, info, warn};
use polars::prelude::*;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;

use crate::error::{Result, RiskError};
use crate::records::{extract_rows, RawRow, RowRecord};
use crate::score::{score, RiskScores, Score};

pub const DEFAULT_WORKERS: usize = 10;
pub const FRAMINGHAM_COLUMN: &str = "framingham";
pub const REGICOR_COLUMN: &str = "regicor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Malformed rows pass through unscored and are listed in the summary.
    #[default]
    Isolate,
    /// The first malformed row fails the whole batch.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub workers: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            workers: DEFAULT_WORKERS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub row: String,
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowOutcome {
    Scored(RiskScores),
    Excluded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub scored: usize,
    pub excluded: usize,
    pub failed: Vec<RowFailure>,
    pub unknown_sex: usize,
}

#[derive(Debug, Clone)]
pub struct ScoredTable {
    pub frame: DataFrame,
    pub summary: BatchSummary,
}

/// Contiguous row ranges for `parts` workers. Sizes differ by at most one and
/// the leading ranges take the remainder, so some ranges may be empty.
pub fn partition_bounds(len: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let base = len / parts;
    let extra = len % parts;

    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

pub struct BatchDriver {
    config: BatchConfig,
    pool: rayon::ThreadPool,
}

impl BatchDriver {
    pub fn new(config: BatchConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(RiskError::InvalidWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("risk-worker-{i}"))
            .build()?;
        Ok(BatchDriver { config, pool })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /* Score every row of `df`. The first column is the row key; it is only read to label
    failures, the frame itself is returned untouched apart from the two appended columns. */
    pub fn score_table(&self, mut df: DataFrame) -> Result<ScoredTable> {
        let index = df
            .get_column_names()
            .first()
            .map(|name| name.to_string())
            .ok_or(RiskError::MissingIndex)?;

        let bounds = partition_bounds(df.height(), self.config.workers);
        info!(
            "Scoring {} rows with {} workers",
            df.height(),
            self.config.workers
        );

        let partitions: Vec<DataFrame> = bounds
            .iter()
            .map(|r| df.slice(r.start as i64, r.len()))
            .collect();

        // collect keeps partition order regardless of completion order
        let scored: Vec<Vec<(RawRow, RowOutcome)>> = self.pool.install(|| {
            partitions
                .par_iter()
                .enumerate()
                .map(|(i, part)| score_partition(i, part, &index))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut summary = BatchSummary {
            rows: df.height(),
            ..BatchSummary::default()
        };
        let mut framingham = Vec::with_capacity(df.height());
        let mut regicor = Vec::with_capacity(df.height());

        for (row, outcome) in scored.into_iter().flatten() {
            if row.unknown_sex {
                summary.unknown_sex += 1;
            }
            match outcome {
                RowOutcome::Scored(s) => {
                    summary.scored += 1;
                    framingham.push(Some(s.framingham));
                    regicor.push(Some(s.regicor));
                }
                RowOutcome::Excluded => {
                    summary.excluded += 1;
                    framingham.push(None);
                    regicor.push(None);
                }
                RowOutcome::Failed => {
                    let field = match row.record {
                        RowRecord::Missing(field) => field.to_string(),
                        _ => String::new(),
                    };
                    if self.config.failure_policy == FailurePolicy::Abort {
                        return Err(RiskError::MalformedInput {
                            row: row.label,
                            field,
                        });
                    }
                    warn!("Row {}: field {:?} missing or not numeric", row.label, field);
                    summary.failed.push(RowFailure {
                        row: row.label,
                        field,
                    });
                    framingham.push(None);
                    regicor.push(None);
                }
            }
        }

        // scores from an earlier run are replaced and moved to the end
        for column in [FRAMINGHAM_COLUMN, REGICOR_COLUMN] {
            if df.get_column_names().contains(&column) {
                df.drop_in_place(column)?;
            }
        }
        df.with_column(Series::new(FRAMINGHAM_COLUMN, framingham))?;
        df.with_column(Series::new(REGICOR_COLUMN, regicor))?;

        info!(
            "Scored {} rows, {} outside the age range, {} failed",
            summary.scored,
            summary.excluded,
            summary.failed.len()
        );
        if summary.unknown_sex > 0 {
            warn!(
                "{} rows carry an unrecognised sex marker and were scored as female",
                summary.unknown_sex
            );
        }

        Ok(ScoredTable { frame: df, summary })
    }
}

fn score_partition(
    worker: usize,
    part: &DataFrame,
    index: &str,
) -> Result<Vec<(RawRow, RowOutcome)>> {
    debug!("Worker {} scoring {} rows", worker, part.height());
    let rows = extract_rows(part, index)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let outcome = match &row.record {
                RowRecord::Complete(record) => match score(record) {
                    Score::Scored(s) => RowOutcome::Scored(s),
                    Score::Excluded => RowOutcome::Excluded,
                },
                RowRecord::AgeOutOfRange => RowOutcome::Excluded,
                RowRecord::Missing(_) => RowOutcome::Failed,
            };
            (row, outcome)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_like_array_split() {
        let bounds = partition_bounds(11, 4);
        assert_eq!(bounds, vec![0..3, 3..6, 6..9, 9..11]);

        let bounds = partition_bounds(3, 5);
        assert_eq!(bounds, vec![0..1, 1..2, 2..3, 3..3, 3..3]);

        assert_eq!(partition_bounds(0, 2), vec![0..0, 0..0]);
        assert!(partition_bounds(4, 0).is_empty());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = BatchConfig {
            workers: 0,
            ..BatchConfig::default()
        };
        assert!(matches!(
            BatchDriver::new(config),
            Err(RiskError::InvalidWorkers)
        ));
    }

    #[test]
    fn default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);
    }
}
