//! Framingham-10 and REGICOR cardiovascular risk scoring for patient tables.

pub mod batch;
pub mod error;
pub mod io;
pub mod records;
pub mod report;
pub mod score;

pub use batch::{BatchConfig, BatchDriver, FailurePolicy, ScoredTable};
pub use error::{Result, RiskError};
pub use records::{PatientRecord, Sex};
pub use score::{score, RiskScores, Score};
