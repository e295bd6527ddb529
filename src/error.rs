use thiserror::Error;

/// Failures of a position statistics query.
///
/// Absent history (no deposits, no withdrawals, zero liquidity) is not an
/// error; it surfaces as `None` fields on the statistics record.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("upstream request failed: {0:#}")]
    Upstream(#[from] anyhow::Error),

    #[error("inconsistent input: {0}")]
    InconsistentInput(String),

    #[error("no pool price resolved for block {0}")]
    MissingBlockPrice(u64),
}

pub type Result<T> = std::result::Result<T, StatsError>;
