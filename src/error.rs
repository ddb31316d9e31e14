use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("feedback window must hold at least one access")]
    ZeroWindow,
    #[error("threshold step must be non-zero")]
    ZeroStep,
    #[error("threshold bounds [{min}, {max}] are invalid")]
    InvalidBounds { min: u32, max: u32 },
    #[error("warm-up miss rate {0} is outside [0, 1]")]
    InvalidMissRate(f64),
    #[error("shared feedback already exists with different parameters")]
    SharedParamsConflict,
    #[error("malformed policy config: {0}")]
    Json(#[from] serde_json::Error),
}
