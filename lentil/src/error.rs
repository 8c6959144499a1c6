/// Failures that abort training-set synthesis. Functions return
/// `anyhow::Result`, so callers can `downcast_ref::<SynthError>()` to
/// tell them apart.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "failed to calibrate kernel bandwidths with {n_min} and {n_max} nearest neighbours; \
         try wider neighbour counts (--sigma-min-cells, --sigma-max-cells) \
         or fewer latent dimensions (--dims)"
    )]
    CalibrationFailed { n_min: usize, n_max: usize },

    #[error("example {example}: cell probabilities vanished in all {attempts} mixture draws")]
    DegenerateProbability { example: usize, attempts: usize },

    #[error("example {example}: synthetic bulk profile has no counts to normalize")]
    DegenerateBulk { example: usize },
}

impl SynthError {
    pub fn invalid<S: Into<String>>(msg: S) -> anyhow::Error {
        SynthError::InvalidInput(msg.into()).into()
    }
}
