use thiserror::Error;

/// Malformed declarative input, detected before anything moves.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no edge to calibrate")]
    EmptyChain,
    #[error("edge {index} has an empty frame name")]
    EmptyFrameName { index: usize },
    #[error("edge {index} calibrates a frame onto itself ({frame})")]
    SelfLoop { index: usize, frame: String },
    #[error("calibration order has {got} entries, expected {expected}")]
    OrderLength { got: usize, expected: usize },
    #[error("invalid index {value} in calibration order (valid: 1..={edges})")]
    OrderIndex { value: usize, edges: usize },
    #[error("index {value} appears more than once in calibration order")]
    OrderDuplicate { value: usize },
    #[error("{axis} range needs (start, step, stop) triples, got {len} values")]
    RangeShape { axis: String, len: usize },
    #[error("{axis} range can never reach its stop value (start {start}, step {step}, stop {stop})")]
    RangeDirection {
        axis: String,
        start: f64,
        step: f64,
        stop: f64,
    },
    #[error("{axis} range yields {count} samples, at most {max} are allowed")]
    TooManySamples { axis: String, count: usize, max: usize },
    #[error("pose space yields more than {max} configurations")]
    TooManyConfigurations { max: usize },
    #[error("configuration list of {len} values is not a multiple of {per_config} values per configuration")]
    ListShape { len: usize, per_config: usize },
    #[error("need at least {min} configurations, got {got}")]
    TooFewConfigurations { got: usize, min: usize },
    #[error("configuration space is empty")]
    EmptyConfigurationSpace,
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
