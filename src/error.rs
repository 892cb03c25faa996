use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum WaveSynthError {
    Param(ParamError),
    Request(RequestError),
}

/// A `ParameterSet` field that breaks the render contract.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    NonPositive { field: &'static str, value: f64 },
    NotFinite { field: &'static str, value: f64 },
    OutOfUnitRange { field: &'static str, value: f64 },
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },
    UnknownVariant { kind: &'static str, index: u8 },
    EnvelopeLength { expected: usize, found: usize },
    RenderTooLong { len: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    NoChannels,
    TooManyChannels { requested: usize, available: usize },
}

impl fmt::Display for WaveSynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveSynthError::Param(e) => write!(f, "Invalid parameter: {e}"),
            WaveSynthError::Request(e) => write!(f, "Invalid render request: {e}"),
        }
    }
}

impl std::error::Error for WaveSynthError {}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::NonPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            ParamError::NotFinite { field, value } => write!(f, "{field} must be finite, got {value}"),
            ParamError::OutOfUnitRange { field, value } => {
                write!(f, "{field} must lie in [0, 1], got {value}")
            }
            ParamError::OutOfRange { field, value, min, max } => {
                write!(f, "{field} must lie in [{min}, {max}], got {value}")
            }
            ParamError::UnknownVariant { kind, index } => write!(f, "Unknown {kind} index {index}"),
            ParamError::EnvelopeLength { expected, found } => {
                write!(f, "Overtone envelope must have {expected} entries, got {found}")
            }
            ParamError::RenderTooLong { len, max } => {
                write!(f, "Render needs {len} oversampled samples, limit is {max}")
            }
        }
    }
}

impl std::error::Error for ParamError {}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::NoChannels => write!(f, "at least one output channel is required"),
            RequestError::TooManyChannels { requested, available } => {
                write!(f, "{requested} channels requested but only {available} worker slots exist")
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl From<ParamError> for WaveSynthError {
    fn from(e: ParamError) -> Self {
        WaveSynthError::Param(e)
    }
}

impl From<RequestError> for WaveSynthError {
    fn from(e: RequestError) -> Self {
        WaveSynthError::Request(e)
    }
}
