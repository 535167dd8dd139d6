use thiserror::Error;

/// Failure to turn an inbound generic value into a domain type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("type mismatch for {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        found: String,
    },
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("unknown command tag: {0}")]
    UnknownCommandTag(String),
    #[error("invalid enum value {value} for {field}")]
    InvalidEnumValue { field: &'static str, value: String },
    #[error("invalid geojson: {0}")]
    InvalidGeoJson(String),
}

impl DecodeError {
    pub fn mismatch(
        context: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        DecodeError::TypeMismatch {
            context: context.into(),
            expected,
            found: found.into(),
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        DecodeError::MissingArgument(key.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::TypeMismatch { .. } => "TYPE_MISMATCH",
            DecodeError::MissingArgument(_) => "MISSING_ARGUMENT",
            DecodeError::UnknownCommandTag(_) => "UNKNOWN_COMMAND_TAG",
            DecodeError::InvalidEnumValue { .. } => "INVALID_ENUM_VALUE",
            DecodeError::InvalidGeoJson(_) => "INVALID_GEOJSON",
        }
    }
}

impl From<map_schema::GeoJsonError> for DecodeError {
    fn from(err: map_schema::GeoJsonError) -> Self {
        DecodeError::InvalidGeoJson(err.to_string())
    }
}

/// Failure reported by the map engine, passed through without reinterpretation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct EngineFailure {
    pub code: String,
    pub message: String,
}

impl EngineFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Terminal outcome of a single command. None of these are fatal to the
/// controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("method not implemented: {0}")]
    NotImplemented(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("engine error {0}")]
    Engine(EngineFailure),
    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),
    #[error("reply dropped before the command completed")]
    ReplyDropped,
}

impl CommandError {
    pub fn precondition(message: impl Into<String>) -> Self {
        CommandError::PreconditionNotMet(message.into())
    }

    /// Stable code carried on the wire next to the message.
    pub fn code(&self) -> &str {
        match self {
            CommandError::NotImplemented(_) => "NOT_IMPLEMENTED",
            CommandError::Decode(err) => err.code(),
            CommandError::Engine(failure) => failure.code.as_str(),
            CommandError::PreconditionNotMet(_) => "PRECONDITION_NOT_MET",
            CommandError::ReplyDropped => "REPLY_DROPPED",
        }
    }
}

impl From<EngineFailure> for CommandError {
    fn from(failure: EngineFailure) -> Self {
        CommandError::Engine(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_codes_pass_through_verbatim() {
        let err = CommandError::from(EngineFailure::new("SOURCE_EXISTS", "source pts exists"));
        assert_eq!(err.code(), "SOURCE_EXISTS");
        assert_eq!(err.to_string(), "engine error SOURCE_EXISTS: source pts exists");
    }

    #[test]
    fn decode_errors_keep_their_own_code() {
        let err = CommandError::from(DecodeError::missing("sourceId"));
        assert_eq!(err.code(), "MISSING_ARGUMENT");
        assert_eq!(err.to_string(), "missing argument: sourceId");
    }
}
