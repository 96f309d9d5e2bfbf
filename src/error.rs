use thiserror::Error;

/// Programmer errors rejected when a component is constructed.
///
/// Malformed market data never ends up here: it is dropped (and counted) or
/// represented as NaN in indicator output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid {component} parameter: {reason}")]
    InvalidParameter {
        component: &'static str,
        reason: String,
    },

    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("unknown timeframe '{0}'")]
    UnknownTimeframe(String),

    #[error("indicator state is {found}, expected {expected}")]
    StateMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl PipelineError {
    pub fn invalid(component: &'static str, reason: impl Into<String>) -> Self {
        PipelineError::InvalidParameter {
            component,
            reason: reason.into(),
        }
    }
}
