use thiserror::Error;

/// A single structural violation found while validating resolved parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Why an injection request was rejected.
///
/// Every variant is terminal for the request: the pending record is deleted
/// and any synchronous waiter receives an empty tracking token. None of these
/// are retried by the controller.
#[derive(Error, Debug)]
pub enum InjectionError {
    /// A node or attribute could not be resolved from the topology graph.
    #[error("{0}")]
    Resolution(String),

    /// An IP or MAC string could not be parsed into a concrete address.
    #[error("{0}")]
    MalformedAddress(String),

    /// One or more structural rules failed on the assembled parameter set.
    #[error("All the params were not set properly: {}", join_fields(.0))]
    ValidationFailed(Vec<FieldError>),

    /// The agent was unreachable or the request timed out.
    #[error("Unable to send message to agent {host}: {reason}")]
    Transport { host: String, reason: String },

    /// The agent replied with a non-success status.
    #[error("{0}")]
    Remote(String),

    /// The agent's reply could not be decoded.
    #[error("Failed to parse response from {host}: {reason}")]
    Protocol { host: String, reason: String },
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
