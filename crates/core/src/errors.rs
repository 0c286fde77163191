use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

/// How an error is presented at the HTTP edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    ServiceUnavailable,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::ServiceUnavailable => "service unavailable",
        }
    }
}

/// Error safe to hand to a caller. The detailed `message` is for logs only.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}: {message}", .kind.label())]
pub struct InterfaceError {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::BadRequest => {
                "The request could not be processed. Check inputs and try again."
            }
            ErrorKind::ServiceUnavailable => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::BadRequest,
            Self::Integration(_) => ErrorKind::ServiceUnavailable,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let kind = self.kind();
        let (Self::Validation(message) | Self::Integration(message)) = self;
        InterfaceError { kind, message, correlation_id: correlation_id.into() }
    }
}
