//! Purpose: Error model shared by the registry, dispatcher, protocol, and ABI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Single structured failure type surfaced verbatim to the host.
//! Invariants: Kind names and numeric codes are stable once published.
//! Invariants: Every failure carries a kind; message and source are optional context.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    InvalidHandle,
    TypeMismatch,
    ArityError,
    UnrecognizedCommand,
    InvalidArgument,
    Leaked,
    Io,
}

impl ErrorKind {
    /// Name used in protocol envelopes (`errorKind`).
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "Internal",
            ErrorKind::InvalidHandle => "InvalidHandle",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ArityError => "ArityError",
            ErrorKind::UnrecognizedCommand => "UnrecognizedCommand",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Leaked => "Leaked",
            ErrorKind::Io => "Io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    handle: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            handle: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Raw token of the handle that caused the failure, when one was involved.
    pub fn handle(&self) -> Option<u64> {
        self.handle
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_handle(mut self, token: u64) -> Self {
        self.handle = Some(token);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(handle) = self.handle {
            write!(f, " (handle: {handle:#x})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::InvalidHandle => 2,
        ErrorKind::TypeMismatch => 3,
        ErrorKind::ArityError => 4,
        ErrorKind::UnrecognizedCommand => 5,
        ErrorKind::InvalidArgument => 6,
        ErrorKind::Leaked => 7,
        ErrorKind::Io => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::InvalidHandle, 2),
            (ErrorKind::TypeMismatch, 3),
            (ErrorKind::ArityError, 4),
            (ErrorKind::UnrecognizedCommand, 5),
            (ErrorKind::InvalidArgument, 6),
            (ErrorKind::Leaked, 7),
            (ErrorKind::Io, 8),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_message_and_handle() {
        let err = Error::new(ErrorKind::InvalidHandle)
            .with_message("handle not registered")
            .with_handle(0x10);
        assert_eq!(
            err.to_string(),
            "InvalidHandle: handle not registered (handle: 0x10)"
        );
    }
}
