#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::std;
use std::{fmt, result};

pub type Result<T> = result::Result<T, Error>;

/// Failure codes reported to the host in a [Failure](crate::Failure) message.
///
/// The numeric values are part of the wire protocol and must not change.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum FailureCode {
    /// Malformed transport, unknown message, wrong direction/channel,
    /// schema decode failure, or permission mismatch
    UnexpectedMessage = 1,
    /// A gesture was required but the host never unmuted the button
    ButtonExpected = 2,
    /// Malformed message content
    SyntaxError = 3,
    /// The user (or the host, via Cancel/Initialize) declined the action
    ActionCancelled = 4,
    /// A PIN was required but not provided
    PinExpected = 5,
    /// PIN entry was cancelled
    PinCancelled = 6,
    /// The provided PIN did not match
    PinInvalid = 7,
    /// Signature recovery or comparison failed
    InvalidSignature = 8,
    /// The device holds no seed/state yet
    NotInitialized = 11,
    /// Everything else, including typed-data session aborts
    Other = 99,
}

impl From<u32> for FailureCode {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::UnexpectedMessage,
            2 => Self::ButtonExpected,
            3 => Self::SyntaxError,
            4 => Self::ActionCancelled,
            5 => Self::PinExpected,
            6 => Self::PinCancelled,
            7 => Self::PinInvalid,
            8 => Self::InvalidSignature,
            11 => Self::NotInitialized,
            _ => Self::Other,
        }
    }
}

impl From<FailureCode> for u32 {
    fn from(code: FailureCode) -> Self {
        code as u32
    }
}

impl From<FailureCode> for &'static str {
    fn from(code: FailureCode) -> Self {
        match code {
            FailureCode::UnexpectedMessage => "unexpected message",
            FailureCode::ButtonExpected => "button expected",
            FailureCode::SyntaxError => "syntax error",
            FailureCode::ActionCancelled => "action cancelled",
            FailureCode::PinExpected => "PIN expected",
            FailureCode::PinCancelled => "PIN cancelled",
            FailureCode::PinInvalid => "PIN invalid",
            FailureCode::InvalidSignature => "invalid signature",
            FailureCode::NotInitialized => "not initialized",
            FailureCode::Other => "other",
        }
    }
}

impl From<&FailureCode> for &'static str {
    fn from(code: &FailureCode) -> Self {
        (*code).into()
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(self))
    }
}

/// Basic error type for the protocol core.
///
/// Every error carries a [FailureCode] so it can be reported to the host
/// as a `Failure` message without translation.
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    code: FailureCode,
    message: String,
}

impl Error {
    /// Create an Error with an explicit failure code.
    pub fn new<S>(code: FailureCode, message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a generic failure Error.
    pub fn failure<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(FailureCode::Other, message)
    }

    /// Create an unexpected-message Error.
    pub fn unexpected<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(FailureCode::UnexpectedMessage, message)
    }

    /// Create a syntax Error.
    pub fn syntax<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(FailureCode::SyntaxError, message)
    }

    /// Create an action-cancelled Error.
    pub fn cancelled() -> Self {
        Self::new(FailureCode::ActionCancelled, "Action cancelled by user")
    }

    /// Get the failure code.
    pub fn code(&self) -> FailureCode {
        self.code
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, message: {}", self.code, self.message)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::syntax(format!("Utf8 error: {err}"))
    }
}
