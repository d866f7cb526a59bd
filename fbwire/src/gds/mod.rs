//! GDS remote protocol: constants, responses, message formats and info
//! buffer parsing.
use std::fmt;

pub mod blr;
pub mod codes;
pub mod info;
pub(crate) mod response;

pub use response::{GenericResponse, Response};

/// A malformed or unexpected frame on the wire.
pub enum ProtocolError {
    /// The server sent an operation the current exchange cannot accept.
    UnexpectedOperation(i32),
    /// No protocol offered during connect was accepted.
    ConnectionRejected,
    /// The server accepted a protocol version this client does not speak.
    UnsupportedVersion(i32),
    /// A frame failed to decode.
    Malformed(&'static str),
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedOperation(op) => write!(f, "unexpected operation code {op}"),
            Self::ConnectionRejected => f.write_str("connection rejected by remote interface"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported protocol version {v}"),
            Self::Malformed(what) => write!(f, "malformed frame: {what}"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error reported by the server through a status vector.
///
/// Keeps the raw argument sequence so callers can inspect secondary codes,
/// the SQLSTATE and interpreted message fragments.
pub struct ServerError {
    args: Vec<Arg>,
}

#[derive(Debug, PartialEq)]
enum Arg {
    Code(i32),
    Warning(i32),
    Number(i32),
    Text(String),
    SqlState(String),
}

impl ServerError {
    pub(crate) fn new() -> Self {
        Self { args: Vec::new() }
    }

    /// A client raised condition expressed with a status code, used when
    /// the failure happens before the server can report one.
    pub fn brief(code: i32, message: impl Into<String>) -> Self {
        Self {
            args: vec![Arg::Code(code), Arg::Text(message.into())],
        }
    }

    pub(crate) fn push_number(&mut self, tag: i32, value: i32) {
        self.args.push(match tag {
            codes::ISC_ARG_WARNING => Arg::Warning(value),
            codes::ISC_ARG_NUMBER => Arg::Number(value),
            _ => Arg::Code(value),
        });
    }

    pub(crate) fn push_string(&mut self, tag: i32, value: String) {
        self.args.push(match tag {
            codes::ISC_ARG_SQL_STATE => Arg::SqlState(value),
            _ => Arg::Text(value),
        });
    }

    /// The primary status code.
    pub fn code(&self) -> i32 {
        self.args
            .iter()
            .find_map(|a| match a {
                Arg::Code(c) | Arg::Warning(c) => Some(*c),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Every status code in the vector, in order.
    pub fn codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.args.iter().filter_map(|a| match a {
            Arg::Code(c) | Arg::Warning(c) => Some(*c),
            _ => None,
        })
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            Arg::SqlState(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.args.first(), Some(Arg::Warning(_)))
    }
}

impl std::error::Error for ServerError { }

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for arg in &self.args {
            if let Arg::Text(text) = arg {
                write!(f, "{sep}{text}")?;
                sep = "\n";
            }
        }
        if sep.is_empty() {
            write!(f, "error code {}", self.code())?;
        }
        if let Some(state) = self.sql_state() {
            write!(f, " (SQLSTATE {state})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_code_wins() {
        let mut err = ServerError::new();
        err.push_number(codes::ISC_ARG_GDS, codes::ISC_ARITH_EXCEPT);
        err.push_string(codes::ISC_ARG_STRING, "arithmetic exception".into());
        err.push_number(codes::ISC_ARG_GDS, codes::ISC_STRING_TRUNCATION);
        assert_eq!(err.code(), codes::ISC_ARITH_EXCEPT);
        assert_eq!(err.codes().count(), 2);
        assert!(!err.is_warning());
    }

    #[test]
    fn warning_vector() {
        let mut err = ServerError::new();
        err.push_number(codes::ISC_ARG_WARNING, 335544808);
        assert!(err.is_warning());
    }

    #[test]
    fn display_joins_text() {
        let mut err = ServerError::new();
        err.push_number(codes::ISC_ARG_GDS, 1);
        err.push_string(codes::ISC_ARG_INTERPRETED, "one".into());
        err.push_string(codes::ISC_ARG_STRING, "two".into());
        err.push_string(codes::ISC_ARG_SQL_STATE, "42000".into());
        assert_eq!(err.to_string(), "one\ntwo (SQLSTATE 42000)");
    }
}
