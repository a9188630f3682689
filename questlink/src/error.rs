// Copyright 2025 Accenture.
//
// SPDX-License-Identifier: Apache-2.0

//! questlink Error implementation

/// questlink Error type
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The I/O thread of a fabric backend is gone
    Channel(&'static str),
    /// Socket or system error
    Io((std::io::Error, &'static str)),
    /// A value read from the fabric is not a valid protobuf message of the expected type
    Decode((prost::DecodeError, &'static str)),
    /// The command id counter reached `u32::MAX`; ids are never reused
    CommandIdExhausted,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io((e, _)) => Some(e),
            Error::Decode((e, _)) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Channel(description) => write!(f, "Channel error, {}", description),
            Error::Io((e, description)) => write!(f, "Io error: {}, {}", description, e),
            Error::Decode((e, description)) => write!(f, "Decode error: {}, {}", description, e),
            Error::CommandIdExhausted => write!(f, "Command id space exhausted"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io((e, "fabric i/o"))
    }
}
