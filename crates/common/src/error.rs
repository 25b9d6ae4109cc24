#![allow(clippy::uninlined_format_args)]

//! Error related data structures to be shared and used.
//!
//! This module contains the [`Error`] enum, which is used to represent
//! errors that can occur within the Dotboy domain.

use std::{
    fmt::{self, Display, Formatter},
    io,
};

/// Top level enum for error handling within Dotboy.
///
/// All of the structured variants are reachable only at the cartridge
/// boundary, once a console is running it cannot fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The provided data is too small to contain a cartridge header.
    InvalidHeader,

    /// The cartridge type code maps to a memory bank controller that
    /// is not supported.
    UnsupportedMapper(u8),

    /// The size of the provided ROM image is not consistent with a
    /// Game Boy cartridge.
    SizeMismatch,

    /// The size of the provided save RAM blob does not match the
    /// external RAM (and RTC) of the inserted cartridge.
    SaveSizeMismatch,

    /// Catch-all variant for boundary glue, carrying a detailed
    /// error message.
    CustomError(String),
}

impl Error {
    pub fn description(&self) -> String {
        match self {
            Error::InvalidHeader => String::from("Invalid cartridge header"),
            Error::UnsupportedMapper(rom_type) => {
                format!("Unsupported mapper for cartridge type 0x{:02x}", rom_type)
            }
            Error::SizeMismatch => String::from("Invalid ROM size"),
            Error::SaveSizeMismatch => String::from("Invalid save RAM size"),
            Error::CustomError(message) => String::from(message),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::CustomError(error.to_string())
    }
}

impl From<Error> for String {
    fn from(error: Error) -> Self {
        error.description()
    }
}
