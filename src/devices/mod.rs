//! Implementation of devices that can sit at the end of the serial
//! transfer (Link Cable) connection.
//!
//! These are virtual devices, mostly used for testing and to capture
//! the output of test ROMs.

pub mod buffer;
pub mod stdout;
