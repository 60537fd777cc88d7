//! # HDMI receiver protocol engine
//!
//! This library implements the decision logic that sits between an HDMI receiver's
//! physical layer and the rest of a video pipeline:
//!
//! - acquiring a stable link from raw power, clock and sync signals,
//! - running the HDCP 1.x and 2.x authentication handshakes, either as a plain
//!   receiver or as a repeater forwarding credentials to an upstream transmitter,
//! - composing the EDID capability descriptor that the source reads to pick
//!   video and audio formats.
//!
//! Register access, interrupts and the upstream transmitter are supplied by the
//! caller through the traits in [`traits`]. Everything else is driven through a
//! single entry point, [`Receiver::handle`], either from a caller-owned loop or
//! from the tokio based [`runtime::Driver`].
//!
//! ## Design
//!
//! Each state machine is a tagged union whose variants carry their own counters,
//! so leaving a state discards its bookkeeping. Per-port state is owned by one
//! aggregate inside [`Receiver`] and components receive it by reference. Timing
//! thresholds live in the configuration structs under [`config`].
//!
//! ## References
//!
//! - HDMI Specification 2.0
//! - CTA-861-G, A DTV Profile for Uncompressed High Speed Digital Interfaces
//! - VESA Enhanced Extended Display Identification Data Standard, Release A, Rev. 2
//! - HDCP 1.4 and HDCP 2.3 on HDMI specifications

pub mod config;
mod dispatch;
pub mod edid;
mod error;
pub mod hdcp;
pub mod link;
mod port;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ReceiverConfig;
pub use dispatch::*;
pub use error::{Error, HardwareError};
pub use port::InputPort;

/// Tick period the default configuration assumes, in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 10;
