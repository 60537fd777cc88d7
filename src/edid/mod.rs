//! EDID parsing and composition.
//!
//! A receiver that forwards video to a display has to tell the source what
//! it can accept. That answer is the intersection of what this device can
//! process and what the attached display (the sink) can show. The
//! [`EdidComposer`] builds it from the sink's EDID and a local ceiling, then
//! produces one image per input port, each with its own physical address.
//!
//! Only the base block and the first CTA-861 extension are handled. Any
//! validation failure on the sink's EDID makes the composer fall back to the
//! built-in descriptor from [`defaults`].

mod block;
mod capability;
mod checksum;
mod composer;
mod config;
pub mod defaults;
mod descriptor;
mod error;
mod physical_address;
mod timing;
mod yuv420;

pub use block::{
    DataBlock, DataBlocks, HdmiForumVsdb, HdmiVsdb, HdrStaticMetadata, RawDataBlock,
    ShortAudioDescriptor, ShortVideoDescriptor,
};
pub use capability::{CapabilitySet, CapabilityStore, VicSet};
pub use checksum::{block_checksum, finalize_checksum, is_block_valid};
pub use composer::{ComposedEdid, EdidComposer};
pub use config::{CompositionMode, EdidConfig};
pub use descriptor::{BaseBlock, CapabilityDescriptor, CtaExtension, EdidImage};
pub use error::Error;
pub use physical_address::PhysicalAddress;
pub use timing::DetailedTiming;

/// Size of one EDID block.
pub const BLOCK_SIZE: usize = 128;
/// Extension blocks inspected when looking for the CTA-861 extension.
pub const MAX_EXTENSIONS: usize = 3;
