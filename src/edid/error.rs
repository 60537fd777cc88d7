use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("No EDID blocks supplied")]
    Empty,
    #[error("Block {block} checksum mismatch: expected {expected:02X}, found {found:02X}")]
    Checksum { block: u8, expected: u8, found: u8 },
    #[error("Invalid EDID header")]
    InvalidHeader,
    #[error("Unsupported EDID version: {0:X}")]
    UnsupportedVersion(u8),
    #[error("Invalid extension tag: {0:X}")]
    InvalidExtensionTag(u8),
    #[error("Unsupported CTA-861 revision: {0}")]
    UnsupportedRevision(u8),
    #[error("Invalid detailed timing offset: {0}")]
    InvalidTimingOffset(u8),
    #[error("Data block at offset {offset} runs past the data block collection")]
    DataBlockOverrun { offset: usize },
    #[error("Data block payload of {0} bytes exceeds 31")]
    PayloadTooLong(usize),
    #[error("Data blocks need {0} bytes, more than an extension block holds")]
    ExtensionOverflow(usize),
    #[error("No CTA-861 extension block found")]
    MissingExtension,
}
