use super::{BLOCK_SIZE, Error};

/// Checksum byte for a 128 byte block: the value that makes all bytes sum to
/// zero modulo 256. Only the first 127 bytes are summed.
#[must_use]
pub fn block_checksum(block: &[u8]) -> u8 {
    block
        .iter()
        .take(BLOCK_SIZE - 1)
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

/// Whether the block's bytes sum to zero.
#[must_use]
pub fn is_block_valid(block: &[u8]) -> bool {
    block.len() == BLOCK_SIZE && block.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte)) == 0
}

/// Store the checksum in the last byte of the block.
pub fn finalize_checksum(block: &mut [u8; BLOCK_SIZE]) {
    block[BLOCK_SIZE - 1] = block_checksum(block);
}

pub(crate) fn verify(index: u8, block: &[u8; BLOCK_SIZE]) -> Result<(), Error> {
    let expected = block_checksum(block);
    let found = block[BLOCK_SIZE - 1];
    if expected == found {
        Ok(())
    } else {
        Err(Error::Checksum {
            block: index,
            expected,
            found,
        })
    }
}
