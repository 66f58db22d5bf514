//! Superblock: block 0, the volume geometry header.
//!
//! Layout (little-endian): 8-byte signature, total block count (u16),
//! root-directory block index (u16), data-region start index (u16), data
//! block count (u16), FAT block count (u8), zero padding to the block size.

use crate::device::Block;
use crate::error::FsError;
use crate::fat::ENTRIES_PER_BLOCK;

/// On-disk signature, inherited from the ECS150FS image format.
pub(crate) const SIGNATURE: [u8; 8] = *b"ECS150FS";

/// Parsed geometry header. Block indices are absolute device indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    total_blocks: u16,
    root_dir_block: u16,
    data_start: u16,
    data_blocks: u16,
    fat_blocks: u8,
}

impl SuperBlock {
    /// Parse and validate block 0 against the device it came from.
    pub fn parse(block: &Block, device_blocks: u32) -> Result<Self, FsError> {
        if block[..8] != SIGNATURE {
            return Err(FsError::BadSignature);
        }
        let sb = Self {
            total_blocks: u16::from_le_bytes([block[8], block[9]]),
            root_dir_block: u16::from_le_bytes([block[10], block[11]]),
            data_start: u16::from_le_bytes([block[12], block[13]]),
            data_blocks: u16::from_le_bytes([block[14], block[15]]),
            fat_blocks: block[16],
        };
        if sb.total_blocks as u32 != device_blocks {
            return Err(FsError::BlockCountMismatch {
                stored: sb.total_blocks as u32,
                device: device_blocks,
            });
        }
        // Superblock + FAT region + root directory + data region must tile
        // the device exactly, in that order, and the FAT region must hold
        // one entry per data block.
        let sum = 2 + sb.fat_blocks as u32 + sb.data_blocks as u32;
        if sum != sb.total_blocks as u32
            || sb.data_blocks == 0
            || sb.fat_blocks == 0
            || sb.root_dir_block as u32 != 1 + sb.fat_blocks as u32
            || sb.data_start as u32 != 2 + sb.fat_blocks as u32
            || (sb.fat_blocks as usize) * ENTRIES_PER_BLOCK < sb.data_blocks as usize
        {
            return Err(FsError::BadGeometry);
        }
        Ok(sb)
    }

    /// Serialize into block 0.
    pub fn encode(&self, block: &mut Block) {
        block.fill(0);
        block[..8].copy_from_slice(&SIGNATURE);
        block[8..10].copy_from_slice(&self.total_blocks.to_le_bytes());
        block[10..12].copy_from_slice(&self.root_dir_block.to_le_bytes());
        block[12..14].copy_from_slice(&self.data_start.to_le_bytes());
        block[14..16].copy_from_slice(&self.data_blocks.to_le_bytes());
        block[16] = self.fat_blocks;
    }

    /// Geometry for a freshly formatted device: the smallest FAT region
    /// whose entries cover every remaining block. The device needs room for
    /// the superblock, one FAT block, the root directory and at least one
    /// data block, and must stay within u16 addressing.
    pub fn for_device(device_blocks: u32) -> Result<Self, FsError> {
        if !(4..=u16::MAX as u32).contains(&device_blocks) {
            return Err(FsError::BadGeometry);
        }
        let mut fat_blocks = 1u32;
        while fat_blocks * (ENTRIES_PER_BLOCK as u32) < device_blocks - 2 - fat_blocks {
            fat_blocks += 1;
        }
        Ok(Self {
            total_blocks: device_blocks as u16,
            root_dir_block: (1 + fat_blocks) as u16,
            data_start: (2 + fat_blocks) as u16,
            data_blocks: (device_blocks - 2 - fat_blocks) as u16,
            fat_blocks: fat_blocks as u8,
        })
    }

    pub fn total_blocks(&self) -> u16 {
        self.total_blocks
    }

    pub fn root_dir_block(&self) -> u16 {
        self.root_dir_block
    }

    pub fn data_start(&self) -> u16 {
        self.data_start
    }

    pub fn data_blocks(&self) -> u16 {
        self.data_blocks
    }

    pub fn fat_blocks(&self) -> u8 {
        self.fat_blocks
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::BLOCK_SIZE;

    #[test]
    fn for_device_small() {
        let sb = SuperBlock::for_device(19).unwrap();
        assert_eq!(sb.total_blocks(), 19);
        assert_eq!(sb.fat_blocks(), 1);
        assert_eq!(sb.root_dir_block(), 2);
        assert_eq!(sb.data_start(), 3);
        assert_eq!(sb.data_blocks(), 16);
    }

    #[test]
    fn for_device_fat_spans_two_blocks() {
        // 2051 blocks fit one FAT block exactly; one more forces a second.
        let sb = SuperBlock::for_device(2051).unwrap();
        assert_eq!(sb.fat_blocks(), 1);
        assert_eq!(sb.data_blocks(), 2048);

        let sb = SuperBlock::for_device(2052).unwrap();
        assert_eq!(sb.fat_blocks(), 2);
        assert_eq!(sb.data_blocks(), 2048);
    }

    #[test]
    fn for_device_largest_volume() {
        let sb = SuperBlock::for_device(u16::MAX as u32).unwrap();
        assert_eq!(sb.total_blocks(), u16::MAX);
        assert_eq!(
            2 + sb.fat_blocks() as u32 + sb.data_blocks() as u32,
            u16::MAX as u32
        );
        assert!(sb.fat_blocks() as usize * ENTRIES_PER_BLOCK >= sb.data_blocks() as usize);
    }

    #[test]
    fn for_device_rejects_tiny_and_oversized() {
        assert!(matches!(SuperBlock::for_device(3), Err(FsError::BadGeometry)));
        assert!(matches!(
            SuperBlock::for_device(u16::MAX as u32 + 1),
            Err(FsError::BadGeometry)
        ));
    }

    #[test]
    fn encode_parse_roundtrip() {
        let sb = SuperBlock::for_device(4100).unwrap();
        let mut block = [0u8; BLOCK_SIZE];
        sb.encode(&mut block);
        let parsed = SuperBlock::parse(&block, 4100).unwrap();
        assert_eq!(parsed, sb);
    }

    #[test]
    fn parse_rejects_bad_signature() {
        let mut block = [0u8; BLOCK_SIZE];
        SuperBlock::for_device(19).unwrap().encode(&mut block);
        block[0] = b'X';
        assert!(matches!(
            SuperBlock::parse(&block, 19),
            Err(FsError::BadSignature)
        ));
    }

    #[test]
    fn parse_rejects_device_size_mismatch() {
        let mut block = [0u8; BLOCK_SIZE];
        SuperBlock::for_device(19).unwrap().encode(&mut block);
        assert!(matches!(
            SuperBlock::parse(&block, 20),
            Err(FsError::BlockCountMismatch { stored: 19, device: 20 })
        ));
    }

    #[test]
    fn parse_rejects_inconsistent_geometry() {
        let mut block = [0u8; BLOCK_SIZE];
        SuperBlock::for_device(19).unwrap().encode(&mut block);

        // Region sum no longer matches the total.
        block[14..16].copy_from_slice(&15u16.to_le_bytes());
        assert!(matches!(
            SuperBlock::parse(&block, 19),
            Err(FsError::BadGeometry)
        ));

        // Root directory index off by one.
        SuperBlock::for_device(19).unwrap().encode(&mut block);
        block[10..12].copy_from_slice(&3u16.to_le_bytes());
        assert!(matches!(
            SuperBlock::parse(&block, 19),
            Err(FsError::BadGeometry)
        ));
    }

    #[test]
    fn parse_rejects_undersized_fat_region() {
        // Claim 3000 data blocks behind a single FAT block.
        let mut block = [0u8; BLOCK_SIZE];
        block[..8].copy_from_slice(&SIGNATURE);
        let total = 2u16 + 1 + 3000;
        block[8..10].copy_from_slice(&total.to_le_bytes());
        block[10..12].copy_from_slice(&2u16.to_le_bytes());
        block[12..14].copy_from_slice(&3u16.to_le_bytes());
        block[14..16].copy_from_slice(&3000u16.to_le_bytes());
        block[16] = 1;
        assert!(matches!(
            SuperBlock::parse(&block, total as u32),
            Err(FsError::BadGeometry)
        ));
    }
}
