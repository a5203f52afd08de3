//! Where compressed blocks live in a texture buffer.
//!
//! Decoders ask a [`BlockAddressing`] for the byte offset of block
//! `(bx, by)` and never assume a layout themselves. Two layouts are
//! provided: [`LinearBlocks`] (row-major, as in DDS files) and
//! [`BlockLinear`], the Tegra X1 tiled layout used by Switch textures.
//!
//! ## Block-linear layout
//! ```text
//! GOB   = 64 bytes × 8 rows = 512 bytes
//! Block = 1 GOB wide × BlockHeight GOBs tall (BlockHeight = 2^log2, 1..=32)
//! Blocks are laid out row-major across the surface.
//!
//! Within a GOB (x in bytes, y in rows):
//!   ((x % 64) / 32) * 256
//! + ((y % 8)  / 2)  * 64
//! + ((x % 32) / 16) * 32
//! + (y % 2)         * 16
//! + (x % 16)
//! ```
//! For BCn data one "row" is a row of 4×4 blocks and one element is a
//! whole compressed block.

/// Maps block coordinates to a byte offset within the texture data.
pub trait BlockAddressing {
    fn block_offset(&self, bx: u32, by: u32) -> usize;
}

impl<F: Fn(u32, u32) -> usize> BlockAddressing for F {
    fn block_offset(&self, bx: u32, by: u32) -> usize {
        self(bx, by)
    }
}

/// Row-major blocks with no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBlocks {
    pub blocks_x: u32,
    pub block_bytes: usize,
}

impl LinearBlocks {
    pub fn new(blocks_x: u32, block_bytes: usize) -> Self {
        Self {
            blocks_x,
            block_bytes,
        }
    }
}

impl BlockAddressing for LinearBlocks {
    fn block_offset(&self, bx: u32, by: u32) -> usize {
        (by as usize * self.blocks_x as usize + bx as usize) * self.block_bytes
    }
}

const GOB_WIDTH: u64 = 64;
const GOB_HEIGHT: u64 = 8;
const GOB_SIZE: u64 = GOB_WIDTH * GOB_HEIGHT;

/// Tegra X1 block-linear layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLinear {
    bytes_per_element: u64,
    block_height: u64,
    width_in_gobs: u64,
}

impl BlockLinear {
    /// Layout for a surface `width` elements wide.
    ///
    /// `block_height` is in GOBs and should be a power of two.
    pub fn new(width: u32, bytes_per_element: usize, block_height: u32) -> Self {
        let bpe = bytes_per_element as u64;
        Self {
            bytes_per_element: bpe,
            block_height: block_height.max(1) as u64,
            width_in_gobs: (width as u64 * bpe).div_ceil(GOB_WIDTH),
        }
    }

    /// Bytes occupied by a surface `height` elements tall, including the
    /// padding up to whole blocks.
    pub fn surface_size(&self, height: u32) -> u64 {
        let rows_per_block = GOB_HEIGHT * self.block_height;
        let block_rows = (height as u64).div_ceil(rows_per_block);
        block_rows * self.width_in_gobs * GOB_SIZE * self.block_height
    }
}

impl BlockAddressing for BlockLinear {
    fn block_offset(&self, bx: u32, by: u32) -> usize {
        let bh = self.block_height;
        let y = by as u64;
        let x = bx as u64 * self.bytes_per_element;

        let gob = (y / (GOB_HEIGHT * bh)) * GOB_SIZE * bh * self.width_in_gobs
            + (x / GOB_WIDTH) * GOB_SIZE * bh
            + (y % (GOB_HEIGHT * bh) / GOB_HEIGHT) * GOB_SIZE;

        let offset = gob
            + ((x % 64) / 32) * 256
            + ((y % 8) / 2) * 64
            + ((x % 32) / 16) * 32
            + (y % 2) * 16
            + (x % 16);
        offset as usize
    }
}

/// Block height (log2, in GOBs) used for mip level `mip`.
///
/// Small mips use shorter blocks: each level whose height in rows, rounded
/// up to a power of two, is below the base block's row count shrinks the
/// block by one step.
pub fn mip_block_height_log2(base_log2: u32, height: u32, block_rows: u32, mip: u32) -> u32 {
    let rows_per_block = (1u32 << base_log2) * GOB_HEIGHT as u32;
    let mut shift = 0;
    for level in 0..=mip {
        let mip_height = (height >> level).max(1);
        let rows = mip_height.div_ceil(block_rows).next_power_of_two();
        if rows < rows_per_block {
            shift += 1;
        }
    }
    base_log2.saturating_sub(shift)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn linear_is_row_major() {
        let l = LinearBlocks::new(3, 8);
        assert_eq!(l.block_offset(0, 0), 0);
        assert_eq!(l.block_offset(2, 0), 16);
        assert_eq!(l.block_offset(0, 1), 24);
    }

    #[test]
    fn closures_address_blocks() {
        let f = |bx: u32, by: u32| (bx + by * 10) as usize;
        assert_eq!(f.block_offset(3, 2), 23);
    }

    #[test]
    fn block_linear_within_gob() {
        // 16-byte elements, four per GOB row
        let bl = BlockLinear::new(4, 16, 1);
        assert_eq!(bl.block_offset(0, 0), 0);
        assert_eq!(bl.block_offset(1, 0), 32);
        assert_eq!(bl.block_offset(2, 0), 256);
        assert_eq!(bl.block_offset(3, 0), 288);
        assert_eq!(bl.block_offset(0, 1), 16);
        assert_eq!(bl.block_offset(0, 2), 64);
        assert_eq!(bl.block_offset(0, 8), 512);
    }

    #[test]
    fn block_linear_tall_blocks() {
        let bl = BlockLinear::new(8, 16, 2);
        // second GOB down stays in the same block
        assert_eq!(bl.block_offset(0, 8), 512);
        // next GOB column starts after a whole block
        assert_eq!(bl.block_offset(4, 0), 1024);
        // next block row starts after all blocks of the first
        assert_eq!(bl.block_offset(0, 16), 2048);
    }

    #[test]
    fn block_linear_is_a_permutation() {
        let bl = BlockLinear::new(8, 16, 2);
        let size = bl.surface_size(16);
        assert_eq!(size, 2048);
        let mut seen = HashSet::new();
        for by in 0..16 {
            for bx in 0..8 {
                let off = bl.block_offset(bx, by);
                assert_eq!(off % 16, 0);
                assert!((off as u64) < size);
                assert!(seen.insert(off));
            }
        }
    }

    #[test]
    fn mip_block_height_shrinks() {
        // 1024 px tall BC texture: 256 block rows, base block height 16 GOBs
        assert_eq!(mip_block_height_log2(4, 1024, 4, 0), 4);
        // levels 2, 3 and 4 are shorter than a 128-row block
        assert_eq!(mip_block_height_log2(4, 1024, 4, 2), 3);
        assert_eq!(mip_block_height_log2(4, 1024, 4, 4), 1);
        assert_eq!(mip_block_height_log2(1, 16, 4, 0), 0);
        assert_eq!(mip_block_height_log2(0, 4, 4, 3), 0);
    }
}
