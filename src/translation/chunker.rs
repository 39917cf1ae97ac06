/*!
 * Partitioning of a block sequence into translation chunks.
 *
 * A chunk is a contiguous, non-empty view over the sequence. It records the
 * position of its first block and the subtitle indices it covers; it never
 * owns blocks. Concatenating the chunks' indices reproduces the input order.
 */

use std::ops::Range;

use crate::errors::TranslationError;
use crate::subtitle_processor::SubtitleBlock;

use super::protocol::SourceBlock;

/// A contiguous group of blocks translated together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the run, starting at 0
    pub id: usize,
    /// Position of the first block in the sequence
    pub start: usize,
    /// Subtitle indices covered, in sequence order
    pub indices: Vec<usize>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sequence positions covered by this chunk
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.indices.len()
    }

    /// Build the backend payload for this chunk, leaving out blocks without text
    pub fn source_blocks(&self, blocks: &[SubtitleBlock]) -> Vec<SourceBlock> {
        blocks[self.range()]
            .iter()
            .filter(|b| !b.is_blank())
            .map(|b| SourceBlock {
                index: b.index,
                content: b.content.clone(),
            })
            .collect()
    }
}

/// Split blocks into chunks of at most `max_size` blocks.
///
/// Only the last chunk may be shorter. An empty input gives no chunks.
pub fn partition(blocks: &[SubtitleBlock], max_size: usize) -> Result<Vec<Chunk>, TranslationError> {
    if max_size == 0 {
        return Err(TranslationError::Config(
            "chunk size must be a positive integer".to_string(),
        ));
    }

    Ok(blocks
        .chunks(max_size)
        .enumerate()
        .map(|(id, group)| Chunk {
            id,
            start: id * max_size,
            indices: group.iter().map(|b| b.index).collect(),
        })
        .collect())
}
