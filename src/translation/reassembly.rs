//! Placement of chunk translations back into the block sequence.

use std::collections::BTreeMap;

use log::warn;

use crate::subtitle_processor::SubtitleBlock;

use super::chunker::Chunk;

/// Write a chunk's translations into the blocks it covers.
///
/// Only blocks inside the chunk's range whose index has a translation are
/// touched, and a block that already holds a translation is left alone.
/// Returns the number of blocks written.
pub fn merge_chunk(
    blocks: &mut [SubtitleBlock],
    chunk: &Chunk,
    translations: &BTreeMap<usize, Vec<String>>,
) -> usize {
    let range = chunk.range();
    let Some(slice) = blocks.get_mut(range.clone()) else {
        warn!("Chunk {} range {:?} is outside the block sequence", chunk.id, range);
        return 0;
    };

    let mut written = 0;
    for block in slice.iter_mut() {
        if let Some(lines) = translations.get(&block.index) {
            if block.set_translation(lines) {
                written += 1;
            }
        }
    }
    written
}
