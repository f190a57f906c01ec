//! Offset table resolving flat source slots back to their owning sampler.
use serde::{Deserialize, Serialize};

/// Cumulative per-target source counts plus the pre-expanded slot lookup.
///
/// `offsets[i]` is the total number of sources of targets `0..=i`; slot `j`
/// belongs to the target returned by [`OffsetTable::target_of`]. The lookup
/// array is expanded once during construction so that resolving a slot is a
/// plain index access rather than a scan over the offsets.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OffsetTable {
    offsets: Vec<usize>,
    slot_to_target: Vec<usize>,
}

impl OffsetTable {
    /// Build the table from per-target source counts, in one forward pass.
    pub fn build(counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut slot_to_target = Vec::with_capacity(counts.iter().sum());

        let mut total = 0;
        for (target, count) in counts.iter().enumerate() {
            total += count;
            offsets.push(total);
            slot_to_target.extend(std::iter::repeat(target).take(*count));
        }

        OffsetTable {
            offsets,
            slot_to_target,
        }
    }

    /// The cumulative source counts, one entry per target.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The target owning the given flat slot, or `None` past the end.
    pub fn target_of(&self, slot: usize) -> Option<usize> {
        self.slot_to_target.get(slot).copied()
    }

    /// The owning target of every slot, in slot order.
    pub fn slot_targets(&self) -> &[usize] {
        &self.slot_to_target
    }

    /// The total number of source slots.
    pub fn num_slots(&self) -> usize {
        self.slot_to_target.len()
    }

    /// The number of targets.
    pub fn num_targets(&self) -> usize {
        self.offsets.len()
    }
}
