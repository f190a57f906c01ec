//! Grouping of samplers by the variant of their source configuration.
use itertools::Itertools;

use crate::config::VariantTag;
use crate::sampler::Sampler;

/// A run of consecutive samplers sharing one configuration variant.
#[derive(Debug)]
pub struct ConfigGroup<'a> {
    pub tag: VariantTag,
    pub samplers: Vec<&'a Sampler>,
}

/// Partition an ordered sampler sequence into runs of consecutive equal
/// variant tags.
///
/// The grouping is adjacency-only: two samplers of the same variant that are
/// separated by a sampler of a different variant land in two distinct
/// groups. Callers that want a single group per variant must order their
/// samplers accordingly.
pub fn partition_by_variant(samplers: &[Sampler]) -> Vec<ConfigGroup> {
    let mut groups = Vec::new();
    for (tag, run) in &samplers.iter().chunk_by(|sampler| sampler.config.tag()) {
        groups.push(ConfigGroup {
            tag,
            samplers: run.collect(),
        });
    }
    groups
}
