//! The sampler, i.e., the target entity a stimulus is wired into.
use serde::{Deserialize, Serialize};

use crate::config::SourceConfiguration;

/// A sampling neuron together with the configuration of its stimulus.
///
/// The id identifies the sampler towards the backend: the realization step
/// resolves it to the backend entity at the same position of the handle
/// array it is given.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Sampler {
    pub id: usize,
    /// Conductance-based targets receive the magnitude of a synaptic weight;
    /// current-based targets the signed value.
    pub conductance_based: bool,
    pub config: SourceConfiguration,
}

impl Sampler {
    pub fn new(id: usize, conductance_based: bool, config: SourceConfiguration) -> Self {
        Sampler {
            id,
            conductance_based,
            config,
        }
    }

    /// The number of stimulus sources of this sampler.
    pub fn num_sources(&self) -> usize {
        self.config.num_sources()
    }
}
