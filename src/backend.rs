//! Backend adapter contracts.
//!
//! The compiler never creates simulator entities itself; it hands a fully
//! validated [`TopologyPlan`](crate::topology::TopologyPlan) to an
//! implementation of [`Backend`]. Entity creation is treated as
//! irreversible, which is why every validation runs before the first
//! backend call.
use serde::{Deserialize, Serialize};

use crate::config::NeuronParameters;
use crate::error::StimError;
use crate::receptor::Receptor;
use crate::topology::GeneratorSpec;
use crate::WEIGHT_SCALE_PYNN_TO_NEST;

/// A backend entity identifier. Backends typically assign these by creation
/// order, which is why submission order must be deterministic.
pub type EntityId = usize;

/// The connection pattern of a single wiring call.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ConnectionPattern {
    /// Pairwise connection of equally long source and target lists.
    OneToOne,
    /// Every source to every target.
    AllToAll,
}

/// The synaptic parameters of a wiring call, one weight per edge.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SynapseSpec {
    pub weights: Vec<f64>,
    pub receptor: Receptor,
    /// Synaptic delay in ms, if the backend is to override its default.
    pub delay: Option<f64>,
}

/// Read-only probe for the generator models a backend provides.
///
/// Consulted during compilation to resolve preferred models and fallbacks;
/// probing must not create anything.
pub trait CapabilityProbe {
    fn supports_model(&self, model: &str) -> bool;
}

/// The backend adapter creating generators, relays and connections.
pub trait Backend: CapabilityProbe {
    /// Create one generator entity from its spec.
    fn create_generator(&mut self, generator: &GeneratorSpec) -> Result<EntityId, StimError>;

    /// Create `count` relay entities.
    fn create_relays(&mut self, count: usize) -> Result<Vec<EntityId>, StimError>;

    /// Create `count` neuron entities with the given parameters (noise
    /// networks only).
    fn create_neurons(
        &mut self,
        count: usize,
        parameters: &NeuronParameters,
    ) -> Result<Vec<EntityId>, StimError>;

    /// Set the initial membrane voltage of the given neurons.
    fn initialize_membrane(
        &mut self,
        neurons: &[EntityId],
        voltages: &[f64],
    ) -> Result<(), StimError>;

    /// Connect sources to targets. `synapse` is `None` for plain forwarding
    /// edges (generator to relay).
    fn connect(
        &mut self,
        sources: &[EntityId],
        targets: &[EntityId],
        pattern: ConnectionPattern,
        synapse: Option<&SynapseSpec>,
    ) -> Result<(), StimError>;
}

/// Pure, order-preserving translation of synaptic weights from frontend to
/// backend units.
pub trait WeightUnitConverter {
    fn convert(&self, weights: &[f64]) -> Vec<f64>;
}

/// The PyNN-to-NEST weight convention: µS to nS (or nA to pA).
#[derive(Debug, Default)]
pub struct NestWeightConverter;

impl WeightUnitConverter for NestWeightConverter {
    fn convert(&self, weights: &[f64]) -> Vec<f64> {
        weights
            .iter()
            .map(|w| w * WEIGHT_SCALE_PYNN_TO_NEST)
            .collect()
    }
}

/// Keeps frontend units, for backends that share them.
#[derive(Debug, Default)]
pub struct IdentityWeightConverter;

impl WeightUnitConverter for IdentityWeightConverter {
    fn convert(&self, weights: &[f64]) -> Vec<f64> {
        weights.to_vec()
    }
}

/// One recorded wiring call of a [`RecordingBackend`].
#[derive(Debug, PartialEq, Clone)]
pub struct ConnectionRecord {
    pub sources: Vec<EntityId>,
    pub targets: Vec<EntityId>,
    pub pattern: ConnectionPattern,
    pub synapse: Option<SynapseSpec>,
}

/// An in-memory backend recording every call, for tests and dry runs.
///
/// Entity ids are assigned by creation order, like the simulator backends
/// this stands in for.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    /// The generator models this backend pretends to provide.
    pub available_models: Vec<String>,
    pub generators: Vec<GeneratorSpec>,
    pub num_relays: usize,
    pub num_neurons: usize,
    pub membrane_voltages: Vec<(EntityId, f64)>,
    pub connections: Vec<ConnectionRecord>,
    next_id: EntityId,
}

impl RecordingBackend {
    pub fn new(available_models: Vec<String>) -> Self {
        RecordingBackend {
            available_models,
            ..Default::default()
        }
    }

    fn take_ids(&mut self, count: usize) -> Vec<EntityId> {
        let ids = (self.next_id..self.next_id + count).collect();
        self.next_id += count;
        ids
    }
}

impl CapabilityProbe for RecordingBackend {
    fn supports_model(&self, model: &str) -> bool {
        self.available_models.iter().any(|m| m == model)
    }
}

impl Backend for RecordingBackend {
    fn create_generator(&mut self, generator: &GeneratorSpec) -> Result<EntityId, StimError> {
        self.generators.push(generator.clone());
        Ok(self.take_ids(1)[0])
    }

    fn create_relays(&mut self, count: usize) -> Result<Vec<EntityId>, StimError> {
        self.num_relays += count;
        Ok(self.take_ids(count))
    }

    fn create_neurons(
        &mut self,
        count: usize,
        _parameters: &NeuronParameters,
    ) -> Result<Vec<EntityId>, StimError> {
        self.num_neurons += count;
        Ok(self.take_ids(count))
    }

    fn initialize_membrane(
        &mut self,
        neurons: &[EntityId],
        voltages: &[f64],
    ) -> Result<(), StimError> {
        if neurons.len() != voltages.len() {
            return Err(StimError::Backend(format!(
                "{} voltages for {} neurons",
                voltages.len(),
                neurons.len()
            )));
        }
        self.membrane_voltages
            .extend(neurons.iter().copied().zip(voltages.iter().copied()));
        Ok(())
    }

    fn connect(
        &mut self,
        sources: &[EntityId],
        targets: &[EntityId],
        pattern: ConnectionPattern,
        synapse: Option<&SynapseSpec>,
    ) -> Result<(), StimError> {
        if pattern == ConnectionPattern::OneToOne && sources.len() != targets.len() {
            return Err(StimError::Backend(format!(
                "one-to-one connect of {} sources to {} targets",
                sources.len(),
                targets.len()
            )));
        }
        self.connections.push(ConnectionRecord {
            sources: sources.to_vec(),
            targets: targets.to_vec(),
            pattern,
            synapse: synapse.cloned(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_weight_converter() {
        let converter = NestWeightConverter;
        assert_eq!(
            converter.convert(&[0.001, -0.002, 0.0]),
            vec![1.0, -2.0, 0.0]
        );
    }

    #[test]
    fn test_recording_backend_assigns_ids_in_creation_order() {
        let mut backend = RecordingBackend::new(vec!["poisson_generator".to_string()]);
        assert!(backend.supports_model("poisson_generator"));
        assert!(!backend.supports_model("lookahead_poisson_generator"));

        let relays = backend.create_relays(3).unwrap();
        assert_eq!(relays, vec![0, 1, 2]);
        let more = backend.create_relays(2).unwrap();
        assert_eq!(more, vec![3, 4]);
    }

    #[test]
    fn test_recording_backend_rejects_ragged_one_to_one() {
        let mut backend = RecordingBackend::default();
        assert!(backend
            .connect(&[0, 1], &[2], ConnectionPattern::OneToOne, None)
            .is_err());
    }
}
