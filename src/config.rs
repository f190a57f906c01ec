//! Source configurations, i.e., the per-sampler description of the stimulus
//! supplied to it.
//!
//! Each sampler carries one [`SourceConfiguration`]. A configuration is
//! verified (and scalar parameters broadcast to the weight length) at
//! construction so that compilation can fail early. The supported kinds form
//! a closed set; dispatch is done by matching on the variant, never by open
//! subtyping.
//!
//! # Examples
//!
//! ```rust
//! use rusty_stim::config::SourceConfiguration;
//!
//! // A scalar rate is broadcast to the weight length.
//! let config = SourceConfiguration::poisson(vec![2000.0], vec![0.001, -0.001]).unwrap();
//! assert_eq!(config.num_sources(), 2);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StimError;
use crate::source::{RateChange, SourceParameters, SourceSpec};

/// The kind of a source configuration, used to group samplers.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum VariantTag {
    Poisson,
    SinusPoisson,
    MultiPoissonVarRate,
    FixedSpikeTrain,
    NoiseNetwork,
    PoissonPool,
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VariantTag::Poisson => write!(f, "poisson"),
            VariantTag::SinusPoisson => write!(f, "sinus-poisson"),
            VariantTag::MultiPoissonVarRate => write!(f, "multi-poisson-var-rate"),
            VariantTag::FixedSpikeTrain => write!(f, "fixed-spike-train"),
            VariantTag::NoiseNetwork => write!(f, "noise-network"),
            VariantTag::PoissonPool => write!(f, "poisson-pool"),
        }
    }
}

/// Neuron parameters of the noise-network neurons.
///
/// The conductance-based variant carries the synaptic reversal potentials;
/// they enter the inhibitory weight balance.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum NeuronParameters {
    CurrentBased {
        tau_syn_e: f64,
        tau_syn_i: f64,
        v_rest: f64,
        v_reset: f64,
        v_thresh: f64,
    },
    ConductanceBased {
        tau_syn_e: f64,
        tau_syn_i: f64,
        v_rest: f64,
        v_reset: f64,
        v_thresh: f64,
        e_rev_e: f64,
        e_rev_i: f64,
    },
}

impl NeuronParameters {
    pub fn v_reset(&self) -> f64 {
        match self {
            NeuronParameters::CurrentBased { v_reset, .. } => *v_reset,
            NeuronParameters::ConductanceBased { v_reset, .. } => *v_reset,
        }
    }

    pub fn v_thresh(&self) -> f64 {
        match self {
            NeuronParameters::CurrentBased { v_thresh, .. } => *v_thresh,
            NeuronParameters::ConductanceBased { v_thresh, .. } => *v_thresh,
        }
    }
}

/// Parameters of a recurrent noise network supplying samplers with noise.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NoiseNetworkParameters {
    /// Number of neurons in the noise network.
    pub n: usize,
    /// Fraction of excitatory neurons, in [0, 1].
    pub gamma: f64,
    /// Internal connectivity (number of presynaptic partners = epsilon * n).
    pub epsilon: f64,
    /// Connectivity towards the samplers.
    pub epsilon_external: f64,
    pub neuron_parameters: NeuronParameters,
    /// Synaptic delay within the network, in ms.
    pub delay_internal: f64,
    /// Synaptic delay towards the samplers, in ms.
    pub delay_external: f64,
    /// Relative weight of inhibitory synapses,
    /// g = (J_I tau_I |v_rest - e_rev_I|) / (J_E tau_E |v_rest - e_rev_E|).
    pub g: f64,
    /// Excitatory weight, in µS (conductance-based) or nA (current-based).
    pub j_e: f64,
    /// Factor applied to the external weights.
    pub f_j_external: f64,
    /// Rate with which each noise neuron is assumed to fire on average; only
    /// used for the theoretical membrane distribution.
    pub rate: f64,
    /// Seed of the wiring random number generator.
    pub seed: u64,
}

impl NoiseNetworkParameters {
    /// The inhibitory weight balancing `j_e`, depending on whether the noise
    /// neurons are conductance or current based.
    pub fn j_i(&self) -> f64 {
        match &self.neuron_parameters {
            NeuronParameters::ConductanceBased {
                tau_syn_e,
                tau_syn_i,
                v_rest,
                e_rev_e,
                e_rev_i,
                ..
            } => {
                self.g * self.j_e * tau_syn_e * (v_rest - e_rev_e).abs()
                    / (tau_syn_i * (v_rest - e_rev_i).abs())
            }
            NeuronParameters::CurrentBased {
                tau_syn_e,
                tau_syn_i,
                ..
            } => self.g * self.j_e * tau_syn_e / tau_syn_i,
        }
    }

    pub fn num_exc(&self) -> usize {
        (self.n as f64 * self.gamma).round() as usize
    }

    pub fn num_inh(&self) -> usize {
        self.n - self.num_exc()
    }

    /// Number of excitatory presynaptic partners of each neuron inside the
    /// noise network.
    pub fn indegree_exc(&self) -> usize {
        (self.num_exc() as f64 * self.epsilon).round() as usize
    }

    /// Number of inhibitory presynaptic partners of each neuron inside the
    /// noise network.
    pub fn indegree_inh(&self) -> usize {
        (self.num_inh() as f64 * self.epsilon).round() as usize
    }

    /// Number of excitatory presynaptic partners of each sampler.
    pub fn indegree_external_exc(&self) -> usize {
        (self.num_exc() as f64 * self.epsilon_external).round() as usize
    }

    /// Number of inhibitory presynaptic partners of each sampler.
    pub fn indegree_external_inh(&self) -> usize {
        (self.num_inh() as f64 * self.epsilon_external).round() as usize
    }
}

/// Parameters of a pool of fixed-rate Poisson sources.
///
/// Unlike the noise network, the pool does not decorrelate its outputs; each
/// sampler is connected to a subset of the pool, which introduces shared
/// input correlations.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PoissonPoolParameters {
    /// Number of sources in the pool.
    pub n: usize,
    /// Fraction of excitatory sources, in [0, 1].
    pub gamma: f64,
    /// The preferred backend generator model.
    pub source_model: String,
    /// Extra numeric parameters of the generator model.
    pub source_model_kwargs: Vec<(String, f64)>,
    /// Connectivity towards the samplers.
    pub epsilon_external: f64,
    /// Synaptic delay towards the samplers, in ms.
    pub delay_external: f64,
    /// Relative weight of inhibitory synapses.
    pub g: f64,
    /// Excitatory weight from the pool to the samplers.
    pub j_e: f64,
    /// Rate with which each pool source spikes, in spikes/second.
    pub rate: f64,
    /// Seed of the wiring random number generator.
    pub seed: u64,
}

impl PoissonPoolParameters {
    pub fn j_i(&self) -> f64 {
        self.g * self.j_e
    }

    pub fn num_exc(&self) -> usize {
        (self.n as f64 * self.gamma).round() as usize
    }

    pub fn num_inh(&self) -> usize {
        self.n - self.num_exc()
    }

    pub fn indegree_external_exc(&self) -> usize {
        (self.num_exc() as f64 * self.epsilon_external).round() as usize
    }

    pub fn indegree_external_inh(&self) -> usize {
        (self.num_inh() as f64 * self.epsilon_external).round() as usize
    }
}

/// Parameters of the theoretical membrane distribution, split by receptor.
///
/// Consumed by the external calibration collaborator; the compiler itself
/// never interprets them.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DistributionParameters {
    pub rates_exc: Vec<f64>,
    pub rates_inh: Vec<f64>,
    pub weights_exc: Vec<f64>,
    pub weights_inh: Vec<f64>,
}

/// The configuration of the stimulus supplied to one sampler.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum SourceConfiguration {
    /// Fixed-rate Poisson sources, one per weight.
    Poisson { rates: Vec<f64>, weights: Vec<f64> },
    /// Sinusoidally rate-modulated Poisson sources, one per weight.
    SinusPoisson {
        rates: Vec<f64>,
        amplitudes: Vec<f64>,
        frequencies: Vec<f64>,
        phases: Vec<f64>,
        weights: Vec<f64>,
        /// By default every target receives its own spike realization. If
        /// false, all targets of a generator see the same realization.
        /// Needs to be the same setting for all samplers of a group.
        individual_spike_trains: bool,
    },
    /// Poisson sources with per-source rate-change schedules.
    MultiPoissonVarRate {
        weight_per_source: Vec<f64>,
        rate_changes_per_source: Vec<Vec<RateChange>>,
    },
    /// Fixed spike trains. Rates are only used for the theoretical membrane
    /// distribution, not for source creation. Spike times are in ms and
    /// assumed sorted per source.
    FixedSpikeTrain {
        rates: Vec<f64>,
        weights: Vec<f64>,
        spike_times: Vec<f64>,
        /// For each entry of `spike_times`, the index of the source it
        /// belongs to.
        spike_ids: Vec<usize>,
    },
    /// A recurrent noise network supplying the samplers.
    NoiseNetwork(NoiseNetworkParameters),
    /// A pool of fixed-rate Poisson sources.
    PoissonPool(PoissonPoolParameters),
}

/// Broadcast a scalar parameter to the weight length, or verify the lengths
/// agree.
fn broadcast(
    parameter: &'static str,
    values: Vec<f64>,
    num_weights: usize,
) -> Result<Vec<f64>, StimError> {
    if values.len() == num_weights {
        Ok(values)
    } else if values.len() == 1 {
        Ok(vec![values[0]; num_weights])
    } else {
        Err(StimError::ShapeMismatch {
            parameter,
            len: values.len(),
            num_weights,
        })
    }
}

fn check_weights_non_empty(weights: &[f64]) -> Result<(), StimError> {
    if weights.is_empty() {
        return Err(StimError::InvalidParameter(
            "a source configuration needs at least one weight".to_string(),
        ));
    }
    Ok(())
}

fn check_fraction(parameter: &'static str, value: f64) -> Result<(), StimError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(StimError::InvalidParameter(format!(
            "{} must be in [0, 1], got {}",
            parameter, value
        )));
    }
    Ok(())
}

impl SourceConfiguration {
    /// Create a fixed-rate Poisson configuration.
    /// A scalar rate is broadcast to the weight length; otherwise the rates
    /// must match the weights one to one.
    pub fn poisson(rates: Vec<f64>, weights: Vec<f64>) -> Result<Self, StimError> {
        check_weights_non_empty(&weights)?;
        let rates = broadcast("rates", rates, weights.len())?;
        Ok(SourceConfiguration::Poisson { rates, weights })
    }

    /// Create a sinusoidally modulated Poisson configuration.
    /// Every scalar parameter is broadcast to the weight length.
    pub fn sinus_poisson(
        rates: Vec<f64>,
        amplitudes: Vec<f64>,
        frequencies: Vec<f64>,
        phases: Vec<f64>,
        weights: Vec<f64>,
        individual_spike_trains: bool,
    ) -> Result<Self, StimError> {
        check_weights_non_empty(&weights)?;
        let rates = broadcast("rates", rates, weights.len())?;
        let amplitudes = broadcast("amplitudes", amplitudes, weights.len())?;
        let frequencies = broadcast("frequencies", frequencies, weights.len())?;
        let phases = broadcast("phases", phases, weights.len())?;
        Ok(SourceConfiguration::SinusPoisson {
            rates,
            amplitudes,
            frequencies,
            phases,
            weights,
            individual_spike_trains,
        })
    }

    /// Create a time-varying multi-rate Poisson configuration.
    /// Each virtual source carries its own rate-change schedule.
    pub fn multi_poisson_var_rate(
        weight_per_source: Vec<f64>,
        rate_changes_per_source: Vec<Vec<RateChange>>,
    ) -> Result<Self, StimError> {
        check_weights_non_empty(&weight_per_source)?;
        if rate_changes_per_source.len() != weight_per_source.len() {
            return Err(StimError::ShapeMismatch {
                parameter: "rate_changes_per_source",
                len: rate_changes_per_source.len(),
                num_weights: weight_per_source.len(),
            });
        }
        Ok(SourceConfiguration::MultiPoissonVarRate {
            weight_per_source,
            rate_changes_per_source,
        })
    }

    /// Create a fixed spike train configuration.
    /// `spike_ids` assigns each spike time to a source; every id must refer
    /// to a weight.
    pub fn fixed_spike_train(
        rates: Vec<f64>,
        weights: Vec<f64>,
        spike_times: Vec<f64>,
        spike_ids: Vec<usize>,
    ) -> Result<Self, StimError> {
        check_weights_non_empty(&weights)?;
        let rates = broadcast("rates", rates, weights.len())?;
        if spike_ids.len() != spike_times.len() {
            return Err(StimError::InvalidParameter(format!(
                "{} spike ids for {} spike times",
                spike_ids.len(),
                spike_times.len()
            )));
        }
        if let Some(id) = spike_ids.iter().find(|id| **id >= weights.len()) {
            return Err(StimError::InvalidParameter(format!(
                "spike id {} refers to no source (have {})",
                id,
                weights.len()
            )));
        }
        Ok(SourceConfiguration::FixedSpikeTrain {
            rates,
            weights,
            spike_times,
            spike_ids,
        })
    }

    /// Create a noise-network configuration.
    pub fn noise_network(parameters: NoiseNetworkParameters) -> Result<Self, StimError> {
        if parameters.n == 0 {
            return Err(StimError::InvalidParameter(
                "the noise network needs at least one neuron".to_string(),
            ));
        }
        check_fraction("gamma", parameters.gamma)?;
        check_fraction("epsilon", parameters.epsilon)?;
        check_fraction("epsilon_external", parameters.epsilon_external)?;
        if parameters.delay_internal < 0.0 || parameters.delay_external < 0.0 {
            return Err(StimError::InvalidParameter(
                "synaptic delays must be non-negative".to_string(),
            ));
        }
        if parameters.neuron_parameters.v_reset() >= parameters.neuron_parameters.v_thresh() {
            return Err(StimError::InvalidParameter(
                "v_reset must lie below v_thresh".to_string(),
            ));
        }
        Ok(SourceConfiguration::NoiseNetwork(parameters))
    }

    /// Create a Poisson-pool configuration.
    pub fn poisson_pool(parameters: PoissonPoolParameters) -> Result<Self, StimError> {
        if parameters.n == 0 {
            return Err(StimError::InvalidParameter(
                "the pool needs at least one source".to_string(),
            ));
        }
        check_fraction("gamma", parameters.gamma)?;
        check_fraction("epsilon_external", parameters.epsilon_external)?;
        if parameters.delay_external < 0.0 {
            return Err(StimError::InvalidParameter(
                "synaptic delays must be non-negative".to_string(),
            ));
        }
        Ok(SourceConfiguration::PoissonPool(parameters))
    }

    /// The variant tag of this configuration.
    pub fn tag(&self) -> VariantTag {
        match self {
            SourceConfiguration::Poisson { .. } => VariantTag::Poisson,
            SourceConfiguration::SinusPoisson { .. } => VariantTag::SinusPoisson,
            SourceConfiguration::MultiPoissonVarRate { .. } => VariantTag::MultiPoissonVarRate,
            SourceConfiguration::FixedSpikeTrain { .. } => VariantTag::FixedSpikeTrain,
            SourceConfiguration::NoiseNetwork(_) => VariantTag::NoiseNetwork,
            SourceConfiguration::PoissonPool(_) => VariantTag::PoissonPool,
        }
    }

    /// The number of sources this configuration supplies to its sampler.
    pub fn num_sources(&self) -> usize {
        match self {
            SourceConfiguration::Poisson { weights, .. } => weights.len(),
            SourceConfiguration::SinusPoisson { weights, .. } => weights.len(),
            SourceConfiguration::MultiPoissonVarRate {
                weight_per_source, ..
            } => weight_per_source.len(),
            SourceConfiguration::FixedSpikeTrain { weights, .. } => weights.len(),
            SourceConfiguration::NoiseNetwork(parameters) => parameters.n,
            SourceConfiguration::PoissonPool(parameters) => parameters.n,
        }
    }

    /// The per-source weights, for the variants that carry them.
    pub fn weights(&self) -> Option<&[f64]> {
        match self {
            SourceConfiguration::Poisson { weights, .. } => Some(weights),
            SourceConfiguration::SinusPoisson { weights, .. } => Some(weights),
            SourceConfiguration::MultiPoissonVarRate {
                weight_per_source, ..
            } => Some(weight_per_source),
            SourceConfiguration::FixedSpikeTrain { weights, .. } => Some(weights),
            SourceConfiguration::NoiseNetwork(_) | SourceConfiguration::PoissonPool(_) => None,
        }
    }

    /// Whether every target receives its own spike realization. Only the
    /// sinus-Poisson variant exposes the flag; all other variants do.
    pub fn individual_spike_trains(&self) -> bool {
        match self {
            SourceConfiguration::SinusPoisson {
                individual_spike_trains,
                ..
            } => *individual_spike_trains,
            _ => true,
        }
    }

    /// Flatten the configuration into one [`SourceSpec`] per source.
    ///
    /// The noise-network and pool variants supply whole populations rather
    /// than per-source generators and yield no specs.
    pub fn build_specs(&self) -> Vec<SourceSpec> {
        match self {
            SourceConfiguration::Poisson { rates, weights } => rates
                .iter()
                .zip(weights)
                .map(|(rate, weight)| {
                    SourceSpec::new(SourceParameters::Poisson { rate: *rate }, *weight)
                })
                .collect(),
            SourceConfiguration::SinusPoisson {
                rates,
                amplitudes,
                frequencies,
                phases,
                weights,
                ..
            } => (0..weights.len())
                .map(|i| {
                    SourceSpec::new(
                        SourceParameters::SinusPoisson {
                            rate: rates[i],
                            amplitude: amplitudes[i],
                            frequency: frequencies[i],
                            phase: phases[i],
                        },
                        weights[i],
                    )
                })
                .collect(),
            SourceConfiguration::MultiPoissonVarRate {
                weight_per_source,
                rate_changes_per_source,
            } => weight_per_source
                .iter()
                .zip(rate_changes_per_source)
                .map(|(weight, rate_changes)| {
                    SourceSpec::new(
                        SourceParameters::MultiPoissonVarRate {
                            rate_changes: rate_changes.clone(),
                        },
                        *weight,
                    )
                })
                .collect(),
            SourceConfiguration::FixedSpikeTrain {
                weights,
                spike_times,
                spike_ids,
                ..
            } => weights
                .iter()
                .enumerate()
                .map(|(i, weight)| {
                    let times = spike_times
                        .iter()
                        .zip(spike_ids)
                        .filter(|(_, id)| **id == i)
                        .map(|(time, _)| *time)
                        .collect();
                    SourceSpec::new(SourceParameters::FixedSpikeTrain { spike_times: times }, *weight)
                })
                .collect(),
            SourceConfiguration::NoiseNetwork(_) | SourceConfiguration::PoissonPool(_) => vec![],
        }
    }

    /// Parameters of the theoretical membrane distribution this stimulus
    /// induces, split into excitatory and inhibitory contributions.
    ///
    /// Not defined for rate-modulated variants, whose input statistics are
    /// not stationary.
    pub fn distribution_parameters(&self) -> Result<DistributionParameters, StimError> {
        match self {
            SourceConfiguration::Poisson { rates, weights }
            | SourceConfiguration::FixedSpikeTrain { rates, weights, .. } => {
                let mut parameters = DistributionParameters {
                    rates_exc: vec![],
                    rates_inh: vec![],
                    weights_exc: vec![],
                    weights_inh: vec![],
                };
                for (rate, weight) in rates.iter().zip(weights) {
                    if *weight > 0.0 {
                        parameters.rates_exc.push(*rate);
                        parameters.weights_exc.push(*weight);
                    } else {
                        parameters.rates_inh.push(*rate);
                        parameters.weights_inh.push(*weight);
                    }
                }
                Ok(parameters)
            }
            SourceConfiguration::NoiseNetwork(p) => Ok(DistributionParameters {
                rates_exc: vec![p.rate * p.epsilon_external * p.num_exc() as f64],
                rates_inh: vec![p.rate * p.epsilon_external * p.num_inh() as f64],
                weights_exc: vec![p.j_e],
                weights_inh: vec![-p.j_i()],
            }),
            SourceConfiguration::PoissonPool(p) => Ok(DistributionParameters {
                rates_exc: vec![p.rate * p.epsilon_external * p.num_exc() as f64],
                rates_inh: vec![p.rate * p.epsilon_external * p.num_inh() as f64],
                weights_exc: vec![p.j_e],
                weights_inh: vec![-p.j_i()],
            }),
            SourceConfiguration::SinusPoisson { .. }
            | SourceConfiguration::MultiPoissonVarRate { .. } => {
                Err(StimError::InvalidParameter(format!(
                    "no stationary membrane distribution for {} sources",
                    self.tag()
                )))
            }
        }
    }
}
