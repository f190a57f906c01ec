//! Per-source parameter tuples and the flat source specification.
use serde::{Deserialize, Serialize};

/// A single rate change of a time-varying Poisson source: at `time`, the
/// source switches to `rate`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RateChange {
    /// The time of the change, in ms.
    pub time: f64,
    /// The new rate, in spikes/second.
    pub rate: f64,
}

impl RateChange {
    pub fn new(time: f64, rate: f64) -> Self {
        RateChange { time, rate }
    }
}

/// The parameter tuple of a single generator, depending on the source kind.
///
/// The tuple is the deduplication identity of a generator: two sources with
/// equal parameters share one generator. The synaptic weight is deliberately
/// not part of the tuple; it lives on the wiring edge.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum SourceParameters {
    /// A fixed-rate Poisson source, rate in spikes/second.
    Poisson { rate: f64 },
    /// A sinusoidally modulated Poisson source.
    SinusPoisson {
        /// Mean firing rate, in spikes/second.
        rate: f64,
        /// Firing rate modulation amplitude, in spikes/second.
        amplitude: f64,
        /// Modulation frequency, in Hz.
        frequency: f64,
        /// Modulation phase, in degree [0-360].
        phase: f64,
    },
    /// A Poisson source with a schedule of rate changes.
    MultiPoissonVarRate { rate_changes: Vec<RateChange> },
    /// A source emitting a fixed spike train, times in ms.
    FixedSpikeTrain { spike_times: Vec<f64> },
}

impl SourceParameters {
    /// The exact-equality key of the parameter tuple.
    ///
    /// Equality is bit-for-bit over every field; in particular `-0.0` and
    /// `0.0` are distinct keys.
    pub fn key(&self) -> ParameterKey {
        let mut bits = Vec::new();
        match self {
            SourceParameters::Poisson { rate } => {
                bits.push(0);
                bits.push(rate.to_bits());
            }
            SourceParameters::SinusPoisson {
                rate,
                amplitude,
                frequency,
                phase,
            } => {
                bits.push(1);
                bits.push(rate.to_bits());
                bits.push(amplitude.to_bits());
                bits.push(frequency.to_bits());
                bits.push(phase.to_bits());
            }
            SourceParameters::MultiPoissonVarRate { rate_changes } => {
                bits.push(2);
                for rate_change in rate_changes {
                    bits.push(rate_change.time.to_bits());
                    bits.push(rate_change.rate.to_bits());
                }
            }
            SourceParameters::FixedSpikeTrain { spike_times } => {
                bits.push(3);
                for time in spike_times {
                    bits.push(time.to_bits());
                }
            }
        }
        ParameterKey(bits)
    }
}

/// The exact-equality key of a parameter tuple, suitable for hashing.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ParameterKey(Vec<u64>);

/// One stimulus source of one sampler: a parameter tuple and the signed
/// weight of the synapse towards its target.
///
/// Positive weights: excitatory. Non-positive weights: inhibitory.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub parameters: SourceParameters,
    pub weight: f64,
}

impl SourceSpec {
    pub fn new(parameters: SourceParameters, weight: f64) -> Self {
        SourceSpec { parameters, weight }
    }
}
