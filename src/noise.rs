//! Planning of noise-network and Poisson-pool stimuli.
//!
//! Both variants supply whole populations instead of per-source generators:
//! the noise network is a recurrent population of spiking neurons, the pool
//! a bank of relays fed by one Poisson generator. Their wiring towards the
//! samplers is random with a fixed indegree, sampled here (without
//! replacement, no self-connections) from a seeded generator so that a plan
//! is reproducible.
use log;
use rand::seq::index::sample as sample_indices;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::backend::{CapabilityProbe, WeightUnitConverter};
use crate::config::{NoiseNetworkParameters, PoissonPoolParameters};
use crate::error::StimError;
use crate::receptor::Receptor;
use crate::source::SourceParameters;
use crate::topology::{GeneratorSpec, FALLBACK_POOL_MODEL};

/// A sampled projection: pairwise edges with one weight and delay.
///
/// `sources` index into the group's own population; `targets` are sampler
/// ids for external projections and population indices for internal ones.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RandomProjection {
    pub sources: Vec<usize>,
    pub targets: Vec<usize>,
    /// Weight per edge, in backend units.
    pub weight: f64,
    /// Synaptic delay, in ms.
    pub delay: f64,
    pub receptor: Receptor,
}

/// The plan of one recurrent noise network and its external wiring.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NoiseGroup {
    pub parameters: NoiseNetworkParameters,
    pub sampler_ids: Vec<usize>,
    /// Initial membrane voltage per noise neuron, uniform in
    /// [v_reset, v_thresh].
    pub initial_voltages: Vec<f64>,
    /// The recurrent EE/EI/IE/II projections, targets indexing the
    /// population itself.
    pub internal: Vec<RandomProjection>,
    /// The projections towards the samplers.
    pub external: Vec<RandomProjection>,
}

/// The plan of one Poisson pool and its external wiring.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PoolGroup {
    pub parameters: PoissonPoolParameters,
    pub sampler_ids: Vec<usize>,
    /// The single generator feeding every pool relay.
    pub generator: GeneratorSpec,
    pub external: Vec<RandomProjection>,
}

/// Sample `indegree` distinct presynaptic partners from
/// `pool_start..pool_start + pool_size` for one target, skipping
/// `exclude` (the target itself, for recurrent wiring).
fn sample_partners<R: Rng>(
    rng: &mut R,
    pool_start: usize,
    pool_size: usize,
    indegree: usize,
    exclude: Option<usize>,
) -> Result<Vec<usize>, StimError> {
    let exclude_local = exclude
        .filter(|e| (pool_start..pool_start + pool_size).contains(e))
        .map(|e| e - pool_start);
    let available = match exclude_local {
        Some(_) => pool_size - 1,
        None => pool_size,
    };
    if indegree > available {
        return Err(StimError::InvalidParameter(format!(
            "indegree {} exceeds the {} available presynaptic partners",
            indegree, available
        )));
    }

    let mut partners: Vec<usize> = sample_indices(rng, available, indegree)
        .into_iter()
        .map(|i| match exclude_local {
            // shift over the hole left by the excluded index
            Some(excluded) if i >= excluded => pool_start + i + 1,
            _ => pool_start + i,
        })
        .collect();
    partners.sort_unstable();
    Ok(partners)
}

fn fixed_indegree_projection<R: Rng>(
    rng: &mut R,
    pool_start: usize,
    pool_size: usize,
    indegree: usize,
    targets: &[usize],
    no_self: bool,
    weight: f64,
    delay: f64,
    receptor: Receptor,
) -> Result<Option<RandomProjection>, StimError> {
    if indegree == 0 || pool_size == 0 || targets.is_empty() {
        return Ok(None);
    }
    let mut all_sources = Vec::with_capacity(indegree * targets.len());
    let mut all_targets = Vec::with_capacity(indegree * targets.len());
    for target in targets {
        let exclude = if no_self { Some(*target) } else { None };
        let partners = sample_partners(rng, pool_start, pool_size, indegree, exclude)?;
        all_targets.extend(std::iter::repeat(*target).take(partners.len()));
        all_sources.extend(partners);
    }
    Ok(Some(RandomProjection {
        sources: all_sources,
        targets: all_targets,
        weight,
        delay,
        receptor,
    }))
}

/// The external inhibitory weight seen by one target: positive towards
/// conductance-based targets, negative towards current-based ones.
fn signed_j_i(j_i: f64, conductance_based: bool) -> f64 {
    if conductance_based {
        j_i
    } else {
        -j_i
    }
}

/// Convert a single weight with the injected unit converter.
fn convert_one(converter: &impl WeightUnitConverter, weight: f64) -> f64 {
    converter.convert(&[weight])[0]
}

/// Plan one noise network supplying the given samplers.
///
/// `samplers` pairs each sampler id with its conductance flag.
pub fn plan_noise_group(
    parameters: &NoiseNetworkParameters,
    samplers: &[(usize, bool)],
    converter: &impl WeightUnitConverter,
) -> Result<NoiseGroup, StimError> {
    log::info!(
        "Creating noise network of size {} to supply {} samplers.",
        parameters.n,
        samplers.len()
    );

    let mut rng = ChaCha8Rng::seed_from_u64(parameters.seed);

    let num_exc = parameters.num_exc();
    let num_inh = parameters.num_inh();
    let inh_start = parameters.n - num_inh;

    let voltage_dist = Uniform::new(
        parameters.neuron_parameters.v_reset(),
        parameters.neuron_parameters.v_thresh(),
    );
    let initial_voltages: Vec<f64> = (0..parameters.n)
        .map(|_| voltage_dist.sample(&mut rng))
        .collect();

    let conductance_neurons = matches!(
        parameters.neuron_parameters,
        crate::config::NeuronParameters::ConductanceBased { .. }
    );
    let j_e = convert_one(converter, parameters.j_e);
    let j_i_internal = convert_one(
        converter,
        signed_j_i(parameters.j_i(), conductance_neurons),
    );

    let mut internal = Vec::new();
    if parameters.epsilon > 0.0 {
        let exc_targets: Vec<usize> = (0..num_exc).collect();
        let inh_targets: Vec<usize> = (inh_start..parameters.n).collect();
        let blocks = [
            // (sources, targets, indegree, weight, receptor)
            (0, num_exc, &exc_targets, parameters.indegree_exc(), j_e, Receptor::Excitatory),
            (0, num_exc, &inh_targets, parameters.indegree_exc(), j_e, Receptor::Excitatory),
            (inh_start, num_inh, &exc_targets, parameters.indegree_inh(), j_i_internal, Receptor::Inhibitory),
            (inh_start, num_inh, &inh_targets, parameters.indegree_inh(), j_i_internal, Receptor::Inhibitory),
        ];
        for (pool_start, pool_size, targets, indegree, weight, receptor) in blocks {
            if let Some(projection) = fixed_indegree_projection(
                &mut rng,
                pool_start,
                pool_size,
                indegree,
                targets,
                true,
                weight,
                parameters.delay_internal,
                receptor,
            )? {
                internal.push(projection);
            }
        }
    }

    log::info!(
        "Noise network: {} exc src @ {} / {} inh @ {}",
        parameters.indegree_external_exc(),
        parameters.j_e * parameters.f_j_external,
        parameters.indegree_external_inh(),
        parameters.j_i() * parameters.f_j_external
    );

    let mut external = Vec::new();
    for (sampler_id, conductance_based) in samplers {
        let j_e_external = convert_one(converter, parameters.j_e * parameters.f_j_external);
        let j_i_external = convert_one(
            converter,
            signed_j_i(parameters.j_i(), *conductance_based) * parameters.f_j_external,
        );
        if let Some(projection) = fixed_indegree_projection(
            &mut rng,
            0,
            num_exc,
            parameters.indegree_external_exc(),
            &[*sampler_id],
            false,
            j_e_external,
            parameters.delay_external,
            Receptor::Excitatory,
        )? {
            external.push(projection);
        }
        if let Some(projection) = fixed_indegree_projection(
            &mut rng,
            inh_start,
            num_inh,
            parameters.indegree_external_inh(),
            &[*sampler_id],
            false,
            j_i_external,
            parameters.delay_external,
            Receptor::Inhibitory,
        )? {
            external.push(projection);
        }
    }

    Ok(NoiseGroup {
        parameters: parameters.clone(),
        sampler_ids: samplers.iter().map(|(id, _)| *id).collect(),
        initial_voltages,
        internal,
        external,
    })
}

/// Plan one Poisson pool supplying the given samplers.
///
/// The configured generator model is probed on the backend; if absent, the
/// pool falls back to the plain Poisson generator, and if that is absent
/// too, the compile is rejected.
pub fn plan_pool_group(
    parameters: &PoissonPoolParameters,
    samplers: &[(usize, bool)],
    probe: &impl CapabilityProbe,
    converter: &impl WeightUnitConverter,
) -> Result<PoolGroup, StimError> {
    log::info!(
        "Creating poisson pool of size {} to supply {} samplers.",
        parameters.n,
        samplers.len()
    );

    let (model, kwargs) = if probe.supports_model(&parameters.source_model) {
        (
            parameters.source_model.clone(),
            parameters.source_model_kwargs.clone(),
        )
    } else if probe.supports_model(FALLBACK_POOL_MODEL) {
        log::warn!(
            "{} not available in backend, falling back to: {}",
            parameters.source_model,
            FALLBACK_POOL_MODEL
        );
        (FALLBACK_POOL_MODEL.to_string(), vec![])
    } else {
        return Err(StimError::UnsupportedBackendModel(format!(
            "neither {} nor the fallback {} is available",
            parameters.source_model, FALLBACK_POOL_MODEL
        )));
    };

    let generator = GeneratorSpec {
        model,
        parameters: SourceParameters::Poisson {
            rate: parameters.rate,
        },
        kwargs,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(parameters.seed);

    let num_exc = parameters.num_exc();
    let num_inh = parameters.num_inh();
    let inh_start = parameters.n - num_inh;

    let mut external = Vec::new();
    for (sampler_id, conductance_based) in samplers {
        let j_e = convert_one(converter, parameters.j_e);
        let j_i = convert_one(converter, signed_j_i(parameters.j_i(), *conductance_based));
        if let Some(projection) = fixed_indegree_projection(
            &mut rng,
            0,
            num_exc,
            parameters.indegree_external_exc(),
            &[*sampler_id],
            false,
            j_e,
            parameters.delay_external,
            Receptor::Excitatory,
        )? {
            external.push(projection);
        }
        if let Some(projection) = fixed_indegree_projection(
            &mut rng,
            inh_start,
            num_inh,
            parameters.indegree_external_inh(),
            &[*sampler_id],
            false,
            j_i,
            parameters.delay_external,
            Receptor::Inhibitory,
        )? {
            external.push(projection);
        }
    }

    Ok(PoolGroup {
        parameters: parameters.clone(),
        sampler_ids: samplers.iter().map(|(id, _)| *id).collect(),
        generator,
        external,
    })
}
