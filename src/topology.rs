//! Topology compilation: generator pools, relay layers and the wiring table.
//!
//! [`TopologyBuilder::compile`] turns an ordered sampler sequence into a
//! [`TopologyPlan`]: per configuration group, a deduplicated set of
//! generators, one relay per source and a flat wiring table partitioned by
//! receptor. Compilation is pure; [`realize`] hands a validated plan to the
//! backend adapter, and only there are entities created.
//!
//! A compile runs through the phases partition, deduplicate, index,
//! classify and validate before the first backend call; entity creation is
//! treated as irreversible, so a failing validation creates nothing and a
//! backend failure aborts the call without retry.
use log;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use itertools::Itertools;

use crate::backend::{
    Backend, CapabilityProbe, ConnectionPattern, EntityId, SynapseSpec, WeightUnitConverter,
};
use crate::config::{SourceConfiguration, VariantTag};
use crate::dedup::deduplicate;
use crate::error::StimError;
use crate::noise::{plan_noise_group, plan_pool_group, NoiseGroup, PoolGroup};
use crate::offsets::OffsetTable;
use crate::partition::partition_by_variant;
use crate::receptor::{audit_sign_policy, check_mixed_signs, classify, Receptor};
use crate::sampler::Sampler;
use crate::source::{SourceParameters, SourceSpec};
use crate::LOOKAHEAD_STEPS;

/// The plain Poisson generator model.
pub const POISSON_MODEL: &str = "poisson_generator";
/// The buffered Poisson generator model, preferred when available.
pub const LOOKAHEAD_POISSON_MODEL: &str = "lookahead_poisson_generator";
/// The sinusoidally rate-modulated Poisson generator model.
pub const SINUS_POISSON_MODEL: &str = "sinusoidal_poisson_generator";
/// The scheduled multi-rate Poisson generator model.
pub const MULTI_POISSON_MODEL: &str = "multi_poisson_generator";
/// The fixed spike train generator model.
pub const SPIKE_TRAIN_MODEL: &str = "spike_generator";
/// The model a Poisson pool falls back to.
pub const FALLBACK_POOL_MODEL: &str = POISSON_MODEL;

/// The phases of one compile call, in order. Validation failures are
/// terminal before any entity is created.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompilePhase {
    Init,
    Partition,
    Deduplicate,
    Index,
    Classify,
    Validate,
    CreateGenerators,
    CreateRelays,
    Wire,
    /// External projections of noise networks and pools onto the samplers.
    AttachExternalWiring,
    Done,
    Failed,
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompilePhase::Init => write!(f, "init"),
            CompilePhase::Partition => write!(f, "partition"),
            CompilePhase::Deduplicate => write!(f, "deduplicate"),
            CompilePhase::Index => write!(f, "index"),
            CompilePhase::Classify => write!(f, "classify"),
            CompilePhase::Validate => write!(f, "validate"),
            CompilePhase::CreateGenerators => write!(f, "create-generators"),
            CompilePhase::CreateRelays => write!(f, "create-relays"),
            CompilePhase::Wire => write!(f, "wire"),
            CompilePhase::AttachExternalWiring => write!(f, "attach-external-wiring"),
            CompilePhase::Done => write!(f, "done"),
            CompilePhase::Failed => write!(f, "failed"),
        }
    }
}

/// A deduplicated, backend-facing generator: the model it resolves to and
/// exactly one parameter tuple. The synaptic weight is not part of the
/// generator; it lives on the wiring edge.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GeneratorSpec {
    pub model: String,
    pub parameters: SourceParameters,
    /// Extra numeric model parameters, e.g. the lookahead buffer size.
    pub kwargs: Vec<(String, f64)>,
}

/// A relay forwarding one generator to exactly one target.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RelaySpec {
    pub generator_index: usize,
}

/// One row of the flat wiring table.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WiringRow {
    /// Index into the group's generators.
    pub generator_index: usize,
    /// Index into the group's relays.
    pub relay_index: usize,
    /// The id of the target sampler.
    pub target_index: usize,
    /// The signed weight, in backend units.
    pub weight: f64,
    pub receptor: Receptor,
}

/// The compiled plan of one generator-backed group.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WiredGroup {
    pub tag: VariantTag,
    /// The sampler ids of this group, in submission order.
    pub sampler_ids: Vec<usize>,
    /// The conductance flag per sampler, aligned with `sampler_ids`.
    pub conductance_based: Vec<bool>,
    /// The deduplicated generators, in order of first occurrence.
    pub generators: Vec<GeneratorSpec>,
    /// If true, the generators feed a generator-shared relay layer so that
    /// all targets of a generator see the same spike realization.
    pub shared_spike_trains: bool,
    /// One relay per source spec.
    pub relays: Vec<RelaySpec>,
    pub offsets: OffsetTable,
    pub wiring: Vec<WiringRow>,
}

/// The compiled plan of one group of samplers.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum GroupPlan {
    Wired(WiredGroup),
    Noise(NoiseGroup),
    Pool(PoolGroup),
}

/// A fully resolved stimulus topology, built once per compile call and
/// consumed by [`realize`]. The plan holds no backend state and can be
/// saved and loaded as JSON.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TopologyPlan {
    pub groups: Vec<GroupPlan>,
}

impl TopologyPlan {
    /// The total number of wiring rows of the generator-backed groups.
    pub fn num_wiring_rows(&self) -> usize {
        self.groups
            .iter()
            .map(|group| match group {
                GroupPlan::Wired(wired) => wired.wiring.len(),
                GroupPlan::Noise(_) | GroupPlan::Pool(_) => 0,
            })
            .sum()
    }

    /// The total number of generators the backend will create.
    pub fn num_generators(&self) -> usize {
        self.groups
            .iter()
            .map(|group| match group {
                GroupPlan::Wired(wired) => wired.generators.len(),
                GroupPlan::Pool(_) => 1,
                GroupPlan::Noise(_) => 0,
            })
            .sum()
    }

    /// Check the structural invariants of the plan.
    ///
    /// Compiled plans always pass; the check guards plans assembled by hand
    /// or loaded from disk before they reach a backend.
    pub fn validate(&self) -> Result<(), StimError> {
        for group in &self.groups {
            match group {
                GroupPlan::Wired(wired) => wired.validate()?,
                GroupPlan::Noise(noise) => {
                    if noise.initial_voltages.len() != noise.parameters.n {
                        return Err(StimError::InvalidParameter(format!(
                            "{} initial voltages for {} noise neurons",
                            noise.initial_voltages.len(),
                            noise.parameters.n
                        )));
                    }
                    for projection in noise.internal.iter().chain(&noise.external) {
                        if projection.sources.len() != projection.targets.len() {
                            return Err(StimError::InvalidParameter(
                                "ragged projection in noise plan".to_string(),
                            ));
                        }
                        if projection.sources.iter().any(|s| *s >= noise.parameters.n) {
                            return Err(StimError::InvalidParameter(
                                "projection source outside the noise network".to_string(),
                            ));
                        }
                    }
                    for projection in &noise.internal {
                        if projection.targets.iter().any(|t| *t >= noise.parameters.n) {
                            return Err(StimError::InvalidParameter(
                                "internal projection target outside the noise network"
                                    .to_string(),
                            ));
                        }
                    }
                    for projection in &noise.external {
                        if projection
                            .targets
                            .iter()
                            .any(|t| !noise.sampler_ids.contains(t))
                        {
                            return Err(StimError::InvalidParameter(
                                "external projection targets an unknown sampler".to_string(),
                            ));
                        }
                    }
                }
                GroupPlan::Pool(pool) => {
                    for projection in &pool.external {
                        if projection.sources.len() != projection.targets.len() {
                            return Err(StimError::InvalidParameter(
                                "ragged projection in pool plan".to_string(),
                            ));
                        }
                        if projection.sources.iter().any(|s| *s >= pool.parameters.n) {
                            return Err(StimError::InvalidParameter(
                                "projection source outside the pool".to_string(),
                            ));
                        }
                        if projection
                            .targets
                            .iter()
                            .any(|t| !pool.sampler_ids.contains(t))
                        {
                            return Err(StimError::InvalidParameter(
                                "external projection targets an unknown sampler".to_string(),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Save the plan to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StimError> {
        let file = File::create(path).map_err(|e| StimError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| StimError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| StimError::IOError(e.to_string()))
    }

    /// Load a plan from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, StimError> {
        let file = File::open(path).map_err(|e| StimError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| StimError::IOError(e.to_string()))
    }
}

impl WiredGroup {
    fn validate(&self) -> Result<(), StimError> {
        if self.sampler_ids.len() != self.conductance_based.len() {
            return Err(StimError::InvalidParameter(
                "conductance flags do not match the sampler ids".to_string(),
            ));
        }
        // one relay per source spec, always
        if self.relays.len() != self.wiring.len() {
            return Err(StimError::InvalidParameter(format!(
                "{} relays for {} wiring rows",
                self.relays.len(),
                self.wiring.len()
            )));
        }
        if self.offsets.num_slots() != self.wiring.len() {
            return Err(StimError::InvalidParameter(format!(
                "offset table covers {} slots for {} wiring rows",
                self.offsets.num_slots(),
                self.wiring.len()
            )));
        }
        for relay in &self.relays {
            if relay.generator_index >= self.generators.len() {
                return Err(StimError::InvalidParameter(
                    "relay refers to no generator".to_string(),
                ));
            }
        }
        for row in &self.wiring {
            if row.relay_index >= self.relays.len()
                || row.generator_index >= self.generators.len()
            {
                return Err(StimError::InvalidParameter(
                    "wiring row refers to no relay or generator".to_string(),
                ));
            }
            if self.relays[row.relay_index].generator_index != row.generator_index {
                return Err(StimError::InvalidParameter(
                    "wiring row disagrees with its relay about the generator".to_string(),
                ));
            }
            if !self.sampler_ids.contains(&row.target_index) {
                return Err(StimError::InvalidParameter(format!(
                    "wiring row targets unknown sampler {}",
                    row.target_index
                )));
            }
        }
        audit_sign_policy(self.wiring.iter().map(|row| (row.weight, &row.receptor)))
    }
}

/// Compile-scoped registry of scheduled generator models.
///
/// Models are keyed by a content hash of their parameter tuple, so equal
/// schedules resolve to the same model name within one compile and nothing
/// leaks into a process-wide namespace.
struct ModelRegistry {
    names: HashMap<u64, String>,
}

impl ModelRegistry {
    fn new() -> Self {
        ModelRegistry {
            names: HashMap::new(),
        }
    }

    fn resolve(&mut self, base: &str, parameters: &SourceParameters) -> String {
        let mut hasher = DefaultHasher::new();
        parameters.key().hash(&mut hasher);
        let digest = hasher.finish();
        self.names
            .entry(digest)
            .or_insert_with(|| format!("{}:{:016x}", base, digest))
            .clone()
    }
}

/// The topology compiler.
///
/// Holds the injected weight-unit converter; everything else is per-call.
pub struct TopologyBuilder<'a, W: WeightUnitConverter> {
    converter: &'a W,
}

impl<'a, W: WeightUnitConverter> TopologyBuilder<'a, W> {
    pub fn new(converter: &'a W) -> Self {
        TopologyBuilder { converter }
    }

    /// Compile the stimulus topology of an ordered sampler sequence.
    ///
    /// Samplers are grouped by runs of consecutive equal configuration
    /// variants (see [`partition_by_variant`]); each group is deduplicated,
    /// indexed, classified and validated independently. No backend entity
    /// is created here; the probe is only consulted for model availability.
    pub fn compile(
        &self,
        samplers: &[Sampler],
        probe: &impl CapabilityProbe,
    ) -> Result<TopologyPlan, StimError> {
        let plan = self.compile_impl(samplers, probe, false);
        if plan.is_err() {
            log::debug!("compile phase: {}", CompilePhase::Failed);
        }
        plan
    }

    /// Compile a shared-rate topology: all `num_samplers` targets of one
    /// population receive the sources of a single configuration.
    ///
    /// This is the calibration mode; a population must receive both
    /// excitatory and inhibitory noise, so configurations whose weights all
    /// carry one sign are rejected.
    pub fn compile_population(
        &self,
        num_samplers: usize,
        conductance_based: bool,
        config: &SourceConfiguration,
        probe: &impl CapabilityProbe,
    ) -> Result<TopologyPlan, StimError> {
        if num_samplers == 0 {
            return Err(StimError::InvalidParameter(
                "a population needs at least one sampler".to_string(),
            ));
        }
        let samplers: Vec<Sampler> = (0..num_samplers)
            .map(|id| Sampler::new(id, conductance_based, config.clone()))
            .collect();
        let plan = self.compile_impl(&samplers, probe, true);
        if plan.is_err() {
            log::debug!("compile phase: {}", CompilePhase::Failed);
        }
        plan
    }

    fn compile_impl(
        &self,
        samplers: &[Sampler],
        probe: &impl CapabilityProbe,
        population_mode: bool,
    ) -> Result<TopologyPlan, StimError> {
        log::debug!("compile phase: {}", CompilePhase::Partition);
        let groups = partition_by_variant(samplers);
        log::info!(
            "Compiling stimulus topology for {} samplers in {} groups.",
            samplers.len(),
            groups.len()
        );

        let mut registry = ModelRegistry::new();
        let mut plans = Vec::with_capacity(groups.len());

        for group in groups {
            match group.tag {
                VariantTag::NoiseNetwork | VariantTag::PoissonPool => {
                    // populations group further by configuration identity
                    for (config, run) in &group
                        .samplers
                        .iter()
                        .chunk_by(|sampler| &sampler.config)
                    {
                        let pairs: Vec<(usize, bool)> = run
                            .map(|sampler| (sampler.id, sampler.conductance_based))
                            .collect();
                        match config {
                            SourceConfiguration::NoiseNetwork(parameters) => {
                                plans.push(GroupPlan::Noise(plan_noise_group(
                                    parameters,
                                    &pairs,
                                    self.converter,
                                )?));
                            }
                            SourceConfiguration::PoissonPool(parameters) => {
                                plans.push(GroupPlan::Pool(plan_pool_group(
                                    parameters,
                                    &pairs,
                                    probe,
                                    self.converter,
                                )?));
                            }
                            _ => {
                                return Err(StimError::InvalidParameter(
                                    "mixed configuration variants in one group".to_string(),
                                ))
                            }
                        }
                    }
                }
                _ => {
                    plans.push(GroupPlan::Wired(self.compile_wired_group(
                        group.tag,
                        &group.samplers,
                        probe,
                        &mut registry,
                        population_mode,
                    )?));
                }
            }
        }

        log::debug!("compile phase: {}", CompilePhase::Done);
        Ok(TopologyPlan { groups: plans })
    }

    fn compile_wired_group(
        &self,
        tag: VariantTag,
        samplers: &[&Sampler],
        probe: &impl CapabilityProbe,
        registry: &mut ModelRegistry,
        population_mode: bool,
    ) -> Result<WiredGroup, StimError> {
        // the spike-sharing mode must agree across the whole group
        let individual = samplers[0].config.individual_spike_trains();
        if samplers
            .iter()
            .any(|s| s.config.individual_spike_trains() != individual)
        {
            return Err(StimError::InvalidParameter(
                "all configurations of a group must have the same individual_spike_trains \
                 setting"
                    .to_string(),
            ));
        }

        log::debug!("compile phase: {}", CompilePhase::Index);
        let spec_lists: Vec<Vec<SourceSpec>> = samplers
            .iter()
            .map(|sampler| sampler.config.build_specs())
            .collect();
        let counts: Vec<usize> = spec_lists.iter().map(|specs| specs.len()).collect();
        let offsets = OffsetTable::build(&counts);
        let specs: Vec<SourceSpec> = spec_lists.into_iter().flatten().collect();

        log::debug!("compile phase: {}", CompilePhase::Deduplicate);
        let dedup = deduplicate(specs.iter().map(|spec| &spec.parameters));
        log::info!(
            "Creating {} different {} sources for {} slots.",
            dedup.unique.len(),
            tag,
            specs.len()
        );

        log::debug!("compile phase: {}", CompilePhase::Classify);
        let weights: Vec<f64> = specs.iter().map(|spec| spec.weight).collect();
        let receptors = classify(&weights);

        log::debug!("compile phase: {}", CompilePhase::Validate);
        if population_mode && matches!(tag, VariantTag::Poisson | VariantTag::SinusPoisson) {
            check_mixed_signs(&weights)?;
        }

        let generators =
            self.resolve_generators(tag, &dedup.unique, probe, registry)?;

        // the converter runs once over the whole group, array-wise
        let converted = self.converter.convert(&weights);
        if converted.len() != weights.len() {
            return Err(StimError::InvalidParameter(format!(
                "weight converter returned {} weights for {}",
                converted.len(),
                weights.len()
            )));
        }

        let relays: Vec<RelaySpec> = dedup
            .spec_to_generator
            .iter()
            .map(|generator_index| RelaySpec {
                generator_index: *generator_index,
            })
            .collect();

        let wiring: Vec<WiringRow> = offsets
            .slot_targets()
            .iter()
            .enumerate()
            .map(|(slot, target)| WiringRow {
                generator_index: dedup.spec_to_generator[slot],
                relay_index: slot,
                target_index: samplers[*target].id,
                weight: converted[slot],
                receptor: receptors[slot],
            })
            .collect();

        // defensive: every row must follow the canonical sign rule
        audit_sign_policy(weights.iter().copied().zip(receptors.iter()))?;

        Ok(WiredGroup {
            tag,
            sampler_ids: samplers.iter().map(|s| s.id).collect(),
            conductance_based: samplers.iter().map(|s| s.conductance_based).collect(),
            generators,
            shared_spike_trains: !individual,
            relays,
            offsets,
            wiring,
        })
    }

    fn resolve_generators(
        &self,
        tag: VariantTag,
        unique: &[SourceParameters],
        probe: &impl CapabilityProbe,
        registry: &mut ModelRegistry,
    ) -> Result<Vec<GeneratorSpec>, StimError> {
        let (model, kwargs): (&str, Vec<(String, f64)>) = match tag {
            VariantTag::Poisson => {
                if probe.supports_model(LOOKAHEAD_POISSON_MODEL) {
                    log::info!("Using the buffered poisson generator.");
                    (
                        LOOKAHEAD_POISSON_MODEL,
                        vec![("steps_lookahead".to_string(), LOOKAHEAD_STEPS as f64)],
                    )
                } else if probe.supports_model(POISSON_MODEL) {
                    (POISSON_MODEL, vec![])
                } else {
                    return Err(StimError::UnsupportedBackendModel(
                        POISSON_MODEL.to_string(),
                    ));
                }
            }
            VariantTag::SinusPoisson => {
                if !probe.supports_model(SINUS_POISSON_MODEL) {
                    return Err(StimError::UnsupportedBackendModel(
                        SINUS_POISSON_MODEL.to_string(),
                    ));
                }
                (SINUS_POISSON_MODEL, vec![])
            }
            VariantTag::MultiPoissonVarRate => {
                if !probe.supports_model(MULTI_POISSON_MODEL) {
                    return Err(StimError::UnsupportedBackendModel(
                        MULTI_POISSON_MODEL.to_string(),
                    ));
                }
                // each unique schedule gets a registered, content-addressed model
                return Ok(unique
                    .iter()
                    .map(|parameters| GeneratorSpec {
                        model: registry.resolve(MULTI_POISSON_MODEL, parameters),
                        parameters: parameters.clone(),
                        kwargs: vec![],
                    })
                    .collect());
            }
            VariantTag::FixedSpikeTrain => {
                if !probe.supports_model(SPIKE_TRAIN_MODEL) {
                    return Err(StimError::UnsupportedBackendModel(
                        SPIKE_TRAIN_MODEL.to_string(),
                    ));
                }
                (SPIKE_TRAIN_MODEL, vec![])
            }
            VariantTag::NoiseNetwork | VariantTag::PoissonPool => {
                return Err(StimError::InvalidParameter(
                    "population variants carry no per-source generators".to_string(),
                ))
            }
        };

        Ok(unique
            .iter()
            .map(|parameters| GeneratorSpec {
                model: model.to_string(),
                parameters: parameters.clone(),
                kwargs: kwargs.clone(),
            })
            .collect())
    }
}

/// The backend entities created for one group.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct GroupRealization {
    pub generators: Vec<EntityId>,
    /// The generator-shared relay layer, present only in shared
    /// spike-train mode.
    pub shared_relays: Vec<EntityId>,
    pub relays: Vec<EntityId>,
    pub neurons: Vec<EntityId>,
}

/// The backend entities created for a whole plan.
#[derive(Debug, PartialEq, Clone)]
pub struct Realization {
    pub groups: Vec<GroupRealization>,
}

/// Create and wire the entities of a compiled plan.
///
/// `sampler_entities` resolves a sampler id to its backend handle by
/// position. The plan is re-validated first; the first backend call only
/// happens once the whole plan has passed, and a backend failure aborts
/// the call without retry or cleanup.
pub fn realize<B: Backend>(
    plan: &TopologyPlan,
    backend: &mut B,
    sampler_entities: &[EntityId],
) -> Result<Realization, StimError> {
    plan.validate()?;

    // resolve every referenced sampler id before creating anything
    let resolve = |id: usize| -> Result<EntityId, StimError> {
        sampler_entities
            .get(id)
            .copied()
            .ok_or_else(|| StimError::InvalidParameter(format!("no entity for sampler {}", id)))
    };
    for group in &plan.groups {
        let ids: &[usize] = match group {
            GroupPlan::Wired(wired) => &wired.sampler_ids,
            GroupPlan::Noise(noise) => &noise.sampler_ids,
            GroupPlan::Pool(pool) => &pool.sampler_ids,
        };
        for id in ids {
            resolve(*id)?;
        }
    }

    let mut realized_groups = Vec::with_capacity(plan.groups.len());
    for group in &plan.groups {
        let realized = match group {
            GroupPlan::Wired(wired) => realize_wired(wired, backend, &resolve)?,
            GroupPlan::Noise(noise) => realize_noise(noise, backend, &resolve)?,
            GroupPlan::Pool(pool) => realize_pool(pool, backend, &resolve)?,
        };
        realized_groups.push(realized);
    }

    log::debug!("compile phase: {}", CompilePhase::Done);
    Ok(Realization {
        groups: realized_groups,
    })
}

fn realize_wired<B: Backend>(
    group: &WiredGroup,
    backend: &mut B,
    resolve: &impl Fn(usize) -> Result<EntityId, StimError>,
) -> Result<GroupRealization, StimError> {
    log::debug!("compile phase: {}", CompilePhase::CreateGenerators);
    let mut generators = Vec::with_capacity(group.generators.len());
    for generator in &group.generators {
        generators.push(backend.create_generator(generator)?);
    }

    log::debug!("compile phase: {}", CompilePhase::CreateRelays);
    // in shared mode a generator-shared relay layer carries the single
    // realization; every visible relay then taps that layer
    let (source_layer, shared_relays) = if group.shared_spike_trains {
        let shared = backend.create_relays(group.generators.len())?;
        backend.connect(&generators, &shared, ConnectionPattern::OneToOne, None)?;
        (shared.clone(), shared)
    } else {
        (generators.clone(), vec![])
    };

    let relays = backend.create_relays(group.relays.len())?;

    log::debug!("compile phase: {}", CompilePhase::Wire);
    let expanded: Vec<EntityId> = group
        .relays
        .iter()
        .map(|relay| source_layer[relay.generator_index])
        .collect();
    backend.connect(&expanded, &relays, ConnectionPattern::OneToOne, None)?;

    let conductance: HashMap<usize, bool> = group
        .sampler_ids
        .iter()
        .copied()
        .zip(group.conductance_based.iter().copied())
        .collect();

    for receptor in [Receptor::Excitatory, Receptor::Inhibitory] {
        let rows: Vec<&WiringRow> = group
            .wiring
            .iter()
            .filter(|row| row.receptor == receptor)
            .collect();
        if rows.is_empty() {
            continue;
        }
        let mut sources = Vec::with_capacity(rows.len());
        let mut targets = Vec::with_capacity(rows.len());
        let mut weights = Vec::with_capacity(rows.len());
        for row in rows {
            sources.push(relays[row.relay_index]);
            targets.push(resolve(row.target_index)?);
            let conductance_based = conductance.get(&row.target_index).copied().ok_or_else(
                || StimError::InvalidParameter(format!("unknown sampler {}", row.target_index)),
            )?;
            weights.push(if conductance_based {
                row.weight.abs()
            } else {
                row.weight
            });
        }
        backend.connect(
            &sources,
            &targets,
            ConnectionPattern::OneToOne,
            Some(&SynapseSpec {
                weights,
                receptor,
                delay: None,
            }),
        )?;
    }

    Ok(GroupRealization {
        generators,
        shared_relays,
        relays,
        neurons: vec![],
    })
}

fn realize_noise<B: Backend>(
    group: &NoiseGroup,
    backend: &mut B,
    resolve: &impl Fn(usize) -> Result<EntityId, StimError>,
) -> Result<GroupRealization, StimError> {
    let neurons =
        backend.create_neurons(group.parameters.n, &group.parameters.neuron_parameters)?;
    backend.initialize_membrane(&neurons, &group.initial_voltages)?;

    for projection in &group.internal {
        let sources: Vec<EntityId> = projection.sources.iter().map(|s| neurons[*s]).collect();
        let targets: Vec<EntityId> = projection.targets.iter().map(|t| neurons[*t]).collect();
        backend.connect(
            &sources,
            &targets,
            ConnectionPattern::OneToOne,
            Some(&SynapseSpec {
                weights: vec![projection.weight; sources.len()],
                receptor: projection.receptor,
                delay: Some(projection.delay),
            }),
        )?;
    }

    log::debug!("compile phase: {}", CompilePhase::AttachExternalWiring);
    for projection in &group.external {
        let sources: Vec<EntityId> = projection.sources.iter().map(|s| neurons[*s]).collect();
        let mut targets = Vec::with_capacity(projection.targets.len());
        for target in &projection.targets {
            targets.push(resolve(*target)?);
        }
        backend.connect(
            &sources,
            &targets,
            ConnectionPattern::OneToOne,
            Some(&SynapseSpec {
                weights: vec![projection.weight; sources.len()],
                receptor: projection.receptor,
                delay: Some(projection.delay),
            }),
        )?;
    }

    Ok(GroupRealization {
        neurons,
        ..Default::default()
    })
}

fn realize_pool<B: Backend>(
    group: &PoolGroup,
    backend: &mut B,
    resolve: &impl Fn(usize) -> Result<EntityId, StimError>,
) -> Result<GroupRealization, StimError> {
    let generator = backend.create_generator(&group.generator)?;
    let relays = backend.create_relays(group.parameters.n)?;
    backend.connect(&[generator], &relays, ConnectionPattern::AllToAll, None)?;

    log::debug!("compile phase: {}", CompilePhase::AttachExternalWiring);
    for projection in &group.external {
        let sources: Vec<EntityId> = projection.sources.iter().map(|s| relays[*s]).collect();
        let mut targets = Vec::with_capacity(projection.targets.len());
        for target in &projection.targets {
            targets.push(resolve(*target)?);
        }
        backend.connect(
            &sources,
            &targets,
            ConnectionPattern::OneToOne,
            Some(&SynapseSpec {
                weights: vec![projection.weight; sources.len()],
                receptor: projection.receptor,
                delay: Some(projection.delay),
            }),
        )?;
    }

    Ok(GroupRealization {
        generators: vec![generator],
        relays,
        ..Default::default()
    })
}
