//! This crate compiles stimulus-source configurations into a wiring topology
//! for spiking sampler networks.
//!
//! Every sampler carries a [`config::SourceConfiguration`] describing its
//! noise input. A compile turns an ordered sampler sequence into a
//! [`topology::TopologyPlan`]: a deduplicated pool of generators, one relay
//! per source and a flat wiring table partitioned into excitatory and
//! inhibitory edges. The plan is pure data; handing it to a backend adapter
//! via [`topology::realize`] is the only step that creates simulator
//! entities.
//!
//! # Compiling a Topology
//!
//! ```rust
//! use rusty_stim::backend::{NestWeightConverter, RecordingBackend};
//! use rusty_stim::config::SourceConfiguration;
//! use rusty_stim::sampler::Sampler;
//! use rusty_stim::topology::{realize, TopologyBuilder, POISSON_MODEL};
//!
//! let samplers = vec![
//!     Sampler::new(
//!         0,
//!         true,
//!         SourceConfiguration::poisson(vec![2000.0], vec![0.001, -0.001]).unwrap(),
//!     ),
//!     Sampler::new(
//!         1,
//!         true,
//!         SourceConfiguration::poisson(vec![2000.0], vec![0.001, -0.001]).unwrap(),
//!     ),
//! ];
//!
//! let converter = NestWeightConverter;
//! let mut backend = RecordingBackend::new(vec![POISSON_MODEL.to_string()]);
//!
//! // Compile first: all validation happens before any entity is created.
//! let plan = TopologyBuilder::new(&converter)
//!     .compile(&samplers, &backend)
//!     .unwrap();
//! assert_eq!(plan.num_wiring_rows(), 4);
//!
//! // Identical rates share a generator; every source keeps its own relay.
//! assert_eq!(plan.num_generators(), 1);
//!
//! // Hand the plan to the backend; sampler ids resolve to these handles.
//! let sampler_entities = vec![100, 101];
//! realize(&plan, &mut backend, &sampler_entities).unwrap();
//! assert_eq!(backend.num_relays, 4);
//! ```
//!
//! # Calibration Populations
//!
//! ```rust
//! use rusty_stim::backend::{IdentityWeightConverter, RecordingBackend};
//! use rusty_stim::config::SourceConfiguration;
//! use rusty_stim::topology::{TopologyBuilder, POISSON_MODEL};
//!
//! let converter = IdentityWeightConverter;
//! let probe = RecordingBackend::new(vec![POISSON_MODEL.to_string()]);
//! let config = SourceConfiguration::poisson(vec![2000.0], vec![0.001, -0.001]).unwrap();
//!
//! // All samplers of the population share the sources of one configuration.
//! let plan = TopologyBuilder::new(&converter)
//!     .compile_population(10, true, &config, &probe)
//!     .unwrap();
//! assert_eq!(plan.num_wiring_rows(), 20);
//! ```

pub mod backend;
pub mod config;
pub mod dedup;
pub mod error;
pub mod noise;
pub mod offsets;
pub mod partition;
pub mod receptor;
pub mod sampler;
pub mod source;
pub mod topology;

/// The lookahead buffer size of the buffered Poisson generator model.
pub const LOOKAHEAD_STEPS: usize = 10000;
/// The scale between frontend (µS/nA) and backend (nS/pA) synaptic weights.
pub const WEIGHT_SCALE_PYNN_TO_NEST: f64 = 1000.0;
/// The default wiring seed of noise-network and pool configurations.
pub const DEFAULT_NOISE_SEED: u64 = 424242;
