use rusty_stim::backend::{
    ConnectionPattern, IdentityWeightConverter, NestWeightConverter, RecordingBackend,
};
use rusty_stim::config::{
    NeuronParameters, NoiseNetworkParameters, PoissonPoolParameters, SourceConfiguration,
};
use rusty_stim::error::StimError;
use rusty_stim::receptor::Receptor;
use rusty_stim::sampler::Sampler;
use rusty_stim::topology::{
    realize, GroupPlan, TopologyBuilder, TopologyPlan, LOOKAHEAD_POISSON_MODEL, POISSON_MODEL,
    SINUS_POISSON_MODEL, SPIKE_TRAIN_MODEL,
};

fn all_models() -> Vec<String> {
    vec![
        POISSON_MODEL.to_string(),
        LOOKAHEAD_POISSON_MODEL.to_string(),
        SINUS_POISSON_MODEL.to_string(),
        SPIKE_TRAIN_MODEL.to_string(),
    ]
}

fn poisson_sampler(id: usize, rates: Vec<f64>, weights: Vec<f64>) -> Sampler {
    Sampler::new(
        id,
        true,
        SourceConfiguration::poisson(rates, weights).unwrap(),
    )
}

#[test]
fn test_wiring_row_count_matches_total_sources() {
    // samplers with source counts [2, 1, 3]
    let samplers = vec![
        poisson_sampler(0, vec![2000.0], vec![0.001, -0.001]),
        poisson_sampler(1, vec![1500.0], vec![0.002]),
        poisson_sampler(2, vec![1000.0, 2000.0, 3000.0], vec![0.001, -0.001, 0.003]),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let probe = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &probe).unwrap();

    let total: usize = samplers.iter().map(|s| s.num_sources()).sum();
    assert_eq!(plan.num_wiring_rows(), total);

    let GroupPlan::Wired(group) = &plan.groups[0] else {
        panic!("expected a wired group");
    };
    // offsets [2, 3, 6]; flat slot 4 belongs to the third sampler
    assert_eq!(group.offsets.offsets(), &[2, 3, 6]);
    assert_eq!(group.offsets.target_of(4), Some(2));
    assert_eq!(group.wiring[4].target_index, 2);

    // one relay per source, never fewer generators than zero, never more
    // generators than wiring rows
    assert_eq!(group.relays.len(), group.wiring.len());
    assert!(group.generators.len() <= group.wiring.len());
}

#[test]
fn test_shared_rate_pair_deduplicates_to_one_generator() {
    // two samplers, equal rates, opposite weights: one generator, two
    // relays, one excitatory and one inhibitory row
    let samplers = vec![
        poisson_sampler(0, vec![2000.0], vec![0.001]),
        poisson_sampler(1, vec![2000.0], vec![-0.001]),
    ];
    let converter = NestWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(vec![POISSON_MODEL.to_string()]);
    let plan = builder.compile(&samplers, &backend).unwrap();

    let GroupPlan::Wired(group) = &plan.groups[0] else {
        panic!("expected a wired group");
    };
    assert_eq!(group.generators.len(), 1);
    assert_eq!(group.relays.len(), 2);

    assert_eq!(group.wiring[0].generator_index, 0);
    assert_eq!(group.wiring[0].relay_index, 0);
    assert_eq!(group.wiring[0].target_index, 0);
    assert_eq!(group.wiring[0].weight, 1.0);
    assert_eq!(group.wiring[0].receptor, Receptor::Excitatory);

    assert_eq!(group.wiring[1].generator_index, 0);
    assert_eq!(group.wiring[1].relay_index, 1);
    assert_eq!(group.wiring[1].target_index, 1);
    assert_eq!(group.wiring[1].weight, -1.0);
    assert_eq!(group.wiring[1].receptor, Receptor::Inhibitory);

    let realization = realize(&plan, &mut backend, &[50, 51]).unwrap();
    assert_eq!(realization.groups[0].generators.len(), 1);
    assert_eq!(realization.groups[0].relays.len(), 2);
    assert!(realization.groups[0].shared_relays.is_empty());

    // generator fans out to both relays even though the parameters are shared
    let fan_out = &backend.connections[0];
    assert_eq!(fan_out.pattern, ConnectionPattern::OneToOne);
    assert_eq!(fan_out.sources.len(), 2);
    assert_eq!(fan_out.sources[0], fan_out.sources[1]);
}

#[test]
fn test_shared_spike_trains_insert_hidden_layer() {
    // three samplers sharing one rate, individual_spike_trains = false:
    // one hidden generator, one generator-shared relay, three visible relays
    let config = SourceConfiguration::sinus_poisson(
        vec![2000.0],
        vec![1000.0],
        vec![5.0],
        vec![0.0],
        vec![0.001, -0.001],
        false,
    )
    .unwrap();
    let samplers = vec![
        Sampler::new(0, true, config.clone()),
        Sampler::new(1, true, config.clone()),
        Sampler::new(2, true, config),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &backend).unwrap();

    let GroupPlan::Wired(group) = &plan.groups[0] else {
        panic!("expected a wired group");
    };
    assert!(group.shared_spike_trains);
    // the weight is not part of the dedup key, so the six sources share a
    // single parameter tuple and a single generator
    assert_eq!(group.generators.len(), 1);
    assert_eq!(group.relays.len(), 6);
    assert_eq!(group.wiring.len(), 6);

    let realization = realize(&plan, &mut backend, &[10, 11, 12]).unwrap();
    assert_eq!(realization.groups[0].generators.len(), 1);
    assert_eq!(realization.groups[0].shared_relays.len(), 1);
    assert_eq!(realization.groups[0].relays.len(), 6);
    // shared layer plus visible layer
    assert_eq!(backend.num_relays, 7);
}

#[test]
fn test_one_rate_three_samplers_shared_realization() {
    // the same with a single source per sampler: exactly one hidden
    // generator, one shared-layer relay, three visible relays
    let config = SourceConfiguration::sinus_poisson(
        vec![2000.0],
        vec![1000.0],
        vec![5.0],
        vec![0.0],
        vec![0.001],
        false,
    )
    .unwrap();
    let samplers = vec![
        Sampler::new(0, true, config.clone()),
        Sampler::new(1, true, config.clone()),
        Sampler::new(2, true, config),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &backend).unwrap();

    let realization = realize(&plan, &mut backend, &[10, 11, 12]).unwrap();
    assert_eq!(realization.groups[0].generators.len(), 1);
    assert_eq!(realization.groups[0].shared_relays.len(), 1);
    assert_eq!(realization.groups[0].relays.len(), 3);
    assert_eq!(plan.num_wiring_rows(), 3);
}

#[test]
fn test_adjacency_grouping_fragments_interleaved_variants() {
    let sinus = SourceConfiguration::sinus_poisson(
        vec![2000.0],
        vec![1000.0],
        vec![5.0],
        vec![0.0],
        vec![0.001, -0.001],
        true,
    )
    .unwrap();
    let samplers = vec![
        poisson_sampler(0, vec![2000.0], vec![0.001, -0.001]),
        Sampler::new(1, true, sinus),
        poisson_sampler(2, vec![2000.0], vec![0.001, -0.001]),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let probe = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &probe).unwrap();

    // the two poisson samplers are separated and do not share a group, so
    // their identical rates are deduplicated per group, not globally
    assert_eq!(plan.groups.len(), 3);
    assert_eq!(plan.num_generators(), 3);
    assert_eq!(plan.num_wiring_rows(), 6);
}

#[test]
fn test_realize_checks_handles_before_creating() {
    let samplers = vec![poisson_sampler(7, vec![2000.0], vec![0.001, -0.001])];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &backend).unwrap();

    // sampler id 7 has no handle: the realize call must fail without
    // creating a single entity
    let result = realize(&plan, &mut backend, &[100, 101]);
    assert!(matches!(result, Err(StimError::InvalidParameter(_))));
    assert!(backend.generators.is_empty());
    assert_eq!(backend.num_relays, 0);
    assert!(backend.connections.is_empty());
}

#[test]
fn test_realize_conductance_targets_get_magnitudes() {
    let samplers = vec![
        poisson_sampler(0, vec![2000.0], vec![0.001, -0.001]),
        Sampler::new(
            1,
            false,
            SourceConfiguration::poisson(vec![2000.0], vec![0.001, -0.001]).unwrap(),
        ),
    ];
    let converter = NestWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(vec![POISSON_MODEL.to_string()]);
    let plan = builder.compile(&samplers, &backend).unwrap();
    realize(&plan, &mut backend, &[10, 11]).unwrap();

    let inhibitory = backend
        .connections
        .iter()
        .find(|c| {
            c.synapse
                .as_ref()
                .is_some_and(|s| s.receptor == Receptor::Inhibitory)
        })
        .unwrap();
    let synapse = inhibitory.synapse.as_ref().unwrap();
    // conductance-based sampler 0 receives the magnitude, current-based
    // sampler 1 the signed weight
    assert_eq!(synapse.weights, vec![1.0, -1.0]);
}

#[test]
fn test_noise_network_end_to_end() {
    let parameters = NoiseNetworkParameters {
        n: 12,
        gamma: 0.75,
        epsilon: 0.4,
        epsilon_external: 0.5,
        neuron_parameters: NeuronParameters::CurrentBased {
            tau_syn_e: 10.0,
            tau_syn_i: 10.0,
            v_rest: -50.0,
            v_reset: -50.1,
            v_thresh: -49.9,
        },
        delay_internal: 0.1,
        delay_external: 1.0,
        g: 5.0,
        j_e: 0.3,
        f_j_external: 1.0,
        rate: 10.0,
        seed: 424242,
    };
    let samplers = vec![
        Sampler::new(
            0,
            true,
            SourceConfiguration::noise_network(parameters.clone()).unwrap(),
        ),
        Sampler::new(
            1,
            true,
            SourceConfiguration::noise_network(parameters).unwrap(),
        ),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &backend).unwrap();

    // both samplers share one configuration, hence one network
    assert_eq!(plan.groups.len(), 1);
    let GroupPlan::Noise(group) = &plan.groups[0] else {
        panic!("expected a noise group");
    };
    assert_eq!(group.initial_voltages.len(), 12);

    let realization = realize(&plan, &mut backend, &[20, 21]).unwrap();
    assert_eq!(realization.groups[0].neurons.len(), 12);
    assert_eq!(backend.num_neurons, 12);
    assert_eq!(backend.membrane_voltages.len(), 12);
    // recurrent EE/EI/IE/II plus one exc and one inh projection per sampler
    assert_eq!(backend.connections.len(), 8);
}

#[test]
fn test_distinct_noise_configurations_make_distinct_networks() {
    let parameters = NoiseNetworkParameters {
        n: 8,
        gamma: 0.5,
        epsilon: 0.0,
        epsilon_external: 0.5,
        neuron_parameters: NeuronParameters::CurrentBased {
            tau_syn_e: 10.0,
            tau_syn_i: 10.0,
            v_rest: -50.0,
            v_reset: -50.1,
            v_thresh: -49.9,
        },
        delay_internal: 0.1,
        delay_external: 1.0,
        g: 5.0,
        j_e: 0.3,
        f_j_external: 1.0,
        rate: 10.0,
        seed: 1,
    };
    let mut other = parameters.clone();
    other.seed = 2;

    let samplers = vec![
        Sampler::new(
            0,
            true,
            SourceConfiguration::noise_network(parameters).unwrap(),
        ),
        Sampler::new(1, true, SourceConfiguration::noise_network(other).unwrap()),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let probe = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &probe).unwrap();
    assert_eq!(plan.groups.len(), 2);
}

#[test]
fn test_fixed_spike_trains_deduplicate_by_times() {
    // sources 0 and 1 of each sampler carry the same spike train; across
    // both samplers that is one unique train plus one distinct train
    let config_a = SourceConfiguration::fixed_spike_train(
        vec![100.0],
        vec![0.001, -0.001],
        vec![1.0, 1.0, 2.5, 2.5],
        vec![0, 1, 0, 1],
    )
    .unwrap();
    let config_b = SourceConfiguration::fixed_spike_train(
        vec![100.0],
        vec![0.002],
        vec![1.0, 4.0],
        vec![0, 0],
    )
    .unwrap();
    let samplers = vec![
        Sampler::new(0, true, config_a),
        Sampler::new(1, true, config_b),
    ];
    let converter = IdentityWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let probe = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &probe).unwrap();

    let GroupPlan::Wired(group) = &plan.groups[0] else {
        panic!("expected a wired group");
    };
    // trains [1.0, 2.5] (twice) and [1.0, 4.0]: two generators, three relays
    assert_eq!(group.generators.len(), 2);
    assert_eq!(group.relays.len(), 3);
    assert!(group
        .generators
        .iter()
        .all(|g| g.model == SPIKE_TRAIN_MODEL));
}

#[test]
fn test_poisson_pool_end_to_end() {
    let parameters = PoissonPoolParameters {
        n: 10,
        gamma: 0.6,
        source_model: POISSON_MODEL.to_string(),
        source_model_kwargs: vec![],
        epsilon_external: 0.5,
        delay_external: 1.0,
        g: 4.0,
        j_e: 0.2,
        rate: 100.0,
        seed: 424242,
    };
    let samplers = vec![Sampler::new(
        0,
        true,
        SourceConfiguration::poisson_pool(parameters).unwrap(),
    )];
    let converter = NestWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let mut backend = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &backend).unwrap();

    let realization = realize(&plan, &mut backend, &[30]).unwrap();
    assert_eq!(realization.groups[0].generators.len(), 1);
    assert_eq!(realization.groups[0].relays.len(), 10);

    // the generator fans out to the whole pool, then the pool wires into
    // the sampler with a fixed indegree per receptor
    let fan_out = &backend.connections[0];
    assert_eq!(fan_out.pattern, ConnectionPattern::AllToAll);
    assert_eq!(fan_out.targets.len(), 10);
    // exc indegree round(6 * 0.5) = 3, inh indegree round(4 * 0.5) = 2
    assert_eq!(backend.connections[1].sources.len(), 3);
    assert_eq!(backend.connections[2].sources.len(), 2);
}

#[test]
fn test_plan_round_trip_through_file() {
    let samplers = vec![
        poisson_sampler(0, vec![2000.0], vec![0.001, -0.001]),
        poisson_sampler(1, vec![3000.0], vec![0.002, -0.002]),
    ];
    let converter = NestWeightConverter;
    let builder = TopologyBuilder::new(&converter);
    let probe = RecordingBackend::new(all_models());
    let plan = builder.compile(&samplers, &probe).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    plan.save_to(&path).unwrap();
    let loaded = TopologyPlan::load_from(&path).unwrap();
    assert_eq!(plan, loaded);
    assert_eq!(loaded.validate(), Ok(()));
}
