//! Whole-run behaviour of the epidemic engine on small hand-built graphs.

use contagion_net::{
    Compartment, CompartmentCounts, ConstantRiskModel, ContactGraph, DefaultRiskModel,
    EpidemicEngine, Individual, InitialCounts, InterventionContext, Lockdown, PersonAttributes, Population,
    InterventionPolicy, RiskModel, SimError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Helpers
// ============================================================================

fn ring(n: usize, weight: f64) -> ContactGraph {
    ContactGraph::from_edges(n, (0..n).map(|i| (i, (i + 1) % n, weight))).unwrap()
}

fn constant(become_infected: f64, recover: f64, die: f64) -> ConstantRiskModel {
    ConstantRiskModel {
        become_infected,
        recover,
        die,
    }
}

fn seeded(size: usize, susceptible: usize, infected: usize, rng: &mut StdRng) -> Population {
    let initial = InitialCounts {
        susceptible,
        infected,
        ..InitialCounts::default()
    };
    Population::seed(size, &initial, &PersonAttributes::default(), rng).unwrap()
}

fn infected_ids(population: &Population) -> Vec<usize> {
    population
        .iter()
        .filter(|p| p.compartment == Compartment::Infected)
        .map(|p| p.id)
        .collect()
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn ten_person_ring_without_transmission_recovers_in_one_cycle() {
    let mut rng = StdRng::seed_from_u64(2020);
    let population = seeded(10, 9, 1, &mut rng);
    let mut engine =
        EpidemicEngine::new(ring(10, 0.0), population, constant(0.0, 1.0, 0.0), rng).unwrap();

    let history = engine.run(1).unwrap();

    assert_eq!(history.infected(), &[1, 0]);
    assert_eq!(history.recovered(), &[0, 1]);
    assert_eq!(history.susceptible(), &[9, 9]);
    assert_eq!(history.asymptomatic(), &[0, 0]);
    assert_eq!(history.dead(), &[0, 0]);
}

#[test]
fn zero_weight_graph_never_transmits() {
    let mut rng = StdRng::seed_from_u64(9);
    let population = seeded(30, 25, 5, &mut rng);
    let mut engine =
        EpidemicEngine::new(ring(30, 0.0), population, DefaultRiskModel::canonical(), rng)
            .unwrap();

    let history = engine.run(40).unwrap();

    assert_eq!(history.len(), 41);
    assert!(history.susceptible().iter().all(|&s| s == 25));
}

#[test]
fn full_weight_graph_reaches_every_direct_contact_in_one_cycle() {
    // hub 0 linked to everyone, plus a chain 1-2-3-4-5
    let mut edges: Vec<(usize, usize, f64)> = (1..6).map(|i| (0, i, 1.0)).collect();
    edges.extend((1..5).map(|i| (i, i + 1, 1.0)));
    let graph = ContactGraph::from_edges(6, edges).unwrap();
    let population = Population::from_compartments(
        &[
            Compartment::Infected,
            Compartment::Susceptible,
            Compartment::Susceptible,
            Compartment::Susceptible,
            Compartment::Susceptible,
            Compartment::Susceptible,
        ],
        40.0,
    );
    let mut engine = EpidemicEngine::new(
        graph,
        population,
        constant(0.0, 0.0, 0.0),
        StdRng::seed_from_u64(1),
    )
    .unwrap();

    let counts = *engine.step().unwrap();

    assert_eq!(counts.asymptomatic, 5);
    assert_eq!(counts.susceptible, 0);
    assert!(engine
        .population()
        .iter()
        .skip(1)
        .all(|p| p.time_of_infection == Some(1)));
}

#[test]
fn testing_isolates_contacts_of_every_case() {
    let mut rng = StdRng::seed_from_u64(77);
    let population = seeded(20, 17, 3, &mut rng);
    let mut engine = EpidemicEngine::new(ring(20, 0.0), population, constant(0.0, 0.0, 0.0), rng)
        .unwrap()
        .with_tests_per_step(20);
    let before = engine.graph().edge_count();

    engine.step().unwrap();

    assert!(engine.graph().edge_count() < before);
    // the cases keep their own edges, their contacts lose the others
    for id in infected_ids(engine.population()) {
        for contact in engine.graph().neighbors(id).collect::<Vec<_>>() {
            assert!(engine.graph().neighbors(contact).all(|n| n == id
                || infected_ids(engine.population()).contains(&n)));
        }
    }
}

#[test]
fn zero_test_budget_leaves_the_graph_alone() {
    let mut rng = StdRng::seed_from_u64(77);
    let population = seeded(20, 17, 3, &mut rng);
    let mut engine =
        EpidemicEngine::new(ring(20, 0.0), population, constant(0.0, 0.0, 0.0), rng).unwrap();
    engine.run(5).unwrap();
    assert_eq!(engine.graph().edge_count(), 20);
}

// ============================================================================
// Determinism
// ============================================================================

fn run_model(seed: u64) -> contagion_net::CountHistory {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = ContactGraph::from_edges(
        60,
        (0..60).flat_map(|i| vec![(i, (i + 1) % 60, 0.0), (i, (i + 7) % 60, 0.0)]),
    )
    .unwrap();
    graph.randomize_weights(&mut rng);
    let population = seeded(60, 55, 5, &mut rng);
    let mut engine = EpidemicEngine::new(graph, population, DefaultRiskModel::canonical(), rng)
        .unwrap()
        .with_tests_per_step(2);
    engine.run(30).unwrap()
}

#[test]
fn same_seed_same_epidemic() {
    assert_eq!(run_model(4), run_model(4));
}

#[test]
fn different_seeds_usually_differ() {
    let runs: Vec<_> = (0..5).map(run_model).collect();
    assert!(runs.windows(2).any(|pair| pair[0] != pair[1]));
}

// ============================================================================
// Policies and risk models
// ============================================================================

struct Recorder(Rc<RefCell<Vec<(usize, CompartmentCounts)>>>);

impl InterventionPolicy for Recorder {
    fn intervene(&mut self, ctx: &mut InterventionContext<'_>) {
        self.0.borrow_mut().push((ctx.timestep, *ctx.counts));
    }
}

#[test]
fn policy_sees_every_completed_cycle() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut rng = StdRng::seed_from_u64(5);
    let population = seeded(12, 10, 2, &mut rng);
    let mut engine = EpidemicEngine::new(ring(12, 0.5), population, constant(0.3, 0.2, 0.1), rng)
        .unwrap()
        .with_policy(Recorder(Rc::clone(&seen)));
    let history = engine.run(4).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    for (t, counts) in seen.iter() {
        assert_eq!(history.at(*t), Some(*counts));
    }
}

#[test]
fn policy_can_raise_the_test_budget() {
    fn start_testing(ctx: &mut InterventionContext<'_>) {
        if ctx.timestep == 1 {
            *ctx.tests_per_step = 5;
        }
    }
    let population = Population::from_compartments(
        &[
            Compartment::Infected,
            Compartment::Susceptible,
            Compartment::Susceptible,
            Compartment::Susceptible,
            Compartment::Susceptible,
            Compartment::Susceptible,
        ],
        40.0,
    );
    let mut engine = EpidemicEngine::new(
        ring(6, 0.0),
        population,
        constant(0.0, 0.0, 0.0),
        StdRng::seed_from_u64(3),
    )
    .unwrap()
    .with_policy(start_testing);

    engine.step().unwrap();
    assert_eq!(engine.graph().edge_count(), 6);
    assert_eq!(engine.tests_per_step(), 5);
    engine.step().unwrap();
    assert_eq!(engine.graph().edge_count(), 4);
}

#[test]
fn lockdown_cuts_heavy_contacts_once_cases_pile_up() {
    let mut rng = StdRng::seed_from_u64(8);
    let population = seeded(10, 6, 4, &mut rng);
    let weights = |i: usize| if i % 2 == 0 { 0.0 } else { 0.9 };
    let graph = ContactGraph::from_edges(10, (0..10).map(|i| (i, (i + 1) % 10, weights(i)))).unwrap();
    let mut engine = EpidemicEngine::new(graph, population, constant(0.0, 0.0, 0.0), rng)
        .unwrap()
        .with_policy(Lockdown::new(4, 0.5));

    engine.step().unwrap();
    assert!(engine.graph().edges_of(0).all(|(_, w)| w <= 0.5));
    assert_eq!(engine.graph().edge_count(), 5);
}

struct AgeOnly;

impl RiskModel for AgeOnly {
    fn p_become_infected(&self, _person: &Individual) -> f64 {
        0.0
    }
    fn p_recover(&self, _person: &Individual) -> f64 {
        0.0
    }
    fn p_die(&self, person: &Individual) -> f64 {
        if person.age > 65.0 {
            1.0
        } else {
            0.0
        }
    }
}

#[test]
fn custom_risk_models_see_the_person() {
    let people: Vec<Individual> = (0..4)
        .map(|id| Individual::new(id, 30.0 + 20.0 * id as f64, Compartment::Infected))
        .collect();
    let mut engine = EpidemicEngine::new(
        ContactGraph::new(4),
        Population::from_individuals(people).unwrap(),
        AgeOnly,
        StdRng::seed_from_u64(0),
    )
    .unwrap();

    engine.step().unwrap();

    // ages 30, 50, 70, 90
    let dead: Vec<bool> = engine.population().iter().map(|p| p.dead()).collect();
    assert_eq!(dead, vec![false, false, true, true]);
}

#[test]
fn risk_values_out_of_range_halt_the_run() {
    let mut rng = StdRng::seed_from_u64(1);
    let population = seeded(5, 4, 1, &mut rng);
    let mut engine =
        EpidemicEngine::new(ring(5, 0.0), population, constant(0.0, 0.0, -0.1), rng).unwrap();
    assert!(matches!(
        engine.run(3),
        Err(SimError::InvalidProbability { function: "p_die", .. })
    ));
}
