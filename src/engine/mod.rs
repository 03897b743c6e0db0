/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// engine module
//
// the engine runs the model one cycle at a time
//
// In each cycle - infectious people expose their neighbours, the sick progress
// along the disease path, the infected get tested and their contacts isolated,
// and finally the intervention policy has its say
//
// every decision in a cycle is taken against the compartments as they stood at
// the start of the cycle, so the order people are visited in cannot change who
// gets infected
//
////////////////////////////////////////////////////////////////////////////////////

use crate::error::SimError;
use crate::graph::ContactGraph;
use crate::policy::{InterventionContext, InterventionPolicy, NoIntervention};
use crate::risk::RiskModel;
use crate::stats::CountHistory;
use crate::world::{Compartment, CompartmentCounts, Individual, Population};
use log::{debug, info, trace};
use rand::prelude::*;
use std::mem;

// Contact events -------------------------------------------------------------------------------------
//
// one event per exposure of a susceptible person to an infectious neighbour

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ContactEvent {
    pub cycle: usize,
    pub source: usize,
    pub target: usize,
    pub weight: f64,
    pub transmitted: bool,
}

pub trait ContactSink {
    fn on_contact(&mut self, event: &ContactEvent);
}

impl<F> ContactSink for F
where
    F: FnMut(&ContactEvent),
{
    fn on_contact(&mut self, event: &ContactEvent) {
        self(event)
    }
}

// Engine ---------------------------------------------------------------------------------------------
pub struct EpidemicEngine<M: RiskModel> {
    graph: ContactGraph,
    population: Population,
    counts: CompartmentCounts,
    history: CountHistory,
    risk: M,
    policy: Box<dyn InterventionPolicy>,
    sink: Option<Box<dyn ContactSink>>,
    rng: StdRng,
    tests_per_step: usize,
    tested: Vec<bool>, // tested at some point in the run
    snapshot: Vec<Compartment>,
    seen: Vec<bool>,
    cycle: usize,
}

impl<M: RiskModel> EpidemicEngine<M> {
    /// The population must hold exactly one person per graph node.
    pub fn new(
        graph: ContactGraph,
        population: Population,
        risk: M,
        rng: StdRng,
    ) -> Result<EpidemicEngine<M>, SimError> {
        if population.is_empty() {
            return Err(SimError::EmptyPopulation);
        }
        if population.len() != graph.node_count() {
            return Err(SimError::InvalidSeed {
                expected: graph.node_count(),
                actual: population.len(),
            });
        }

        let size = population.len();
        let counts = population.counts();
        let mut history = CountHistory::default();
        history.push(&counts);
        Ok(EpidemicEngine {
            graph,
            population,
            counts,
            history,
            risk,
            policy: Box::new(NoIntervention),
            sink: None,
            rng,
            tests_per_step: 0,
            tested: vec![false; size],
            snapshot: Vec::with_capacity(size),
            seen: vec![false; size],
            cycle: 0,
        })
    }

    pub fn with_policy<P: InterventionPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Infected people that can be tested per cycle. Zero turns testing off.
    pub fn with_tests_per_step(mut self, tests_per_step: usize) -> Self {
        self.tests_per_step = tests_per_step;
        self
    }

    pub fn with_contact_sink<S: ContactSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn graph(&self) -> &ContactGraph {
        &self.graph
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn counts(&self) -> &CompartmentCounts {
        &self.counts
    }

    pub fn history(&self) -> &CountHistory {
        &self.history
    }

    pub fn cycle(&self) -> usize {
        self.cycle
    }

    pub fn tests_per_step(&self) -> usize {
        self.tests_per_step
    }

    /// Runs `cycles` more cycles and returns the count series, initial state included.
    pub fn run(&mut self, cycles: usize) -> Result<CountHistory, SimError> {
        info!(
            "Running {} cycles over {} people and {} contacts",
            cycles,
            self.population.len(),
            self.graph.edge_count()
        );
        for _ in 0..cycles {
            self.step()?;
        }
        info!("Finished at cycle {} - {}", self.cycle, self.counts);
        Ok(self.history.clone())
    }

    /// Advances the model by one cycle.
    pub fn step(&mut self) -> Result<&CompartmentCounts, SimError> {
        let cycle = self.cycle + 1;

        let mut snapshot = mem::take(&mut self.snapshot);
        snapshot.clear();
        snapshot.extend(self.population.iter().map(|p| p.compartment));
        self.seen.iter_mut().for_each(|seen| *seen = false);

        self.transmit(cycle, &snapshot);
        let result = self.progress(cycle, &snapshot);
        self.snapshot = snapshot;
        result?;

        self.cycle = cycle;
        self.history.push(&self.counts);
        debug!("cycle {} - {}", cycle, self.counts);

        let mut ctx = InterventionContext {
            graph: &mut self.graph,
            counts: &self.counts,
            timestep: cycle,
            tests_per_step: &mut self.tests_per_step,
        };
        self.policy.intervene(&mut ctx);

        Ok(&self.counts)
    }

    // infectious people at the start of the cycle expose their susceptible neighbours
    // a susceptible person can be infected at most once per cycle
    fn transmit(&mut self, cycle: usize, snapshot: &[Compartment]) {
        for source in 0..snapshot.len() {
            let person = &mut self.population.individuals_mut()[source];
            if person.contacts.is_enabled() {
                person.contacts.record(cycle, self.graph.neighbors(source).collect());
            }
            if !snapshot[source].is_infectious() {
                continue;
            }

            for (target, weight) in self.graph.edges_of(source) {
                if snapshot[target] != Compartment::Susceptible || self.seen[target] {
                    continue;
                }
                let transmitted = self.rng.gen::<f64>() < weight;
                if let Some(sink) = self.sink.as_mut() {
                    sink.on_contact(&ContactEvent {
                        cycle,
                        source,
                        target,
                        weight,
                        transmitted,
                    });
                }
                if transmitted {
                    self.seen[target] = true;
                    self.population.individuals_mut()[target].advance(Compartment::Asymptomatic, cycle);
                    self.counts
                        .transfer(Compartment::Susceptible, Compartment::Asymptomatic);
                }
            }
        }
    }

    // people sick at the start of the cycle recover, die or get worse
    //   infected:      tested first, then death is checked before recovery
    //                  the test budget drops by one per infected person
    //   asymptomatic:  recovery is checked before becoming symptomatic
    fn progress(&mut self, cycle: usize, snapshot: &[Compartment]) -> Result<(), SimError> {
        let mut tests_left = self.tests_per_step;

        for id in 0..snapshot.len() {
            match snapshot[id] {
                Compartment::Infected => {
                    let death_flip = self.rng.gen::<f64>();
                    let removal_flip = self.rng.gen::<f64>();

                    // every infected person uses up a test, only the untested get quarantined
                    let has_test = tests_left > 0;
                    tests_left = tests_left.saturating_sub(1);
                    if has_test && !self.tested[id] {
                        self.tested[id] = true;
                        let cut = self.graph.quarantine(id)?;
                        trace!("cycle {} - {} tested positive, {} contacts cut", cycle, id, cut);
                    }

                    let person = &self.population.individuals()[id];
                    let p_die = checked("p_die", person, self.risk.p_die(person))?;
                    if death_flip < p_die {
                        self.move_person(id, Compartment::Dead, cycle);
                        continue;
                    }
                    let p_recover = checked("p_recover", person, self.risk.p_recover(person))?;
                    if removal_flip < p_recover {
                        self.move_person(id, Compartment::Recovered, cycle);
                    }
                }
                Compartment::Asymptomatic => {
                    let removal_flip = self.rng.gen::<f64>();
                    let infection_flip = self.rng.gen::<f64>();

                    let person = &self.population.individuals()[id];
                    let p_recover = checked("p_recover", person, self.risk.p_recover(person))?;
                    if removal_flip < p_recover {
                        self.move_person(id, Compartment::Recovered, cycle);
                        continue;
                    }
                    let p_infected = checked(
                        "p_become_infected",
                        person,
                        self.risk.p_become_infected(person),
                    )?;
                    if infection_flip < p_infected {
                        self.move_person(id, Compartment::Infected, cycle);
                    }
                }
                _ => (),
            }
        }
        Ok(())
    }

    fn move_person(&mut self, id: usize, to: Compartment, cycle: usize) {
        let person = &mut self.population.individuals_mut()[id];
        let from = person.compartment;
        person.advance(to, cycle);
        self.counts.transfer(from, to);
    }
}

// risk values outside [0, 1] (NaN included) stop the run
fn checked(function: &'static str, person: &Individual, value: f64) -> Result<f64, SimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SimError::InvalidProbability {
            function,
            individual: person.id,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::ConstantRiskModel;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cycle_graph(n: usize, weight: f64) -> ContactGraph {
        ContactGraph::from_edges(n, (0..n).map(|i| (i, (i + 1) % n, weight))).unwrap()
    }

    fn risk(become_infected: f64, recover: f64, die: f64) -> ConstantRiskModel {
        ConstantRiskModel {
            become_infected,
            recover,
            die,
        }
    }

    fn compartments(states: &str) -> Vec<Compartment> {
        states.chars()
            .map(|c| match c {
                'S' => Compartment::Susceptible,
                'A' => Compartment::Asymptomatic,
                'I' => Compartment::Infected,
                'R' => Compartment::Recovered,
                _ => Compartment::Dead,
            })
            .collect()
    }

    fn build(graph: ContactGraph, states: &str, model: ConstantRiskModel) -> EpidemicEngine<ConstantRiskModel> {
        let population = Population::from_compartments(&compartments(states), 50.0);
        EpidemicEngine::new(graph, population, model, StdRng::seed_from_u64(17)).unwrap()
    }

    #[test]
    fn newly_infected_do_not_spread_in_the_same_cycle() {
        // path 0 - 1 - 2 with certain transmission: only 1 can be reached in cycle 1
        let graph = ContactGraph::from_edges(3, vec![(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
        let mut engine = build(graph, "ISS", risk(0.0, 0.0, 0.0));
        engine.step().unwrap();
        let states: Vec<Compartment> = engine.population().iter().map(|p| p.compartment).collect();
        assert_eq!(states, compartments("IAS"));
        assert_eq!(engine.population().get(1).unwrap().time_of_infection, Some(1));

        engine.step().unwrap();
        assert_eq!(engine.counts().asymptomatic, 2);
    }

    #[test]
    fn newly_infected_do_not_progress_in_the_same_cycle() {
        let graph = ContactGraph::from_edges(2, vec![(0, 1, 1.0)]).unwrap();
        let mut engine = build(graph, "AS", risk(0.0, 1.0, 0.0));
        engine.step().unwrap();
        // the source recovers, the new case stays asymptomatic until next cycle
        let states: Vec<Compartment> = engine.population().iter().map(|p| p.compartment).collect();
        assert_eq!(states, compartments("RA"));
    }

    #[test]
    fn a_susceptible_is_exposed_at_most_once_per_cycle() {
        // star: 0 and 2 both touch 1
        let graph = ContactGraph::from_edges(3, vec![(0, 1, 1.0), (1, 2, 1.0)]).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&events);
        let mut engine = build(graph, "ISI", risk(0.0, 0.0, 0.0))
            .with_contact_sink(move |event: &ContactEvent| log.borrow_mut().push(*event));
        engine.step().unwrap();

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, 0);
        assert_eq!(events[0].target, 1);
        assert!(events[0].transmitted);
        assert_eq!(engine.counts().asymptomatic, 1);
    }

    #[test]
    fn death_is_checked_before_recovery() {
        let mut engine = build(ContactGraph::new(2), "IS", risk(0.0, 1.0, 1.0));
        engine.step().unwrap();
        let person = engine.population().get(0).unwrap();
        assert!(person.dead());
        assert_eq!(person.time_of_removal, Some(1));
        assert_eq!(engine.counts().dead, 1);
        assert_eq!(engine.counts().recovered, 0);
    }

    #[test]
    fn recovery_wins_over_progression() {
        let mut engine = build(ContactGraph::new(3), "AAS", risk(1.0, 1.0, 0.0));
        engine.step().unwrap();
        assert_eq!(engine.counts().recovered, 2);
        assert_eq!(engine.counts().infected, 0);
    }

    #[test]
    fn the_dead_stay_dead() {
        let graph = cycle_graph(4, 1.0);
        let mut engine = build(graph, "DISS", risk(1.0, 1.0, 0.0));
        engine.run(5).unwrap();
        assert!(engine.population().get(0).unwrap().dead());
        assert_eq!(engine.counts().dead, 1);
    }

    #[test]
    fn bad_probabilities_stop_the_run() {
        let mut engine = build(ContactGraph::new(2), "IS", risk(0.0, 1.5, 0.0));
        assert_eq!(
            engine.step().unwrap_err(),
            SimError::InvalidProbability {
                function: "p_recover",
                individual: 0,
                value: 1.5
            }
        );

        let mut engine = build(ContactGraph::new(1), "A", risk(f64::NAN, 0.0, 0.0));
        assert!(matches!(
            engine.step(),
            Err(SimError::InvalidProbability { function: "p_become_infected", .. })
        ));
    }

    #[test]
    fn the_population_must_match_the_graph() {
        let population = Population::from_compartments(&compartments("SI"), 30.0);
        let result = EpidemicEngine::new(
            ContactGraph::new(3),
            population,
            risk(0.0, 0.0, 0.0),
            StdRng::seed_from_u64(0),
        );
        assert_eq!(
            result.err(),
            Some(SimError::InvalidSeed { expected: 3, actual: 2 })
        );

        let result = EpidemicEngine::new(
            ContactGraph::new(0),
            Population::from_compartments(&[], 30.0),
            risk(0.0, 0.0, 0.0),
            StdRng::seed_from_u64(0),
        );
        assert_eq!(result.err(), Some(SimError::EmptyPopulation));
    }

    #[test]
    fn each_case_is_tested_once_per_run() {
        // 0 stays infected: its contacts are isolated in cycle 1 only
        let mut engine = build(cycle_graph(6, 0.0), "ISSSSS", risk(0.0, 0.0, 0.0)).with_tests_per_step(10);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 4);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 4);
    }

    #[test]
    fn the_test_budget_caps_quarantines_per_cycle() {
        // two infected cases far apart on a ring, only one test per cycle
        // case 0 comes first and takes the test every cycle, so case 4 is never isolated
        let mut engine = build(cycle_graph(8, 0.0), "ISSSISSS", risk(0.0, 0.0, 0.0)).with_tests_per_step(1);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 6);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 6);
    }

    #[test]
    fn a_budget_for_every_case_isolates_them_all() {
        let mut engine = build(cycle_graph(8, 0.0), "ISSSISSS", risk(0.0, 0.0, 0.0)).with_tests_per_step(2);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 4);
    }

    #[test]
    fn cases_already_tested_still_use_up_the_budget() {
        // case 4 only gets its test once case 0 has gone
        let mut engine = build(cycle_graph(8, 0.0), "ISSSISSS", risk(0.0, 0.0, 0.0)).with_tests_per_step(1);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 6);
        engine.population.individuals_mut()[0].advance(Compartment::Recovered, 1);
        engine.counts.transfer(Compartment::Infected, Compartment::Recovered);
        engine.step().unwrap();
        assert_eq!(engine.graph().edge_count(), 4);
    }

    #[test]
    fn no_tests_no_quarantine() {
        let mut engine = build(cycle_graph(6, 0.0), "ISSSSS", risk(0.0, 0.0, 0.0));
        engine.run(3).unwrap();
        assert_eq!(engine.graph().edge_count(), 6);
    }

    #[test]
    fn contact_history_records_neighbours_when_enabled() {
        let mut people: Vec<Individual> = compartments("SSS")
            .into_iter()
            .enumerate()
            .map(|(id, c)| Individual::new(id, 20.0, c))
            .collect();
        people[1].contacts = crate::world::ContactHistory::with_capacity(2);
        let graph = ContactGraph::from_edges(3, vec![(0, 1, 0.5), (1, 2, 0.5)]).unwrap();
        let mut engine = EpidemicEngine::new(
            graph,
            Population::from_individuals(people).unwrap(),
            risk(0.0, 0.0, 0.0),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        engine.run(3).unwrap();

        let contacts = &engine.population().get(1).unwrap().contacts;
        let kept: Vec<(usize, Vec<usize>)> = contacts.iter().map(|(c, n)| (c, n.to_vec())).collect();
        assert_eq!(kept, vec![(2, vec![0, 2]), (3, vec![0, 2])]);
        assert!(engine.population().get(0).unwrap().contacts.is_empty());
    }
}
