/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// world module
//
// the world is a population of individuals, one per node of the contact graph
// each individual sits in exactly one compartment (S, A, I, R, D)
//
// compartment counts are kept alongside the population and are only ever
// changed by moving one person from one compartment to another
//
////////////////////////////////////////////////////////////////////////////////////

use crate::error::SimError;
use crate::utilities::{self, AgeDistribution};
use rand::prelude::*;
use rand::seq::index;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

// Compartment ----------------------------------------------------------------------------------------
#[derive(Hash, Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum Compartment {
    Susceptible,
    Asymptomatic,
    Infected,
    Recovered,
    Dead,
}

impl Compartment {
    pub const ALL: [Compartment; 5] = [
        Compartment::Susceptible,
        Compartment::Asymptomatic,
        Compartment::Infected,
        Compartment::Recovered,
        Compartment::Dead,
    ];

    /// Asymptomatic and infected people both spread the virus.
    pub fn is_infectious(self) -> bool {
        matches!(self, Compartment::Asymptomatic | Compartment::Infected)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Compartment::Recovered | Compartment::Dead)
    }

    // the allowed transitions
    //    S>A
    //    A>I  A>R
    //    I>R  I>D
    pub fn can_become(self, to: Compartment) -> bool {
        use Compartment::*;
        matches!(
            (self, to),
            (Susceptible, Asymptomatic)
                | (Asymptomatic, Infected)
                | (Asymptomatic, Recovered)
                | (Infected, Recovered)
                | (Infected, Dead)
        )
    }

    pub fn code(self) -> char {
        match self {
            Compartment::Susceptible => 'S',
            Compartment::Asymptomatic => 'A',
            Compartment::Infected => 'I',
            Compartment::Recovered => 'R',
            Compartment::Dead => 'D',
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// Compartment counts ---------------------------------------------------------------------------------
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct CompartmentCounts {
    pub susceptible: usize,
    pub asymptomatic: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
}

impl CompartmentCounts {
    /// One full pass over the population. Only used when a population is built.
    pub fn tally<'a, I>(compartments: I) -> CompartmentCounts
    where
        I: IntoIterator<Item = &'a Compartment>,
    {
        let mut counts = CompartmentCounts::default();
        for &compartment in compartments {
            *counts.slot(compartment) += 1;
        }
        counts
    }

    pub fn get(&self, compartment: Compartment) -> usize {
        match compartment {
            Compartment::Susceptible => self.susceptible,
            Compartment::Asymptomatic => self.asymptomatic,
            Compartment::Infected => self.infected,
            Compartment::Recovered => self.recovered,
            Compartment::Dead => self.dead,
        }
    }

    pub fn total(&self) -> usize {
        self.susceptible + self.asymptomatic + self.infected + self.recovered + self.dead
    }

    /// Moves one person from `from` to `to`.
    pub fn transfer(&mut self, from: Compartment, to: Compartment) {
        debug_assert!(self.get(from) > 0, "no one left in {}", from);
        *self.slot(from) -= 1;
        *self.slot(to) += 1;
    }

    fn slot(&mut self, compartment: Compartment) -> &mut usize {
        match compartment {
            Compartment::Susceptible => &mut self.susceptible,
            Compartment::Asymptomatic => &mut self.asymptomatic,
            Compartment::Infected => &mut self.infected,
            Compartment::Recovered => &mut self.recovered,
            Compartment::Dead => &mut self.dead,
        }
    }
}

impl fmt::Display for CompartmentCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, &compartment) in Compartment::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{} {}", compartment.code(), self.get(compartment))?;
        }
        Ok(())
    }
}

/// Initial number of people in each compartment.
pub type InitialCounts = CompartmentCounts;

// Contact history ------------------------------------------------------------------------------------
//
// the neighbours a person was exposed to, one entry per cycle
// capacity 0 keeps nothing, otherwise the oldest cycle is dropped once full
#[derive(Debug, Clone, Default)]
pub struct ContactHistory {
    capacity: usize,
    entries: VecDeque<(usize, Vec<usize>)>, // cycle, neighbour ids
}

impl ContactHistory {
    pub fn with_capacity(capacity: usize) -> ContactHistory {
        ContactHistory {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn record(&mut self, cycle: usize, contacts: Vec<usize>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((cycle, contacts));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.entries
            .iter()
            .map(|(cycle, contacts)| (*cycle, contacts.as_slice()))
    }
}

// Individual -----------------------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub struct Individual {
    pub id: usize,
    pub age: f64,
    pub underlying_condition: bool,
    pub compartment: Compartment,
    pub time_of_infection: Option<usize>, // cycle
    pub time_of_removal: Option<usize>,   // cycle of recovery or death
    pub contacts: ContactHistory,
}

impl Individual {
    pub fn new(id: usize, age: f64, compartment: Compartment) -> Individual {
        // only people who start sick have a known infection time
        let time_of_infection = if compartment.is_infectious() {
            Some(0)
        } else {
            None
        };
        let time_of_removal = if compartment.is_terminal() {
            Some(0)
        } else {
            None
        };
        Individual {
            id,
            age,
            underlying_condition: false,
            compartment,
            time_of_infection,
            time_of_removal,
            contacts: ContactHistory::default(),
        }
    }

    pub fn dead(&self) -> bool {
        self.compartment == Compartment::Dead
    }

    // moves the person along the disease path and stamps the cycle
    pub(crate) fn advance(&mut self, to: Compartment, cycle: usize) {
        debug_assert!(
            self.compartment.can_become(to),
            "illegal transition {} > {} for {}",
            self.compartment,
            to,
            self.id
        );
        match to {
            Compartment::Asymptomatic => self.time_of_infection = Some(cycle),
            Compartment::Recovered | Compartment::Dead => self.time_of_removal = Some(cycle),
            _ => (),
        }
        self.compartment = to;
    }
}

// Population -----------------------------------------------------------------------------------------
//
// individuals live in a vector indexed by their id (which is also their graph node id)

/// Attributes drawn for each person when a population is seeded.
#[derive(Debug, Clone, Default)]
pub struct PersonAttributes {
    pub age: AgeDistribution,
    pub underlying_condition_rate: f64,
    pub contact_history: usize, // cycles of contacts kept per person
}

#[derive(Debug, Clone)]
pub struct Population {
    individuals: Vec<Individual>,
}

impl Population {
    /// Randomly places the initial counts over `size` people: ids are sampled
    /// without replacement, the first go to I, then A, R and D. Everybody else is S.
    pub fn seed<R: Rng>(
        size: usize,
        initial: &InitialCounts,
        attributes: &PersonAttributes,
        rng: &mut R,
    ) -> Result<Population, SimError> {
        if size == 0 {
            return Err(SimError::EmptyPopulation);
        }
        if initial.total() != size {
            return Err(SimError::InvalidSeed {
                expected: size,
                actual: initial.total(),
            });
        }

        let mut compartments = vec![Compartment::Susceptible; size];
        let seeded = size - initial.susceptible;
        let order = [
            (Compartment::Infected, initial.infected),
            (Compartment::Asymptomatic, initial.asymptomatic),
            (Compartment::Recovered, initial.recovered),
            (Compartment::Dead, initial.dead),
        ];
        let mut picks = index::sample(rng, size, seeded).into_iter();
        for &(compartment, count) in order.iter() {
            for id in picks.by_ref().take(count) {
                compartments[id] = compartment;
            }
        }

        let individuals = compartments
            .into_iter()
            .enumerate()
            .map(|(id, compartment)| {
                let mut person = Individual::new(id, attributes.age.sample(rng), compartment);
                person.underlying_condition =
                    utilities::bernoulli(rng, attributes.underlying_condition_rate);
                person.contacts = ContactHistory::with_capacity(attributes.contact_history);
                person
            })
            .collect();
        Ok(Population { individuals })
    }

    /// A population with the given compartments, in id order, all of age `age`.
    pub fn from_compartments(compartments: &[Compartment], age: f64) -> Population {
        Population {
            individuals: compartments
                .iter()
                .enumerate()
                .map(|(id, &compartment)| Individual::new(id, age, compartment))
                .collect(),
        }
    }

    /// Takes ready-made individuals. Each one's id must be its position in the vector.
    pub fn from_individuals(individuals: Vec<Individual>) -> Result<Population, SimError> {
        if let Some((position, person)) = individuals
            .iter()
            .enumerate()
            .find(|(position, person)| person.id != *position)
        {
            return Err(SimError::MisplacedIndividual {
                position,
                id: person.id,
            });
        }
        Ok(Population { individuals })
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Individual> {
        self.individuals.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Individual> {
        self.individuals.iter()
    }

    pub fn counts(&self) -> CompartmentCounts {
        CompartmentCounts::tally(self.individuals.iter().map(|p| &p.compartment))
    }

    pub(crate) fn individuals_mut(&mut self) -> &mut [Individual] {
        &mut self.individuals
    }

    pub(crate) fn individuals(&self) -> &[Individual] {
        &self.individuals
    }
}
