/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// risk module
//
// a risk model turns a person's attributes into the probability of moving
// along the disease path in one cycle
//
////////////////////////////////////////////////////////////////////////////////////

use crate::world::Individual;

/// Per-cycle transition probabilities for one person. Every value must lie in [0, 1];
/// the engine refuses to run with anything else.
pub trait RiskModel {
    /// Asymptomatic > infected.
    fn p_become_infected(&self, person: &Individual) -> f64;

    /// Asymptomatic or infected > recovered.
    fn p_recover(&self, person: &Individual) -> f64;

    /// Infected > dead. Only asked for infected people.
    fn p_die(&self, person: &Individual) -> f64;
}

impl<M: RiskModel + ?Sized> RiskModel for Box<M> {
    fn p_become_infected(&self, person: &Individual) -> f64 {
        (**self).p_become_infected(person)
    }
    fn p_recover(&self, person: &Individual) -> f64 {
        (**self).p_recover(person)
    }
    fn p_die(&self, person: &Individual) -> f64 {
        (**self).p_die(person)
    }
}

// Age bands ------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBand {
    pub older_than: f64,
    pub probability: f64,
}

// case fatality by age used in the reference runs
const CANONICAL_DEATH_BANDS: [(f64, f64); 6] = [
    (80.0, 0.148),
    (70.0, 0.08),
    (60.0, 0.036),
    (50.0, 0.013),
    (40.0, 0.004),
    (10.0, 0.002),
];

// Default model --------------------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRiskModel {
    pub become_infected: f64,
    pub recover: f64,
    death_bands: Vec<AgeBand>, // sorted oldest band first
}

impl DefaultRiskModel {
    pub fn new(become_infected: f64, recover: f64, mut death_bands: Vec<AgeBand>) -> DefaultRiskModel {
        death_bands.sort_by(|a, b| {
            b.older_than
                .partial_cmp(&a.older_than)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        DefaultRiskModel {
            become_infected,
            recover,
            death_bands,
        }
    }

    /// Half of asymptomatic cases turn symptomatic each cycle, two weeks to recover,
    /// death rate by age band.
    pub fn canonical() -> DefaultRiskModel {
        DefaultRiskModel::new(0.5, 1.0 / 14.0, canonical_death_bands())
    }

    pub fn death_bands(&self) -> &[AgeBand] {
        &self.death_bands
    }
}

impl Default for DefaultRiskModel {
    fn default() -> Self {
        DefaultRiskModel::canonical()
    }
}

impl RiskModel for DefaultRiskModel {
    fn p_become_infected(&self, _person: &Individual) -> f64 {
        self.become_infected
    }

    fn p_recover(&self, _person: &Individual) -> f64 {
        self.recover
    }

    // first band the person is strictly older than, nobody in the youngest band dies
    fn p_die(&self, person: &Individual) -> f64 {
        self.death_bands
            .iter()
            .find(|band| person.age > band.older_than)
            .map_or(0.0, |band| band.probability)
    }
}

pub fn canonical_death_bands() -> Vec<AgeBand> {
    CANONICAL_DEATH_BANDS
        .iter()
        .map(|&(older_than, probability)| AgeBand {
            older_than,
            probability,
        })
        .collect()
}

// Constant model -------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRiskModel {
    pub become_infected: f64,
    pub recover: f64,
    pub die: f64,
}

impl RiskModel for ConstantRiskModel {
    fn p_become_infected(&self, _person: &Individual) -> f64 {
        self.become_infected
    }
    fn p_recover(&self, _person: &Individual) -> f64 {
        self.recover
    }
    fn p_die(&self, _person: &Individual) -> f64 {
        self.die
    }
}
