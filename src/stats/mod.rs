/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// stats module
//
// keeps the compartment counts of every cycle, writes them out and
// calculates summary statistics
//
////////////////////////////////////////////////////////////////////////////////////

use crate::error::ConfigError;
use crate::world::{Compartment, CompartmentCounts};
use csv::WriterBuilder;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

// Count history --------------------------------------------------------------------------------------
//
// one series per compartment, entry 0 is the initial state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountHistory {
    susceptible: Vec<usize>,
    asymptomatic: Vec<usize>,
    infected: Vec<usize>,
    recovered: Vec<usize>,
    dead: Vec<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct CountRecord {
    pub timestep: usize,
    pub susceptible: usize,
    pub asymptomatic: usize,
    pub infected: usize,
    pub recovered: usize,
    pub dead: usize,
}

impl CountHistory {
    pub fn push(&mut self, counts: &CompartmentCounts) {
        self.susceptible.push(counts.susceptible);
        self.asymptomatic.push(counts.asymptomatic);
        self.infected.push(counts.infected);
        self.recovered.push(counts.recovered);
        self.dead.push(counts.dead);
    }

    /// Number of recorded timesteps, the initial state included.
    pub fn len(&self) -> usize {
        self.susceptible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.susceptible.is_empty()
    }

    pub fn susceptible(&self) -> &[usize] {
        &self.susceptible
    }

    pub fn asymptomatic(&self) -> &[usize] {
        &self.asymptomatic
    }

    pub fn infected(&self) -> &[usize] {
        &self.infected
    }

    pub fn recovered(&self) -> &[usize] {
        &self.recovered
    }

    pub fn dead(&self) -> &[usize] {
        &self.dead
    }

    pub fn series(&self, compartment: Compartment) -> &[usize] {
        match compartment {
            Compartment::Susceptible => &self.susceptible,
            Compartment::Asymptomatic => &self.asymptomatic,
            Compartment::Infected => &self.infected,
            Compartment::Recovered => &self.recovered,
            Compartment::Dead => &self.dead,
        }
    }

    pub fn at(&self, timestep: usize) -> Option<CompartmentCounts> {
        if timestep >= self.len() {
            return None;
        }
        Some(CompartmentCounts {
            susceptible: self.susceptible[timestep],
            asymptomatic: self.asymptomatic[timestep],
            infected: self.infected[timestep],
            recovered: self.recovered[timestep],
            dead: self.dead[timestep],
        })
    }

    pub fn records(&self) -> impl Iterator<Item = CountRecord> + '_ {
        (0..self.len()).filter_map(move |timestep| {
            self.at(timestep).map(|counts| CountRecord {
                timestep,
                susceptible: counts.susceptible,
                asymptomatic: counts.asymptomatic,
                infected: counts.infected,
                recovered: counts.recovered,
                dead: counts.dead,
            })
        })
    }
}

// Count log ------------------------------------------------------------------------------------------
pub struct CountLog {
    file_path: PathBuf,
}

impl CountLog {
    pub fn new(file_path: &Path) -> CountLog {
        CountLog {
            file_path: file_path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    // one row per timestep with a header line
    pub fn write(&self, history: &CountHistory) -> Result<(), ConfigError> {
        let file =
            File::create(&self.file_path).map_err(|e| ConfigError::io(&self.file_path, e))?;
        let mut wtr = WriterBuilder::new().has_headers(true).from_writer(file);

        for record in history.records() {
            wtr.serialize(record)?;
        }
        wtr.flush().map_err(|e| ConfigError::io(&self.file_path, e))?;
        Ok(())
    }
}

// Summary --------------------------------------------------------------------------------------------
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EpidemicSummary {
    pub population: usize,
    pub peak_infected: usize,
    pub peak_timestep: usize,
    pub ever_infected: usize, // everybody who left S
    pub dead: usize,
    pub attack_rate: f64,
}

impl EpidemicSummary {
    pub fn from_history(history: &CountHistory) -> Option<EpidemicSummary> {
        let first = history.at(0)?;
        let last = history.at(history.len() - 1)?;
        let population = first.total();

        // earliest timestep wins a tie
        let (peak_timestep, peak_infected) = history
            .infected()
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0), |best, (t, i)| if i > best.1 { (t, i) } else { best });
        let ever_infected = population - last.susceptible;
        let attack_rate = if population == 0 {
            0.0
        } else {
            ever_infected as f64 / population as f64
        };

        Some(EpidemicSummary {
            population,
            peak_infected,
            peak_timestep,
            ever_infected,
            dead: last.dead,
            attack_rate,
        })
    }
}

impl fmt::Display for EpidemicSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "peak of {} infected at cycle {}, {} of {} ever infected ({:.1}%), {} dead",
            self.peak_infected,
            self.peak_timestep,
            self.ever_infected,
            self.population,
            self.attack_rate * 100.0,
            self.dead
        )
    }
}
