/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// data_managment module
//
// functions to read and write from file system
//
//   <model root>/parms.yaml                          model parameters
//   <model root>/<edge list>.csv                     contact graph (source,target[,weight])
//   <model root>/Scenarios/scenario_NNNN/counts.csv  results, one folder per scenario
//
////////////////////////////////////////////////////////////////////////////////////

use crate::error::ConfigError;
use crate::graph::ContactGraph;
use crate::risk::{canonical_death_bands, AgeBand, DefaultRiskModel};
use crate::stats::CountLog;
use crate::utilities::AgeDistribution;
use crate::world::{InitialCounts, PersonAttributes};
use log::info;
use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use yaml_rust::{Yaml, YamlLoader};

// -------------------------------- File paths -------------------------------------------------------------
pub struct ModelDataStore {
    model_root: PathBuf,
    parameter_file: PathBuf,
    scenario_dir: PathBuf,
}

impl ModelDataStore {
    // create file paths starting at model_root
    // fail if root does not exist
    // (re)create the scenario folder
    pub fn new(model_root: &Path) -> Result<ModelDataStore, ConfigError> {
        info!("model root dir: {}", model_root.display());
        if !model_root.is_dir() {
            return Err(ConfigError::io(
                model_root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "model root is not a directory"),
            ));
        }
        let parameter_file = model_root.join("parms.yaml");
        let scenario_dir = model_root.join("Scenarios");

        // create the scenario directory - delete first if it exists
        if scenario_dir.exists() {
            fs::remove_dir_all(&scenario_dir).map_err(|e| ConfigError::io(&scenario_dir, e))?;
        }
        fs::create_dir(&scenario_dir).map_err(|e| ConfigError::io(&scenario_dir, e))?;

        Ok(ModelDataStore {
            model_root: model_root.to_path_buf(),
            parameter_file,
            scenario_dir,
        })
    }

    pub fn get_model_parms(&self) -> Result<ModelParameters, ConfigError> {
        let parm_string = fs::read_to_string(&self.parameter_file)
            .map_err(|e| ConfigError::io(&self.parameter_file, e))?;
        ModelParameters::from_yaml_str(&parm_string)
    }

    /// Reads the edge list named in the parameters and weights it for one scenario.
    pub fn load_contact_graph<R: Rng>(
        &self,
        scenario: &ScenarioParms,
        rng: &mut R,
    ) -> Result<ContactGraph, ConfigError> {
        let path = self.model_root.join(&scenario.edge_list);
        let edges = read_edge_list(&path)?;
        build_contact_graph(scenario.population_size, &edges, scenario.edge_weights, rng)
    }

    fn get_scenario_directory(&self, scenario_number: usize) -> PathBuf {
        self.scenario_dir
            .join(format!("scenario_{:04}", scenario_number))
    }

    pub fn create_scenario_directory(&self, scenario_number: usize) -> Result<PathBuf, ConfigError> {
        let dir_full_path = self.get_scenario_directory(scenario_number);
        if !dir_full_path.exists() {
            fs::create_dir(&dir_full_path).map_err(|e| ConfigError::io(&dir_full_path, e))?;
        }
        Ok(dir_full_path)
    }

    pub fn count_log(&self, scenario_number: usize) -> Result<CountLog, ConfigError> {
        let dir = self.create_scenario_directory(scenario_number)?;
        Ok(CountLog::new(&dir.join("counts.csv")))
    }
}

// ----------------------------- Contact graph input -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EdgeRecord {
    pub source: usize,
    pub target: usize,
    pub weight: Option<f64>,
}

pub fn read_edge_list(path: &Path) -> Result<Vec<EdgeRecord>, ConfigError> {
    let file = fs::File::open(path).map_err(|e| ConfigError::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let mut edges = Vec::new();
    for record in rdr.deserialize() {
        edges.push(record?);
    }
    Ok(edges)
}

// weights are assigned once here and never change afterwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeWeights {
    File,         // every row carries its own weight
    Random,       // uniform [0, 1) draw per edge
    Uniform(f64), // same weight for every edge
}

pub fn build_contact_graph<R: Rng>(
    population_size: usize,
    edges: &[EdgeRecord],
    weights: EdgeWeights,
    rng: &mut R,
) -> Result<ContactGraph, ConfigError> {
    let mut graph = ContactGraph::new(population_size);
    for edge in edges {
        let weight = match weights {
            EdgeWeights::File => edge.weight.ok_or_else(|| {
                ConfigError::invalid(
                    "edge_weights",
                    format!("edge {}-{} has no weight", edge.source, edge.target),
                )
            })?,
            EdgeWeights::Random | EdgeWeights::Uniform(_) => 0.0,
        };
        graph.add_edge(edge.source, edge.target, weight)?;
    }
    match weights {
        EdgeWeights::File => (),
        EdgeWeights::Random => graph.randomize_weights(rng),
        EdgeWeights::Uniform(w) => graph.set_uniform_weight(w)?,
    }
    Ok(graph)
}

// ----------------------------- Scenario parameters -------------------------------------------------------
//
//  Scenario parameters manage a series of runs each which differs from the base run by
//  the value of a single variable
#[derive(Hash, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SensitivityVariable {
    TestsPerStep,
    InitialInfected,
    BecomeInfected,
    Recover,
    UniformWeight,
    LockdownThreshold,
}
impl fmt::Display for SensitivityVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl FromStr for SensitivityVariable {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<SensitivityVariable, ConfigError> {
        match s {
            "tests_per_step" => Ok(SensitivityVariable::TestsPerStep),
            "initial_infected" => Ok(SensitivityVariable::InitialInfected),
            "become_infected" => Ok(SensitivityVariable::BecomeInfected),
            "recover" => Ok(SensitivityVariable::Recover),
            "uniform_weight" => Ok(SensitivityVariable::UniformWeight),
            "lockdown_threshold" => Ok(SensitivityVariable::LockdownThreshold),
            _ => Err(ConfigError::invalid(
                "scenario_variable",
                format!("unknown variable {}", s),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterventionParms {
    None,
    Lockdown { infected_threshold: usize, max_weight: f64 },
}

/// Everything needed to run one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioParms {
    pub value: Option<f64>, // value of the sensitivity variable, None for a single run
    pub cycles: usize,
    pub seed: u64,
    pub population_size: usize,
    pub initial: InitialCounts,
    pub edge_list: PathBuf,
    pub edge_weights: EdgeWeights,
    pub tests_per_step: usize,
    pub risk: DefaultRiskModel,
    pub attributes: PersonAttributes,
    pub intervention: InterventionParms,
}

pub struct ModelParameters {
    pub model_name: String,
    pub model_description: String,
    base: ScenarioParms,
    pub variable: Option<SensitivityVariable>,
    pub value_vector: Vec<f64>,
    current_increment: Option<usize>,
}

impl ModelParameters {
    pub fn from_yaml_str(parm_string: &str) -> Result<ModelParameters, ConfigError> {
        // the loader creates an array of yaml enums
        let docs = YamlLoader::load_from_str(parm_string)?;

        // there can be multiple docs in Yaml file.  Only the first one interests us.
        let doc = docs
            .first()
            .ok_or_else(|| ConfigError::MissingParameter("model_name".to_string()))?;

        let model_name = text(&doc["model_name"], "model_name")?;
        let model_description = optional_text(&doc["model_description"], "model_description")?
            .unwrap_or_default();
        let cycles = count(&doc["cycles"], "cycles")?;
        let seed = optional_count(&doc["seed"], "seed")?.unwrap_or(0) as u64;

        // parse World parms -----------------------------------------------------
        let wp = &doc["world_parms"];
        let population_size = count(&wp["population_size"], "world_parms.population_size")?;
        let edge_list = PathBuf::from(text(&wp["edge_list"], "world_parms.edge_list")?);
        let edge_weights = match optional_text(&wp["edge_weights"], "world_parms.edge_weights")?
            .as_deref()
        {
            None | Some("random") => EdgeWeights::Random,
            Some("file") => EdgeWeights::File,
            Some("uniform") => EdgeWeights::Uniform(probability(
                &wp["uniform_weight"],
                "world_parms.uniform_weight",
            )?),
            Some(other) => {
                return Err(ConfigError::invalid(
                    "world_parms.edge_weights",
                    format!("expected random, file or uniform - got {}", other),
                ))
            }
        };
        let contact_history =
            optional_count(&wp["contact_history"], "world_parms.contact_history")?.unwrap_or(0);

        // parse initial compartments -------------------------------------------
        let ip = &doc["initial_parms"];
        let initial = InitialCounts {
            susceptible: count(&ip["susceptible"], "initial_parms.susceptible")?,
            asymptomatic: optional_count(&ip["asymptomatic"], "initial_parms.asymptomatic")?
                .unwrap_or(0),
            infected: count(&ip["infected"], "initial_parms.infected")?,
            recovered: optional_count(&ip["recovered"], "initial_parms.recovered")?.unwrap_or(0),
            dead: optional_count(&ip["dead"], "initial_parms.dead")?.unwrap_or(0),
        };
        check_partition(population_size, &initial)?;

        // parse - disease and people parms ---------------------------------------
        let sp = &doc["sim_parms"];
        let tests_per_step =
            optional_count(&sp["tests_per_step"], "sim_parms.tests_per_step")?.unwrap_or(0);
        let become_infected = match optional_number(&sp["become_infected"], "sim_parms.become_infected")? {
            Some(_) => probability(&sp["become_infected"], "sim_parms.become_infected")?,
            None => 0.5,
        };
        let recover = match optional_number(&sp["recover"], "sim_parms.recover")? {
            Some(_) => probability(&sp["recover"], "sim_parms.recover")?,
            None => 1.0 / 14.0,
        };
        let death_bands = parse_death_bands(&sp["death_bands"])?;
        let age = parse_age(&sp["age"])?;
        let underlying_condition_rate = match optional_number(
            &sp["underlying_condition_rate"],
            "sim_parms.underlying_condition_rate",
        )? {
            Some(_) => probability(
                &sp["underlying_condition_rate"],
                "sim_parms.underlying_condition_rate",
            )?,
            None => 0.0,
        };

        let intervention = parse_intervention(&doc["intervention"])?;

        // parse - Scenario parms ---------------------------------------------------
        let scp = &doc["scenario_parms"];
        let (variable, value_vector) = if scp.is_badvalue() || scp.is_null() {
            (None, Vec::new())
        } else {
            let variable: SensitivityVariable =
                text(&scp["scenario_variable"], "scenario_parms.scenario_variable")?.parse()?;
            let values = scp["scenario_values"]
                .as_vec()
                .ok_or_else(|| ConfigError::MissingParameter("scenario_parms.scenario_values".to_string()))?
                .iter()
                .map(|v| number(v, "scenario_parms.scenario_values"))
                .collect::<Result<Vec<f64>, ConfigError>>()?;
            (Some(variable), values)
        };

        let parms = ModelParameters {
            model_name,
            model_description,
            base: ScenarioParms {
                value: None,
                cycles,
                seed,
                population_size,
                initial,
                edge_list,
                edge_weights,
                tests_per_step,
                risk: DefaultRiskModel::new(become_infected, recover, death_bands),
                attributes: PersonAttributes {
                    age,
                    underlying_condition_rate,
                    contact_history,
                },
                intervention,
            },
            variable,
            value_vector,
            current_increment: None,
        };

        // every scenario is checked up front so no run starts on a bad value
        if let Some(variable) = parms.variable {
            for &value in &parms.value_vector {
                parms.scenario(variable, value)?;
            }
        }
        Ok(parms)
    }

    pub fn cycles(&self) -> usize {
        self.base.cycles
    }

    pub fn seed(&self) -> u64 {
        self.base.seed
    }

    /// Replaces the seed of every scenario.
    pub fn set_seed(&mut self, seed: u64) {
        self.base.seed = seed;
    }

    pub fn scenario_count(&self) -> usize {
        if self.variable.is_some() {
            self.value_vector.len()
        } else {
            1
        }
    }

    pub fn base(&self) -> &ScenarioParms {
        &self.base
    }

    // the base scenario with one variable changed
    fn scenario(&self, variable: SensitivityVariable, value: f64) -> Result<ScenarioParms, ConfigError> {
        let mut parms = self.base.clone();
        parms.value = Some(value);
        let name = format!("scenario value {} for {}", value, variable);
        match variable {
            SensitivityVariable::TestsPerStep => parms.tests_per_step = whole(value, &name)?,
            SensitivityVariable::InitialInfected => {
                let infected = whole(value, &name)?;
                let others = parms.initial.asymptomatic + parms.initial.recovered + parms.initial.dead;
                let cases = match infected.checked_add(others) {
                    Some(cases) if cases <= parms.population_size => cases,
                    _ => return Err(ConfigError::invalid(&name, "more initial cases than people")),
                };
                parms.initial.infected = infected;
                parms.initial.susceptible = parms.population_size - cases;
            }
            SensitivityVariable::BecomeInfected => {
                parms.risk.become_infected = unit(value, &name)?;
            }
            SensitivityVariable::Recover => parms.risk.recover = unit(value, &name)?,
            SensitivityVariable::UniformWeight => {
                parms.edge_weights = EdgeWeights::Uniform(unit(value, &name)?)
            }
            SensitivityVariable::LockdownThreshold => match parms.intervention {
                InterventionParms::Lockdown { max_weight, .. } => {
                    parms.intervention = InterventionParms::Lockdown {
                        infected_threshold: whole(value, &name)?,
                        max_weight,
                    }
                }
                InterventionParms::None => {
                    return Err(ConfigError::invalid(&name, "no lockdown intervention configured"))
                }
            },
        }
        Ok(parms)
    }
}

impl fmt::Display for ModelParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Model name {}\nModel description {}\nPopulation {}\nInitial {}",
            self.model_name, self.model_description, self.base.population_size, self.base.initial
        )?;
        if let Some(variable) = self.variable {
            write!(
                f,
                "\nSensitivity analysis on {} with values {:?}",
                variable, self.value_vector
            )?;
        }
        Ok(())
    }
}

// the Iterator trait for scenario parameters issues
// a sequence of ScenarioParms structs each one differing only by
// the value of the variable being sensitivity tested
impl Iterator for ModelParameters {
    type Item = Result<ScenarioParms, ConfigError>;

    fn next(&mut self) -> Option<Self::Item> {
        let increment = match self.current_increment {
            Some(increment) => increment + 1,
            None => 0,
        };
        self.current_increment = Some(increment);

        match self.variable {
            None if increment == 0 => Some(Ok(self.base.clone())),
            None => None,
            Some(variable) => {
                let value = *self.value_vector.get(increment)?;
                Some(self.scenario(variable, value))
            }
        }
    }
}

// the command line / parameter file must partition the population exactly
pub fn check_partition(population_size: usize, initial: &InitialCounts) -> Result<(), ConfigError> {
    if initial.total() != population_size {
        return Err(ConfigError::PopulationMismatch {
            expected: population_size,
            actual: initial.total(),
        });
    }
    Ok(())
}

// ----------------------------- YAML helpers -------------------------------------------------------------
fn text(node: &Yaml, name: &str) -> Result<String, ConfigError> {
    optional_text(node, name)?.ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
}

fn optional_text(node: &Yaml, name: &str) -> Result<Option<String>, ConfigError> {
    match node {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::String(s) => Ok(Some(s.clone())),
        _ => Err(ConfigError::invalid(name, "expected text")),
    }
}

// integers are accepted where reals are expected - yaml reads "1" as an integer
fn optional_number(node: &Yaml, name: &str) -> Result<Option<f64>, ConfigError> {
    match node {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(i) => Ok(Some(*i as f64)),
        Yaml::Real(_) => node
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(name, "expected a number")),
        _ => Err(ConfigError::invalid(name, "expected a number")),
    }
}

fn number(node: &Yaml, name: &str) -> Result<f64, ConfigError> {
    optional_number(node, name)?.ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
}

fn probability(node: &Yaml, name: &str) -> Result<f64, ConfigError> {
    unit(number(node, name)?, name)
}

fn optional_count(node: &Yaml, name: &str) -> Result<Option<usize>, ConfigError> {
    match node {
        Yaml::BadValue | Yaml::Null => Ok(None),
        Yaml::Integer(i) if *i >= 0 => Ok(Some(*i as usize)),
        _ => Err(ConfigError::invalid(name, "expected a non-negative integer")),
    }
}

fn count(node: &Yaml, name: &str) -> Result<usize, ConfigError> {
    optional_count(node, name)?.ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
}

fn unit(value: f64, name: &str) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::invalid(name, format!("{} is not a probability", value)))
    }
}

fn whole(value: f64, name: &str) -> Result<usize, ConfigError> {
    if value >= 0.0 && value.fract() == 0.0 && value.is_finite() {
        Ok(value as usize)
    } else {
        Err(ConfigError::invalid(name, format!("{} is not a whole number", value)))
    }
}

fn parse_death_bands(node: &Yaml) -> Result<Vec<AgeBand>, ConfigError> {
    let bands = match node {
        Yaml::BadValue | Yaml::Null => return Ok(canonical_death_bands()),
        Yaml::Array(bands) => bands,
        _ => return Err(ConfigError::invalid("sim_parms.death_bands", "expected a list")),
    };
    bands
        .iter()
        .map(|band| {
            Ok(AgeBand {
                older_than: number(&band["older_than"], "sim_parms.death_bands.older_than")?,
                probability: probability(
                    &band["probability"],
                    "sim_parms.death_bands.probability",
                )?,
            })
        })
        .collect()
}

fn parse_age(node: &Yaml) -> Result<AgeDistribution, ConfigError> {
    if node.is_badvalue() || node.is_null() {
        return Ok(AgeDistribution::default());
    }
    let age = match text(&node["distribution"], "sim_parms.age.distribution")?.as_str() {
        "fixed" => AgeDistribution::Fixed(number(&node["value"], "sim_parms.age.value")?),
        "normal" => AgeDistribution::Normal {
            mean: number(&node["mean"], "sim_parms.age.mean")?,
            sdev: number(&node["sdev"], "sim_parms.age.sdev")?,
        },
        "uniform" => AgeDistribution::Uniform {
            min: number(&node["min"], "sim_parms.age.min")?,
            max: number(&node["max"], "sim_parms.age.max")?,
        },
        other => {
            return Err(ConfigError::invalid(
                "sim_parms.age.distribution",
                format!("expected fixed, normal or uniform - got {}", other),
            ))
        }
    };
    age.validate()?;
    Ok(age)
}

fn parse_intervention(node: &Yaml) -> Result<InterventionParms, ConfigError> {
    if node.is_badvalue() || node.is_null() {
        return Ok(InterventionParms::None);
    }
    match text(&node["kind"], "intervention.kind")?.as_str() {
        "none" => Ok(InterventionParms::None),
        "lockdown" => Ok(InterventionParms::Lockdown {
            infected_threshold: count(&node["infected_threshold"], "intervention.infected_threshold")?,
            max_weight: probability(&node["max_weight"], "intervention.max_weight")?,
        }),
        other => Err(ConfigError::invalid(
            "intervention.kind",
            format!("expected none or lockdown - got {}", other),
        )),
    }
}
