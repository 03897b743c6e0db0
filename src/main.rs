use clap::Parser;
use contagion_net::data_management::{InterventionParms, ModelDataStore, ScenarioParms};
use contagion_net::{logging, ConfigError, EpidemicEngine, EpidemicSummary, Lockdown, Population};
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::process;

/// Runs the network contagion model found in a model directory.
#[derive(Parser, Debug)]
#[command(name = "contagion-net", version)]
struct Args {
    /// Directory holding parms.yaml and the edge list; results go to its Scenarios folder
    model_root: PathBuf,

    /// Overrides the random seed of the parameter file
    #[arg(long)]
    seed: Option<u64>,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    let level = match logging::parse_level(&args.log_level) {
        Ok(level) => level,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            process::exit(2);
        }
    };
    if let Err(msg) = logging::init(level) {
        eprintln!("Error: {}", msg);
        process::exit(2);
    }

    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), ConfigError> {
    // The model data store handles all models inputs and outputs
    let model_data_store = ModelDataStore::new(&args.model_root)?;

    // create the simulation parameters
    let mut model_parms = model_data_store.get_model_parms()?;
    if let Some(seed) = args.seed {
        model_parms.set_seed(seed);
    }
    info!("--------------------Contagion Model-----------------------");
    info!("{}", model_parms);
    info!(
        "Model runs {} scenarios of {} cycles",
        model_parms.scenario_count(),
        model_parms.cycles()
    );

    // loop around scenarios
    for (index, model_scenario) in model_parms.enumerate() {
        let scenario_number = index + 1;
        let model_scenario = model_scenario?;
        match model_scenario.value {
            Some(value) => info!("Starting scenario {} - value {}", scenario_number, value),
            None => info!("Starting scenario {}", scenario_number),
        }
        run_scenario(&model_data_store, scenario_number, &model_scenario)?;
    }
    Ok(())
}

fn run_scenario(
    store: &ModelDataStore,
    scenario_number: usize,
    parms: &ScenarioParms,
) -> Result<(), ConfigError> {
    // every scenario starts from the same seed so they differ only by the tested variable
    let mut rng = StdRng::seed_from_u64(parms.seed);
    let graph = store.load_contact_graph(parms, &mut rng)?;
    let population = Population::seed(
        parms.population_size,
        &parms.initial,
        &parms.attributes,
        &mut rng,
    )?;

    let engine = EpidemicEngine::new(graph, population, parms.risk.clone(), rng)?
        .with_tests_per_step(parms.tests_per_step);
    let mut engine = match parms.intervention {
        InterventionParms::None => engine,
        InterventionParms::Lockdown {
            infected_threshold,
            max_weight,
        } => engine.with_policy(Lockdown::new(infected_threshold, max_weight)),
    };

    let history = engine.run(parms.cycles)?;

    let count_log = store.count_log(scenario_number)?;
    count_log.write(&history)?;
    info!("Counts written to {}", count_log.path().display());
    if let Some(summary) = EpidemicSummary::from_history(&history) {
        info!("Scenario {} - {}", scenario_number, summary);
    }
    Ok(())
}
