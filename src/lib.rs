/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// stochastic S-A-I-R-D epidemic on a weighted contact graph
//
// In each cycle - infectious people expose their neighbours, people progress along
// the disease path, infected people get tested and their contacts isolated,
// then an intervention policy may reshape the graph
//
////////////////////////////////////////////////////////////////////////////////////

pub mod data_management;
pub mod engine;
pub mod error;
pub mod graph;
pub mod logging;
pub mod policy;
pub mod risk;
pub mod stats;
pub mod utilities;
pub mod world;

pub use engine::{ContactEvent, ContactSink, EpidemicEngine};
pub use error::{ConfigError, SimError};
pub use graph::ContactGraph;
pub use policy::{InterventionContext, InterventionPolicy, Lockdown, NoIntervention};
pub use risk::{AgeBand, ConstantRiskModel, DefaultRiskModel, RiskModel};
pub use stats::{CountHistory, CountLog, EpidemicSummary};
pub use world::{Compartment, CompartmentCounts, Individual, InitialCounts, PersonAttributes, Population};
