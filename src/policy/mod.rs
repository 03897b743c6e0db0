/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// policy module
//
// an intervention policy runs once at the end of every cycle
// it may cut edges in the contact graph or change the testing capacity
// it never touches a person's compartment - only the engine does that
//
////////////////////////////////////////////////////////////////////////////////////

use crate::graph::ContactGraph;
use crate::world::CompartmentCounts;
use log::info;

/// What a policy can see and change at the end of a cycle.
pub struct InterventionContext<'a> {
    pub graph: &'a mut ContactGraph,
    pub counts: &'a CompartmentCounts,
    pub timestep: usize,
    pub tests_per_step: &'a mut usize, // used from the next cycle on
}

pub trait InterventionPolicy {
    fn intervene(&mut self, ctx: &mut InterventionContext<'_>);
}

impl<F> InterventionPolicy for F
where
    F: FnMut(&mut InterventionContext<'_>),
{
    fn intervene(&mut self, ctx: &mut InterventionContext<'_>) {
        self(ctx)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoIntervention;

impl InterventionPolicy for NoIntervention {
    fn intervene(&mut self, _ctx: &mut InterventionContext<'_>) {}
}

// Lockdown -------------------------------------------------------------------------------------------
//
// once the number of symptomatic cases reaches the threshold every contact riskier
// than max_weight is cut for the rest of the run
#[derive(Debug, Clone, PartialEq)]
pub struct Lockdown {
    pub infected_threshold: usize,
    pub max_weight: f64,
    started: Option<usize>, // cycle
}

impl Lockdown {
    pub fn new(infected_threshold: usize, max_weight: f64) -> Lockdown {
        Lockdown {
            infected_threshold,
            max_weight,
            started: None,
        }
    }

    pub fn started(&self) -> Option<usize> {
        self.started
    }
}

impl InterventionPolicy for Lockdown {
    fn intervene(&mut self, ctx: &mut InterventionContext<'_>) {
        if self.started.is_some() || ctx.counts.infected < self.infected_threshold {
            return;
        }
        let max_weight = self.max_weight;
        let removed = ctx.graph.retain_edges(|_, _, weight| weight <= max_weight);
        self.started = Some(ctx.timestep);
        info!(
            "Lockdown at cycle {} with {} infected - {} contacts cut",
            ctx.timestep, ctx.counts.infected, removed
        );
    }
}
