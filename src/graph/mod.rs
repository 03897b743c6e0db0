/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// graph module
//
// the contact graph links individuals by undirected weighted edges
// an edge weight is the probability that an infectious person passes the
// virus to a susceptible neighbour in one cycle
//
// nodes are dense ids 0..node_count, the same ids used by the population
// adjacency is kept in ordered maps so neighbours always come out in id order
//
////////////////////////////////////////////////////////////////////////////////////

use crate::error::SimError;
use rand::Rng;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ContactGraph {
    adjacency: Vec<BTreeMap<usize, f64>>,
    edge_count: usize,
}

impl ContactGraph {
    /// Creates a graph of `node_count` isolated nodes.
    pub fn new(node_count: usize) -> ContactGraph {
        ContactGraph {
            adjacency: vec![BTreeMap::new(); node_count],
            edge_count: 0,
        }
    }

    /// Builds a graph from `(a, b, weight)` triples, failing on the first bad edge.
    pub fn from_edges<I>(node_count: usize, edges: I) -> Result<ContactGraph, SimError>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut graph = ContactGraph::new(node_count);
        for (a, b, weight) in edges {
            graph.add_edge(a, b, weight)?;
        }
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adjacency.get(node).map_or(0, BTreeMap::len)
    }

    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) -> Result<(), SimError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(SimError::SelfLoop(a));
        }
        if !(0.0..=1.0).contains(&weight) {
            return Err(SimError::InvalidWeight { a, b, weight });
        }
        if self.adjacency[a].contains_key(&b) {
            return Err(SimError::DuplicateEdge { a, b });
        }

        self.adjacency[a].insert(b, weight);
        self.adjacency[b].insert(a, weight);
        self.edge_count += 1;
        Ok(())
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.adjacency
            .get(a)
            .map_or(false, |neighbours| neighbours.contains_key(&b))
    }

    /// Transmission probability along the edge `a`-`b`.
    pub fn edge_weight(&self, a: usize, b: usize) -> Result<f64, SimError> {
        self.adjacency
            .get(a)
            .and_then(|neighbours| neighbours.get(&b))
            .copied()
            .ok_or(SimError::MissingEdge { a, b })
    }

    /// Neighbours of `node` in ascending id order. Unknown nodes have none.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges_of(node).map(|(neighbour, _)| neighbour)
    }

    /// `(neighbour, weight)` pairs of `node` in ascending id order.
    pub fn edges_of(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.adjacency
            .get(node)
            .into_iter()
            .flat_map(|neighbours| neighbours.iter().map(|(&n, &w)| (n, w)))
    }

    pub fn remove_edge(&mut self, a: usize, b: usize) -> Result<(), SimError> {
        if !self.has_edge(a, b) {
            return Err(SimError::MissingEdge { a, b });
        }
        self.detach(a, b);
        Ok(())
    }

    /// For every neighbour `c` of `node` and every neighbour `x` of `c`, removes
    /// the edge `c`-`x` when `filter(c, x)` holds. Returns the number of edges removed.
    pub fn remove_edges_incident<F>(&mut self, node: usize, mut filter: F) -> Result<usize, SimError>
    where
        F: FnMut(usize, usize) -> bool,
    {
        self.check_node(node)?;
        let contacts: Vec<usize> = self.neighbors(node).collect();
        let mut removed = 0;
        for contact in contacts {
            let cut: Vec<usize> = self
                .neighbors(contact)
                .filter(|&other| filter(contact, other))
                .collect();
            for other in cut {
                self.detach(contact, other);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Contact-tracing cutoff around a detected case: the case's contacts lose
    /// every edge except the one back to the case.
    pub fn quarantine(&mut self, node: usize) -> Result<usize, SimError> {
        self.remove_edges_incident(node, |_, other| other != node)
    }

    /// Keeps only the edges for which `keep(a, b, weight)` holds. Returns the number removed.
    pub fn retain_edges<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize, usize, f64) -> bool,
    {
        let mut cut: Vec<(usize, usize)> = Vec::new();
        for (a, neighbours) in self.adjacency.iter().enumerate() {
            for (&b, &weight) in neighbours.range(a + 1..) {
                if !keep(a, b, weight) {
                    cut.push((a, b));
                }
            }
        }
        for &(a, b) in &cut {
            self.detach(a, b);
        }
        cut.len()
    }

    /// Gives every edge the same transmission probability.
    pub fn set_uniform_weight(&mut self, weight: f64) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(SimError::InvalidWeight { a: 0, b: 0, weight });
        }
        for neighbours in self.adjacency.iter_mut() {
            for w in neighbours.values_mut() {
                *w = weight;
            }
        }
        Ok(())
    }

    /// Draws a fresh uniform [0, 1) weight for each edge, once per edge in id order.
    pub fn randomize_weights<R: Rng>(&mut self, rng: &mut R) {
        for a in 0..self.adjacency.len() {
            let upper: Vec<usize> = self.adjacency[a].range(a + 1..).map(|(&b, _)| b).collect();
            for b in upper {
                let weight = rng.gen::<f64>();
                self.adjacency[a].insert(b, weight);
                self.adjacency[b].insert(a, weight);
            }
        }
    }

    fn detach(&mut self, a: usize, b: usize) {
        let removed = self.adjacency[a].remove(&b).is_some();
        self.adjacency[b].remove(&a);
        if removed {
            self.edge_count -= 1;
        }
    }

    fn check_node(&self, node: usize) -> Result<(), SimError> {
        if node < self.adjacency.len() {
            Ok(())
        } else {
            Err(SimError::UnknownNode {
                node,
                node_count: self.adjacency.len(),
            })
        }
    }
}
