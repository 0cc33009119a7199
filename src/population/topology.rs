//! Graph generators over local indices `0..n`.
//!
//! Generators know nothing about people; the builder runs them over the
//! eligible agents of one region and maps the local indices back to
//! [`PersonId`](crate::people::PersonId)s.
use std::str::FromStr;

use rand::seq::index::sample as choose_range;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::error::IxaError;

/// The closed set of topology kinds a layer can be generated with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TopologyKind {
    PreferentialAttachment,
    UniformRandom,
    Clustered,
}

impl FromStr for TopologyKind {
    type Err = IxaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preferential_attachment" | "scale_free" => Ok(TopologyKind::PreferentialAttachment),
            "uniform_random" | "random" => Ok(TopologyKind::UniformRandom),
            "clustered" | "microstructured" => Ok(TopologyKind::Clustered),
            other => Err(IxaError::config(format!("unknown topology kind `{other}`"))),
        }
    }
}

/// A topology kind with its validated parameter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Topology {
    /// Each new node links to `m` distinct existing nodes, proportional to degree.
    PreferentialAttachment { m: usize },
    /// Each node links to `k` distinct uniformly chosen partners.
    UniformRandom { k: usize },
    /// Nodes are partitioned into cliques of mean size `mean_size`.
    Clustered { mean_size: f64 },
}

/// Edges between local indices, plus the cluster partition for clustered
/// layers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalGraph {
    pub edges: Vec<(usize, usize)>,
    pub clusters: Vec<Vec<usize>>,
}

impl Topology {
    pub fn generate<R: Rng>(self, rng: &mut R, n: usize) -> LocalGraph {
        match self {
            Topology::PreferentialAttachment { m } => LocalGraph {
                edges: preferential_attachment(rng, n, m),
                clusters: Vec::new(),
            },
            Topology::UniformRandom { k } => LocalGraph {
                edges: uniform_random(rng, n, k),
                clusters: Vec::new(),
            },
            Topology::Clustered { mean_size } => clustered(rng, n, mean_size),
        }
    }
}

fn complete_graph(n: usize) -> Vec<(usize, usize)> {
    let mut edges = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            edges.push((i, j));
        }
    }
    edges
}

/// Barabasi-Albert growth. Node `m` joins the `m` seed nodes; every later node
/// draws `m` distinct targets from a list in which each node appears once per
/// incident edge.
pub fn preferential_attachment<R: Rng>(rng: &mut R, n: usize, m: usize) -> Vec<(usize, usize)> {
    if n <= m {
        return complete_graph(n);
    }
    let mut edges = Vec::with_capacity((n - m) * m);
    let mut repeated: Vec<usize> = Vec::with_capacity(2 * (n - m) * m);
    let mut targets: Vec<usize> = (0..m).collect();
    for source in m..n {
        for &target in &targets {
            edges.push((source, target));
        }
        repeated.extend_from_slice(&targets);
        repeated.extend(std::iter::repeat_n(source, m));

        targets.clear();
        while targets.len() < m {
            let candidate = repeated[rng.random_range(0..repeated.len())];
            if !targets.contains(&candidate) {
                targets.push(candidate);
            }
        }
    }
    edges
}

/// Every node gets `k` edges to distinct partners other than itself; `k` is
/// capped at `n - 1`.
pub fn uniform_random<R: Rng>(rng: &mut R, n: usize, k: usize) -> Vec<(usize, usize)> {
    if n < 2 {
        return Vec::new();
    }
    let k = k.min(n - 1);
    let mut edges = Vec::with_capacity(n * k);
    for source in 0..n {
        for partner in choose_range(rng, n - 1, k) {
            // Skip over `source` itself.
            let target = if partner >= source { partner + 1 } else { partner };
            edges.push((source, target));
        }
    }
    edges
}

/// Shuffles the nodes and cuts them into clusters of size `1 + Poisson(c - 1)`,
/// truncating the last one, then connects every pair within a cluster.
pub fn clustered<R: Rng>(rng: &mut R, n: usize, mean_size: f64) -> LocalGraph {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let extra = Poisson::new(mean_size - 1.0).ok();

    let mut graph = LocalGraph::default();
    let mut start = 0;
    while start < n {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = 1 + extra.map_or(0, |poisson| poisson.sample(rng) as usize);
        let end = (start + size).min(n);
        let members = order[start..end].to_vec();
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                graph.edges.push((a, b));
            }
        }
        graph.clusters.push(members);
        start = end;
    }
    graph
}
