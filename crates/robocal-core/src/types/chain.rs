//! Kinematic chain of uncertain edges.
//!
//! A chain is an ordered list of [`Edge`]s. Each edge is the transform
//! `parent_se3_child` between two named frames. Consecutive edges either
//! share a frame (`edges[i].child == edges[i + 1].parent`) or are connected
//! by a fixed, already-known *bridge* transform `child_i_se3_parent_{i+1}`.
//!
//! ```text
//! root ──E0──▶ c0 ┄┄B0┄┄▶ p1 ──E1──▶ c1 ──E2──▶ tip
//! ```

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Iso3};

/// Declarative description of one edge (frame names only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub parent: String,
    pub child: String,
}

impl EdgeSpec {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

/// One uncertain transform of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub parent: String,
    pub child: String,
    /// Current estimate of `parent_se3_child`. Only the solver refines it.
    pub transform: Iso3,
    /// Index of the bridge from this edge's child to the next edge's parent.
    pub bridge_index: Option<usize>,
}

/// Ordered, non-empty sequence of edges with resolved bridge indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    edges: Vec<Edge>,
    num_bridges: usize,
}

/// A gap between two edges that must be spanned by a fixed transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSpec {
    /// Bridge index (position in a per-observation bridge list).
    pub index: usize,
    /// Child frame of the preceding edge.
    pub from: String,
    /// Parent frame of the following edge.
    pub to: String,
}

impl Chain {
    /// Build a chain from frame names and their initial estimates.
    ///
    /// Bridges are assigned to every gap where a child frame differs from
    /// the next parent frame, numbered in chain order.
    pub fn new(specs: &[EdgeSpec], initial: &[Iso3]) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyChain);
        }
        if initial.len() != specs.len() {
            return Err(ConfigError::InvalidParameter {
                name: "initial",
                reason: format!(
                    "{} initial transforms for {} edges",
                    initial.len(),
                    specs.len()
                ),
            });
        }
        validate_specs(specs)?;

        let mut edges = Vec::with_capacity(specs.len());
        let mut num_bridges = 0;
        for (i, (spec, tf)) in specs.iter().zip(initial).enumerate() {
            let bridge_index = match specs.get(i + 1) {
                Some(next) if next.parent != spec.child => {
                    num_bridges += 1;
                    Some(num_bridges - 1)
                }
                _ => None,
            };
            edges.push(Edge {
                parent: spec.parent.clone(),
                child: spec.child.clone(),
                transform: *tf,
                bridge_index,
            });
        }

        Ok(Self { edges, num_bridges })
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    /// Replace the estimate of one edge.
    pub fn set_transform(&mut self, index: usize, transform: Iso3) {
        self.edges[index].transform = transform;
    }

    /// Snapshot of all current estimates, in chain order.
    pub fn transforms(&self) -> Vec<Iso3> {
        self.edges.iter().map(|e| e.transform).collect()
    }

    pub fn num_bridges(&self) -> usize {
        self.num_bridges
    }

    /// The gaps that must be looked up for every observation.
    pub fn bridges(&self) -> Vec<BridgeSpec> {
        self.edges
            .windows(2)
            .filter_map(|w| {
                w[0].bridge_index.map(|index| BridgeSpec {
                    index,
                    from: w[0].child.clone(),
                    to: w[1].parent.clone(),
                })
            })
            .collect()
    }

    /// Compose `root_se3_tip` from explicit edge transforms and the bridges
    /// of one observation.
    ///
    /// Panics if `transforms` does not have one entry per edge or a bridge
    /// index is out of range for `bridges`.
    pub fn compose_root_se3_tip(&self, transforms: &[Iso3], bridges: &[Iso3]) -> Iso3 {
        assert_eq!(transforms.len(), self.edges.len());
        let mut acc = Iso3::identity();
        for (edge, tf) in self.edges.iter().zip(transforms) {
            acc *= tf;
            if let Some(b) = edge.bridge_index {
                acc *= bridges[b];
            }
        }
        acc
    }

    /// Parent frame of the first edge.
    pub fn root_frame(&self) -> &str {
        &self.edges[0].parent
    }

    /// Child frame of the last edge.
    pub fn tip_frame(&self) -> &str {
        &self.edges[self.edges.len() - 1].child
    }
}

pub fn validate_specs(specs: &[EdgeSpec]) -> Result<(), ConfigError> {
    if specs.is_empty() {
        return Err(ConfigError::EmptyChain);
    }
    for (index, spec) in specs.iter().enumerate() {
        if spec.parent.is_empty() || spec.child.is_empty() {
            return Err(ConfigError::EmptyFrameName { index });
        }
        if spec.parent == spec.child {
            return Err(ConfigError::SelfLoop {
                index,
                frame: spec.parent.clone(),
            });
        }
    }
    Ok(())
}

/// Permutation of edge indices defining the solve sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct CalibrationOrder(Vec<usize>);

impl CalibrationOrder {
    /// Validate a 1-indexed order against a chain of `num_edges` edges.
    pub fn from_one_based(values: &[usize], num_edges: usize) -> Result<Self, ConfigError> {
        if values.len() != num_edges {
            return Err(ConfigError::OrderLength {
                got: values.len(),
                expected: num_edges,
            });
        }
        let mut seen = vec![false; num_edges];
        let mut order = Vec::with_capacity(num_edges);
        for &value in values {
            if value < 1 || value > num_edges {
                return Err(ConfigError::OrderIndex {
                    value,
                    edges: num_edges,
                });
            }
            if std::mem::replace(&mut seen[value - 1], true) {
                return Err(ConfigError::OrderDuplicate { value });
            }
            order.push(value - 1);
        }
        Ok(Self(order))
    }

    /// Chain order `0, 1, .., n-1`.
    pub fn sequential(num_edges: usize) -> Self {
        Self((0..num_edges).collect())
    }

    /// Zero-based edge indices.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The 1-indexed form, as written in configuration files.
    pub fn to_one_based(&self) -> Vec<usize> {
        self.0.iter().map(|i| i + 1).collect()
    }
}

impl TryFrom<Vec<usize>> for CalibrationOrder {
    type Error = ConfigError;

    fn try_from(values: Vec<usize>) -> Result<Self, Self::Error> {
        let n = values.len();
        Self::from_one_based(&values, n)
    }
}

impl From<CalibrationOrder> for Vec<usize> {
    fn from(order: CalibrationOrder) -> Self {
        order.to_one_based()
    }
}
