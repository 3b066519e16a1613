//! Builds the ordered list of configurations a session visits.
//!
//! Two input forms:
//! - an explicit flat list, `base_dof + joint_dof` values per configuration,
//! - per-axis `(start, step, stop)` ranges whose Cartesian product is
//!   enumerated odometer-style (last-declared axis varies fastest).

use log::{debug, info};
use robocal_core::{BasePose, ConfigError, Configuration, Real};
use serde::{Deserialize, Serialize};

/// Degrees of freedom of a planar base pose (x, y, phi).
pub const BASE_DOF: usize = 3;
/// Fewest configurations an explicit list may yield.
pub const MIN_CONFIGURATIONS: usize = 3;
/// Most values a single range axis may yield.
pub const MAX_AXIS_SAMPLES: usize = 10_000;
/// Most configurations a range specification may yield.
pub const MAX_CONFIGURATIONS: usize = 100_000;

const RANGE_EPS: Real = 1e-9;

/// One axis of a range specification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: Real,
    pub step: Real,
    pub stop: Real,
}

impl AxisRange {
    pub fn new(start: Real, step: Real, stop: Real) -> Self {
        Self { start, step, stop }
    }

    /// Parse a `[start, step, stop]` triple.
    pub fn from_triple(axis: &str, values: &[Real]) -> Result<Self, ConfigError> {
        match values {
            [start, step, stop] => Ok(Self::new(*start, *step, *stop)),
            _ => Err(ConfigError::RangeShape {
                axis: axis.to_string(),
                len: values.len(),
            }),
        }
    }

    /// Values `start + k * step` up to and including `stop`.
    ///
    /// A degenerate axis (`start == stop` or `step == 0`) uses a unit step,
    /// so it yields at least `start`.
    pub fn samples(&self, axis: &str) -> Result<Vec<Real>, ConfigError> {
        let Self { start, stop, .. } = *self;
        let step = if start == stop || self.step == 0.0 {
            1.0
        } else {
            self.step
        };

        let ascending = step > 0.0;
        if (ascending && start > stop) || (!ascending && start < stop) {
            return Err(ConfigError::RangeDirection {
                axis: axis.to_string(),
                start,
                step: self.step,
                stop,
            });
        }

        // Checked before allocating anything; `as` saturates on overflow.
        let count = ((((stop - start) / step).abs() + RANGE_EPS).floor() as usize).saturating_add(1);
        if count > MAX_AXIS_SAMPLES {
            return Err(ConfigError::TooManySamples {
                axis: axis.to_string(),
                count,
                max: MAX_AXIS_SAMPLES,
            });
        }

        let mut values = Vec::with_capacity(count);
        for k in 0..=count {
            let v = start + k as Real * step;
            let inside = if ascending {
                v <= stop + RANGE_EPS
            } else {
                v >= stop - RANGE_EPS
            };
            if !inside {
                break;
            }
            values.push(v);
        }
        Ok(values)
    }
}

/// Range specification. Base axes are all present or all absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeSpec {
    /// `[start, step, stop]` for base x, y and phi, or `None` for limb-only sessions.
    #[serde(default)]
    pub base: Option<BaseRanges>,
    /// Flat `[start, step, stop]` triples, one per joint.
    #[serde(default)]
    pub joints: Vec<Real>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseRanges {
    pub x: Vec<Real>,
    pub y: Vec<Real>,
    pub phi: Vec<Real>,
}

/// Declarative pose space, as found in session configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PoseSpace {
    Explicit {
        /// Whether every configuration starts with a base pose (x, y, phi).
        #[serde(default)]
        base: bool,
        #[serde(default)]
        joint_dof: usize,
        values: Vec<Real>,
    },
    Range(RangeSpec),
}

impl Default for PoseSpace {
    fn default() -> Self {
        PoseSpace::Range(RangeSpec::default())
    }
}

/// Generated configurations, in visiting order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigurationSpace {
    configurations: Vec<Configuration>,
}

impl ConfigurationSpace {
    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Base goals, parallel to [`joint_configurations`](Self::joint_configurations).
    pub fn base_configurations(&self) -> Vec<Option<BasePose>> {
        self.configurations.iter().map(|c| c.base_pose).collect()
    }

    pub fn joint_configurations(&self) -> Vec<Vec<Real>> {
        self.configurations
            .iter()
            .map(|c| c.joint_values.clone())
            .collect()
    }

    pub fn into_configurations(self) -> Vec<Configuration> {
        self.configurations
    }
}

/// Stateless builder of [`ConfigurationSpace`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationSpaceGenerator;

impl ConfigurationSpaceGenerator {
    pub fn generate(space: &PoseSpace) -> Result<ConfigurationSpace, ConfigError> {
        let out = match space {
            PoseSpace::Explicit {
                base,
                joint_dof,
                values,
            } => Self::from_list(values, *base, *joint_dof)?,
            PoseSpace::Range(spec) => Self::from_ranges(spec)?,
        };

        info!("generated {} configuration(s)", out.len());
        for (i, c) in out.configurations.iter().enumerate() {
            debug!("configuration {i}: base {:?}, joints {:?}", c.base_pose, c.joint_values);
        }
        Ok(out)
    }

    /// Split a flat list into configurations of `base_dof + joint_dof` values.
    pub fn from_list(
        values: &[Real],
        base: bool,
        joint_dof: usize,
    ) -> Result<ConfigurationSpace, ConfigError> {
        let base_dof = if base { BASE_DOF } else { 0 };
        let per_config = base_dof + joint_dof;
        if per_config == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "poses",
                reason: "neither base nor joints are moved".into(),
            });
        }
        if values.len() % per_config != 0 {
            return Err(ConfigError::ListShape {
                len: values.len(),
                per_config,
            });
        }
        let count = values.len() / per_config;
        if count < MIN_CONFIGURATIONS {
            return Err(ConfigError::TooFewConfigurations {
                got: count,
                min: MIN_CONFIGURATIONS,
            });
        }

        let configurations = values
            .chunks_exact(per_config)
            .map(|chunk| {
                let (b, j) = chunk.split_at(base_dof);
                Configuration {
                    base_pose: base.then(|| BasePose::new(b[0], b[1], b[2])),
                    joint_values: j.to_vec(),
                }
            })
            .collect();
        Ok(ConfigurationSpace { configurations })
    }

    /// Cartesian product of all axis ranges, last-declared axis fastest.
    pub fn from_ranges(spec: &RangeSpec) -> Result<ConfigurationSpace, ConfigError> {
        if spec.joints.len() % 3 != 0 {
            return Err(ConfigError::RangeShape {
                axis: "joints".into(),
                len: spec.joints.len(),
            });
        }

        let mut axes: Vec<Vec<Real>> = Vec::new();
        if let Some(base) = &spec.base {
            for (name, values) in [("base x", &base.x), ("base y", &base.y), ("base phi", &base.phi)] {
                axes.push(AxisRange::from_triple(name, values)?.samples(name)?);
            }
        }
        for (j, triple) in spec.joints.chunks_exact(3).enumerate() {
            let name = format!("joint {j}");
            axes.push(AxisRange::from_triple(&name, triple)?.samples(&name)?);
        }

        let count = axes
            .iter()
            .try_fold(1usize, |acc, a| acc.checked_mul(a.len()))
            .filter(|&n| n <= MAX_CONFIGURATIONS)
            .ok_or(ConfigError::TooManyConfigurations {
                max: MAX_CONFIGURATIONS,
            })?;
        if axes.is_empty() || count == 0 {
            return Err(ConfigError::EmptyConfigurationSpace);
        }

        let base_dof = if spec.base.is_some() { BASE_DOF } else { 0 };
        let mut configurations = Vec::with_capacity(count);
        let mut digits = vec![0usize; axes.len()];
        for _ in 0..count {
            let values: Vec<Real> = digits.iter().zip(&axes).map(|(&d, a)| a[d]).collect();
            let (b, j) = values.split_at(base_dof);
            configurations.push(Configuration {
                base_pose: (base_dof > 0).then(|| BasePose::new(b[0], b[1], b[2])),
                joint_values: j.to_vec(),
            });

            // Odometer increment, rightmost digit first.
            for (digit, axis) in digits.iter_mut().zip(&axes).rev() {
                *digit += 1;
                if *digit < axis.len() {
                    break;
                }
                *digit = 0;
            }
        }

        Ok(ConfigurationSpace { configurations })
    }
}
