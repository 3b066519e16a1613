//! Absolute orientation: best rigid transform between corresponding points.

use log::debug;
use nalgebra::Translation3;
use robocal_core::{Iso3, Mat3, Pt3, Real, Vec3};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RigidFitError {
    #[error("need at least 3 point correspondences, got {0}")]
    NotEnoughPoints(usize),
    #[error("point sets differ in size: {parent} parent vs {child} child")]
    LengthMismatch { parent: usize, child: usize },
    #[error("correspondences are degenerate ({0})")]
    Degenerate(&'static str),
    #[error("svd failed")]
    SvdFailed,
}

/// Ratio between the second and first principal spread below which a point
/// set is considered colinear.
const COLINEAR_RATIO: Real = 1e-9;
/// Spread (m²) below which all points are considered coincident.
const COINCIDENT_SPREAD: Real = 1e-18;

/// Estimate `T` minimising `Σ |parent_i - T * child_i|²`.
///
/// Uses the SVD of the cross-covariance of the centered point sets. The
/// rotation is corrected to a proper rotation when the SVD yields a
/// reflection. Requires at least 3 non-colinear points.
pub fn fit_rigid_transform(parent: &[Pt3], child: &[Pt3]) -> Result<Iso3, RigidFitError> {
    if parent.len() != child.len() {
        return Err(RigidFitError::LengthMismatch {
            parent: parent.len(),
            child: child.len(),
        });
    }
    let n = parent.len();
    if n < 3 {
        return Err(RigidFitError::NotEnoughPoints(n));
    }

    let cp = centroid(parent);
    let cc = centroid(child);

    let mut cross = Mat3::zeros();
    let mut scatter = Mat3::zeros();
    for (p, c) in parent.iter().zip(child) {
        let dp = p.coords - cp;
        let dc = c.coords - cc;
        cross += dc * dp.transpose();
        scatter += dc * dc.transpose();
    }

    check_spread(&scatter)?;

    let svd = cross.svd(true, true);
    let u = svd.u.ok_or(RigidFitError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RigidFitError::SvdFailed)?;
    let v = v_t.transpose();

    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        // Flip the axis of the smallest singular value.
        let smallest = smallest_index(svd.singular_values.as_slice());
        let mut v_fixed = v;
        v_fixed.column_mut(smallest).neg_mut();
        r = v_fixed * u.transpose();
    }

    let rot = nalgebra::Rotation3::from_matrix_unchecked(r);
    let t = cp - rot * cc;
    debug!("rigid fit over {n} correspondences, |t| = {:.4}", t.norm());

    Ok(Iso3::from_parts(Translation3::from(t), rot.into()))
}

/// Root-mean-square of `|parent_i - T * child_i|`.
pub fn rms_residual(transform: &Iso3, parent: &[Pt3], child: &[Pt3]) -> Real {
    if parent.is_empty() {
        return 0.0;
    }
    let sum: Real = parent
        .iter()
        .zip(child)
        .map(|(p, c)| (p - transform * c).norm_squared())
        .sum();
    (sum / parent.len() as Real).sqrt()
}

fn centroid(points: &[Pt3]) -> Vec3 {
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    sum / points.len() as Real
}

fn check_spread(scatter: &Mat3) -> Result<(), RigidFitError> {
    let mut spread: Vec<Real> = scatter.symmetric_eigenvalues().iter().map(|v| v.abs()).collect();
    spread.sort_by(|a, b| b.total_cmp(a));

    if spread[0] <= COINCIDENT_SPREAD {
        return Err(RigidFitError::Degenerate("coincident points"));
    }
    if spread[1] <= COLINEAR_RATIO * spread[0] {
        return Err(RigidFitError::Degenerate("colinear points"));
    }
    Ok(())
}

fn smallest_index(values: &[Real]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(2)
}
