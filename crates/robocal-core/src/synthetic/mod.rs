pub mod noise;

use crate::{Chain, ChainObservation, Iso3, Pt3, Real};

/// Planar calibration grid in the marker frame (z = 0), row-major.
///
/// The origin is at the first inner corner; `cols × rows` points spaced by
/// `spacing` meters.
pub fn grid_points(cols: usize, rows: usize, spacing: Real) -> Vec<Pt3> {
    let mut pts = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            pts.push(Pt3::new(c as Real * spacing, r as Real * spacing, 0.0));
        }
    }
    pts
}

/// Observation of `model_points` for a chain with known ground truth.
///
/// `truth` holds one `parent_se3_child` per edge, `bridges` the bridge
/// transforms of this configuration. The tip side is derived from the
/// truth so that both ends of the chain agree exactly on the marker.
pub fn observe_chain(
    chain: &Chain,
    truth: &[Iso3],
    bridges: &[Iso3],
    root_se3_marker: Iso3,
    model_points: &[Pt3],
    configuration: usize,
) -> ChainObservation {
    let root_se3_tip = chain.compose_root_se3_tip(truth, bridges);
    ChainObservation {
        configuration,
        model_points: model_points.to_vec(),
        root_se3_marker,
        tip_se3_marker: root_se3_tip.inverse() * root_se3_marker,
        bridges: bridges.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdgeSpec, Rpy, iso_from_xyz_rpy};

    #[test]
    fn grid_is_row_major() {
        let pts = grid_points(3, 2, 0.05);
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[1], Pt3::new(0.05, 0.0, 0.0));
        assert_eq!(pts[3], Pt3::new(0.0, 0.05, 0.0));
    }

    #[test]
    fn observed_chain_closes_on_the_marker() {
        let chain = Chain::new(
            &[EdgeSpec::new("a", "b"), EdgeSpec::new("c", "d")],
            &[Iso3::identity(); 2],
        )
        .unwrap();
        let truth = [
            iso_from_xyz_rpy([0.1, 0.0, 0.3], Rpy::new(0.0, 0.0, 0.4)),
            iso_from_xyz_rpy([0.0, 0.2, 0.1], Rpy::new(0.1, -0.1, 0.0)),
        ];
        let bridge = iso_from_xyz_rpy([0.05, 0.0, 0.0], Rpy::new(0.0, 0.3, 0.0));
        let root_se3_marker = iso_from_xyz_rpy([1.0, 0.0, 0.5], Rpy::new(0.0, 0.0, 3.0));

        let obs = observe_chain(&chain, &truth, &[bridge], root_se3_marker, &grid_points(2, 2, 0.1), 0);
        let closed = truth[0] * bridge * truth[1] * obs.tip_se3_marker;
        let (dt, dr) = crate::pose_error(&closed, &root_se3_marker);
        assert!(dt < 1e-12 && dr < 1e-7);
    }
}
