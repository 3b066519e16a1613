use robocal_core::Real;

/// Detects runaway oscillation within one control phase.
///
/// The first error vector seen after [`reset`](Self::reset) becomes the
/// baseline; any later component exceeding its baseline by more than
/// `margin` is reported.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    margin: Real,
    baseline: Option<Vec<Real>>,
}

/// A component that grew beyond its allowance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divergence {
    pub axis: usize,
    pub error: Real,
    pub baseline: Real,
}

impl DivergenceGuard {
    pub fn new(margin: Real) -> Self {
        Self {
            margin,
            baseline: None,
        }
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn baseline(&self) -> Option<&[Real]> {
        self.baseline.as_deref()
    }

    /// Compare error magnitudes (signs are ignored) against the baseline.
    pub fn check(&mut self, errors: &[Real]) -> Option<Divergence> {
        let magnitudes: Vec<Real> = errors.iter().map(|e| e.abs()).collect();
        if self.baseline.is_none() {
            self.baseline = Some(magnitudes);
            return None;
        }
        let baseline = self.baseline.as_deref()?;
        magnitudes
            .iter()
            .zip(baseline)
            .enumerate()
            .find(|(_, (e, b))| **e > **b + self.margin)
            .map(|(axis, (&error, &baseline))| Divergence {
                axis,
                error,
                baseline,
            })
    }
}
