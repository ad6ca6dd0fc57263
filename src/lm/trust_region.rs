//! Trust region implementation for the Levenberg-Marquardt algorithm.
//!
//! The radius `delta` bounds the scaled step length `‖D·p‖`. It shrinks
//! when the actual reduction of the residual norm falls short of the
//! reduction the linear model predicted and grows when they agree.

/// Trust-region state carried between inner iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustRegion {
    /// Radius of the region in scaled parameter space
    pub delta: f64,

    /// Current Levenberg-Marquardt damping parameter
    pub par: f64,
}

impl TrustRegion {
    /// Initial region: `factor·‖D·x₀‖`, or `factor` itself when that is zero.
    pub fn initial(factor: f64, scaled_xnorm: f64) -> Self {
        let delta = if scaled_xnorm == 0.0 {
            factor
        } else {
            factor * scaled_xnorm
        };
        Self { delta, par: 0.0 }
    }

    /// Clamp the radius to the first step length.
    pub fn limit_to(&mut self, pnorm: f64) {
        self.delta = self.delta.min(pnorm);
    }

    /// Update the radius and damping from the outcome of a trial step.
    ///
    /// # Arguments
    ///
    /// * `ratio` - Actual over predicted reduction
    /// * `actred` - Scaled actual reduction
    /// * `dirder` - Scaled directional derivative
    /// * `fnorm` - Residual norm at the current point
    /// * `fnorm1` - Residual norm at the trial point
    /// * `pnorm` - Scaled length of the step
    pub fn update(
        &mut self,
        ratio: f64,
        actred: f64,
        dirder: f64,
        fnorm: f64,
        fnorm1: f64,
        pnorm: f64,
    ) {
        if ratio <= 0.25 {
            let mut temp = if actred >= 0.0 {
                0.5
            } else {
                0.5 * dirder / (dirder + 0.5 * actred)
            };
            if 0.1 * fnorm1 >= fnorm || temp < 0.1 {
                temp = 0.1;
            }
            self.delta = temp * self.delta.min(pnorm / 0.1);
            self.par /= temp;
        } else if self.par == 0.0 || ratio >= 0.75 {
            self.delta = pnorm / 0.5;
            self.par *= 0.5;
        }
    }

    /// Scaled actual reduction `1 − (fnorm1/fnorm)²`, or `-1` when the
    /// trial norm grew by more than a factor of ten.
    pub fn actual_reduction(fnorm: f64, fnorm1: f64) -> f64 {
        if 0.1 * fnorm1 < fnorm {
            let r = fnorm1 / fnorm;
            1.0 - r * r
        } else {
            -1.0
        }
    }

    /// Calculates the ratio between actual and predicted reduction.
    pub fn gain_ratio(actred: f64, prered: f64) -> f64 {
        if prered != 0.0 {
            actred / prered
        } else {
            0.0
        }
    }
}
