//! Convergence criteria for the Levenberg-Marquardt iteration.
//!
//! A solve stops when any test fires. Every test that fires in the same
//! check is recorded, so a caller can see, for example, that both the
//! `ftol` and `xtol` criteria were met on the final step.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lm::config::SolverConfig;

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Actual and predicted relative reductions in the sum of squares are at most `ftol`.
    FtolConverged,

    /// Relative error between two consecutive iterates is at most `xtol`.
    XtolConverged,

    /// The residual vector is orthogonal to the Jacobian columns to within `gtol`.
    GtolConverged,

    /// The iteration limit was reached.
    MaxIterations,

    /// The residual evaluation limit was reached.
    MaxEvaluations,

    /// `ftol` is too small; no further reduction in the sum of squares is possible.
    FtolTooSmall,

    /// `xtol` is too small; no further improvement in the parameters is possible.
    XtolTooSmall,

    /// `gtol` is too small; the residual vector is orthogonal to the Jacobian to machine precision.
    GtolTooSmall,
}

impl TerminationReason {
    /// Returns true if the reason is a successful convergence test.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            TerminationReason::FtolConverged
                | TerminationReason::XtolConverged
                | TerminationReason::GtolConverged
        )
    }

    /// Returns a description of the reason.
    pub fn description(&self) -> &'static str {
        match self {
            TerminationReason::FtolConverged => "Converged: small relative reduction in chi-square",
            TerminationReason::XtolConverged => "Converged: small relative change in parameters",
            TerminationReason::GtolConverged => "Converged: residuals orthogonal to the Jacobian",
            TerminationReason::MaxIterations => "Terminated: maximum iterations reached",
            TerminationReason::MaxEvaluations => "Terminated: maximum function evaluations reached",
            TerminationReason::FtolTooSmall => {
                "Terminated: ftol too small, no further reduction possible"
            }
            TerminationReason::XtolTooSmall => {
                "Terminated: xtol too small, no further improvement possible"
            }
            TerminationReason::GtolTooSmall => {
                "Terminated: gtol too small, gradient is zero to machine precision"
            }
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// The set of reasons recorded when a solve stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationStatus(BTreeSet<TerminationReason>);

impl TerminationStatus {
    /// An empty status: the iteration continues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reason.
    pub fn insert(&mut self, reason: TerminationReason) {
        self.0.insert(reason);
    }

    /// Whether a reason was recorded.
    pub fn contains(&self, reason: TerminationReason) -> bool {
        self.0.contains(&reason)
    }

    /// True while no test has fired.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if at least one convergence test fired.
    pub fn converged(&self) -> bool {
        self.0.iter().any(TerminationReason::is_converged)
    }

    /// Iterate over the recorded reasons.
    pub fn iter(&self) -> impl Iterator<Item = &TerminationReason> {
        self.0.iter()
    }
}

impl From<TerminationReason> for TerminationStatus {
    fn from(reason: TerminationReason) -> Self {
        let mut status = Self::new();
        status.insert(reason);
        status
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(TerminationReason::description).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Quantities from one trial step that the tests read.
#[derive(Debug, Clone, Copy)]
pub struct StepStatistics {
    /// Scaled actual reduction
    pub actred: f64,
    /// Scaled predicted reduction
    pub prered: f64,
    /// Actual over predicted reduction
    pub ratio: f64,
    /// Trust-region radius after the update
    pub delta: f64,
    /// Scaled norm of the current parameters
    pub xnorm: f64,
    /// Largest cosine between the residuals and a Jacobian column
    pub gnorm: f64,
}

/// Criteria for determining when the iteration stops.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance on the relative reduction in the sum of squares.
    pub ftol: f64,

    /// Tolerance on the relative change in parameter values.
    pub xtol: f64,

    /// Tolerance on the orthogonality of residuals and Jacobian.
    pub gtol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,

    /// Maximum number of residual evaluations.
    pub max_evaluations: Option<usize>,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from(&SolverConfig::default())
    }
}

impl From<&SolverConfig> for ConvergenceCriteria {
    fn from(config: &SolverConfig) -> Self {
        Self {
            ftol: config.ftol,
            xtol: config.xtol,
            gtol: config.gtol,
            max_iterations: config.max_iterations,
            max_evaluations: config.max_evaluations,
        }
    }
}

impl ConvergenceCriteria {
    /// The gradient test, run once per outer iteration before stepping.
    pub fn check_gradient(&self, gnorm: f64) -> TerminationStatus {
        let mut status = TerminationStatus::new();
        if gnorm <= self.gtol {
            status.insert(TerminationReason::GtolConverged);
        }
        status
    }

    /// The tests run after each trial step.
    ///
    /// # Arguments
    ///
    /// * `stats` - Reductions and norms from the trial step
    /// * `iterations` - Completed outer iterations
    /// * `evaluations` - Residual evaluations so far
    pub fn check_step(
        &self,
        stats: &StepStatistics,
        iterations: usize,
        evaluations: usize,
    ) -> TerminationStatus {
        let mut status = TerminationStatus::new();
        let StepStatistics {
            actred,
            prered,
            ratio,
            delta,
            xnorm,
            gnorm,
        } = *stats;

        if actred.abs() <= self.ftol && prered <= self.ftol && 0.5 * ratio <= 1.0 {
            status.insert(TerminationReason::FtolConverged);
        }
        if delta <= self.xtol * xnorm {
            status.insert(TerminationReason::XtolConverged);
        }
        if !status.is_empty() {
            return status;
        }

        if iterations >= self.max_iterations {
            status.insert(TerminationReason::MaxIterations);
        }
        if let Some(limit) = self.max_evaluations {
            if evaluations >= limit {
                status.insert(TerminationReason::MaxEvaluations);
            }
        }

        let eps = f64::EPSILON;
        if actred.abs() <= eps && prered <= eps && 0.5 * ratio <= 1.0 {
            status.insert(TerminationReason::FtolTooSmall);
        }
        if delta <= eps * xnorm {
            status.insert(TerminationReason::XtolTooSmall);
        }
        if gnorm <= eps {
            status.insert(TerminationReason::GtolTooSmall);
        }

        status
    }
}
