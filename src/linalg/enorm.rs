//! Euclidean norms that neither overflow nor underflow.
//!
//! The careful norm splits the components into small, intermediate and
//! large magnitudes and accumulates each group with its own scaling, so
//! that `‖x‖` is exact to rounding even when `Σ x²` is not representable.

use ndarray::{ArrayBase, Data, Ix1};
use serde::{Deserialize, Serialize};

/// Components below this magnitude are accumulated with scaling.
const RDWARF: f64 = 3.834e-20;

/// Components above `RGIANT / n` are accumulated with scaling.
const RGIANT: f64 = 1.304e19;

/// Which norm the solver uses for residual and step lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormMethod {
    /// Overflow- and underflow-safe accumulation
    #[default]
    Careful,
    /// Plain `sqrt(Σ x²)`
    Fast,
}

/// Euclidean norm of a vector.
pub trait Enorm {
    /// Norm that is safe against overflow and destructive underflow.
    fn enorm(&self) -> f64;

    /// Norm computed as `sqrt(Σ x²)`.
    fn enorm_fast(&self) -> f64;

    /// Norm computed with the given method.
    fn norm_with(&self, method: NormMethod) -> f64 {
        match method {
            NormMethod::Careful => self.enorm(),
            NormMethod::Fast => self.enorm_fast(),
        }
    }
}

fn careful<'a, I>(values: I, n: usize) -> f64
where
    I: Iterator<Item = &'a f64>,
{
    if n == 0 {
        return 0.0;
    }

    let agiant = RGIANT / n as f64;
    let mut s1 = 0.0;
    let mut s2 = 0.0;
    let mut s3 = 0.0;
    let mut x1max = 0.0;
    let mut x3max = 0.0;

    for &v in values {
        let xabs = v.abs();
        if xabs > RDWARF && xabs < agiant {
            s2 += xabs * xabs;
        } else if xabs <= RDWARF {
            if xabs > x3max {
                s3 = 1.0 + s3 * (x3max / xabs) * (x3max / xabs);
                x3max = xabs;
            } else if xabs != 0.0 {
                s3 += (xabs / x3max) * (xabs / x3max);
            }
        } else if xabs > x1max {
            s1 = 1.0 + s1 * (x1max / xabs) * (x1max / xabs);
            x1max = xabs;
        } else {
            s1 += (xabs / x1max) * (xabs / x1max);
        }
    }

    if s1 != 0.0 {
        x1max * (s1 + (s2 / x1max) / x1max).sqrt()
    } else if s2 != 0.0 {
        if s2 >= x3max {
            (s2 * (1.0 + (x3max / s2) * (x3max * s3))).sqrt()
        } else {
            (x3max * ((s2 / x3max) + (x3max * s3))).sqrt()
        }
    } else {
        x3max * s3.sqrt()
    }
}

impl Enorm for [f64] {
    fn enorm(&self) -> f64 {
        careful(self.iter(), self.len())
    }

    fn enorm_fast(&self) -> f64 {
        self.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

// Views may be strided (matrix columns), so iterate rather than slice.
impl<S> Enorm for ArrayBase<S, Ix1>
where
    S: Data<Elem = f64>,
{
    fn enorm(&self) -> f64 {
        careful(self.iter(), self.len())
    }

    fn enorm_fast(&self) -> f64 {
        self.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}
