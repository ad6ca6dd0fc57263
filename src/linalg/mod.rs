//! Dense linear algebra used by the solver.
//!
//! Only what the Levenberg-Marquardt iteration needs: careful Euclidean
//! norms, column-pivoted Householder QR, and the regularized
//! least-squares solve on top of it.

pub mod enorm;
pub mod qr;
pub mod qr_solve;

pub use enorm::{Enorm, NormMethod};
pub use qr::{PackedQr, TriangularR};
pub use qr_solve::{qrd_solve, s_matrix, QrdSolution};
