//! QR factorization and regularized solves checked against nalgebra.

mod qr_properties;
