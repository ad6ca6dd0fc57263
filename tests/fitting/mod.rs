//! Fitting models to synthetic data.

mod model_fits;
mod persistence;
