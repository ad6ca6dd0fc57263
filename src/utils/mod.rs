//! Utility functions and helpers for the mpfit-rs library.

pub mod finite_difference;
