//! Parameter collection implementation
//!
//! [`ParameterStore`] holds one [`Parameter`] per unknown, indexed by
//! position. It derives the free-parameter index set, applies ties, and
//! validates a starting vector before a solve.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{MpFitError, Result};
use crate::parameters::parameter::{Parameter, ParameterError};

/// An indexed collection of parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterStore {
    params: Vec<Parameter>,
}

impl ParameterStore {
    /// Create a store of `n` unset, free, unbounded parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::parameters::ParameterStore;
    ///
    /// let store = ParameterStore::new(3);
    /// assert_eq!(store.len(), 3);
    /// assert_eq!(store.free_indices(), vec![0, 1, 2]);
    /// ```
    pub fn new(n: usize) -> Self {
        Self {
            params: vec![Parameter::new(); n],
        }
    }

    /// Get the number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Check if the store has no parameters
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get a parameter by index
    pub fn get(&self, index: usize) -> Result<&Parameter> {
        let count = self.params.len();
        self.params
            .get(index)
            .ok_or(MpFitError::ParameterIndex { index, count })
    }

    /// Get a mutable reference to a parameter by index
    pub fn get_mut(&mut self, index: usize) -> Result<&mut Parameter> {
        let count = self.params.len();
        self.params
            .get_mut(index)
            .ok_or(MpFitError::ParameterIndex { index, count })
    }

    /// Iterate over the parameters in index order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Find the index of a named parameter
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.params
            .iter()
            .position(|p| p.name() == Some(name))
            .ok_or_else(|| {
                ParameterError::ParameterNotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Parameter names, `None` where no name was set
    pub fn names(&self) -> Vec<Option<String>> {
        self.params
            .iter()
            .map(|p| p.name().map(str::to_string))
            .collect()
    }

    /// Indices of the parameters the solver varies (neither fixed nor tied).
    pub fn free_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_free())
            .map(|(i, _)| i)
            .collect()
    }

    /// Build the starting vector from the configured values.
    ///
    /// Tied parameters without a value start at zero; their value is
    /// overwritten by [`ParameterStore::apply_ties`] before any evaluation.
    pub fn values(&self) -> Result<Array1<f64>> {
        self.params
            .iter()
            .enumerate()
            .map(|(index, p)| match p.value() {
                Some(v) => Ok(v),
                None if p.is_tied() => Ok(0.0),
                None => Err(ParameterError::NonFiniteValue { index, value: None }.into()),
            })
            .collect()
    }

    /// Recompute every tied parameter, in index order, from the current vector.
    ///
    /// Ties may read other tied parameters; a tie sees the values of ties
    /// with lower indices already updated. Circular ties are not detected.
    pub fn apply_ties(&self, values: &mut Array1<f64>) {
        for (i, p) in self.params.iter().enumerate() {
            if let Some(tie) = p.tie() {
                let v = tie(values.view());
                values[i] = v;
            }
        }
    }

    /// Check a starting vector against the configuration.
    ///
    /// Every non-tied value must be finite and inside its limits.
    pub fn validate(&self, values: ArrayView1<f64>) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(MpFitError::DimensionMismatch(format!(
                "Expected {} parameter values, got {}",
                self.params.len(),
                values.len()
            )));
        }

        for (index, (p, &value)) in self.params.iter().zip(values.iter()).enumerate() {
            if p.is_tied() {
                continue;
            }
            if !value.is_finite() {
                return Err(ParameterError::NonFiniteValue {
                    index,
                    value: Some(value),
                }
                .into());
            }
            p.bounds()
                .check(value)
                .map_err(|source| ParameterError::InvalidBounds { index, source })?;
        }

        Ok(())
    }

    /// Serialize the configuration to JSON. Ties are not included.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration previously written by [`ParameterStore::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
