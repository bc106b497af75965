//! Snowball parameters.

use crate::{Error, Result};

/// Parameters for a Snowball instance.
#[derive(Debug, Clone, Copy)]
pub struct Parameters {
    /// Sample size (k): number of validators polled per round.
    pub k: usize,

    /// Quorum size (alpha): votes needed for a poll to succeed.
    /// Safety requires `alpha > k / 2`.
    pub alpha: usize,

    /// Consecutive successes needed to finalize a slot with no observed
    /// conflict.
    pub beta_virtuous: u32,

    /// Consecutive successes needed to finalize a contested slot.
    pub beta_rogue: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            k: 20,
            alpha: 15,
            beta_virtuous: 15,
            beta_rogue: 20,
        }
    }
}

impl Parameters {
    /// Creates new parameters.
    pub fn new(k: usize, alpha: usize, beta_virtuous: u32, beta_rogue: u32) -> Self {
        Self {
            k,
            alpha,
            beta_virtuous,
            beta_rogue,
        }
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameters` describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidParameters("k must be positive".into()));
        }
        if self.alpha <= self.k / 2 {
            return Err(Error::InvalidParameters(format!(
                "alpha must satisfy alpha > k/2 (alpha = {}, k = {})",
                self.alpha, self.k
            )));
        }
        if self.alpha > self.k {
            return Err(Error::InvalidParameters(format!(
                "alpha must satisfy alpha <= k (alpha = {}, k = {})",
                self.alpha, self.k
            )));
        }
        if self.beta_virtuous == 0 {
            return Err(Error::InvalidParameters(
                "beta_virtuous must be positive".into(),
            ));
        }
        if self.beta_rogue < self.beta_virtuous {
            return Err(Error::InvalidParameters(format!(
                "beta_rogue must satisfy beta_rogue >= beta_virtuous ({} < {})",
                self.beta_rogue, self.beta_virtuous
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn test_zero_k() {
        assert!(Parameters::new(0, 1, 1, 1).validate().is_err());
    }

    #[test]
    fn test_alpha_below_majority() {
        // alpha = k/2 is not a majority
        assert!(Parameters::new(20, 10, 15, 20).validate().is_err());
        assert!(Parameters::new(20, 11, 15, 20).validate().is_ok());
    }

    #[test]
    fn test_alpha_above_k() {
        assert!(Parameters::new(20, 21, 15, 20).validate().is_err());
    }

    #[test]
    fn test_beta_ordering() {
        assert!(Parameters::new(20, 15, 20, 15).validate().is_err());
        assert!(Parameters::new(20, 15, 15, 15).validate().is_ok());
    }
}
