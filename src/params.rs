//! Configuration for a [`crate::engine::Castle`] instance.

use crate::error::ConfigError;

/// Tuning parameters for the CASTLE algorithm. Defaults match the values
/// published by Cao, Carminati, Ferrari and Tan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameters {
    /// Minimum cluster size for release.
    pub k: usize,
    /// Maximum active tuples before forcing a release decision.
    pub delta: usize,
    /// Maximum active clusters in Γ.
    pub beta: usize,
    /// Rolling window of recent losses feeding τ.
    pub mu: usize,
    /// Minimum distinct sensitive values per released cluster.
    pub l: usize,
    /// Inverse-scale factor for Laplace noise.
    pub phi: f64,
    /// Whether differential-privacy perturbation is enabled.
    pub dp: bool,
    /// Probability that an incoming tuple is retained rather than dropped
    /// outright, when `dp` is enabled.
    pub beta_big: f64,
    /// Whether to retain all released originals for inspection.
    pub history: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            k: 5,
            delta: 10,
            beta: 5,
            mu: 5,
            l: 1,
            phi: 100.0 * std::f64::consts::LN_2,
            dp: true,
            beta_big: 1.0,
            history: false,
        }
    }
}

impl Parameters {
    /// Fatal configuration errors, checked once at construction time: an
    /// empty header list, an `l` requirement stronger than `k` can ever
    /// satisfy, or a sensitive attribute accidentally listed as a
    /// quasi-identifier header.
    pub fn validate(&self, headers: &[String], sensitive_attr: &str) -> Result<(), ConfigError> {
        if headers.is_empty() {
            return Err(ConfigError::EmptyHeaders);
        }
        if self.l > self.k {
            return Err(ConfigError::LGreaterThanK {
                l: self.l,
                k: self.k,
            });
        }
        if headers.iter().any(|h| h == sensitive_attr) {
            return Err(ConfigError::UnknownHeader(sensitive_attr.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_published_algorithm() {
        let p = Parameters::default();
        assert_eq!(p.k, 5);
        assert_eq!(p.delta, 10);
        assert_eq!(p.beta, 5);
        assert_eq!(p.mu, 5);
        assert_eq!(p.l, 1);
        assert!(p.dp);
        assert_eq!(p.beta_big, 1.0);
        assert!(!p.history);
    }

    #[test]
    fn rejects_empty_headers() {
        let p = Parameters::default();
        assert!(matches!(
            p.validate(&[], "sensitive"),
            Err(ConfigError::EmptyHeaders)
        ));
    }

    #[test]
    fn rejects_l_greater_than_k() {
        let mut p = Parameters::default();
        p.l = 10;
        p.k = 5;
        let headers = vec!["age".to_string()];
        assert!(matches!(
            p.validate(&headers, "sensitive"),
            Err(ConfigError::LGreaterThanK { l: 10, k: 5 })
        ));
    }

    #[test]
    fn rejects_sensitive_attr_among_headers() {
        let p = Parameters::default();
        let headers = vec!["age".to_string(), "disease".to_string()];
        assert!(p.validate(&headers, "disease").is_err());
    }
}
