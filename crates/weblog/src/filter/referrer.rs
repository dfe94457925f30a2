use glob::Pattern;

use crate::conf::ConfigError;
use crate::parser::traits::ReferrerExclusion;

/// Referring sites to leave out, as glob patterns (`*.spam.example`).
#[derive(Debug, Clone, Default)]
pub struct ReferrerFilter {
    patterns: Vec<Pattern>,
}

impl ReferrerFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| ConfigError::InvalidReferrerPattern {
                    pattern: p.as_ref().to_string(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }
}

impl ReferrerExclusion for ReferrerFilter {
    fn is_ignored(&self, site: &str) -> bool {
        !site.is_empty() && self.patterns.iter().any(|p| p.matches(site))
    }
}
