use regex::Regex;

/// Compiled message-exclusion patterns, in configuration order.
///
/// Always rebuilt as a whole from the configured expressions; an expression
/// that fails to compile is reported and left out, the others still apply.
#[derive(Debug, Clone, Default)]
pub struct MessageExclusionSet {
    patterns: Vec<Regex>,
}

impl MessageExclusionSet {
    #[must_use]
    pub fn compile<S: AsRef<str>>(expressions: &[S]) -> Self {
        let patterns = expressions
            .iter()
            .filter_map(|expr| match Regex::new(expr.as_ref()) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Ignoring message exclusion [{}]: {e}", expr.as_ref());
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// True when any pattern matches the serialized message payload.
    #[must_use]
    pub fn is_excluded(&self, payload: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(payload))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
