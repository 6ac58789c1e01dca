//! Resolution context: which implicit-expansion rules are active.

/// Whether expressions are being bound for a plain projection or for the
/// aggregate list of a `group_by(..).agg(..)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    #[default]
    Default,
    Aggregate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    pub mode: ResolutionMode,
    /// Output names of the active group keys (aggregate mode only).
    pub group_keys: Vec<String>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(group_keys: Vec<String>) -> Self {
        Self {
            mode: ResolutionMode::Aggregate,
            group_keys,
        }
    }

    /// True if an implicit expansion (wildcard, regex, dtype) must skip `name`.
    ///
    /// Explicitly named columns never consult this.
    pub fn skips_implicit(&self, name: &str) -> bool {
        self.mode == ResolutionMode::Aggregate && self.group_keys.iter().any(|k| k == name)
    }
}
