//! Glob-based selection of devices and mount points.

use glob::Pattern;

/// Include/exclude filter over resource names.
///
/// An empty include list admits every name; exclusion always wins.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl NameFilter {
    /// Build a filter from glob strings. Invalid patterns are skipped; the
    /// configuration layer rejects them before this point.
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: compile(include),
            exclude: compile(exclude),
        }
    }

    pub fn exclude_only(exclude: &[String]) -> Self {
        Self::new(&[], exclude)
    }

    pub fn should_include(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(name)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(name))
    }
}

fn compile(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
}
