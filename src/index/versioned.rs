//! Physical, suffix-tagged builds of a logical index.

/// One versioned build of a logical index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedIndex {
    pub logical_name: String,
    pub suffix: u64,
    pub alias_bound: bool,
}

impl VersionedIndex {
    /// A freshly created, not yet aliased version.
    pub fn new(logical_name: impl Into<String>, suffix: u64) -> Self {
        Self {
            logical_name: logical_name.into(),
            suffix,
            alias_bound: false,
        }
    }

    /// Concrete index name on the engine, e.g. `statuses_1700000000000`.
    pub fn name(&self) -> String {
        versioned_name(&self.logical_name, self.suffix)
    }
}

pub fn versioned_name(logical_name: &str, suffix: u64) -> String {
    format!("{}_{}", logical_name, suffix)
}

/// Split a concrete index name back into logical name and suffix.
pub fn parse_versioned_name(name: &str) -> Option<(&str, u64)> {
    let (logical, suffix) = name.rsplit_once('_')?;
    let suffix = suffix.parse().ok()?;
    Some((logical, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        let version = VersionedIndex::new("statuses", 1_700_000_000_000);
        assert_eq!(version.name(), "statuses_1700000000000");
        assert_eq!(
            parse_versioned_name(&version.name()),
            Some(("statuses", 1_700_000_000_000))
        );
        assert_eq!(parse_versioned_name("statuses"), None);
        assert_eq!(parse_versioned_name("statuses_new"), None);
    }
}
