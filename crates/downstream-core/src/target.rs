//! Repository entries in `owner/name[@selector]` form.

use std::fmt;

use crate::error::TargetParseError;

/// One repository to trigger, with an optional branch or build selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub owner: String,
    pub name: String,
    /// Branch name or build number. `None` means the latest build.
    pub selector: Option<String>,
    /// The raw entry, used in messages.
    pub entry: String,
}

impl Target {
    /// Parse `owner/name`, `owner/name@branch` or `owner/name@123`.
    ///
    /// Whether the selector is a build number or a branch is left to the
    /// caller, since it only matters for deploys.
    pub fn parse(entry: &str) -> Result<Self, TargetParseError> {
        let invalid = || TargetParseError {
            entry: entry.to_string(),
        };

        let (repo, selector) = match entry.rsplit_once('@') {
            Some((repo, selector)) => (repo, Some(selector)),
            None => (entry, None),
        };
        if repo.contains('@') {
            return Err(invalid());
        }

        let (owner, name) = repo.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        Ok(Target {
            owner: owner.to_string(),
            name: name.to_string(),
            selector: selector.filter(|s| !s.is_empty()).map(str::to_string),
            entry: entry.to_string(),
        })
    }

    /// Selector as a build number, if it is one.
    pub fn build_number(&self) -> Option<u64> {
        self.selector.as_deref().and_then(|s| s.parse().ok())
    }

    /// Selector names a branch rather than a build number.
    pub fn selector_is_branch(&self) -> bool {
        self.selector.is_some() && self.build_number().is_none()
    }

    /// Selector as a branch; empty selects the server default.
    pub fn branch(&self) -> &str {
        self.selector.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_repo() {
        let t = Target::parse("octo/app").unwrap();
        assert_eq!(t.owner, "octo");
        assert_eq!(t.name, "app");
        assert_eq!(t.selector, None);
        assert_eq!(t.branch(), "");
        assert!(!t.selector_is_branch());
    }

    #[test]
    fn test_parse_branch_selector() {
        let t = Target::parse("octo/app@release/1.x").unwrap();
        assert_eq!(t.owner, "octo");
        assert_eq!(t.name, "app");
        assert_eq!(t.selector.as_deref(), Some("release/1.x"));
        assert!(t.selector_is_branch());
        assert_eq!(t.build_number(), None);
    }

    #[test]
    fn test_parse_build_number_selector() {
        let t = Target::parse("octo/app@123").unwrap();
        assert_eq!(t.selector.as_deref(), Some("123"));
        assert_eq!(t.build_number(), Some(123));
        assert!(!t.selector_is_branch());
    }

    #[test]
    fn test_trailing_at_means_latest() {
        let t = Target::parse("octo/app@").unwrap();
        assert_eq!(t.selector, None);
    }

    #[test]
    fn test_malformed_entries_rejected() {
        for entry in [
            "octoapp",
            "octo/app@main@dev",
            "/app",
            "octo/",
            "octo/app/extra",
            "",
            "@main",
        ] {
            let err = Target::parse(entry).unwrap_err();
            assert_eq!(err.entry, entry);
            assert!(err.to_string().contains(entry));
        }
    }
}
