use super::error::{BackupError, Result};
use std::collections::BTreeSet;

/// Tokens that are never worth archiving: temp files, logs, bytecode caches
/// and OS metadata.
pub const DEFAULT_TOKENS: &[&str] = &[
    ".tmp",
    ".log",
    ".pyc",
    "__pycache__",
    "Thumbs.db",
    ".DS_Store",
];

/// Substring-based exclusion rules.
///
/// A file is excluded when any token occurs, case-sensitively, inside either
/// its bare file name or its path relative to the backup root. Tokens can be
/// added but never removed, and the empty token is refused because it would
/// match every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionPolicy {
    tokens: BTreeSet<String>,
}

impl ExclusionPolicy {
    /// A policy with no tokens; it never excludes anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default token set, plus the running executable's own file name
    /// when it lives inside the tree being archived.
    pub fn with_defaults(self_name: Option<&str>) -> Self {
        let mut tokens: BTreeSet<String> = DEFAULT_TOKENS.iter().map(|t| t.to_string()).collect();
        if let Some(name) = self_name.filter(|n| !n.is_empty()) {
            tokens.insert(name.to_string());
        }
        Self { tokens }
    }

    pub fn extend<I, S>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        // Validate the whole batch first so a bad token leaves the policy untouched
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(BackupError::EmptyExclusionToken);
        }
        self.tokens.extend(tokens);
        Ok(())
    }

    /// Copy of this policy extended with `extra` for a single run.
    pub fn extended<I, S>(&self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut policy = self.clone();
        policy.extend(extra)?;
        Ok(policy)
    }

    pub fn should_exclude(&self, file_name: &str, relative_path: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| file_name.contains(token.as_str()) || relative_path.contains(token.as_str()))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
