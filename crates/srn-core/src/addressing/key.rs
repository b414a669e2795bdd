//! Composite key addressing for keyed/collection backends.

use serde::{Deserialize, Serialize};

use super::path::{self, ScopePath};
use crate::error::Result;
use crate::scope::Scope;

/// Delimiter between key segments. Identifiers never contain it.
pub const KEY_DELIMITER: char = ':';

/// `workspace:subject_type:subject_id[:proj_<p>][:thr_<t>][:top_<t>]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    key: String,
}

impl CompositeKey {
    pub fn from_scope(scope: &Scope) -> Result<Self> {
        let path = ScopePath::from_scope(scope)?;
        Ok(Self {
            key: path.segments().join(":"),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Field-wise match against another composite key: every segment of
    /// `self` past the subject must appear in `other`.
    pub fn contains(&self, other: &str) -> bool {
        let parent: Vec<&str> = self.key.split(KEY_DELIMITER).collect();
        let child: Vec<&str> = other.split(KEY_DELIMITER).collect();
        path::segments_contain(&parent, &child)
    }

    /// Recovers the scope a composite key was derived from.
    pub fn parse(key: &str) -> Result<Scope> {
        let segments: Vec<&str> = key.split(KEY_DELIMITER).collect();
        ScopePath::parse(&segments)
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WS: &str = "abc12345abcd12345abc1234567890ab";

    #[test]
    fn test_composite_key() {
        let scope = Scope::from_string(&format!("1.{}.agent.bot.thr_t1", WS)).unwrap();
        let key = CompositeKey::from_scope(&scope).unwrap();
        assert_eq!(key.as_str(), format!("{}:agent:bot:thr_t1", WS));
        assert_eq!(CompositeKey::parse(key.as_str()).unwrap(), scope);
    }

    #[test]
    fn test_contains_respects_delimiter() {
        let base = Scope::from_string(&format!("1.{}.agent.bot", WS)).unwrap();
        let key = CompositeKey::from_scope(&base).unwrap();
        assert!(key.contains(&format!("{}:agent:bot:proj_x", WS)));
        assert!(key.contains(key.as_str()));
        assert!(!key.contains(&format!("{}:agent:bot2", WS)));
    }

    #[test]
    fn test_thread_key_contains_project_thread_key() {
        let thread_only = Scope::from_string(&format!("1.{}.agent.bot.thr_t1", WS)).unwrap();
        let key = CompositeKey::from_scope(&thread_only).unwrap();
        assert!(key.contains(&format!("{}:agent:bot:proj_p:thr_t1", WS)));
        assert!(key.contains(&format!("{}:agent:bot:proj_p:thr_t1:top_z", WS)));
        assert!(!key.contains(&format!("{}:agent:bot:proj_p:thr_t2", WS)));
    }
}
