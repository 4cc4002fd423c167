// Script Name (filename sanitization)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Extension every stored script carries
pub const SCRIPT_EXTENSION: &str = ".sh";

/// Longest accepted filename (NAME_MAX on common filesystems)
pub const MAX_SCRIPT_NAME_LEN: usize = 255;

/// Safe script filename
///
/// Only `[A-Za-z0-9_.-]`, never a path, never hidden (no leading dot),
/// always ending in `.sh`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptName(String);

impl ScriptName {
    /// Reduce an untrusted name to a safe filename
    ///
    /// Returns `None` when nothing usable is left.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let base = raw
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();

        let mut safe: String = base
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();

        if safe.to_ascii_lowercase().ends_with(SCRIPT_EXTENSION) {
            safe.truncate(safe.len() - SCRIPT_EXTENSION.len());
        }

        let mut safe = safe.trim_start_matches('.').to_string();
        if safe.is_empty() {
            return None;
        }

        safe.push_str(SCRIPT_EXTENSION);
        if safe.len() > MAX_SCRIPT_NAME_LEN {
            return None;
        }

        Some(Self(safe))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScriptName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(raw: &str) -> Option<String> {
        ScriptName::sanitize(raw).map(|n| n.as_str().to_string())
    }

    #[test]
    fn test_sanitize_appends_extension() {
        assert_eq!(sanitize("backup"), Some("backup.sh".to_string()));
        assert_eq!(sanitize("backup.sh"), Some("backup.sh".to_string()));
        assert_eq!(sanitize("Backup.SH"), Some("Backup.sh".to_string()));
    }

    #[test]
    fn test_sanitize_strips_forbidden_chars() {
        assert_eq!(sanitize("my script!.sh"), Some("myscript.sh".to_string()));
        assert_eq!(sanitize("a;rm -rf"), Some("arm-rf.sh".to_string()));
    }

    #[test]
    fn test_sanitize_strips_path_traversal() {
        assert_eq!(sanitize("../../etc/passwd"), Some("passwd.sh".to_string()));
        assert_eq!(sanitize("/abs/path/run.sh"), Some("run.sh".to_string()));
        assert_eq!(sanitize("dir/"), Some("dir.sh".to_string()));
    }

    #[test]
    fn test_sanitize_strips_leading_dots() {
        assert_eq!(sanitize(".hidden"), Some("hidden.sh".to_string()));
        assert_eq!(sanitize("..hidden.sh"), Some("hidden.sh".to_string()));
        assert_eq!(sanitize("../.profile"), Some("profile.sh".to_string()));
        assert_eq!(sanitize("a.b"), Some("a.b.sh".to_string()));
    }

    #[test]
    fn test_sanitize_rejects_unusable() {
        assert_eq!(sanitize(""), None);
        assert_eq!(sanitize("$$$"), None);
        assert_eq!(sanitize(".."), None);
        assert_eq!(sanitize("../.."), None);
        assert_eq!(sanitize(".sh"), None);
        assert_eq!(sanitize("...sh"), None);
        assert_eq!(sanitize("/"), None);
        assert_eq!(sanitize(&"a".repeat(300)), None);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "deploy",
            "deploy.sh",
            "DEPLOY.Sh",
            "../x/../y z.sh",
            "...a",
            ".hidden",
            "a.sh.sh",
            "weird__--..name",
            "ü-nicode.sh",
        ];
        for input in inputs {
            let once = sanitize(input).unwrap();
            let twice = sanitize(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {:?}", input);
            assert!(once.ends_with(SCRIPT_EXTENSION));
            assert!(!once.starts_with('.'));
        }
    }
}
