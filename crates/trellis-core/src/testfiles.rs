//! Test-file detection from glob patterns

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{CoreError, Result};
use crate::preferences::default_test_patterns;

#[derive(Debug, Clone)]
pub struct TestFileMatcher {
    set: GlobSet,
}

impl TestFileMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|source| CoreError::Pattern {
                pattern: pattern.as_ref().to_string(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| CoreError::Pattern {
            pattern: "<set>".to_string(),
            source,
        })?;
        Ok(TestFileMatcher { set })
    }

    pub fn is_test_path(&self, path: &str) -> bool {
        let normalized = path.replace('\\', "/");
        self.set.is_match(normalized.trim_start_matches("./"))
    }
}

impl Default for TestFileMatcher {
    fn default() -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in default_test_patterns() {
            if let Ok(glob) = Glob::new(&pattern) {
                builder.add(glob);
            }
        }
        let set = builder.build().unwrap_or_else(|_| GlobSet::empty());
        TestFileMatcher { set }
    }
}
