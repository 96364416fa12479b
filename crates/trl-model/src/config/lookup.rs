use std::collections::HashMap;
use std::fs;

/// Source of configuration values, usually the process environment.
///
/// Abstracting the lookup keeps config loading testable without touching the
/// real environment.
pub trait EnvLookup {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Lookup backed by the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Lookup backed by a plain map, for tests.
#[derive(Debug, Clone, Default)]
pub struct MapLookup(HashMap<String, String>);

impl MapLookup {
    pub fn new(entries: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl EnvLookup for MapLookup {
    fn lookup(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Lookup that honors `<NAME>_FILE` indirection for secrets.
///
/// If `<NAME>_FILE` is set, its value is a filesystem path; the file content
/// with trailing CR/LF stripped becomes the value for `<NAME>`. The `_FILE`
/// form takes precedence over the bare form, and an unreadable file makes the
/// key unresolvable rather than falling back.
#[derive(Debug, Clone)]
pub struct FileLookup<L> {
    inner: L,
}

impl<L: EnvLookup> FileLookup<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: EnvLookup> EnvLookup for FileLookup<L> {
    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(path) = self.inner.lookup(&format!("{key}_FILE")) {
            let content = fs::read_to_string(&path).ok()?;
            return Some(
                content
                    .trim_end_matches(|c| c == '\n' || c == '\r')
                    .to_string(),
            );
        }

        self.inner.lookup(key)
    }
}
