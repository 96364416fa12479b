use crate::domain::KeyValue;

/// Ordered list of environment bindings handed to a runner process.
///
/// Internally stored as a list of key-value pairs. Later entries override
/// earlier ones when queried via [`Env::get`], which gives simple override
/// semantics without deduplicating on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env(Vec<KeyValue>);

impl Env {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Number of bindings, counting duplicates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the environment is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all bindings in order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    /// Check whether any binding exists for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Append a binding without removing prior ones for the same key.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Remove all bindings for the key, then append the new one.
    ///
    /// Unlike [`Env::push`], this guarantees the key ends up bound exactly
    /// once.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        self.remove(&key);
        self.0.push(KeyValue::new(key, value));
    }

    /// Remove all bindings for the key.
    pub fn remove(&mut self, key: &str) {
        self.0.retain(|kv| kv.key() != key);
    }

    /// Keys of all bindings, in order, counting duplicates.
    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|kv| kv.key()).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Env
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| KeyValue::new(k, v))
                .collect(),
        )
    }
}
