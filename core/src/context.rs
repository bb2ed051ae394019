//! Per-call execution context threaded through to breaker callbacks

use std::collections::BTreeMap;

/// Caller-supplied data for one protected execution
///
/// Created fresh for each call and handed unchanged to any `on_break` or
/// `on_reset` callback fired as a consequence of that call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    operation_key: Option<String>,
    data: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context tagged with the logical operation being executed
    pub fn with_operation_key(key: impl Into<String>) -> Self {
        Self {
            operation_key: Some(key.into()),
            data: BTreeMap::new(),
        }
    }

    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    /// Insert a value, returning the previous one for that key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.data.insert(key.into(), value.into())
    }

    /// Builder-style [`Context::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
