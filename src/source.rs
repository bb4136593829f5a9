//! Flat name → string lookups that feed materialization.
//!
//! The engine only ever asks one question of a source: "what is the value
//! named `NAME`?". An absent entry and an empty entry are treated the same.

use std::collections::{BTreeMap, HashMap};

/// A flat name → string lookup, conventionally the process environment.
pub trait EnvSource {
    /// Look up a value by name, returning `None` when it is absent.
    fn get(&self, name: &str) -> Option<String>;
}

impl<S: EnvSource + ?Sized> EnvSource for &S {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}

/// The process environment, as seen by [`std::env::var`].
///
/// A variable holding non-UTF-8 bytes resolves like an unset one, so its
/// field falls back to the annotation default.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnv;

impl EnvSource for StdEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Variables held in memory instead of the process environment.
///
/// Lets a configuration struct be populated from a fixed set of values, e.g.
/// one loaded from a dotenv file, or one built inside a test.
#[derive(Debug, Clone, Default)]
pub struct MockEnv {
    vars: HashMap<String, String>,
}

impl MockEnv {
    /// No variables: every field resolves to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables from `(NAME, value)` pairs. Later pairs win.
    pub fn from_pairs<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Define `name`, shadowing any earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Undefine `name`, returning what it held.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }
}

impl EnvSource for MockEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<H: std::hash::BuildHasher> EnvSource for HashMap<String, String, H> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        BTreeMap::get(self, name).cloned()
    }
}

/// Look `name` up in `source`, mapping absence to the empty string.
pub(crate) fn lookup<S: EnvSource + ?Sized>(source: &S, name: &str) -> String {
    source.get(name).unwrap_or_default()
}
