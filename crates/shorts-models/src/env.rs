//! Environment-backed configuration reader.
//!
//! Config structs read their settings through an [`EnvReader`] instead of
//! calling `std::env::var` directly. The lookup function is injectable, so
//! tests can feed a fixed map. Problems are collected rather than returned
//! one by one, which lets the caller report every bad key at once.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// Key lookup function.
pub type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads typed settings and accumulates errors.
pub struct EnvReader {
    lookup: Lookup,
    errors: Vec<String>,
}

impl EnvReader {
    /// Read from the process environment.
    pub fn from_env() -> Self {
        Self::from_fn(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup function.
    pub fn from_fn<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
            errors: Vec::new(),
        }
    }

    /// Read from a fixed map.
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self::from_fn(move |key| map.get(key).cloned())
    }

    /// Read from key/value pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::from_map(map)
    }

    /// Raw value with whitespace trimmed; blank values count as absent.
    pub fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// String value or a default.
    pub fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Required string value. Records an error and returns an empty string when absent.
    pub fn required(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(v) => v,
            None => {
                self.errors.push(format!("{} is not set", key));
                String::new()
            }
        }
    }

    /// Parsed value or a default. Records an error when the value does not parse.
    pub fn parse<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(key) {
            None => default,
            Some(raw) => match raw.parse::<T>() {
                Ok(v) => v,
                Err(e) => {
                    self.errors
                        .push(format!("{} has invalid value '{}': {}", key, raw, e));
                    default
                }
            },
        }
    }

    /// Boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
    pub fn bool(&mut self, key: &str, default: bool) -> bool {
        match self.optional(key) {
            None => default,
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    self.errors
                        .push(format!("{} has invalid boolean value '{}'", key, raw));
                    default
                }
            },
        }
    }

    /// Comma-separated list; empty entries are dropped.
    pub fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.optional(key) {
            None => default.iter().map(|s| s.to_string()).collect(),
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Record a validation problem found by the caller.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Finish reading. Returns every collected problem.
    pub fn finish(self) -> Result<(), Vec<String>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

impl std::fmt::Debug for EnvReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvReader")
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
