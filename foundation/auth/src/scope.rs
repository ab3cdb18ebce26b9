use std::collections::HashMap;

use crate::error::Error;

pub const BIGQUERY: &str = "https://www.googleapis.com/auth/bigquery";
pub const DEVSTORAGE_READ_ONLY: &str = "https://www.googleapis.com/auth/devstorage.read_only";
pub const DEVSTORAGE_READ_WRITE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";
pub const SPREADSHEETS: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const ANALYTICS_READ_ONLY: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Maps the scope names stored by older connector versions to OAuth2 scope URLs.
#[derive(Clone, Debug)]
pub struct ScopeRegistry {
    scopes: HashMap<String, Vec<String>>,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("BigQuery", &[BIGQUERY]);
        registry.register("Cloud Storage (Read)", &[DEVSTORAGE_READ_ONLY]);
        registry.register("Cloud Storage (Read/Write)", &[DEVSTORAGE_READ_WRITE]);
        registry.register("Drive", &[DRIVE]);
        registry.register("Sheets", &[SPREADSHEETS, DRIVE]);
        registry.register("Analytics", &[ANALYTICS_READ_ONLY]);
        registry
    }
}

impl ScopeRegistry {
    pub fn empty() -> Self {
        Self { scopes: HashMap::new() }
    }

    pub fn register(&mut self, name: &str, scopes: &[&str]) {
        self.scopes
            .insert(name.to_string(), scopes.iter().map(|s| s.to_string()).collect());
    }

    /// Resolves scope names into scope URLs, keeping first-seen order and dropping duplicates.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<String>, Error> {
        let mut resolved = vec![];
        for name in names {
            let scopes = self
                .scopes
                .get(name)
                .ok_or_else(|| Error::UnknownScope(name.to_string()))?;
            for scope in scopes {
                if !resolved.contains(scope) {
                    resolved.push(scope.clone());
                }
            }
        }
        Ok(resolved)
    }
}
