//! Request DTOs for the demo API
//!
//! Defines the structure of incoming query parameters.

use serde::Deserialize;

/// Query string for GET /greet
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GreetQuery {
    /// Who to greet
    #[serde(default)]
    pub name: Option<String>,
}

impl GreetQuery {
    /// Name to greet, `world` when missing or blank.
    pub fn name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => "world",
        }
    }
}
