//! Tool declarations
//!
//! Each agent declares, at construction, the ordered set of tools it may
//! call. Declarations are configuration; they are never negotiated at runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name, description and JSON schema of a callable tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,

    /// JSON schema for the tool's arguments
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Find a declaration by name
    pub fn find<'a>(specs: &'a [ToolSpec], name: &str) -> Option<&'a ToolSpec> {
        specs.iter().find(|spec| spec.name == name)
    }
}
