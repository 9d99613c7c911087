use crate::error::{ActionRefError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

/// The parts of an `action.yml` consumers care about. Everything else in the
/// document (`runs`, `outputs`, `branding`, ...) is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub inputs: Vec<ActionInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
}

impl ActionInput {
    pub fn is_deprecated(&self) -> bool {
        self.deprecation_message.is_some()
    }
}

impl ActionManifest {
    /// Parse a (possibly multi-document) manifest. At least one document must
    /// have a mapping at the top level.
    pub fn parse(text: &str) -> Result<Self> {
        let mut manifest = ActionManifest::default();
        let mut found_mapping = false;

        for document in serde_yaml::Deserializer::from_str(text) {
            let Value::Mapping(root) = Value::deserialize(document)? else {
                continue;
            };
            found_mapping = true;

            if manifest.name.is_none() {
                manifest.name = scalar_text(root.get("name"));
            }
            if manifest.description.is_none() {
                manifest.description = scalar_text(root.get("description"));
            }

            let Some(Value::Mapping(inputs)) = root.get("inputs") else {
                continue;
            };
            for (key, value) in inputs {
                let Some(name) = scalar_text(Some(key)).filter(|n| !n.is_empty()) else {
                    continue;
                };
                let Value::Mapping(fields) = value else {
                    continue;
                };
                let input = ActionInput {
                    name,
                    description: scalar_text(fields.get("description")),
                    default: scalar_text(fields.get("default")),
                    required: fields.get("required").is_some_and(is_truthy),
                    deprecation_message: scalar_text(fields.get("deprecationMessage")),
                };
                match manifest.inputs.iter_mut().find(|i| i.name == input.name) {
                    Some(existing) => *existing = input,
                    None => manifest.inputs.push(input),
                }
            }
        }

        if !found_mapping {
            return Err(ActionRefError::InvalidManifest(
                "expected a mapping at the top level".to_string(),
            ));
        }
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn input(&self, name: &str) -> Option<&ActionInput> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Inputs that are required and have no default.
    pub fn required_inputs(&self) -> impl Iterator<Item = &ActionInput> {
        self.inputs
            .iter()
            .filter(|i| i.required && i.default.is_none())
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
