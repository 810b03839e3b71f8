//! The stored model definition, one `<name>.json` per model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DefinitionDefaults;
use crate::gallery::apply_overrides;
use crate::{GalleryError, Result};

/// Runtime parameter defaults carried by a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f16: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    /// Primary artifact file name, relative to the model directory.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Auxiliary projection file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mmproj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
    /// Prompt template files written alongside the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
    /// Unrecognized fields, preserved across read/write.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Build a definition from an install config template plus overrides, forcing `name`.
    pub fn from_template(name: &str, template: &Value, overrides: &Map<String, Value>) -> Result<Self> {
        let mut value = match template {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        apply_overrides(&mut value, overrides);

        let Value::Object(map) = &mut value else {
            return Err(GalleryError::validation(
                "config_file",
                "definition template must be a JSON object",
            ));
        };
        map.insert("name".to_string(), Value::String(name.to_string()));

        serde_json::from_value(value).map_err(|e| GalleryError::Json {
            message: format!("Invalid definition for '{}': {}", name, e),
            source: Some(e),
        })
    }

    /// Artifact and template files referenced by this definition.
    pub fn files(&self) -> Vec<String> {
        let mut files = Vec::new();
        if !self.model.is_empty() {
            files.push(self.model.clone());
        }
        if let Some(mmproj) = self.mmproj.as_ref().filter(|m| !m.is_empty()) {
            files.push(mmproj.clone());
        }
        files.extend(self.templates.iter().cloned());
        files
    }

    /// Fill unset parameters from `defaults`. Returns true if anything changed.
    pub fn apply_defaults(&mut self, defaults: &DefinitionDefaults) -> bool {
        let mut changed = false;
        if self.parameters.context_size.is_none() {
            self.parameters.context_size = Some(defaults.context_size);
            changed = true;
        }
        if self.parameters.threads.is_none() {
            self.parameters.threads = Some(defaults.threads);
            changed = true;
        }
        if self.parameters.f16.is_none() {
            self.parameters.f16 = Some(defaults.f16);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let raw = json!({
            "name": "llama",
            "model": "llama.gguf",
            "parameters": {"contextSize": 2048, "temperature": 0.2},
            "stopwords": ["</s>"]
        });
        let def: ModelDefinition = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(def.parameters.context_size, Some(2048));
        assert_eq!(def.parameters.extra["temperature"], 0.2);
        assert_eq!(def.extra["stopwords"][0], "</s>");
        assert_eq!(serde_json::to_value(&def).unwrap(), raw);
    }

    #[test]
    fn test_files_lists_model_and_mmproj() {
        let mut def = ModelDefinition::new("llava", "llava.gguf");
        assert_eq!(def.files(), vec!["llava.gguf"]);
        def.mmproj = Some("mmproj.gguf".into());
        assert_eq!(def.files(), vec!["llava.gguf", "mmproj.gguf"]);
        def.templates = vec!["vicuna.tmpl".into()];
        assert_eq!(def.files(), vec!["llava.gguf", "mmproj.gguf", "vicuna.tmpl"]);
    }

    #[test]
    fn test_from_template_applies_overrides_and_name() {
        let template = json!({"name": "upstream", "model": "a.gguf", "parameters": {"threads": 2}});
        let overrides = json!({"parameters": {"threads": 8}, "backend": "llama-cpp"});
        let def = ModelDefinition::from_template(
            "local",
            &template,
            overrides.as_object().unwrap(),
        )
        .unwrap();
        assert_eq!(def.name, "local");
        assert_eq!(def.model, "a.gguf");
        assert_eq!(def.parameters.threads, Some(8));
        assert_eq!(def.backend.as_deref(), Some("llama-cpp"));
    }

    #[test]
    fn test_from_template_rejects_non_object() {
        let err = ModelDefinition::from_template("x", &json!([1, 2]), &Map::new()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn test_apply_defaults_only_fills_gaps() {
        let mut def = ModelDefinition::new("llama", "llama.gguf");
        def.parameters.threads = Some(3);
        let defaults = DefinitionDefaults {
            context_size: 1024,
            threads: 16,
            f16: true,
        };
        assert!(def.apply_defaults(&defaults));
        assert_eq!(def.parameters.context_size, Some(1024));
        assert_eq!(def.parameters.threads, Some(3));
        assert!(!def.apply_defaults(&defaults));
    }
}
