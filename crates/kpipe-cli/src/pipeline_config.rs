use crate::errors::PipelineError;
use kpipe_yaml::{Filter, FilterRegistry};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline file: variables plus one chain of filter declarations
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Variables for substitution (${var} and $(var) syntax)
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    /// Filter declarations, piped in order over every document
    #[serde(default)]
    pub filters: Vec<Value>,
}

impl PipelineConfig {
    /// Load pipeline configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path_ref = path.as_ref();
        let content = match fs::read_to_string(path_ref) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if let Some(fallback) = Self::resolve_fallback_path(path_ref) {
                    fs::read_to_string(fallback)?
                } else {
                    return Err(PipelineError::Io(err));
                }
            }
            Err(err) => return Err(PipelineError::Io(err)),
        };
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        if config.filters.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "Pipeline has no filters".to_string(),
            ));
        }
        Ok(config)
    }

    /// Substitute variables in a string (supports ${var} and $(var) syntax)
    pub fn substitute_string(&self, input: &str) -> Result<String, PipelineError> {
        let result = self.substitute_delimited(input, "${", '}')?;
        self.substitute_delimited(&result, "$(", ')')
    }

    fn substitute_delimited(
        &self,
        input: &str,
        open: &str,
        close: char,
    ) -> Result<String, PipelineError> {
        let mut result = input.to_string();
        let mut from = 0;
        while let Some(offset) = result[from..].find(open) {
            let start = from + offset;
            let Some(end) = result[start..].find(close) else {
                return Err(PipelineError::InvalidConfig(format!(
                    "Unclosed variable substitution {}",
                    open
                )));
            };
            let var_name = &result[start + open.len()..start + end];
            let value = self.get_variable_string(var_name)?;
            result.replace_range(start..=(start + end), &value);
            from = start + value.len();
        }
        Ok(result)
    }

    /// Get a variable value as a string
    fn get_variable_string(&self, name: &str) -> Result<String, PipelineError> {
        let value = self
            .variables
            .get(name)
            .ok_or_else(|| PipelineError::VariableNotFound(name.to_string()))?;

        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok("null".to_string()),
            _ => Err(PipelineError::InvalidConfig(format!(
                "Variable '{}' has complex type that cannot be substituted as string",
                name
            ))),
        }
    }

    /// Substitute variables in a YAML value recursively
    pub fn substitute_value(&self, value: &Value) -> Result<Value, PipelineError> {
        match value {
            Value::String(s) => Ok(Value::String(self.substitute_string(s)?)),
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    new_map.insert(self.substitute_value(k)?, self.substitute_value(v)?);
                }
                Ok(Value::Mapping(new_map))
            }
            Value::Sequence(seq) => Ok(Value::Sequence(
                seq.iter()
                    .map(|item| self.substitute_value(item))
                    .collect::<Result<_, _>>()?,
            )),
            // Numbers, booleans, null don't need substitution
            _ => Ok(value.clone()),
        }
    }

    /// Filter declarations with variables substituted
    pub fn resolved_filters(&self) -> Result<Vec<Value>, PipelineError> {
        self.filters
            .iter()
            .map(|decl| self.substitute_value(decl))
            .collect()
    }

    /// Build the filter chain with `registry`
    pub fn build(&self, registry: &FilterRegistry) -> Result<Vec<Box<dyn Filter>>, PipelineError> {
        Ok(registry.build_pipeline(self.resolved_filters()?)?)
    }

    fn resolve_fallback_path(original: &Path) -> Option<PathBuf> {
        let mut candidates = Vec::new();

        if original.extension().is_none() {
            candidates.push(original.with_extension("yaml"));
            candidates.push(original.with_extension("yml"));
        }

        candidates.into_iter().find(|candidate| candidate.exists())
    }
}
