//! Errors raised while validating and instantiating a panel configuration

use std::fmt;

/// A single key that failed its value domain check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Offending configuration key
    pub key: String,
    /// What was expected instead
    pub message: String,
}

impl FieldError {
    /// Create a field error for `key`
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.key, self.message)
    }
}

/// Every way a panel configuration can be rejected
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// One or more keys are outside their declared domain
    #[error("invalid configuration:\n  {}", join_fields(.0))]
    Fields(Vec<FieldError>),

    /// An option was given for a model that does not support it
    #[error("The '{key}' option is only available for models {}", .supported.join(", "))]
    UnsupportedOption {
        key: &'static str,
        model: String,
        supported: Vec<&'static str>,
    },

    /// The model needs a pin that was not configured
    #[error("'{key}' is required for model {model}")]
    MissingPin { key: &'static str, model: String },

    /// Mutually exclusive keys were supplied together
    #[error("Cannot specify more than one of {}", quote_keys(.keys))]
    ConflictingKeys { keys: Vec<&'static str> },

    /// The model family has no driver yet
    #[error("driver family '{family}' (model {model}) is not implemented")]
    NotImplemented { family: char, model: String },

    /// A registration collaborator refused the handle
    #[error("[{key}] {message}")]
    Registration { key: &'static str, message: String },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    /// Keys this error points at, in the order they were reported
    pub fn keys(&self) -> Vec<String> {
        match self {
            ConfigError::Fields(fields) => fields.iter().map(|f| f.key.clone()).collect(),
            ConfigError::UnsupportedOption { key, .. }
            | ConfigError::MissingPin { key, .. }
            | ConfigError::Registration { key, .. } => vec![key.to_string()],
            ConfigError::ConflictingKeys { keys } => keys.iter().map(|k| k.to_string()).collect(),
            ConfigError::NotImplemented { .. } => vec!["model".to_string()],
            ConfigError::Io(_) | ConfigError::Toml(_) => Vec::new(),
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n  ")
}

fn quote_keys(keys: &[&'static str]) -> String {
    keys.iter()
        .map(|k| format!("'{}'", k))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_are_listed_one_per_line() {
        let err = ConfigError::Fields(vec![
            FieldError::new("dc_pin", "required key not provided"),
            FieldError::new("model", "Unknown value '9in'"),
        ]);
        let text = err.to_string();
        assert!(text.contains("[dc_pin] required key not provided"));
        assert!(text.contains("\n  [model] Unknown value '9in'"));
        assert_eq!(err.keys(), vec!["dc_pin", "model"]);
    }

    #[test]
    fn test_conflicting_keys_message() {
        let err = ConfigError::ConflictingKeys {
            keys: vec!["pages", "lambda"],
        };
        assert_eq!(
            err.to_string(),
            "Cannot specify more than one of 'pages', 'lambda'"
        );
    }
}
