//! Renomeação de colunas: substituição por regex (`rename`) e achatamento de
//! subquestões de matriz (`mcg`).

use regex::Regex;

use crate::dataset::Dataset;
use crate::error::{ConfigError, TransformError};
use crate::profile::GlobalSettings;
use crate::traits::Preprocessor;

use super::{parse_ordered_rules, parse_params};

/// Aplica cada par `padrão → substituição` a todos os nomes de coluna.
///
/// As regras são aplicadas em ordem e cada uma vê os nomes já renomeados
/// pelas anteriores. A substituição aceita `$1`/`${nome}` e também `\1`.
#[derive(Debug, Clone)]
pub struct RenamePreprocessor {
    rules: Vec<(Regex, String)>,
}

impl RenamePreprocessor {
    pub fn new(rules: Vec<(Regex, String)>) -> Self {
        Self { rules }
    }

    pub fn build(
        params: &serde_yaml::Value,
        _global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        Ok(Box::new(Self::new(parse_ordered_rules("rename", params)?)))
    }
}

impl Preprocessor for RenamePreprocessor {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        for (pattern, target) in &self.rules {
            dataset.rename_columns(|name| pattern.replace_all(name, target.as_str()).into_owned())?;
        }
        tracing::debug!(columns = ?dataset.column_names(), "Colunas após renomeação");
        Ok(())
    }
}

/// Para colunas que começam com `<chave><separador>`, troca cada ocorrência do
/// separador por `_` (ex.: `Q10|a` → `Q10_a` com separador `|`).
#[derive(Debug, Clone)]
pub struct GroupRenamePreprocessor {
    separator: String,
    keys: Vec<String>,
}

impl GroupRenamePreprocessor {
    pub fn new(separator: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            separator: separator.into(),
            keys,
        }
    }

    pub fn build(
        params: &serde_yaml::Value,
        global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        let separator = global.key_separator.clone().ok_or_else(|| {
            ConfigError::MissingRequiredParameter(
                "key_separator deve estar definido em _config para o pré-processador mcg".to_string(),
            )
        })?;
        if separator.is_empty() {
            return Err(ConfigError::InvalidValue {
                param: "key_separator".to_string(),
                value: String::new(),
            });
        }
        let keys: Vec<String> = parse_params("mcg", params)?;
        Ok(Box::new(Self::new(separator, keys)))
    }
}

impl Preprocessor for GroupRenamePreprocessor {
    fn name(&self) -> &str {
        "mcg"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        for key in &self.keys {
            let prefix = format!("{}{}", key, self.separator);
            dataset.rename_columns(|name| {
                if name.starts_with(&prefix) {
                    name.replace(&self.separator, "_")
                } else {
                    name.to_string()
                }
            })?;
        }
        Ok(())
    }
}
