//! Migração de identificadores globais (`migration`).

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dataset::Dataset;
use crate::error::{ConfigError, TransformError};
use crate::profile::GlobalSettings;
use crate::traits::Preprocessor;
use crate::types::DataValue;

use super::parse_optional_params;

fn default_column() -> String {
    "global_id".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationParams {
    #[serde(default)]
    encode: bool,
    #[serde(default = "default_column")]
    column: String,
}

impl Default for MigrationParams {
    fn default() -> Self {
        Self {
            encode: false,
            column: default_column(),
        }
    }
}

/// Tabela `antigo → novo` lida do arquivo de migrações
pub type MigrationLookup = HashMap<String, String>;

/// Caminho do arquivo de migrações relativo ao diretório de trabalho
pub fn migrations_path(global: &GlobalSettings) -> Result<PathBuf, ConfigError> {
    let file = global
        .migrations
        .as_ref()
        .and_then(|m| m.file.as_ref())
        .ok_or_else(|| {
            ConfigError::MissingRequiredParameter("_config.migrations.file não definido".to_string())
        })?;
    Ok(match &global.path {
        Some(base) => base.join(file),
        None => file.clone(),
    })
}

/// Lê o objeto JSON plano de migrações
pub fn load_lookup(path: &Path) -> Result<MigrationLookup, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidValue {
        param: "migrations.file".to_string(),
        value: format!("{} ({})", path.display(), e),
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ConfigError::ParseError(format!("arquivo de migrações {}: {}", path.display(), e))
    })
}

/// Converte um identificador hexadecimal para base64 URL-safe com padding
pub fn encode_global_id(value: &str) -> Option<String> {
    hex::decode(value.trim())
        .ok()
        .map(|bytes| general_purpose::URL_SAFE.encode(bytes))
}

/// Substitui identificadores antigos pelos novos segundo a tabela carregada.
///
/// Valores sem correspondência passam inalterados ou, com `encode`, são
/// convertidos de hexadecimal para base64. Nulos passam inalterados.
/// Sem a coluna configurada no dataset o passo não faz nada.
#[derive(Debug, Clone)]
pub struct IdentityMigrationPreprocessor {
    lookup: MigrationLookup,
    encode: bool,
    column: String,
}

impl IdentityMigrationPreprocessor {
    pub fn new(lookup: MigrationLookup, encode: bool, column: impl Into<String>) -> Self {
        Self {
            lookup,
            encode,
            column: column.into(),
        }
    }

    pub fn build(
        params: &serde_yaml::Value,
        global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        let params: MigrationParams = parse_optional_params("migration", params)?;
        let path = migrations_path(global)?;
        let lookup = load_lookup(&path)?;
        tracing::info!(path = %path.display(), entries = lookup.len(), "Migrações carregadas");
        Ok(Box::new(Self::new(lookup, params.encode, params.column)))
    }

    fn migrate(&self, value: &DataValue) -> Result<DataValue, TransformError> {
        let Some(key) = value.as_string().filter(|_| !value.is_null()) else {
            return Ok(value.clone());
        };
        if let Some(new_id) = self.lookup.get(&key) {
            return Ok(DataValue::String(new_id.clone()));
        }
        if !self.encode {
            return Ok(value.clone());
        }
        encode_global_id(&key)
            .map(DataValue::String)
            .ok_or_else(|| TransformError::InvalidValue {
                column: self.column.clone(),
                value: key,
            })
    }
}

impl Preprocessor for IdentityMigrationPreprocessor {
    fn name(&self) -> &str {
        "migration"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        let Some(column) = dataset.column(&self.column) else {
            tracing::warn!(column = %self.column, "Coluna de identificadores ausente, migração ignorada");
            return Ok(());
        };
        let values = column
            .values
            .iter()
            .map(|v| self.migrate(v))
            .collect::<Result<Vec<_>, _>>()?;
        dataset.replace_values(&self.column, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::MigrationsConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn migrations_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"old-1": "new-1", "abc": "mapped"}}"#).unwrap();
        file
    }

    fn global_for(file: &NamedTempFile) -> GlobalSettings {
        let path = file.path();
        GlobalSettings {
            path: path.parent().map(Path::to_path_buf),
            migrations: Some(MigrationsConfig {
                file: path.file_name().map(PathBuf::from),
            }),
            ..GlobalSettings::default()
        }
    }

    fn dataset(values: Vec<DataValue>) -> Dataset {
        Dataset::from_rows(vec!["global_id".to_string()], values.into_iter().map(|v| vec![v]).collect())
    }

    #[test]
    fn test_lookup_and_passthrough() {
        let file = migrations_file();
        let step = IdentityMigrationPreprocessor::build(&serde_yaml::Value::Null, &global_for(&file)).unwrap();

        let mut data = dataset(vec![DataValue::from("old-1"), DataValue::from("zz"), DataValue::Null]);
        step.apply(&mut data).unwrap();
        assert_eq!(
            data.column("global_id").unwrap().values,
            vec![DataValue::from("new-1"), DataValue::from("zz"), DataValue::Null]
        );
    }

    #[test]
    fn test_encode_unmapped_hex() {
        let file = migrations_file();
        let params: serde_yaml::Value = serde_yaml::from_str("{encode: true}").unwrap();
        let step = IdentityMigrationPreprocessor::build(&params, &global_for(&file)).unwrap();

        let mut data = dataset(vec![DataValue::from("abc"), DataValue::from("fbff")]);
        step.apply(&mut data).unwrap();
        assert_eq!(data.value("global_id", 0), Some(&DataValue::from("mapped")));
        assert_eq!(data.value("global_id", 1), Some(&DataValue::from("-_8=")));

        let mut bad = dataset(vec![DataValue::from("xyz")]);
        assert!(step.apply(&mut bad).is_err());
    }

    #[test]
    fn test_missing_configuration() {
        assert!(matches!(
            IdentityMigrationPreprocessor::build(&serde_yaml::Value::Null, &GlobalSettings::default()),
            Err(ConfigError::MissingRequiredParameter(_))
        ));

        let global = GlobalSettings {
            migrations: Some(MigrationsConfig {
                file: Some(PathBuf::from("/nonexistent/migrations.json")),
            }),
            ..GlobalSettings::default()
        };
        assert!(IdentityMigrationPreprocessor::build(&serde_yaml::Value::Null, &global).is_err());
    }

    #[test]
    fn test_absent_column_is_noop() {
        let step = IdentityMigrationPreprocessor::new(MigrationLookup::new(), true, "global_id");
        let before = Dataset::from_rows(vec!["other".to_string()], vec![vec![DataValue::from("x")]]);
        let mut data = before.clone();
        step.apply(&mut data).unwrap();
        assert_eq!(data, before);
    }

    #[test]
    fn test_encode_global_id() {
        assert_eq!(encode_global_id("00ff").as_deref(), Some("AP8="));
        assert_eq!(encode_global_id("nothex"), None);
    }
}
