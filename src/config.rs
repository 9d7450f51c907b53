use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ETLError};
use crate::load::{LoadOptions, DEFAULT_BATCH_SIZE, DEFAULT_PARTITION_COLUMN, DEFAULT_STAGING_SUFFIX};
use crate::profile::ProfileOptions;
use crate::schema::DEFAULT_SCHEMA;

/// Prefixo das variáveis de ambiente (`SURVEYLOAD__IMPORT__BATCH_SIZE`)
pub const ENV_PREFIX: &str = "SURVEYLOAD";
const ENV_SEPARATOR: &str = "__";

/// Configuração principal do carregador
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub observability: ObservabilityConfig,
}

/// Conexão com o banco de destino
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// Schema das tabelas declaradas sem schema no perfil
    pub schema: String,
    pub connect_timeout_seconds: u64,
}

/// Parâmetros da carga
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub partition_column: String,
    pub staging_suffix: String,
    pub keep_staging: bool,
}

/// Configuração de observabilidade
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Formato de log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            schema: DEFAULT_SCHEMA.to_string(),
            connect_timeout_seconds: 30,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            partition_column: DEFAULT_PARTITION_COLUMN.to_string(),
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
            keep_staging: false,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl LoaderConfig {
    /// Cria um novo builder para configuração
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// Padrões, arquivo opcional e variáveis de ambiente, nessa ordem de precedência crescente
    pub fn load(path: Option<&Path>) -> Result<Self, ETLError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: Self = builder.add_source(environment()).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Carrega configuração do ambiente
    pub fn from_env() -> Result<Self, ETLError> {
        Self::load(None)
    }

    /// Carrega configuração de arquivo
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ETLError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Carrega configuração de string TOML
    pub fn from_toml(toml_str: &str) -> Result<Self, ETLError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml_str, config::FileFormat::Toml))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Valida a configuração
    pub fn validate(&self) -> Result<(), ETLError> {
        if self.import.batch_size == 0 {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "import.batch_size".to_string(),
                value: "0".to_string(),
            }));
        }

        if self.import.partition_column.trim().is_empty() {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "import.partition_column".to_string(),
                value: String::new(),
            }));
        }

        if self.database.schema.trim().is_empty() {
            return Err(ETLError::Config(ConfigError::InvalidValue {
                param: "database.schema".to_string(),
                value: String::new(),
            }));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.database.connect_timeout_seconds)
    }

    /// Opções de carga equivalentes
    pub fn to_load_options(&self) -> LoadOptions {
        LoadOptions {
            batch_size: self.import.batch_size,
            partition_column: self.import.partition_column.clone(),
            staging_suffix: self.import.staging_suffix.clone(),
            keep_staging: self.import.keep_staging,
            ..LoadOptions::default()
        }
    }

    /// Opções de leitura do perfil
    pub fn to_profile_options(&self, path: Option<PathBuf>) -> ProfileOptions {
        ProfileOptions {
            path,
            default_schema: Some(self.database.schema.clone()),
            ..ProfileOptions::default()
        }
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

/// Inicializa o subscriber global do `tracing`.
///
/// `RUST_LOG` tem precedência sobre `log_level`.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ETLError> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ConfigError::InvalidValue {
            param: "observability.log_level".to_string(),
            value: format!("{} ({})", config.log_level, e),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| ETLError::Generic(anyhow::anyhow!("falha ao iniciar o tracing: {}", e)))
}

/// Builder para configuração do carregador
#[derive(Default)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.database.schema = schema.into();
        self
    }

    pub fn connect_timeout_seconds(mut self, timeout: u64) -> Self {
        self.config.database.connect_timeout_seconds = timeout;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.import.batch_size = size;
        self
    }

    pub fn partition_column(mut self, column: impl Into<String>) -> Self {
        self.config.import.partition_column = column.into();
        self
    }

    pub fn keep_staging(mut self, keep: bool) -> Self {
        self.config.import.keep_staging = keep;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.observability.log_level = level.into();
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.config.observability.log_format = format;
        self
    }

    pub fn build(self) -> Result<LoaderConfig, ETLError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.import.batch_size, 2000);
        assert_eq!(config.import.partition_column, "timestamp");
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.observability.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LoaderConfig::builder()
            .database_url("postgres://localhost/surveys")
            .batch_size(500)
            .keep_staging(true)
            .log_level("debug")
            .build()
            .unwrap();

        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/surveys"));
        let options = config.to_load_options();
        assert_eq!(options.batch_size, 500);
        assert!(options.keep_staging);
        assert_eq!(options.staging_suffix, "_import");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoaderConfig::default();
        config.import.batch_size = 0;
        assert!(config.validate().is_err());

        let result = LoaderConfig::builder().partition_column(" ").build();
        assert!(matches!(result, Err(ETLError::Config(ConfigError::InvalidValue { .. }))));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
        [database]
        url = "postgres://db/epi"
        schema = "survey"

        [import]
        batch_size = 250
        partition_column = "submitted"

        [observability]
        log_format = "json"
        "#;

        let config = LoaderConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.import.batch_size, 250);
        assert_eq!(config.import.partition_column, "submitted");
        assert_eq!(config.import.staging_suffix, "_import");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));

        let profile = config.to_profile_options(None);
        assert_eq!(profile.default_schema.as_deref(), Some("survey"));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[import]\nkeep_staging = true").unwrap();

        let config = LoaderConfig::from_file(file.path()).unwrap();
        assert!(config.import.keep_staging);
        assert_eq!(config.import.batch_size, 2000);
    }

    #[test]
    fn test_file_and_toml_are_validated() {
        let result = LoaderConfig::from_toml("[import]\nbatch_size = 0");
        assert!(matches!(result, Err(ETLError::Config(ConfigError::InvalidValue { .. }))));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[database]\nschema = \"\"").unwrap();
        assert!(LoaderConfig::from_file(file.path()).is_err());
    }
}
