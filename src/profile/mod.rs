//! # Perfis de transformação
//!
//! Um perfil YAML descreve, para cada tabela importável, o destino no banco,
//! as regras por coluna, a cadeia de pré-processadores e as dicas de tipo do CSV.
//!
//! ```yaml
//! _config:
//!   key_separator: "|"
//!   migrations:
//!     file: migrations.json
//!
//! weekly:
//!   table: survey.weekly
//!   prepare:
//!     - rename: { "^intake\\.": "" }
//!     - mcg: [Q10]
//!   mapping:
//!     Q1: int
//!     Q2: ~
//!     "Q10_*": { to: bool }
//!     submitted: { rename: submitted_at, to: timestamp }
//!   csv_types:
//!     zip: str
//!   constants:
//!     season: 2024
//! ```
//!
//! Todo o documento é validado no carregamento: chaves desconhecidas, tipos de
//! conversão inválidos e pré-processadores inexistentes são rejeitados antes de
//! qualquer importação.

pub mod selector;

use globset::GlobMatcher;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ETLError, Result};
use crate::extract::ColumnTypeHint;
use crate::schema::{TableRef, DEFAULT_SCHEMA};
use crate::transform::{ConversionKind, PreprocessorChain, PreprocessorRegistry};
use crate::types::DataValue;

use selector::{compile_glob, is_glob_pattern};

/// Chave reservada para as configurações globais
pub const CONFIG_KEY: &str = "_config";

/// Referência ao arquivo de migrações de identificadores
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsConfig {
    pub file: Option<PathBuf>,
}

/// Configurações globais do perfil (`_config`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalSettings {
    /// Separador usado pelo pré-processador `mcg`
    pub key_separator: Option<String>,
    pub migrations: Option<MigrationsConfig>,
    /// Diretório de trabalho onde os arquivos auxiliares são procurados
    pub path: Option<PathBuf>,
    /// Não constrói os pré-processadores (inspeção do perfil)
    pub skip_prepare: bool,
}

/// Opções de carregamento fornecidas pelo chamador
#[derive(Debug, Clone, Default)]
pub struct ProfileOptions {
    /// Sobrepõe `_config.path`
    pub path: Option<PathBuf>,
    /// Força `skip_prepare`
    pub skip_prepare: bool,
    /// Schema das tabelas declaradas sem schema (`public` se ausente)
    pub default_schema: Option<String>,
}

/// Regra aplicada a uma coluna de origem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRule {
    pub ignore: bool,
    pub rename: Option<String>,
    pub to: Option<ConversionKind>,
}

impl ColumnRule {
    pub fn ignored() -> Self {
        Self {
            ignore: true,
            ..Self::default()
        }
    }

    pub fn convert_to(kind: ConversionKind) -> Self {
        Self {
            to: Some(kind),
            ..Self::default()
        }
    }

    /// Interpreta o valor de uma entrada de `mapping`
    fn from_yaml(column: &str, value: &serde_yaml::Value) -> std::result::Result<Self, ConfigError> {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct RawColumnRule {
            #[serde(default)]
            ignore: bool,
            rename: Option<String>,
            to: Option<String>,
        }

        let parse_kind = |kind: &str| {
            kind.parse::<ConversionKind>()
                .map_err(|kind| ConfigError::UnknownConversion {
                    column: column.to_string(),
                    kind,
                })
        };

        match value {
            serde_yaml::Value::Null => Ok(Self::ignored()),
            serde_yaml::Value::String(kind) => Ok(Self::convert_to(parse_kind(kind.as_str())?)),
            serde_yaml::Value::Mapping(_) => {
                let raw: RawColumnRule = serde_yaml::from_value(value.clone()).map_err(|e| {
                    ConfigError::InvalidConfig(format!("regra da coluna '{}': {}", column, e))
                })?;
                Ok(Self {
                    ignore: raw.ignore,
                    rename: raw.rename,
                    to: raw.to.as_deref().map(parse_kind).transpose()?,
                })
            }
            other => Err(ConfigError::InvalidConfig(format!(
                "regra da coluna '{}' deve ser nula, texto ou mapa: {:?}",
                column, other
            ))),
        }
    }
}

/// Entrada de `mapping`: nome exato ou padrão glob
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub pattern: String,
    matcher: Option<GlobMatcher>,
    pub rule: ColumnRule,
}

impl ColumnMapping {
    pub fn is_pattern(&self) -> bool {
        self.matcher.is_some()
    }
}

/// Definição de importação de uma tabela
#[derive(Debug)]
pub struct TableDefinition {
    /// Nome da entrada no perfil
    pub name: String,
    /// Tabela de destino
    pub table: TableRef,
    mappings: Vec<ColumnMapping>,
    /// Pré-processadores declarados, na ordem
    pub prepare: Vec<String>,
    pub chain: PreprocessorChain,
    pub csv_types: HashMap<String, ColumnTypeHint>,
    /// Colunas constantes acrescentadas a toda linha carregada
    pub constants: Vec<(String, DataValue)>,
}

impl TableDefinition {
    /// Regra de uma coluna: nome exato primeiro, senão o primeiro padrão declarado que casar
    pub fn rule_for(&self, column: &str) -> Option<&ColumnRule> {
        self.mappings
            .iter()
            .find(|m| m.pattern == column)
            .or_else(|| {
                self.mappings
                    .iter()
                    .find(|m| m.matcher.as_ref().is_some_and(|g| g.is_match(column)))
            })
            .map(|m| &m.rule)
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    table: Option<String>,
    mapping: serde_yaml::Mapping,
    #[serde(default)]
    prepare: Vec<serde_yaml::Value>,
    #[serde(default)]
    csv_types: HashMap<String, ColumnTypeHint>,
    #[serde(default)]
    constants: serde_yaml::Mapping,
}

/// Perfil carregado
#[derive(Debug)]
pub struct TransformationProfile {
    global: GlobalSettings,
    tables: Vec<TableDefinition>,
}

impl TransformationProfile {
    /// Carrega o perfil de um arquivo YAML com os pré-processadores da biblioteca.
    ///
    /// Sem `path` nas opções nem em `_config`, o diretório do perfil é usado
    /// como diretório de trabalho.
    pub fn load<P: AsRef<Path>>(path: P, options: &ProfileOptions) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidConfig(format!("não foi possível ler o perfil {}: {}", path.display(), e))
        })?;

        let mut options = options.clone();
        if options.path.is_none() {
            options.path = path.parent().map(Path::to_path_buf);
        }

        tracing::info!(profile = %path.display(), "Carregando perfil");
        Self::from_yaml_str(&content, &options, &PreprocessorRegistry::with_builtins())
    }

    /// Interpreta um documento YAML
    pub fn from_yaml_str(content: &str, options: &ProfileOptions, registry: &PreprocessorRegistry) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(content)?;
        let serde_yaml::Value::Mapping(document) = document else {
            return Err(ConfigError::InvalidConfig("o perfil deve ser um mapa de tabelas".to_string()).into());
        };

        let mut global = match document.get(CONFIG_KEY) {
            Some(value) if !value.is_null() => serde_yaml::from_value::<GlobalSettings>(value.clone())
                .map_err(|e| ConfigError::InvalidConfig(format!("{}: {}", CONFIG_KEY, e)))?,
            _ => GlobalSettings::default(),
        };
        if global.path.is_none() {
            global.path = options.path.clone();
        } else if let (Some(base), Some(relative)) = (&options.path, &global.path) {
            global.path = Some(base.join(relative));
        }
        global.skip_prepare |= options.skip_prepare;

        let mut tables = Vec::new();
        for (key, value) in &document {
            let name = key
                .as_str()
                .ok_or_else(|| ConfigError::InvalidConfig(format!("nome de tabela inválido: {:?}", key)))?;
            if name == CONFIG_KEY {
                continue;
            }
            let schema = options.default_schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
            tables.push(Self::parse_table(name, value, schema, &global, registry)?);
        }

        tracing::debug!(tables = tables.len(), skip_prepare = global.skip_prepare, "Perfil interpretado");
        Ok(Self { global, tables })
    }

    fn parse_table(
        name: &str,
        value: &serde_yaml::Value,
        default_schema: &str,
        global: &GlobalSettings,
        registry: &PreprocessorRegistry,
    ) -> Result<TableDefinition> {
        let raw: RawTable = serde_yaml::from_value(value.clone())
            .map_err(|e| ConfigError::InvalidConfig(format!("tabela '{}': {}", name, e)))?;

        let mut mappings = Vec::with_capacity(raw.mapping.len());
        for (pattern, rule) in &raw.mapping {
            let pattern = pattern.as_str().ok_or_else(|| {
                ConfigError::InvalidConfig(format!("tabela '{}': coluna inválida em mapping: {:?}", name, pattern))
            })?;
            let matcher = if is_glob_pattern(pattern) {
                Some(compile_glob(pattern)?)
            } else {
                None
            };
            mappings.push(ColumnMapping {
                pattern: pattern.to_string(),
                matcher,
                rule: ColumnRule::from_yaml(pattern, rule)?,
            });
        }

        let mut prepare = Vec::with_capacity(raw.prepare.len());
        let mut chain = PreprocessorChain::default();
        for step in &raw.prepare {
            let (step_name, params) = preprocessor_entry(step)?;
            if !global.skip_prepare {
                chain.push(registry.build(&step_name, &params, global)?);
            }
            prepare.push(step_name);
        }

        let mut constants = Vec::with_capacity(raw.constants.len());
        for (column, value) in &raw.constants {
            let column = column
                .as_str()
                .ok_or_else(|| ConfigError::InvalidConfig(format!("tabela '{}': constante inválida", name)))?;
            constants.push((column.to_string(), constant_value(column, value)?));
        }

        let table = TableRef::parse(raw.table.as_deref().unwrap_or(name), default_schema);
        Ok(TableDefinition {
            name: name.to_string(),
            table,
            mappings,
            prepare,
            chain,
            csv_types: raw.csv_types,
            constants,
        })
    }

    /// Definição de uma tabela pelo nome da entrada
    pub fn get_table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ETLError::UnknownTable(name.to_string()))
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn global(&self) -> &GlobalSettings {
        &self.global
    }
}

/// Entrada de `prepare`: `{nome: parâmetros}` ou apenas `nome`
fn preprocessor_entry(step: &serde_yaml::Value) -> std::result::Result<(String, serde_yaml::Value), ConfigError> {
    match step {
        serde_yaml::Value::String(name) => Ok((name.clone(), serde_yaml::Value::Null)),
        serde_yaml::Value::Mapping(map) if map.len() == 1 => {
            let (name, params) = map
                .iter()
                .next()
                .ok_or_else(|| ConfigError::InvalidConfig("entrada de prepare vazia".to_string()))?;
            let name = name
                .as_str()
                .ok_or_else(|| ConfigError::InvalidConfig(format!("nome de pré-processador inválido: {:?}", name)))?;
            Ok((name.to_string(), params.clone()))
        }
        other => Err(ConfigError::InvalidConfig(format!(
            "entrada de prepare deve ser {{nome: parâmetros}}: {:?}",
            other
        ))),
    }
}

fn constant_value(column: &str, value: &serde_yaml::Value) -> std::result::Result<DataValue, ConfigError> {
    match value {
        serde_yaml::Value::Null => Ok(DataValue::Null),
        serde_yaml::Value::Bool(b) => Ok(DataValue::Boolean(*b)),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(DataValue::Integer(i)),
            None => n.as_f64().map(DataValue::Float).ok_or_else(|| ConfigError::InvalidValue {
                param: column.to_string(),
                value: n.to_string(),
            }),
        },
        serde_yaml::Value::String(s) => Ok(DataValue::String(s.clone())),
        other => Err(ConfigError::InvalidValue {
            param: column.to_string(),
            value: format!("{:?}", other),
        }),
    }
}
