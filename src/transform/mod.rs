//! # Transformações
//!
//! Pré-processadores nomeados que operam sobre o [`Dataset`] inteiro antes do
//! mapeamento de colunas, e as conversões de tipo aplicadas em seguida.
//!
//! Cada pré-processador é construído a partir do nome usado no perfil por meio
//! do [`PreprocessorRegistry`]; os parâmetros são validados na construção, de
//! modo que um perfil inválido falha já no carregamento.

pub mod boolean;
pub mod convert;
pub mod derive;
pub mod json;
pub mod migration;
pub mod rename;

use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::error::{ConfigError, ETLError, Result};
use crate::profile::GlobalSettings;
use crate::traits::Preprocessor;

pub use boolean::NormalizeBooleanPreprocessor;
pub use convert::{auto_convert_type, convert, ConversionKind};
pub use derive::{ElapsedTimePreprocessor, IndicatorPreprocessor};
pub use json::JsonExtractPreprocessor;
pub use migration::IdentityMigrationPreprocessor;
pub use rename::{GroupRenamePreprocessor, RenamePreprocessor};

/// Construtor de um pré-processador a partir dos parâmetros do perfil
pub type PreprocessorConstructor =
    fn(&serde_yaml::Value, &GlobalSettings) -> std::result::Result<Box<dyn Preprocessor>, ConfigError>;

/// Registro nome → construtor
#[derive(Clone, Default)]
pub struct PreprocessorRegistry {
    constructors: HashMap<String, PreprocessorConstructor>,
}

impl PreprocessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro com todos os pré-processadores da biblioteca
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("rename", RenamePreprocessor::build);
        registry.register("mcg", GroupRenamePreprocessor::build);
        registry.register("unjson", JsonExtractPreprocessor::build);
        registry.register("timeelapsed", ElapsedTimePreprocessor::build);
        registry.register("bool", NormalizeBooleanPreprocessor::build);
        registry.register("indicator", IndicatorPreprocessor::build);
        registry.register("migration", IdentityMigrationPreprocessor::build);
        registry
    }

    /// Registra (ou substitui) um construtor
    pub fn register(&mut self, name: impl Into<String>, constructor: PreprocessorConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Nomes registrados, em ordem alfabética
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Constrói um pré-processador pelo nome
    pub fn build(
        &self,
        name: &str,
        params: &serde_yaml::Value,
        global: &GlobalSettings,
    ) -> std::result::Result<Box<dyn Preprocessor>, ConfigError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPreprocessor(name.to_string()))?;
        constructor(params, global)
    }
}

impl std::fmt::Debug for PreprocessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessorRegistry").field("names", &self.names()).finish()
    }
}

/// Deserializa os parâmetros tipados de um pré-processador
pub(crate) fn parse_params<T: DeserializeOwned>(
    name: &str,
    params: &serde_yaml::Value,
) -> std::result::Result<T, ConfigError> {
    serde_yaml::from_value(params.clone()).map_err(|e| ConfigError::InvalidPreprocessor {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Como [`parse_params`], aceitando parâmetros ausentes (`null`)
pub(crate) fn parse_optional_params<T: DeserializeOwned + Default>(
    name: &str,
    params: &serde_yaml::Value,
) -> std::result::Result<T, ConfigError> {
    if params.is_null() {
        Ok(T::default())
    } else {
        parse_params(name, params)
    }
}

/// Lê um mapa ordenado `padrão: substituição`
pub(crate) fn parse_ordered_rules(
    name: &str,
    params: &serde_yaml::Value,
) -> std::result::Result<Vec<(regex::Regex, String)>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidPreprocessor {
        name: name.to_string(),
        reason,
    };
    let mapping = params
        .as_mapping()
        .ok_or_else(|| invalid("esperado um mapa de regras 'padrão': 'substituição'".to_string()))?;

    let mut rules = Vec::with_capacity(mapping.len());
    for (pattern, target) in mapping {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| invalid(format!("padrão deve ser texto: {:?}", pattern)))?;
        let target = target
            .as_str()
            .ok_or_else(|| invalid(format!("substituição de '{}' deve ser texto", pattern)))?;
        let regex = regex::Regex::new(pattern).map_err(|e| invalid(format!("regex '{}': {}", pattern, e)))?;
        rules.push((regex, translate_backreferences(target)));
    }
    Ok(rules)
}

/// Converte referências `\1` para a sintaxe do crate `regex` (`${1}`).
///
/// `\\` vira uma barra literal; `$1` e `${nome}` passam sem alteração.
pub(crate) fn translate_backreferences(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    group.push(d);
                    chars.next();
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Cadeia ordenada de pré-processadores
#[derive(Debug, Default)]
pub struct PreprocessorChain {
    steps: Vec<Box<dyn Preprocessor>>,
}

impl PreprocessorChain {
    pub fn new(steps: Vec<Box<dyn Preprocessor>>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: Box<dyn Preprocessor>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Executa os passos na ordem declarada; o primeiro erro interrompe a cadeia.
    ///
    /// O erro informa o índice (a partir de 1) e o nome do passo.
    pub fn run(&self, dataset: &mut Dataset) -> Result<()> {
        for (i, step) in self.steps.iter().enumerate() {
            tracing::info!(index = i + 1, preprocessor = step.name(), "Executando pré-processador");
            step.apply(dataset).map_err(|source| ETLError::Preprocess {
                index: i + 1,
                name: step.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::types::DataValue;

    #[derive(Debug)]
    struct Failing;

    impl Preprocessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn apply(&self, _dataset: &mut Dataset) -> std::result::Result<(), TransformError> {
            Err(TransformError::ProcessingError("falhou".to_string()))
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_rows(vec!["Q1".to_string()], vec![vec![DataValue::Integer(1)]])
    }

    #[test]
    fn test_registry_builtins() {
        let registry = PreprocessorRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["bool", "indicator", "mcg", "migration", "rename", "timeelapsed", "unjson"]
        );
        let err = registry
            .build("explode", &serde_yaml::Value::Null, &GlobalSettings::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreprocessor(n) if n == "explode"));
    }

    #[test]
    fn test_chain_reports_one_based_index() {
        let params: serde_yaml::Value = serde_yaml::from_str("{'^Q': 'q'}").unwrap();
        let rename = RenamePreprocessor::build(&params, &GlobalSettings::default()).unwrap();
        let chain = PreprocessorChain::new(vec![rename, Box::new(Failing)]);

        let mut data = dataset();
        match chain.run(&mut data) {
            Err(ETLError::Preprocess { index, name, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(name, "failing");
            }
            other => panic!("esperado erro de pré-processamento: {:?}", other),
        }
        assert_eq!(chain.names(), vec!["rename", "failing"]);
    }

    #[test]
    fn test_empty_chain_is_noop() {
        let mut data = dataset();
        PreprocessorChain::default().run(&mut data).unwrap();
        assert_eq!(data, dataset());
    }

    #[test]
    fn test_translate_backreferences() {
        assert_eq!(translate_backreferences(r"\1_\12"), "${1}_${12}");
        assert_eq!(translate_backreferences(r"q$1_${name}"), "q$1_${name}");
        assert_eq!(translate_backreferences(r"a\\b\x"), r"a\b\x");
    }
}
