//! Colunas derivadas: tempo decorrido (`timeelapsed`) e indicadores de presença
//! (`indicator`).

use regex::Regex;
use serde::Deserialize;

use crate::dataset::Dataset;
use crate::error::{ConfigError, TransformError};
use crate::profile::GlobalSettings;
use crate::traits::Preprocessor;
use crate::types::DataValue;

use super::{parse_optional_params, parse_ordered_rules};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ElapsedTimeParams {
    from: String,
    to: String,
    column: String,
}

impl Default for ElapsedTimeParams {
    fn default() -> Self {
        Self {
            from: "opened".to_string(),
            to: "submitted".to_string(),
            column: "timeelapsed".to_string(),
        }
    }
}

/// Calcula `to - from` linha a linha em uma nova coluna.
///
/// Operando nulo ou não numérico resulta em nulo. Se a coluna de destino já
/// existir, seus valores são substituídos.
#[derive(Debug, Clone)]
pub struct ElapsedTimePreprocessor {
    from: String,
    to: String,
    column: String,
}

impl ElapsedTimePreprocessor {
    pub fn new(from: impl Into<String>, to: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            column: column.into(),
        }
    }

    pub fn build(
        params: &serde_yaml::Value,
        _global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        let params: ElapsedTimeParams = parse_optional_params("timeelapsed", params)?;
        Ok(Box::new(Self::new(params.from, params.to, params.column)))
    }

    fn operand<'a>(&self, dataset: &'a Dataset, name: &str) -> Result<&'a [DataValue], TransformError> {
        dataset
            .column(name)
            .map(|c| c.values.as_slice())
            .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
    }
}

fn difference(to: &DataValue, from: &DataValue) -> DataValue {
    match (to, from) {
        (DataValue::Integer(b), DataValue::Integer(a)) => {
            b.checked_sub(*a).map(DataValue::Integer).unwrap_or(DataValue::Null)
        }
        (DataValue::Timestamp(b), DataValue::Timestamp(a)) => DataValue::Integer((*b - *a).num_seconds()),
        _ => match (to.as_float(), from.as_float()) {
            (Some(b), Some(a)) => DataValue::Float(b - a),
            _ => DataValue::Null,
        },
    }
}

impl Preprocessor for ElapsedTimePreprocessor {
    fn name(&self) -> &str {
        "timeelapsed"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        let from = self.operand(dataset, &self.from)?;
        let to = self.operand(dataset, &self.to)?;
        let values: Vec<DataValue> = to.iter().zip(from).map(|(b, a)| difference(b, a)).collect();

        if dataset.has_column(&self.column) {
            dataset.replace_values(&self.column, values)
        } else {
            dataset.add_column(self.column.clone(), values)
        }
    }
}

/// Para cada regra `regex: modelo`, cria uma coluna booleana para cada coluna
/// cujo nome casa com a regex, indicando se a célula de origem está presente.
///
/// O nome derivado é `regex.replace_all(nome, modelo)`; as colunas consideradas
/// são as existentes antes da regra.
#[derive(Debug, Clone)]
pub struct IndicatorPreprocessor {
    rules: Vec<(Regex, String)>,
}

impl IndicatorPreprocessor {
    pub fn new(rules: Vec<(Regex, String)>) -> Self {
        Self { rules }
    }

    pub fn build(
        params: &serde_yaml::Value,
        _global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        Ok(Box::new(Self::new(parse_ordered_rules("indicator", params)?)))
    }
}

impl Preprocessor for IndicatorPreprocessor {
    fn name(&self) -> &str {
        "indicator"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        for (pattern, template) in &self.rules {
            let sources: Vec<String> = dataset
                .column_names()
                .into_iter()
                .filter(|name| pattern.is_match(name))
                .collect();

            for source in sources {
                let target = pattern.replace_all(&source, template.as_str()).into_owned();
                let values: Vec<DataValue> = dataset
                    .column(&source)
                    .map(|c| c.values.iter().map(|v| DataValue::Boolean(!v.is_null())).collect())
                    .unwrap_or_default();
                tracing::debug!(source = %source, target = %target, "Indicador derivado");
                dataset.add_column(target, values)?;
            }
        }
        Ok(())
    }
}
