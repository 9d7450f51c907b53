use serde::Deserialize;

use crate::dataset::Dataset;
use crate::error::{ConfigError, TransformError};
use crate::profile::selector::ColumnSelector;
use crate::profile::GlobalSettings;
use crate::traits::Preprocessor;
use crate::types::DataValue;

use super::parse_params;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NormalizeBooleanParams {
    columns: Vec<String>,
    #[serde(default)]
    na_false: bool,
}

/// Normaliza as colunas selecionadas para booleano (`bool`).
///
/// Aceita `0`, `1`, `true` e `false` em qualquer caixa. Nulos viram `false`
/// com `na_false`, senão continuam nulos. Qualquer outro valor é erro.
#[derive(Debug, Clone)]
pub struct NormalizeBooleanPreprocessor {
    selector: ColumnSelector,
    na_false: bool,
}

impl NormalizeBooleanPreprocessor {
    pub fn new(selector: ColumnSelector, na_false: bool) -> Self {
        Self { selector, na_false }
    }

    pub fn build(
        params: &serde_yaml::Value,
        _global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        let params: NormalizeBooleanParams = parse_params("bool", params)?;
        Ok(Box::new(Self::new(ColumnSelector::new(params.columns)?, params.na_false)))
    }

    fn normalize(&self, column: &str, value: &DataValue) -> Result<DataValue, TransformError> {
        if value.is_null() {
            return Ok(if self.na_false {
                DataValue::Boolean(false)
            } else {
                DataValue::Null
            });
        }
        value
            .as_boolean()
            .map(DataValue::Boolean)
            .ok_or_else(|| TransformError::InvalidValue {
                column: column.to_string(),
                value: value.to_string(),
            })
    }
}

impl Preprocessor for NormalizeBooleanPreprocessor {
    fn name(&self) -> &str {
        "bool"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        for column in self.selector.select(&dataset.column_names()) {
            let values = match dataset.column(&column) {
                Some(c) => c
                    .values
                    .iter()
                    .map(|v| self.normalize(&column, v))
                    .collect::<Result<Vec<_>, _>>()?,
                None => continue,
            };
            dataset.replace_values(&column, values)?;
        }
        Ok(())
    }
}
