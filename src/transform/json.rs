//! Extração de campos de células codificadas em JSON (`unjson`).

use serde::Deserialize;

use crate::dataset::Dataset;
use crate::error::{ConfigError, TransformError};
use crate::profile::selector::ColumnSelector;
use crate::profile::GlobalSettings;
use crate::traits::Preprocessor;
use crate::types::DataValue;

use super::parse_params;

/// Função que extrai uma lista de textos de um documento JSON
pub type JsonExtractor = fn(&serde_json::Value) -> Vec<String>;

/// Extratores disponíveis pelo nome
pub fn extractor_by_name(name: &str) -> Option<JsonExtractor> {
    match name {
        "items_keys" => Some(items_keys),
        _ => None,
    }
}

/// Chaves (`key`) de cada item da lista `items`
pub fn items_keys(data: &serde_json::Value) -> Vec<String> {
    data.get("items")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item.get("key")? {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonExtractParams {
    columns: Vec<String>,
    parser: String,
}

/// Para as colunas selecionadas, interpreta cada célula não nula como JSON,
/// aplica o extrator e junta os resultados com vírgulas.
///
/// Células nulas continuam nulas; um resultado vazio vira texto vazio.
#[derive(Debug, Clone)]
pub struct JsonExtractPreprocessor {
    selector: ColumnSelector,
    parser_name: String,
    parser: JsonExtractor,
}

impl JsonExtractPreprocessor {
    pub fn new(selector: ColumnSelector, parser_name: impl Into<String>, parser: JsonExtractor) -> Self {
        Self {
            selector,
            parser_name: parser_name.into(),
            parser,
        }
    }

    pub fn build(
        params: &serde_yaml::Value,
        _global: &GlobalSettings,
    ) -> Result<Box<dyn Preprocessor>, ConfigError> {
        let params: JsonExtractParams = parse_params("unjson", params)?;
        let parser = extractor_by_name(&params.parser).ok_or_else(|| ConfigError::InvalidPreprocessor {
            name: "unjson".to_string(),
            reason: format!("parser desconhecido '{}'", params.parser),
        })?;
        let selector = ColumnSelector::new(params.columns)?;
        Ok(Box::new(Self::new(selector, params.parser, parser)))
    }

    fn extract(&self, column: &str, value: DataValue) -> Result<DataValue, TransformError> {
        if value.is_null() {
            return Ok(DataValue::Null);
        }
        let text = match value {
            DataValue::String(s) => s,
            other => other.to_string(),
        };
        let document: serde_json::Value = serde_json::from_str(&text).map_err(|e| TransformError::InvalidJson {
            column: column.to_string(),
            reason: e.to_string(),
        })?;
        Ok(DataValue::String((self.parser)(&document).join(",")))
    }
}

impl Preprocessor for JsonExtractPreprocessor {
    fn name(&self) -> &str {
        "unjson"
    }

    fn apply(&self, dataset: &mut Dataset) -> Result<(), TransformError> {
        let columns = self.selector.select(&dataset.column_names());
        tracing::debug!(parser = %self.parser_name, selector = %self.selector, ?columns, "Extraindo JSON");

        for column in columns {
            let values = match dataset.column_mut(&column) {
                Some(c) => std::mem::take(&mut c.values),
                None => continue,
            };
            let extracted = values
                .into_iter()
                .map(|v| self.extract(&column, v))
                .collect::<Result<Vec<_>, _>>()?;
            dataset.replace_values(&column, extracted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(yaml: &str) -> Box<dyn Preprocessor> {
        let params: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        JsonExtractPreprocessor::build(&params, &GlobalSettings::default()).unwrap()
    }

    #[test]
    fn test_items_keys_joined() {
        let step = build("{columns: ['Q5*'], parser: items_keys}");
        let mut data = Dataset::from_rows(
            vec!["Q5a".to_string(), "other".to_string()],
            vec![
                vec![DataValue::from(r#"{"items":[{"key":"a"},{"key":"b"}]}"#), DataValue::from("{")],
                vec![DataValue::Null, DataValue::Null],
                vec![DataValue::from(r#"{"items":[]}"#), DataValue::Null],
            ],
        );

        step.apply(&mut data).unwrap();
        let column = data.column("Q5a").unwrap();
        assert_eq!(
            column.values,
            vec![DataValue::from("a,b"), DataValue::Null, DataValue::from("")]
        );
        assert_eq!(data.value("other", 0), Some(&DataValue::from("{")));
    }

    #[test]
    fn test_invalid_json_fails() {
        let step = build("{columns: [Q5], parser: items_keys}");
        let mut data = Dataset::from_rows(vec!["Q5".to_string()], vec![vec![DataValue::from("not json")]]);
        assert!(matches!(step.apply(&mut data), Err(TransformError::InvalidJson { .. })));
    }

    #[test]
    fn test_unknown_parser_and_fields() {
        let params: serde_yaml::Value = serde_yaml::from_str("{columns: [a], parser: nope}").unwrap();
        assert!(JsonExtractPreprocessor::build(&params, &GlobalSettings::default()).is_err());

        let params: serde_yaml::Value = serde_yaml::from_str("{columns: [a], parser: items_keys, extra: 1}").unwrap();
        assert!(JsonExtractPreprocessor::build(&params, &GlobalSettings::default()).is_err());
    }

    #[test]
    fn test_absent_columns_leave_dataset_unchanged() {
        let step = build("{columns: [missing, 'Z*'], parser: items_keys}");
        let before = Dataset::from_rows(vec!["a".to_string()], vec![vec![DataValue::from("{")]]);
        let mut data = before.clone();
        step.apply(&mut data).unwrap();
        assert_eq!(data, before);
    }
}
