//! Fontes de dados de entrada.

#[cfg(feature = "csv")]
pub mod csv;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{ETLError, ExtractError, Result};
use crate::types::DataValue;

#[cfg(feature = "csv")]
pub use self::csv::CsvExtractor;

/// Tipo forçado para uma coluna na leitura (`csv_types` no perfil)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnTypeHint {
    Str,
    Int,
    Float,
    Bool,
}

impl ColumnTypeHint {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnTypeHint::Str => "str",
            ColumnTypeHint::Int => "int",
            ColumnTypeHint::Float => "float",
            ColumnTypeHint::Bool => "bool",
        }
    }
}

/// Célula textual considerada ausente
pub fn is_missing(raw: &str) -> bool {
    matches!(raw.trim(), "" | "null" | "NULL" | "NaN" | "nan" | "NA" | "N/A")
}

fn parse_bool_token(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Converte as células textuais de uma coluna.
///
/// Com dica, toda célula presente precisa respeitar o tipo indicado. Sem dica,
/// o tipo é inferido para a coluna inteira: inteiro, float, booleano (`true`/`false`)
/// ou texto, nessa ordem.
pub fn parse_column(
    column: &str,
    cells: Vec<Option<String>>,
    hint: Option<ColumnTypeHint>,
) -> Result<Vec<DataValue>> {
    let present = || cells.iter().flatten();

    let hint = match hint {
        Some(hint) => hint,
        None if present().all(|c| c.trim().parse::<i64>().is_ok()) => ColumnTypeHint::Int,
        None if present().all(|c| c.trim().parse::<f64>().is_ok()) => ColumnTypeHint::Float,
        None if present().all(|c| parse_bool_token(c).is_some()) => ColumnTypeHint::Bool,
        None => ColumnTypeHint::Str,
    };

    cells
        .into_iter()
        .map(|cell| {
            let Some(raw) = cell else {
                return Ok(DataValue::Null);
            };
            let parsed = match hint {
                ColumnTypeHint::Str => Some(DataValue::String(raw.clone())),
                ColumnTypeHint::Int => raw.trim().parse::<i64>().ok().map(DataValue::Integer),
                ColumnTypeHint::Float => raw.trim().parse::<f64>().ok().map(DataValue::Float),
                ColumnTypeHint::Bool => parse_bool_token(&raw).map(DataValue::Boolean),
            };
            parsed.ok_or_else(|| {
                ETLError::Extract(ExtractError::ParseError(format!(
                    "coluna '{}': valor '{}' não é do tipo {}",
                    column,
                    raw,
                    hint.name()
                )))
            })
        })
        .collect()
}

/// Monta o dataset a partir do cabeçalho e das colunas de texto bruto
pub fn build_dataset<F>(headers: Vec<String>, raw_columns: Vec<Vec<Option<String>>>, hint_for: F) -> Result<Dataset>
where
    F: Fn(&str) -> Option<ColumnTypeHint>,
{
    let mut dataset = Dataset::new();
    for (name, cells) in headers.into_iter().zip(raw_columns) {
        let values = parse_column(&name, cells, hint_for(&name))?;
        dataset.add_column(name, values).map_err(|e| ExtractError::InvalidFormat(e.to_string()))?;
    }
    Ok(dataset)
}
