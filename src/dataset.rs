//! # Dataset
//!
//! Tabela em memória, organizada por colunas, que atravessa o pré-processamento
//! e a conversão de tipos antes da carga.
//!
//! Convenções:
//! - uma coluna ausente é simplesmente ignorada pelos operadores baseados em seleção;
//! - uma coluna presente mas sem linhas continua sendo processada;
//! - todas as colunas têm sempre o mesmo número de linhas.

use crate::error::TransformError;
use crate::types::{DataValue, ValueType};

/// Coluna nomeada
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<DataValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<DataValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Tipo inferido dos valores atuais
    pub fn value_type(&self) -> ValueType {
        ValueType::of_column(&self.values)
    }
}

/// Conjunto de dados colunar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monta um dataset a partir do cabeçalho e das linhas
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<DataValue>>) -> Self {
        let row_count = rows.len();
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(row_count)))
            .collect();

        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.values.push(cells.next().unwrap_or(DataValue::Null));
            }
        }

        Self { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Valor de uma célula
    pub fn value(&self, column: &str, row: usize) -> Option<&DataValue> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Acrescenta uma coluna no final. Falha se o nome já existir ou o tamanho divergir.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<DataValue>) -> Result<(), TransformError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(TransformError::ColumnConflict(name));
        }
        if !self.columns.is_empty() && values.len() != self.row_count {
            return Err(TransformError::ProcessingError(format!(
                "coluna '{}' tem {} linhas, esperado {}",
                name,
                values.len(),
                self.row_count
            )));
        }
        if self.columns.is_empty() {
            self.row_count = values.len();
        }
        self.columns.push(Column::new(name, values));
        Ok(())
    }

    /// Substitui os valores de uma coluna existente
    pub fn replace_values(&mut self, name: &str, values: Vec<DataValue>) -> Result<(), TransformError> {
        let row_count = self.row_count;
        let column = self
            .column_mut(name)
            .ok_or_else(|| TransformError::MissingColumn(name.to_string()))?;
        if values.len() != row_count {
            return Err(TransformError::ProcessingError(format!(
                "coluna '{}' recebeu {} valores, esperado {}",
                name,
                values.len(),
                row_count
            )));
        }
        column.values = values;
        Ok(())
    }

    /// Aplica uma função de renomeação a todas as colunas.
    ///
    /// Falha se dois nomes resultantes colidirem.
    pub fn rename_columns<F>(&mut self, renamer: F) -> Result<(), TransformError>
    where
        F: Fn(&str) -> String,
    {
        let renamed: Vec<String> = self.columns.iter().map(|c| renamer(&c.name)).collect();
        for (i, name) in renamed.iter().enumerate() {
            if renamed[..i].contains(name) {
                return Err(TransformError::ColumnConflict(name.clone()));
            }
        }
        for (column, name) in self.columns.iter_mut().zip(renamed) {
            column.name = name;
        }
        Ok(())
    }

    /// Linha `index` como pares (coluna, valor), na ordem das colunas
    pub fn row(&self, index: usize) -> Vec<(&str, &DataValue)> {
        self.columns
            .iter()
            .filter_map(|c| c.values.get(index).map(|v| (c.name.as_str(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_rows(
            vec!["id".to_string(), "Q1".to_string()],
            vec![
                vec![DataValue::Integer(1), DataValue::from("a")],
                vec![DataValue::Integer(2)],
            ],
        )
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let dataset = sample();
        assert_eq!(dataset.row_count(), 2);
        assert_eq!(dataset.value("Q1", 1), Some(&DataValue::Null));
    }

    #[test]
    fn test_add_column_conflict_and_length() {
        let mut dataset = sample();
        assert!(matches!(
            dataset.add_column("id", vec![DataValue::Null, DataValue::Null]),
            Err(TransformError::ColumnConflict(_))
        ));
        assert!(dataset.add_column("x", vec![DataValue::Null]).is_err());
        dataset.add_column("x", vec![DataValue::Null, DataValue::Null]).unwrap();
        assert_eq!(dataset.column_names(), vec!["id", "Q1", "x"]);
    }

    #[test]
    fn test_rename_columns_detects_collisions() {
        let mut dataset = sample();
        assert!(dataset.rename_columns(|_| "same".to_string()).is_err());
        assert_eq!(dataset.column_names(), vec!["id", "Q1"]);

        dataset.rename_columns(|n| n.to_lowercase()).unwrap();
        assert_eq!(dataset.column_names(), vec!["id", "q1"]);
    }

    #[test]
    fn test_row_view() {
        let dataset = sample();
        let row = dataset.row(0);
        assert_eq!(row[0], ("id", &DataValue::Integer(1)));
        assert_eq!(row[1], ("Q1", &DataValue::from("a")));
    }
}
