use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{build_dataset, is_missing, ColumnTypeHint};
use crate::dataset::Dataset;
use crate::error::{ExtractError, Result};
use crate::traits::DataSource;

/// Extrator para arquivos CSV com cabeçalho
#[derive(Debug, Clone)]
pub struct CsvExtractor {
    file_path: PathBuf,
    delimiter: u8,
    quote_char: u8,
    type_hints: HashMap<String, ColumnTypeHint>,
}

impl CsvExtractor {
    /// Cria um novo extrator CSV
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            delimiter: b',',
            quote_char: b'"',
            type_hints: HashMap::new(),
        }
    }

    /// Define o delimitador
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Define o caractere de aspas
    pub fn with_quote_char(mut self, quote_char: u8) -> Self {
        self.quote_char = quote_char;
        self
    }

    /// Define os tipos forçados por coluna
    pub fn with_type_hints(mut self, hints: HashMap<String, ColumnTypeHint>) -> Self {
        self.type_hints = hints;
        self
    }

    /// Nome de uma coluna do cabeçalho; células vazias recebem `Unnamed: <i>`
    fn header_name(index: usize, raw: &str) -> String {
        if raw.trim().is_empty() {
            format!("Unnamed: {}", index)
        } else {
            raw.to_string()
        }
    }
}

#[async_trait]
impl DataSource for CsvExtractor {
    async fn load(&self) -> Result<Dataset> {
        use std::fs::File;
        use std::io::BufReader;

        if !self.file_path.exists() {
            return Err(ExtractError::FileNotFound(self.file_path.display().to_string()).into());
        }

        let file = File::open(&self.file_path)?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote_char)
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| Self::header_name(i, h))
            .collect();
        if headers.is_empty() {
            return Err(ExtractError::MissingHeader(self.describe()).into());
        }

        let mut raw_columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for result in csv_reader.records() {
            let record = result?;
            for (i, column) in raw_columns.iter_mut().enumerate() {
                let cell = record.get(i).filter(|c| !is_missing(c)).map(str::to_string);
                column.push(cell);
            }
        }

        let dataset = build_dataset(headers, raw_columns, |name| self.type_hints.get(name).copied())?;
        tracing::info!(
            source = %self.describe(),
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            "CSV carregado"
        );
        Ok(dataset)
    }

    fn describe(&self) -> String {
        self.file_path.display().to_string()
    }
}
