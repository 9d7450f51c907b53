//! # Carga
//!
//! Geração de comandos, execução em lotes e o algoritmo de carga atômica com
//! substituição de partição.

pub mod batch;
pub mod commit;
pub mod executor;
pub mod statement;

use crate::dataset::Dataset;
use crate::transform::ConversionKind;
use crate::types::DataValue;

pub use batch::{BatchExecutor, BatchStats};
pub use commit::AtomicLoader;
#[cfg(feature = "database")]
pub use executor::PgExecutor;
pub use executor::{DryRunExecutor, MemoryExecutor};
pub use statement::{quote_ident, quote_literal, FetchMode, Statement};

/// Tamanho padrão do lote
pub const DEFAULT_BATCH_SIZE: usize = 2000;
/// Coluna padrão de partição temporal
pub const DEFAULT_PARTITION_COLUMN: &str = "timestamp";
/// Sufixo padrão da tabela de staging
pub const DEFAULT_STAGING_SUFFIX: &str = "_import";
/// Coluna interna com o identificador da linha no arquivo
pub const ROW_ID_COLUMN: &str = "_rowid";

/// Coluna resolvida para carga
#[derive(Debug, Clone, PartialEq)]
pub enum LoadColumn {
    /// Coluna do dataset
    Column {
        source: String,
        target: String,
        conversion: Option<ConversionKind>,
    },
    /// Valor fixo para todas as linhas
    Constant { target: String, value: DataValue },
}

impl LoadColumn {
    pub fn column(source: impl Into<String>, target: impl Into<String>, conversion: Option<ConversionKind>) -> Self {
        LoadColumn::Column {
            source: source.into(),
            target: target.into(),
            conversion,
        }
    }

    pub fn constant(target: impl Into<String>, value: DataValue) -> Self {
        LoadColumn::Constant {
            target: target.into(),
            value,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            LoadColumn::Column { target, .. } | LoadColumn::Constant { target, .. } => target,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            LoadColumn::Column { source, .. } => Some(source),
            LoadColumn::Constant { .. } => None,
        }
    }

    pub fn conversion(&self) -> Option<ConversionKind> {
        match self {
            LoadColumn::Column { conversion, .. } => *conversion,
            LoadColumn::Constant { .. } => None,
        }
    }

    /// Valor a gravar na linha `row`.
    ///
    /// Destinos inteiros recebem inteiro (parte inteira); ausentes e NaN viram nulo.
    pub fn value_at(&self, dataset: &Dataset, row: usize) -> DataValue {
        match self {
            LoadColumn::Constant { value, .. } => value.clone(),
            LoadColumn::Column { source, conversion, .. } => {
                let value = dataset.value(source, row).cloned().unwrap_or(DataValue::Null);
                if value.is_null() {
                    return DataValue::Null;
                }
                match (conversion, &value) {
                    (Some(ConversionKind::Int), DataValue::Float(_)) => {
                        value.as_integer().map(DataValue::Integer).unwrap_or(DataValue::Null)
                    }
                    _ => value,
                }
            }
        }
    }
}

impl std::fmt::Display for LoadColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadColumn::Column { source, target, conversion } => {
                write!(f, "{} -> {}", source, target)?;
                if let Some(kind) = conversion {
                    write!(f, " ({})", kind)?;
                }
                Ok(())
            }
            LoadColumn::Constant { target, value } => write!(f, "{} = {}", target, value),
        }
    }
}

/// Opções da carga atômica
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub partition_column: String,
    pub staging_suffix: String,
    pub keep_staging: bool,
    /// Imprime as N primeiras linhas e seus comandos
    pub show_batch_count: usize,
    /// Imprime a linha cujo `_rowid` for igual a este valor
    pub show_batch_row: Option<i64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            partition_column: DEFAULT_PARTITION_COLUMN.to_string(),
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
            keep_staging: false,
            show_batch_count: 0,
            show_batch_row: None,
        }
    }
}
