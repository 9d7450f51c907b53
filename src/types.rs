use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};

/// Valores de dados suportados
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
    /// Data sem horário (YYYY-MM-DD)
    Date(NaiveDate),
    /// Timestamp com timezone UTC
    Timestamp(DateTime<Utc>),
}

impl Eq for DataValue {}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        match (self, other) {
            (DataValue::Null, DataValue::Null) => Ordering::Equal,
            (DataValue::Null, _) => Ordering::Less,
            (_, DataValue::Null) => Ordering::Greater,

            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.cmp(b),
            (DataValue::Boolean(_), _) => Ordering::Less,
            (_, DataValue::Boolean(_)) => Ordering::Greater,

            (DataValue::Integer(a), DataValue::Integer(b)) => a.cmp(b),
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64)
                .partial_cmp(b)
                .unwrap_or(Ordering::Equal),
            (DataValue::Integer(_), _) => Ordering::Less,

            (DataValue::Float(a), DataValue::Integer(b)) => a
                .partial_cmp(&(*b as f64))
                .unwrap_or(Ordering::Equal),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (DataValue::Float(_), _) => Ordering::Less,

            (DataValue::String(a), DataValue::String(b)) => a.cmp(b),
            (DataValue::String(_), DataValue::Integer(_)) | (DataValue::String(_), DataValue::Float(_)) => {
                Ordering::Greater
            }
            (DataValue::String(_), _) => Ordering::Less,

            (DataValue::Date(a), DataValue::Date(b)) => a.cmp(b),
            (DataValue::Date(_), DataValue::Timestamp(_)) => Ordering::Less,
            (DataValue::Date(_), _) => Ordering::Greater,

            (DataValue::Timestamp(a), DataValue::Timestamp(b)) => a.cmp(b),
            (DataValue::Timestamp(_), _) => Ordering::Greater,
        }
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Integer(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Boolean(value)
    }
}

impl From<NaiveDate> for DataValue {
    fn from(value: NaiveDate) -> Self {
        DataValue::Date(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Timestamp(value)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DataValue::Null)
    }
}

impl DataValue {
    /// Converte para string se possível
    pub fn as_string(&self) -> Option<String> {
        match self {
            DataValue::String(s) => Some(s.clone()),
            DataValue::Integer(i) => Some(i.to_string()),
            DataValue::Float(f) => Some(f.to_string()),
            DataValue::Boolean(b) => Some(b.to_string()),
            DataValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            DataValue::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%:z").to_string()),
            DataValue::Null => None,
        }
    }

    /// Converte para inteiro se possível
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            DataValue::String(s) => s.trim().parse().ok(),
            DataValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            DataValue::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Converte para float se possível
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) if !f.is_nan() => Some(*f),
            DataValue::Integer(i) => Some(*i as f64),
            DataValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    /// Interpreta os tokens booleanos `0`, `1`, `true` e `false` (sem diferenciar maiúsculas)
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            DataValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            DataValue::Integer(0) => Some(false),
            DataValue::Integer(1) => Some(true),
            _ => None,
        }
    }

    /// Verifica se é nulo (NaN também conta como ausente)
    pub fn is_null(&self) -> bool {
        match self {
            DataValue::Null => true,
            DataValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Tipo em memória deste valor
    pub fn value_type(&self) -> ValueType {
        match self {
            _ if self.is_null() => ValueType::Empty,
            DataValue::String(_) => ValueType::String,
            DataValue::Integer(_) => ValueType::Integer,
            DataValue::Float(_) => ValueType::Float,
            DataValue::Boolean(_) => ValueType::Boolean,
            DataValue::Date(_) => ValueType::Date,
            DataValue::Timestamp(_) => ValueType::Timestamp,
            DataValue::Null => ValueType::Empty,
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_string() {
            Some(s) if !self.is_null() => write!(f, "{}", s),
            _ => write!(f, "null"),
        }
    }
}

/// Tipo em memória de uma coluna, inferido a partir das células não nulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
    String,
    Date,
    Timestamp,
    /// Coluna sem nenhum valor presente
    Empty,
    /// Células de tipos diferentes
    Mixed,
}

impl ValueType {
    /// Infere o tipo de uma coluna. Inteiros misturados com floats resultam em `Float`.
    pub fn of_column(values: &[DataValue]) -> Self {
        values.iter().fold(ValueType::Empty, |acc, value| {
            match (acc, value.value_type()) {
                (acc, ValueType::Empty) => acc,
                (ValueType::Empty, current) => current,
                (ValueType::Integer, ValueType::Float) | (ValueType::Float, ValueType::Integer) => ValueType::Float,
                (acc, current) if acc == current => acc,
                _ => ValueType::Mixed,
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
            ValueType::Date => "date",
            ValueType::Timestamp => "timestamp",
            ValueType::Empty => "empty",
            ValueType::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resultado de uma importação de tabela
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub table: String,
    pub rows_staged: usize,
    pub rows_deleted: u64,
    pub rows_inserted: u64,
    pub batches_flushed: usize,
    pub statements_executed: usize,
    pub dry_run: bool,
    pub execution_time_ms: u64,
}

impl ImportReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// Estados de uma importação
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportState {
    #[default]
    Idle,
    Loaded,
    Preprocessed,
    ColumnsResolved,
    Validated,
    Committed,
    Aborted(String),
}

impl std::fmt::Display for ImportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportState::Idle => write!(f, "Ocioso"),
            ImportState::Loaded => write!(f, "Carregado"),
            ImportState::Preprocessed => write!(f, "Pré-processado"),
            ImportState::ColumnsResolved => write!(f, "Colunas resolvidas"),
            ImportState::Validated => write!(f, "Validado"),
            ImportState::Committed => write!(f, "Gravado"),
            ImportState::Aborted(reason) => write!(f, "Cancelado: {}", reason),
        }
    }
}

/// Eventos da importação para monitoramento externo
#[derive(Debug, Clone)]
pub enum ImportEvent {
    /// Importação iniciada
    Started {
        table: String,
        timestamp: std::time::SystemTime,
    },
    /// Estado alterado
    StateChanged {
        table: String,
        old_state: ImportState,
        new_state: ImportState,
        timestamp: std::time::SystemTime,
    },
    /// Lote gravado no destino
    BatchFlushed {
        table: String,
        batch_number: usize,
        statements: usize,
        timestamp: std::time::SystemTime,
    },
    /// Erro ocorreu
    Error {
        table: String,
        error: String,
        timestamp: std::time::SystemTime,
    },
    /// Importação concluída
    Completed {
        table: String,
        report: ImportReport,
        timestamp: std::time::SystemTime,
    },
}
