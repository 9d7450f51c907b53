//! # Conversão de tipos
//!
//! Conversões aplicadas às colunas depois do pré-processamento, escolhidas pela
//! regra da coluna ou inferidas a partir do tipo declarado no destino.
//!
//! Política de coerção: valores que não podem ser lidos como número em uma
//! conversão `int` viram nulo, sem erro. Nas conversões de época (`timestamp`,
//! `date`, `month-year`) os valores inválidos são devolvidos em
//! [`Conversion::failures`] para entrar no relatório de validação.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::CanonicalType;
use crate::types::DataValue;

/// Tipos de conversão aceitos no perfil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionKind {
    Int,
    Bool,
    Date,
    Timestamp,
    Str,
    MonthYear,
}

impl ConversionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConversionKind::Int => "int",
            ConversionKind::Bool => "bool",
            ConversionKind::Date => "date",
            ConversionKind::Timestamp => "timestamp",
            ConversionKind::Str => "str",
            ConversionKind::MonthYear => "month-year",
        }
    }
}

impl FromStr for ConversionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(ConversionKind::Int),
            "bool" => Ok(ConversionKind::Bool),
            "date" => Ok(ConversionKind::Date),
            "timestamp" => Ok(ConversionKind::Timestamp),
            "str" => Ok(ConversionKind::Str),
            "month-year" => Ok(ConversionKind::MonthYear),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Conversão padrão para um tipo declarado no destino
pub fn auto_convert_type(declared_type: &str) -> Option<ConversionKind> {
    match CanonicalType::normalize(declared_type)? {
        CanonicalType::Int => Some(ConversionKind::Int),
        CanonicalType::TimestampTz => Some(ConversionKind::Timestamp),
        CanonicalType::Date => Some(ConversionKind::Date),
        CanonicalType::Bool => Some(ConversionKind::Bool),
        CanonicalType::Text | CanonicalType::Varying => Some(ConversionKind::Str),
    }
}

/// Resultado da conversão de uma coluna
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub values: Vec<DataValue>,
    /// Valores originais que não puderam ser convertidos
    pub failures: Vec<DataValue>,
}

/// Converte os valores de uma coluna
pub fn convert(values: Vec<DataValue>, kind: ConversionKind) -> Conversion {
    let mut failures = Vec::new();
    let values = values
        .into_iter()
        .map(|value| {
            if value.is_null() {
                return DataValue::Null;
            }
            let converted = convert_value(&value, kind);
            if converted.is_null() && kind.is_strict() {
                failures.push(value);
            }
            converted
        })
        .collect();

    Conversion { values, failures }
}

impl ConversionKind {
    /// Conversões em que um valor inválido deve ser reportado
    fn is_strict(&self) -> bool {
        matches!(self, ConversionKind::Timestamp | ConversionKind::Date | ConversionKind::MonthYear)
    }
}

fn convert_value(value: &DataValue, kind: ConversionKind) -> DataValue {
    match kind {
        ConversionKind::Int => to_numeric(value),
        ConversionKind::Timestamp => epoch(value).map(DataValue::Timestamp).unwrap_or(DataValue::Null),
        ConversionKind::Date => epoch(value)
            .map(|ts| DataValue::Date(ts.date_naive()))
            .unwrap_or(DataValue::Null),
        ConversionKind::Bool => to_boolean(value),
        ConversionKind::Str => value.as_string().map(DataValue::String).unwrap_or(DataValue::Null),
        ConversionKind::MonthYear => epoch(value)
            .map(|ts| DataValue::String(ts.format("%Y-%m").to_string()))
            .unwrap_or(DataValue::Null),
    }
}

/// Coerção numérica: inteiros ficam inteiros, frações ficam float, o resto vira nulo
fn to_numeric(value: &DataValue) -> DataValue {
    match value {
        DataValue::Integer(i) => DataValue::Integer(*i),
        DataValue::Float(f) if f.is_finite() => DataValue::Float(*f),
        DataValue::Boolean(b) => DataValue::Integer(i64::from(*b)),
        DataValue::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                DataValue::Integer(i)
            } else {
                match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => DataValue::Float(f),
                    _ => DataValue::Null,
                }
            }
        }
        _ => DataValue::Null,
    }
}

/// Segundos desde a época POSIX
fn epoch(value: &DataValue) -> Option<DateTime<Utc>> {
    match value {
        DataValue::Timestamp(ts) => Some(*ts),
        DataValue::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        DataValue::Float(_) | DataValue::String(_) => {
            let secs = value.as_float()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        }
        _ => None,
    }
}

fn to_boolean(value: &DataValue) -> DataValue {
    match value {
        DataValue::Boolean(b) => DataValue::Boolean(*b),
        DataValue::Integer(i) => DataValue::Boolean(*i != 0),
        DataValue::Float(f) => DataValue::Boolean(*f != 0.0),
        DataValue::String(s) => match value.as_boolean() {
            Some(b) => DataValue::Boolean(b),
            None => DataValue::Boolean(!s.is_empty()),
        },
        DataValue::Date(_) | DataValue::Timestamp(_) => DataValue::Boolean(true),
        DataValue::Null => DataValue::Null,
    }
}
