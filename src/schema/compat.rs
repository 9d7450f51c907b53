//! Tabela de compatibilidade entre tipos de destino e tipos em memória.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::schema::{CanonicalType, ColumnDef};
use crate::types::ValueType;

/// Para cada tipo canônico, os tipos em memória aceitos na carga.
///
/// Colunas sem nenhum valor (`ValueType::Empty`) são aceitas por qualquer tipo.
#[derive(Debug, Clone)]
pub struct TypeCompatibilityMatrix {
    accepted: HashMap<CanonicalType, Vec<ValueType>>,
}

impl Default for TypeCompatibilityMatrix {
    fn default() -> Self {
        let mut accepted = HashMap::new();
        accepted.insert(CanonicalType::Int, vec![ValueType::Integer, ValueType::Float]);
        accepted.insert(CanonicalType::Text, vec![ValueType::String]);
        accepted.insert(CanonicalType::Varying, vec![ValueType::String]);
        accepted.insert(CanonicalType::Bool, vec![ValueType::Boolean]);
        accepted.insert(CanonicalType::Date, vec![ValueType::Date, ValueType::Timestamp]);
        accepted.insert(CanonicalType::TimestampTz, vec![ValueType::Timestamp]);
        Self { accepted }
    }
}

impl TypeCompatibilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tipos aceitos para um tipo canônico
    pub fn accepted(&self, canonical: CanonicalType) -> &[ValueType] {
        self.accepted.get(&canonical).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_compatible(&self, canonical: CanonicalType, actual: ValueType) -> bool {
        actual == ValueType::Empty || self.accepted(canonical).contains(&actual)
    }

    /// Verifica se os valores de `column` podem ser gravados na coluna de destino
    pub fn check(&self, column: &str, target: &ColumnDef, actual: ValueType) -> Result<(), ValidationError> {
        let canonical = target.canonical_type().ok_or_else(|| ValidationError::UnknownDbType {
            column: column.to_string(),
            declared: target.declared_type.clone(),
        })?;

        if self.is_compatible(canonical, actual) {
            Ok(())
        } else {
            Err(ValidationError::TypeMismatch {
                column: column.to_string(),
                declared: target.declared_type.clone(),
                canonical: canonical.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn representative(canonical: CanonicalType) -> (&'static str, Vec<ValueType>, Vec<ValueType>) {
        match canonical {
            CanonicalType::Int => ("integer", vec![ValueType::Integer, ValueType::Float], vec![ValueType::String, ValueType::Boolean]),
            CanonicalType::Text => ("text", vec![ValueType::String], vec![ValueType::Integer, ValueType::Mixed]),
            CanonicalType::Varying => ("character varying", vec![ValueType::String], vec![ValueType::Timestamp]),
            CanonicalType::Bool => ("boolean", vec![ValueType::Boolean], vec![ValueType::String, ValueType::Integer]),
            CanonicalType::Date => ("date", vec![ValueType::Date, ValueType::Timestamp], vec![ValueType::Integer]),
            CanonicalType::TimestampTz => ("timestamp with time zone", vec![ValueType::Timestamp], vec![ValueType::Date, ValueType::Float]),
        }
    }

    #[test]
    fn test_every_canonical_type_accepts_and_rejects() {
        let matrix = TypeCompatibilityMatrix::new();
        let all = [
            CanonicalType::Int,
            CanonicalType::Text,
            CanonicalType::Varying,
            CanonicalType::Bool,
            CanonicalType::Date,
            CanonicalType::TimestampTz,
        ];

        for canonical in all {
            let (declared, good, bad) = representative(canonical);
            let def = ColumnDef::new("c", declared, true);
            for actual in good.into_iter().chain([ValueType::Empty]) {
                assert!(matrix.check("c", &def, actual).is_ok(), "{} / {}", declared, actual);
            }
            for actual in bad {
                match matrix.check("c", &def, actual) {
                    Err(ValidationError::TypeMismatch { column, declared: d, canonical: c, actual: a }) => {
                        assert_eq!(column, "c");
                        assert_eq!(d, declared);
                        assert_eq!(c, canonical.to_string());
                        assert_eq!(a, actual.to_string());
                    }
                    other => panic!("esperado TypeMismatch para {} / {}: {:?}", declared, actual, other),
                }
            }
        }
    }

    #[test]
    fn test_unknown_declared_type() {
        let matrix = TypeCompatibilityMatrix::new();
        let def = ColumnDef::new("payload", "jsonb", true);
        assert!(matches!(
            matrix.check("payload", &def, ValueType::String),
            Err(ValidationError::UnknownDbType { .. })
        ));
    }
}
