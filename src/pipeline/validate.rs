//! Validação das colunas resolvidas contra a tabela de destino.

use std::collections::HashSet;

use crate::dataset::Dataset;
use crate::error::{ValidationError, ValidationReport};
use crate::load::LoadColumn;
use crate::schema::{TargetSchema, TypeCompatibilityMatrix};
use crate::types::ValueType;

/// Verifica as colunas de carga e acumula todos os problemas encontrados.
///
/// `failures` traz as falhas de conversão da resolução, que entram no mesmo
/// relatório.
pub fn validate_columns(
    columns: &[LoadColumn],
    dataset: &Dataset,
    schema: &TargetSchema,
    matrix: &TypeCompatibilityMatrix,
    failures: Vec<ValidationError>,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    let mut targets = HashSet::new();

    for column in columns {
        let target = column.target();
        let label = column.source().unwrap_or(target);

        if !targets.insert(target) {
            report.push(ValidationError::DuplicateTarget {
                target: target.to_string(),
                source_column: label.to_string(),
            });
            continue;
        }

        let Some(def) = schema.get(target) else {
            report.push(ValidationError::UnknownTargetColumn {
                target: target.to_string(),
                table: schema.table.to_string(),
            });
            continue;
        };

        let actual = match column {
            LoadColumn::Column { source, .. } => dataset
                .column(source)
                .map(|c| c.value_type())
                .unwrap_or(ValueType::Empty),
            LoadColumn::Constant { value, .. } => value.value_type(),
        };
        if let Err(error) = matrix.check(label, def, actual) {
            report.push(error);
        }
    }

    for error in failures {
        report.push(error);
    }

    for required in schema.required_columns() {
        if !targets.contains(required.name.as_str()) {
            report.push(ValidationError::MissingRequiredColumn {
                column: required.name.clone(),
                table: schema.table.to_string(),
            });
        }
    }

    if !report.is_empty() {
        tracing::debug!(errors = report.len(), "Validação encontrou problemas");
    }
    report
}
