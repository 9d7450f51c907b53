//! Resolução das colunas do dataset em colunas de carga.

use crate::dataset::Dataset;
use crate::error::ValidationError;
use crate::load::{LoadColumn, ROW_ID_COLUMN};
use crate::profile::TableDefinition;
use crate::schema::TargetSchema;
use crate::transform::{auto_convert_type, convert};

/// Nome dado pelo exportador à coluna de índice sem cabeçalho
pub const UNNAMED_INDEX_COLUMN: &str = "Unnamed: 0";

/// Colunas do exportador que nunca são carregadas
pub const AUTO_IGNORED_COLUMNS: [&str; 3] = ["engineVersion", "language", ROW_ID_COLUMN];

/// Colunas a carregar e falhas de conversão encontradas no caminho
#[derive(Debug, Default)]
pub struct Resolution {
    pub columns: Vec<LoadColumn>,
    pub failures: Vec<ValidationError>,
}

/// Renomeia a coluna de índice para `_rowid` quando ela é a primeira do arquivo
pub fn promote_row_id(dataset: &mut Dataset) {
    let leading = dataset.columns().first().map(|c| c.name == UNNAMED_INDEX_COLUMN);
    if leading == Some(true) && !dataset.has_column(ROW_ID_COLUMN) {
        if let Some(column) = dataset.column_mut(UNNAMED_INDEX_COLUMN) {
            column.name = ROW_ID_COLUMN.to_string();
            tracing::debug!("Coluna de índice renomeada para {}", ROW_ID_COLUMN);
        }
    }
}

/// Aplica as regras do perfil a cada coluna, convertendo os valores no lugar.
///
/// A conversão vem da regra ou, sem ela, do tipo declarado da coluna de
/// destino com o mesmo nome. Valores de época inválidos não interrompem a
/// resolução; vão para [`Resolution::failures`].
pub fn resolve_columns(definition: &TableDefinition, dataset: &mut Dataset, schema: &TargetSchema) -> Resolution {
    let mut resolution = Resolution::default();

    for name in dataset.column_names() {
        if AUTO_IGNORED_COLUMNS.contains(&name.as_str()) {
            continue;
        }

        let rule = definition.rule_for(&name).cloned().unwrap_or_default();
        if rule.ignore {
            tracing::debug!(column = %name, "Coluna ignorada");
            continue;
        }

        let target = rule.rename.clone().unwrap_or_else(|| name.clone());
        let kind = rule
            .to
            .or_else(|| schema.get(&target).and_then(|c| auto_convert_type(&c.declared_type)));

        if let Some(kind) = kind {
            if let Some(column) = dataset.column_mut(&name) {
                let values = std::mem::take(&mut column.values);
                let conversion = convert(values, kind);
                column.values = conversion.values;

                if !conversion.failures.is_empty() {
                    tracing::warn!(column = %name, %kind, failures = conversion.failures.len(), "Valores não convertidos");
                }
                resolution
                    .failures
                    .extend(conversion.failures.into_iter().map(|value| ValidationError::Conversion {
                        column: name.clone(),
                        kind: kind.to_string(),
                        value: value.to_string(),
                    }));
            }
            tracing::debug!(column = %name, target = %target, %kind, "Coluna convertida");
        }

        resolution.columns.push(LoadColumn::column(name, target, kind));
    }

    for (target, value) in &definition.constants {
        resolution.columns.push(LoadColumn::constant(target.clone(), value.clone()));
    }

    resolution
}
