//! Leitura da estrutura das tabelas de destino.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{LoadError, Result};
use crate::schema::{ColumnDef, TableRef, TargetSchema};
use crate::traits::SchemaIntrospector;

/// Introspecção a partir de estruturas mantidas em memória.
///
/// Útil em testes e em execuções sem banco.
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaIntrospector {
    tables: HashMap<TableRef, Vec<ColumnDef>>,
}

impl MemorySchemaIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra a estrutura de uma tabela
    pub fn with_table(mut self, table: TableRef, columns: Vec<ColumnDef>) -> Self {
        self.tables.insert(table, columns);
        self
    }
}

#[async_trait]
impl SchemaIntrospector for MemorySchemaIntrospector {
    async fn table_schema(&self, table: &TableRef) -> Result<TargetSchema> {
        match self.tables.get(table) {
            Some(columns) if !columns.is_empty() => Ok(TargetSchema::new(table.clone(), columns.clone())),
            _ => Err(LoadError::UnknownTableStructure {
                schema: table.schema.clone(),
                table: table.name.clone(),
            }
            .into()),
        }
    }
}

#[cfg(feature = "database")]
pub use postgres::PgSchemaIntrospector;

#[cfg(feature = "database")]
mod postgres {
    use super::*;
    use sqlx::postgres::PgPool;
    use sqlx::Row;

    const COLUMNS_QUERY: &str = "SELECT column_name::text, data_type::text, is_nullable::text \
         FROM information_schema.columns \
         WHERE table_name = $1 AND table_schema = $2 \
         ORDER BY ordinal_position";

    /// Introspecção via `information_schema` do PostgreSQL
    #[derive(Debug, Clone)]
    pub struct PgSchemaIntrospector {
        pool: PgPool,
    }

    impl PgSchemaIntrospector {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl SchemaIntrospector for PgSchemaIntrospector {
        async fn table_schema(&self, table: &TableRef) -> Result<TargetSchema> {
            let rows = sqlx::query(COLUMNS_QUERY)
                .bind(&table.name)
                .bind(&table.schema)
                .fetch_all(&self.pool)
                .await?;

            if rows.is_empty() {
                return Err(LoadError::UnknownTableStructure {
                    schema: table.schema.clone(),
                    table: table.name.clone(),
                }
                .into());
            }

            let mut columns = Vec::with_capacity(rows.len());
            for row in rows {
                let name: String = row.try_get(0)?;
                let declared_type: String = row.try_get(1)?;
                let is_nullable: String = row.try_get(2)?;
                columns.push(ColumnDef::new(name, declared_type, is_nullable.eq_ignore_ascii_case("YES")));
            }

            tracing::debug!(table = %table, columns = columns.len(), "Estrutura da tabela lida");
            Ok(TargetSchema::new(table.clone(), columns))
        }
    }
}
