//! Carga atômica com substituição de partição.
//!
//! 1. recria a tabela de staging `<schema>.<tabela><sufixo>` com a estrutura do destino;
//! 2. prepara um `INSERT` com exatamente as colunas resolvidas;
//! 3. envia um `EXECUTE` por linha, em lotes;
//! 4. remove do destino as linhas no intervalo `[min, max]` da coluna de partição;
//! 5. copia o staging para o destino.
//!
//! Cada lote é uma transação; não há transação envolvendo a carga inteira.
//! Se um lote falhar, os anteriores permanecem no staging e o destino não é tocado.

use std::time::{Instant, SystemTime};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::load::batch::BatchExecutor;
use crate::load::statement::{FetchMode, Statement};
use crate::load::{LoadColumn, LoadOptions, ROW_ID_COLUMN};
use crate::schema::{TableRef, TargetSchema};
use crate::traits::{EventEmitter, Executor};
use crate::types::{DataValue, ImportEvent, ImportReport};

/// Nome do plano preparado para a tabela de destino
pub fn plan_name(table: &TableRef, staging_suffix: &str) -> String {
    format!("{}{}_insert", table.name, staging_suffix)
}

/// Executa o algoritmo de carga sobre um [`Executor`]
pub struct AtomicLoader<'a> {
    executor: &'a dyn Executor,
    events: &'a dyn EventEmitter,
    options: &'a LoadOptions,
}

impl<'a> AtomicLoader<'a> {
    pub fn new(executor: &'a dyn Executor, events: &'a dyn EventEmitter, options: &'a LoadOptions) -> Self {
        Self {
            executor,
            events,
            options,
        }
    }

    pub async fn load(&self, target: &TargetSchema, dataset: &Dataset, columns: &[LoadColumn]) -> Result<ImportReport> {
        let start = Instant::now();
        let dest = &target.table;
        let staging = dest.with_suffix(&self.options.staging_suffix);
        let plan = plan_name(dest, &self.options.staging_suffix);

        let mut report = ImportReport::new(dest.to_string());
        report.dry_run = self.executor.is_dry_run();
        let mut statements = 0;

        tracing::info!(staging = %staging, "Criando tabela de staging");
        self.executor.execute(&Statement::drop_table_if_exists(&staging)).await?;
        self.executor.execute(&Statement::create_table_like(&staging, dest)).await?;
        let targets: Vec<&str> = columns.iter().map(LoadColumn::target).collect();
        self.executor
            .execute(&Statement::prepare_insert(&plan, &staging, &targets))
            .await?;
        statements += 3;

        let mut batch = BatchExecutor::new(self.executor, self.options.batch_size);
        let mut shown = 0;
        for row in 0..dataset.row_count() {
            let values: Vec<DataValue> = columns.iter().map(|c| c.value_at(dataset, row)).collect();
            let statement = Statement::execute_plan(&plan, &values);

            if self.should_show(dataset, row, &mut shown) {
                print_row(dataset, row);
                println!("{}", statement);
            }

            if let Some(batch_number) = batch.append(statement).await? {
                self.batch_flushed(dest, batch_number, self.options.batch_size + 1).await?;
            }
        }
        let pending = batch.pending();
        let stats = batch.finish().await?;
        if pending > 0 {
            self.batch_flushed(dest, stats.batches_flushed, pending).await?;
        }
        statements += stats.statements_executed;
        report.rows_staged = dataset.row_count();
        report.batches_flushed = stats.batches_flushed;

        let staged = self
            .executor
            .fetch(&Statement::count_rows(&staging), FetchMode::One)
            .await?;
        statements += 1;
        if let Some(count) = staged.first().and_then(|r| r.first()).and_then(DataValue::as_integer) {
            if count as usize != dataset.row_count() {
                tracing::warn!(staged = count, expected = dataset.row_count(), "Número de linhas em staging diverge");
            }
        }

        self.executor.execute(&Statement::deallocate(&plan)).await?;
        statements += 1;

        match partition_bounds(dataset, columns, &self.options.partition_column) {
            Some((min, max)) => {
                tracing::info!(column = %self.options.partition_column, %min, %max, "Substituindo partição");
                report.rows_deleted = self
                    .executor
                    .execute(&Statement::delete_range(dest, &self.options.partition_column, &min, &max))
                    .await?;
                statements += 1;
            }
            None => {
                tracing::warn!(
                    column = %self.options.partition_column,
                    table = %dest,
                    "Coluna de partição sem valores carregados, remoção de intervalo ignorada"
                );
            }
        }

        report.rows_inserted = self
            .executor
            .execute(&Statement::insert_select_all(dest, &staging))
            .await?;
        statements += 1;

        if !self.options.keep_staging {
            self.executor.execute(&Statement::drop_table_if_exists(&staging)).await?;
            statements += 1;
        }

        report.statements_executed = statements;
        report.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    fn should_show(&self, dataset: &Dataset, row: usize, shown: &mut usize) -> bool {
        let mut show = false;
        if *shown < self.options.show_batch_count {
            *shown += 1;
            show = true;
        }
        if let Some(row_id) = self.options.show_batch_row {
            show |= dataset.value(ROW_ID_COLUMN, row).and_then(DataValue::as_integer) == Some(row_id);
        }
        show
    }

    async fn batch_flushed(&self, table: &TableRef, batch_number: usize, statements: usize) -> Result<()> {
        self.events
            .emit(ImportEvent::BatchFlushed {
                table: table.to_string(),
                batch_number,
                statements,
                timestamp: SystemTime::now(),
            })
            .await
    }
}

/// Menor e maior valor da coluna de partição entre as linhas carregadas
pub fn partition_bounds(dataset: &Dataset, columns: &[LoadColumn], partition_column: &str) -> Option<(DataValue, DataValue)> {
    let column = columns.iter().find(|c| c.target() == partition_column)?;
    let values = (0..dataset.row_count())
        .map(|row| column.value_at(dataset, row))
        .filter(|v| !v.is_null());

    values.fold(None, |bounds, value| match bounds {
        None => Some((value.clone(), value)),
        Some((min, max)) => Some((
            if value < min { value.clone() } else { min },
            if value > max { value } else { max },
        )),
    })
}

fn print_row(dataset: &Dataset, row: usize) {
    let cells: Vec<String> = dataset
        .row(row)
        .into_iter()
        .map(|(name, value)| format!("'{}': {}", name, value))
        .collect();
    println!("{{{}}}", cells.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventEmitter;
    use crate::load::executor::{DryRunExecutor, MemoryExecutor};
    use crate::schema::ColumnDef;
    use chrono::DateTime;

    fn target() -> TargetSchema {
        TargetSchema::new(
            TableRef::new("survey", "weekly"),
            vec![
                ColumnDef::new("q1", "integer", true),
                ColumnDef::new("timestamp", "timestamp with time zone", false),
            ],
        )
    }

    fn dataset() -> Dataset {
        let ts = |s| DataValue::Timestamp(DateTime::from_timestamp(s, 0).unwrap());
        Dataset::from_rows(
            vec!["Q1".to_string(), "timestamp".to_string()],
            vec![
                vec![DataValue::Float(1.0), ts(300)],
                vec![DataValue::Null, ts(100)],
                vec![DataValue::Float(3.0), ts(200)],
            ],
        )
    }

    fn columns() -> Vec<LoadColumn> {
        vec![
            LoadColumn::column("Q1", "q1", Some(crate::transform::ConversionKind::Int)),
            LoadColumn::column("timestamp", "timestamp", None),
            LoadColumn::constant("season", DataValue::Integer(2024)),
        ]
    }

    fn sql(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(Statement::sql).collect()
    }

    #[tokio::test]
    async fn test_load_sequence() {
        let executor = MemoryExecutor::new();
        let events = InMemoryEventEmitter::new();
        let options = LoadOptions {
            batch_size: 2,
            ..LoadOptions::default()
        };

        let report = AtomicLoader::new(&executor, &events, &options)
            .load(&target(), &dataset(), &columns())
            .await
            .unwrap();

        let executed = executor.executed().await;
        assert_eq!(
            sql(&executed),
            vec![
                r#"DROP TABLE IF EXISTS "survey"."weekly_import""#,
                r#"CREATE TABLE "survey"."weekly_import" (LIKE "survey"."weekly")"#,
                r#"PREPARE "weekly_import_insert" AS INSERT INTO "survey"."weekly_import"("q1","timestamp","season") VALUES ($1,$2,$3)"#,
                r#"EXECUTE "weekly_import_insert"(1,'1970-01-01T00:05:00+00:00',2024)"#,
                r#"EXECUTE "weekly_import_insert"(NULL,'1970-01-01T00:01:40+00:00',2024)"#,
                r#"EXECUTE "weekly_import_insert"(3,'1970-01-01T00:03:20+00:00',2024)"#,
                r#"DEALLOCATE "weekly_import_insert""#,
                r#"DELETE FROM "survey"."weekly" WHERE "timestamp" >= '1970-01-01T00:01:40+00:00' AND "timestamp" <= '1970-01-01T00:05:00+00:00'"#,
                r#"INSERT INTO "survey"."weekly" SELECT * FROM "survey"."weekly_import""#,
                r#"DROP TABLE IF EXISTS "survey"."weekly_import""#,
            ]
        );

        assert_eq!(report.rows_staged, 3);
        assert_eq!(report.batches_flushed, 1);
        assert_eq!(report.statements_executed, 11);
        assert!(!report.dry_run);
        assert_eq!(events.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_generates_same_text() {
        let memory = MemoryExecutor::new();
        let dry = DryRunExecutor::new().quiet();
        let events = InMemoryEventEmitter::new();
        let options = LoadOptions::default();

        AtomicLoader::new(&memory, &events, &options)
            .load(&target(), &dataset(), &columns())
            .await
            .unwrap();
        let report = AtomicLoader::new(&dry, &events, &options)
            .load(&target(), &dataset(), &columns())
            .await
            .unwrap();

        let real: Vec<Statement> = memory.executed().await;
        let simulated: Vec<Statement> = dry
            .statements()
            .await
            .into_iter()
            .filter(|s| !s.sql().starts_with("SELECT"))
            .collect();
        assert_eq!(real, simulated);
        assert!(report.dry_run);
        assert_eq!(report.rows_deleted, 0);
        assert_eq!(report.rows_inserted, 0);
    }

    #[tokio::test]
    async fn test_missing_partition_column_skips_delete() {
        let executor = MemoryExecutor::new();
        let events = InMemoryEventEmitter::new();
        let options = LoadOptions {
            partition_column: "submitted".to_string(),
            keep_staging: true,
            ..LoadOptions::default()
        };

        AtomicLoader::new(&executor, &events, &options)
            .load(&target(), &dataset(), &columns())
            .await
            .unwrap();

        let executed = executor.executed().await;
        assert!(executed.iter().all(|s| !s.sql().starts_with("DELETE")));
        assert!(executed.last().unwrap().sql().starts_with("INSERT INTO"));
    }

    #[tokio::test]
    async fn test_batch_failure_stops_before_destination() {
        let executor = MemoryExecutor::new().fail_on("(3,");
        let events = InMemoryEventEmitter::new();
        let options = LoadOptions {
            batch_size: 1,
            ..LoadOptions::default()
        };

        let err = AtomicLoader::new(&executor, &events, &options)
            .load(&target(), &dataset(), &columns())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "BATCH_EXECUTION_ERROR");

        let executed = executor.executed().await;
        assert_eq!(executed.iter().filter(|s| s.sql().starts_with("EXECUTE")).count(), 2);
        assert!(executed.iter().all(|s| !s.sql().starts_with("DELETE")));
    }

    #[test]
    fn test_partition_bounds() {
        let bounds = partition_bounds(&dataset(), &columns(), "timestamp").unwrap();
        assert_eq!(bounds.0, DataValue::Timestamp(DateTime::from_timestamp(100, 0).unwrap()));
        assert_eq!(bounds.1, DataValue::Timestamp(DateTime::from_timestamp(300, 0).unwrap()));

        assert_eq!(
            partition_bounds(&dataset(), &columns(), "season"),
            Some((DataValue::Integer(2024), DataValue::Integer(2024)))
        );
        assert_eq!(partition_bounds(&dataset(), &columns(), "other"), None);
    }
}
