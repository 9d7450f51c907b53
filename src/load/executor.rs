//! # Executores
//!
//! Implementações de [`Executor`]:
//!
//! - `PgExecutor`: conexão única com o PostgreSQL (o `PREPARE` vale por sessão);
//! - [`DryRunExecutor`]: imprime cada comando e não executa nada;
//! - [`MemoryExecutor`]: registra os comandos em memória, para testes.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{ETLError, LoadError, Result};
use crate::load::statement::{FetchMode, Statement};
use crate::traits::Executor;
use crate::types::DataValue;

#[cfg(feature = "database")]
pub use postgres::PgExecutor;

/// Executor de simulação: imprime os comandos e informa zero linhas afetadas
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor {
    statements: Arc<Mutex<Vec<Statement>>>,
    quiet: bool,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Não imprime os comandos, apenas os registra
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Comandos recebidos, na ordem
    pub async fn statements(&self) -> Vec<Statement> {
        self.statements.lock().await.clone()
    }

    async fn record(&self, statement: &Statement) {
        if !self.quiet {
            println!("{}", statement);
        }
        self.statements.lock().await.push(statement.clone());
    }
}

#[async_trait]
impl Executor for DryRunExecutor {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.record(statement).await;
        Ok(0)
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        for statement in statements {
            self.record(statement).await;
        }
        Ok(0)
    }

    async fn fetch(&self, statement: &Statement, _mode: FetchMode) -> Result<Vec<Vec<DataValue>>> {
        self.record(statement).await;
        Ok(Vec::new())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    batches: Vec<Vec<Statement>>,
    fetch_results: Vec<Vec<Vec<DataValue>>>,
}

/// Executor em memória que acumula os comandos recebidos.
///
/// Cada `execute` isolado conta como um lote de um comando. Com
/// [`MemoryExecutor::fail_on`], o primeiro comando que contiver o trecho dado
/// faz o lote falhar sem registrar nenhum comando dele.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    state: Arc<Mutex<MemoryState>>,
    fail_on: Option<String>,
    affected_per_statement: u64,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self {
            affected_per_statement: 1,
            ..Self::default()
        }
    }

    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    /// Resultado devolvido pelo próximo `fetch`
    pub async fn push_fetch_result(&self, rows: Vec<Vec<DataValue>>) {
        self.state.lock().await.fetch_results.push(rows);
    }

    /// Lotes gravados
    pub async fn batches(&self) -> Vec<Vec<Statement>> {
        self.state.lock().await.batches.clone()
    }

    /// Todos os comandos gravados, na ordem
    pub async fn executed(&self) -> Vec<Statement> {
        self.state.lock().await.batches.iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.execute_batch(std::slice::from_ref(statement)).await
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
        if let Some(fragment) = &self.fail_on {
            if let Some(index) = statements.iter().position(|s| s.sql().contains(fragment.as_str())) {
                return Err(ETLError::Load(LoadError::BatchExecution {
                    index: index + 1,
                    statement: statements[index].sql().to_string(),
                    cause: "falha simulada".to_string(),
                }));
            }
        }
        self.state.lock().await.batches.push(statements.to_vec());
        Ok(self.affected_per_statement * statements.len() as u64)
    }

    async fn fetch(&self, _statement: &Statement, mode: FetchMode) -> Result<Vec<Vec<DataValue>>> {
        let mut state = self.state.lock().await;
        let mut rows = if state.fetch_results.is_empty() {
            Vec::new()
        } else {
            state.fetch_results.remove(0)
        };
        if mode == FetchMode::One {
            rows.truncate(1);
        }
        Ok(rows)
    }
}

#[cfg(feature = "database")]
mod postgres {
    use super::*;
    use sqlx::postgres::{PgConnection, PgRow};
    use sqlx::{Column, Connection, Row, TypeInfo};
    use std::time::Duration;

    /// Executor PostgreSQL sobre uma única conexão.
    ///
    /// Os comandos são enviados como texto simples; cada lote roda em uma
    /// transação própria.
    pub struct PgExecutor {
        conn: Mutex<PgConnection>,
    }

    impl PgExecutor {
        pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
            let conn = tokio::time::timeout(timeout, PgConnection::connect(url))
                .await
                .map_err(|_| {
                    ETLError::Load(LoadError::DestinationConnection(format!(
                        "tempo esgotado após {}s",
                        timeout.as_secs()
                    )))
                })?
                .map_err(|e| ETLError::Load(LoadError::DestinationConnection(e.to_string())))?;
            tracing::info!("Conectado ao banco de destino");
            Ok(Self {
                conn: Mutex::new(conn),
            })
        }

        pub fn from_connection(conn: PgConnection) -> Self {
            Self {
                conn: Mutex::new(conn),
            }
        }
    }

    impl std::fmt::Debug for PgExecutor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PgExecutor").finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl Executor for PgExecutor {
        async fn execute(&self, statement: &Statement) -> Result<u64> {
            let mut conn = self.conn.lock().await;
            let result = sqlx::Executor::execute(&mut *conn, statement.sql()).await?;
            Ok(result.rows_affected())
        }

        async fn execute_batch(&self, statements: &[Statement]) -> Result<u64> {
            let mut conn = self.conn.lock().await;
            let mut tx = conn.begin().await?;
            let mut affected = 0;
            for (i, statement) in statements.iter().enumerate() {
                match sqlx::Executor::execute(&mut *tx, statement.sql()).await {
                    Ok(result) => affected += result.rows_affected(),
                    Err(e) => {
                        // a transação é desfeita ao ser descartada
                        return Err(ETLError::Load(LoadError::BatchExecution {
                            index: i + 1,
                            statement: statement.sql().to_string(),
                            cause: e.to_string(),
                        }));
                    }
                }
            }
            tx.commit().await?;
            Ok(affected)
        }

        async fn fetch(&self, statement: &Statement, mode: FetchMode) -> Result<Vec<Vec<DataValue>>> {
            let mut conn = self.conn.lock().await;
            let query = sqlx::query(statement.sql());
            let rows = match mode {
                FetchMode::All => query.fetch_all(&mut *conn).await?,
                FetchMode::One => query.fetch_optional(&mut *conn).await?.into_iter().collect(),
            };
            rows.iter().map(decode_row).collect()
        }
    }

    fn decode_row(row: &PgRow) -> Result<Vec<DataValue>> {
        (0..row.columns().len())
            .map(|i| -> Result<DataValue> {
                let value = match row.column(i).type_info().name() {
                    "INT2" => row.try_get::<Option<i16>, _>(i)?.map(|v| DataValue::Integer(v.into())),
                    "INT4" => row.try_get::<Option<i32>, _>(i)?.map(|v| DataValue::Integer(v.into())),
                    "INT8" => row.try_get::<Option<i64>, _>(i)?.map(DataValue::Integer),
                    "FLOAT4" => row.try_get::<Option<f32>, _>(i)?.map(|v| DataValue::Float(v.into())),
                    "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(DataValue::Float),
                    "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(DataValue::Boolean),
                    "DATE" => row.try_get::<Option<chrono::NaiveDate>, _>(i)?.map(DataValue::Date),
                    "TIMESTAMPTZ" => row
                        .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(i)?
                        .map(DataValue::Timestamp),
                    _ => row.try_get::<Option<String>, _>(i)?.map(DataValue::String),
                };
                Ok(value.unwrap_or(DataValue::Null))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_reports_zero() {
        let executor = DryRunExecutor::new().quiet();
        assert_eq!(executor.execute(&Statement::new("DROP TABLE x")).await.unwrap(), 0);
        let batch = vec![Statement::new("EXECUTE p(1)"), Statement::new("EXECUTE p(2)")];
        assert_eq!(executor.execute_batch(&batch).await.unwrap(), 0);
        assert!(executor.fetch(&Statement::new("SELECT 1"), FetchMode::One).await.unwrap().is_empty());

        assert!(executor.is_dry_run());
        assert_eq!(executor.statements().await.len(), 4);
    }

    #[tokio::test]
    async fn test_memory_executor_records_batches() {
        let executor = MemoryExecutor::new();
        executor.execute(&Statement::new("CREATE TABLE t (LIKE d)")).await.unwrap();
        let affected = executor
            .execute_batch(&[Statement::new("EXECUTE p(1)"), Statement::new("EXECUTE p(2)")])
            .await
            .unwrap();

        assert_eq!(affected, 2);
        assert_eq!(executor.batches().await.len(), 2);
        assert_eq!(executor.executed().await[2].sql(), "EXECUTE p(2)");
        assert!(!executor.is_dry_run());
    }

    #[tokio::test]
    async fn test_memory_executor_fetch_queue() {
        let executor = MemoryExecutor::new();
        executor
            .push_fetch_result(vec![vec![DataValue::Integer(1)], vec![DataValue::Integer(2)]])
            .await;

        let rows = executor.fetch(&Statement::new("SELECT n"), FetchMode::One).await.unwrap();
        assert_eq!(rows, vec![vec![DataValue::Integer(1)]]);
        assert!(executor.fetch(&Statement::new("SELECT n"), FetchMode::All).await.unwrap().is_empty());
    }
}
