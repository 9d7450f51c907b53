//! Eventos da importação para observabilidade

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::Result;
use crate::traits::EventEmitter;
use crate::types::{ImportEvent, ImportState};

/// EventEmitter que registra os eventos via `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingEventEmitter;

impl LoggingEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventEmitter for LoggingEventEmitter {
    async fn emit(&self, event: ImportEvent) -> Result<()> {
        match event {
            ImportEvent::Started { table, timestamp } => {
                info!(table = %table, timestamp = ?timestamp, "Importação iniciada");
            }
            ImportEvent::StateChanged {
                table,
                old_state,
                new_state,
                timestamp,
            } => {
                info!(
                    table = %table,
                    old_state = %old_state,
                    new_state = %new_state,
                    timestamp = ?timestamp,
                    "Estado da importação alterado"
                );
            }
            ImportEvent::BatchFlushed {
                table,
                batch_number,
                statements,
                timestamp,
            } => {
                info!(
                    table = %table,
                    batch_number = batch_number,
                    statements = statements,
                    timestamp = ?timestamp,
                    "Lote gravado"
                );
            }
            ImportEvent::Error { table, error, timestamp } => {
                error!(table = %table, error = %error, timestamp = ?timestamp, "Erro na importação");
            }
            ImportEvent::Completed { table, report, timestamp } => {
                info!(
                    table = %table,
                    rows_staged = report.rows_staged,
                    rows_deleted = report.rows_deleted,
                    rows_inserted = report.rows_inserted,
                    batches_flushed = report.batches_flushed,
                    statements_executed = report.statements_executed,
                    dry_run = report.dry_run,
                    execution_time_ms = report.execution_time_ms,
                    timestamp = ?timestamp,
                    "Importação concluída"
                );
            }
        }

        Ok(())
    }
}

/// EventEmitter que armazena eventos em memória para testes
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventEmitter {
    events: Arc<Mutex<Vec<ImportEvent>>>,
}

impl InMemoryEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retorna todos os eventos capturados
    pub async fn events(&self) -> Vec<ImportEvent> {
        self.events.lock().await.clone()
    }

    /// Sequência de estados alcançados, na ordem
    pub async fn states(&self) -> Vec<ImportState> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ImportEvent::StateChanged { new_state, .. } => Some(new_state.clone()),
                _ => None,
            })
            .collect()
    }

    /// Limpa todos os eventos armazenados
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }

    /// Retorna o número de eventos capturados
    pub async fn event_count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EventEmitter for InMemoryEventEmitter {
    async fn emit(&self, event: ImportEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
