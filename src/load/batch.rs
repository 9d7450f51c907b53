use crate::error::{ETLError, LoadError, Result};
use crate::load::statement::Statement;
use crate::traits::Executor;

/// Acumula comandos e os envia ao executor em lotes transacionais.
///
/// O lote é enviado quando o número de comandos acumulados passa de
/// `batch_size` e uma última vez em [`BatchExecutor::finish`]. Um lote que
/// falha interrompe a carga; os lotes anteriores continuam gravados.
pub struct BatchExecutor<'a> {
    executor: &'a dyn Executor,
    batch_size: usize,
    buffer: Vec<Statement>,
    batches_flushed: usize,
    statements_executed: usize,
}

/// Totais de uma sequência de lotes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batches_flushed: usize,
    pub statements_executed: usize,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(executor: &'a dyn Executor, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            executor,
            batch_size,
            buffer: Vec::with_capacity(batch_size + 1),
            batches_flushed: 0,
            statements_executed: 0,
        }
    }

    /// Acrescenta um comando; retorna o número do lote se houve envio
    pub async fn append(&mut self, statement: Statement) -> Result<Option<usize>> {
        self.buffer.push(statement);
        if self.buffer.len() > self.batch_size {
            self.flush().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Envia os comandos acumulados como uma transação.
    ///
    /// Em caso de erro, o índice reportado é a posição do comando na carga
    /// inteira (a partir de 1).
    pub async fn flush(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(self.batches_flushed);
        }
        let statements = std::mem::take(&mut self.buffer);
        let batch_number = self.batches_flushed + 1;
        tracing::debug!(batch = batch_number, statements = statements.len(), "Enviando lote");

        self.executor
            .execute_batch(&statements)
            .await
            .map_err(|e| match e {
                ETLError::Load(LoadError::BatchExecution { index, statement, cause }) => {
                    ETLError::Load(LoadError::BatchExecution {
                        index: self.statements_executed + index,
                        statement,
                        cause,
                    })
                }
                other => other,
            })?;

        self.batches_flushed = batch_number;
        self.statements_executed += statements.len();
        Ok(batch_number)
    }

    /// Envia o que restar e devolve os totais
    pub async fn finish(mut self) -> Result<BatchStats> {
        self.flush().await?;
        Ok(BatchStats {
            batches_flushed: self.batches_flushed,
            statements_executed: self.statements_executed,
        })
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
