use async_trait::async_trait;
use crate::dataset::Dataset;
use crate::error::{Result, TransformError};
use crate::load::statement::{FetchMode, Statement};
use crate::schema::{TableRef, TargetSchema};
use crate::types::{DataValue, ImportEvent};

/// Fonte de dados materializada em um [`Dataset`] a cada importação
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Lê toda a fonte
    async fn load(&self) -> Result<Dataset>;

    /// Descrição curta da fonte (para logs)
    fn describe(&self) -> String;
}

/// Operador nomeado que transforma o dataset inteiro antes do mapeamento de colunas
pub trait Preprocessor: Send + Sync + std::fmt::Debug {
    /// Nome do operador no perfil
    fn name(&self) -> &str;

    /// Aplica a transformação no lugar
    fn apply(&self, dataset: &mut Dataset) -> std::result::Result<(), TransformError>;
}

/// Executor de comandos no banco de destino
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executa um comando isolado (com commit) e retorna o número de linhas afetadas
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    /// Executa um lote de comandos como uma única transação.
    ///
    /// Em caso de falha, retorna `LoadError::BatchExecution` com o índice (1-based,
    /// dentro do lote) e o texto do comando que falhou.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<u64>;

    /// Executa uma consulta e retorna as linhas
    async fn fetch(&self, statement: &Statement, mode: FetchMode) -> Result<Vec<Vec<DataValue>>>;

    /// Indica se o executor apenas simula os comandos
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Leitura da estrutura das tabelas de destino
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Retorna as colunas da tabela na ordem de declaração.
    ///
    /// Falha com `LoadError::UnknownTableStructure` se a tabela não tiver colunas.
    async fn table_schema(&self, table: &TableRef) -> Result<TargetSchema>;
}

/// Trait para emissão de eventos da importação
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Emite um evento
    async fn emit(&self, event: ImportEvent) -> Result<()>;
}
