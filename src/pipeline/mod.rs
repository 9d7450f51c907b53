//! # Importação
//!
//! O [`Importer`] conduz um arquivo pelas etapas de carga, pré-processamento,
//! resolução de colunas, validação e gravação, emitindo um evento a cada
//! mudança de estado:
//!
//! ```text
//! Ocioso → Carregado → Pré-processado → Colunas resolvidas → Validado → Gravado
//!                                                                     ↘ Cancelado
//! ```
//!
//! Nenhum comando é enviado ao destino antes que a cadeia de pré-processadores
//! e a validação terminem sem erro.

pub mod resolve;
pub mod validate;

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

use crate::dataset::Dataset;
use crate::error::{ConfigError, ETLError, Result};
use crate::events::LoggingEventEmitter;
use crate::load::{AtomicLoader, LoadColumn, LoadOptions};
use crate::profile::{ProfileOptions, TableDefinition, TransformationProfile};
use crate::schema::{TargetSchema, TypeCompatibilityMatrix};
use crate::traits::{DataSource, EventEmitter, Executor, SchemaIntrospector};
use crate::types::{ImportEvent, ImportReport, ImportState};

pub use resolve::{promote_row_id, resolve_columns, Resolution, AUTO_IGNORED_COLUMNS, UNNAMED_INDEX_COLUMN};
pub use validate::validate_columns;

/// Conduz importações de tabelas descritas em um perfil
pub struct Importer {
    executor: Arc<dyn Executor>,
    introspector: Arc<dyn SchemaIntrospector>,
    event_emitter: Arc<dyn EventEmitter>,
    options: LoadOptions,
    profile_options: ProfileOptions,
    matrix: TypeCompatibilityMatrix,
    profile: Option<TransformationProfile>,
    state: Mutex<ImportState>,
}

/// Resultado das etapas anteriores à gravação
#[derive(Debug)]
pub struct PreparedImport {
    pub schema: TargetSchema,
    pub dataset: Dataset,
    pub columns: Vec<LoadColumn>,
}

impl Importer {
    /// Cria um novo builder
    pub fn builder() -> ImporterBuilder {
        ImporterBuilder::new()
    }

    /// Carrega o perfil de transformação usado pelas importações seguintes
    pub fn load_profile<P: AsRef<Path>>(&mut self, path: P) -> Result<&TransformationProfile> {
        let profile = TransformationProfile::load(path, &self.profile_options)?;
        tracing::info!(tables = ?profile.table_names(), "Perfil carregado");
        Ok(self.profile.insert(profile))
    }

    /// Usa um perfil já interpretado
    pub fn set_profile(&mut self, profile: TransformationProfile) {
        self.profile = Some(profile);
    }

    pub fn profile(&self) -> Option<&TransformationProfile> {
        self.profile.as_ref()
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Estado da importação mais recente
    pub async fn current_state(&self) -> ImportState {
        self.state.lock().await.clone()
    }

    /// Importa o arquivo CSV de uma tabela, respeitando os `csv_types` do perfil
    #[cfg(feature = "csv")]
    pub async fn import_file<P: AsRef<Path>>(&self, table: &str, path: P) -> Result<ImportReport> {
        let hints = self
            .definition(table)
            .map(|d| d.csv_types.clone())
            .unwrap_or_default();
        let source = crate::extract::CsvExtractor::new(path).with_type_hints(hints);
        self.import_table(table, &source).await
    }

    /// Importa uma tabela do perfil a partir de uma fonte de dados.
    ///
    /// Qualquer erro leva ao estado `Cancelado`; erros anteriores à gravação
    /// não enviam nenhum comando ao destino.
    pub async fn import_table(&self, table: &str, source: &dyn DataSource) -> Result<ImportReport> {
        *self.state.lock().await = ImportState::Idle;
        self.event_emitter
            .emit(ImportEvent::Started {
                table: table.to_string(),
                timestamp: SystemTime::now(),
            })
            .await?;

        tracing::info!(table = %table, source = %source.describe(), "Iniciando importação");

        let result = match self.prepare(table, source).await {
            Ok(prepared) => self.commit(prepared).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                self.set_state(table, ImportState::Committed).await?;
                self.event_emitter
                    .emit(ImportEvent::Completed {
                        table: table.to_string(),
                        report: report.clone(),
                        timestamp: SystemTime::now(),
                    })
                    .await?;
                tracing::info!(
                    table = %table,
                    rows = report.rows_staged,
                    dry_run = report.dry_run,
                    "Importação concluída em {}ms",
                    report.execution_time_ms
                );
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(table = %table, code = e.error_code(), "Importação cancelada: {}", message);
                self.set_state(table, ImportState::Aborted(message.clone())).await?;
                self.event_emitter
                    .emit(ImportEvent::Error {
                        table: table.to_string(),
                        error: message,
                        timestamp: SystemTime::now(),
                    })
                    .await?;
                Err(e)
            }
        }
    }

    /// Executa as etapas até a validação, sem tocar no destino
    pub async fn prepare(&self, table: &str, source: &dyn DataSource) -> Result<PreparedImport> {
        let definition = self.definition(table)?;
        if definition.chain.len() != definition.prepare.len() {
            return Err(ConfigError::InvalidConfig(format!(
                "perfil carregado sem pré-processadores; a tabela '{}' declara {:?}",
                table, definition.prepare
            ))
            .into());
        }

        let mut dataset = source.load().await?;
        tracing::info!(rows = dataset.row_count(), columns = dataset.column_count(), "Dados carregados");
        self.set_state(table, ImportState::Loaded).await?;

        definition.chain.run(&mut dataset)?;
        self.set_state(table, ImportState::Preprocessed).await?;

        promote_row_id(&mut dataset);
        let schema = self.introspector.table_schema(&definition.table).await?;
        let resolution = resolve_columns(definition, &mut dataset, &schema);
        for column in &resolution.columns {
            tracing::debug!(column = %column, "Coluna de carga");
        }
        self.set_state(table, ImportState::ColumnsResolved).await?;

        validate_columns(&resolution.columns, &dataset, &schema, &self.matrix, resolution.failures)
            .into_result()?;
        self.set_state(table, ImportState::Validated).await?;

        Ok(PreparedImport {
            schema,
            dataset,
            columns: resolution.columns,
        })
    }

    async fn commit(&self, prepared: PreparedImport) -> Result<ImportReport> {
        tracing::info!(
            table = %prepared.schema.table,
            columns = prepared.columns.len(),
            dry_run = self.executor.is_dry_run(),
            "Gravando no destino"
        );
        AtomicLoader::new(self.executor.as_ref(), self.event_emitter.as_ref(), &self.options)
            .load(&prepared.schema, &prepared.dataset, &prepared.columns)
            .await
    }

    fn definition(&self, table: &str) -> Result<&TableDefinition> {
        self.profile
            .as_ref()
            .ok_or_else(|| ETLError::Config(ConfigError::InvalidConfig("nenhum perfil carregado".to_string())))?
            .get_table(table)
    }

    /// Altera o estado e emite o evento correspondente
    async fn set_state(&self, table: &str, new_state: ImportState) -> Result<()> {
        let old_state = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, new_state.clone())
        };

        self.event_emitter
            .emit(ImportEvent::StateChanged {
                table: table.to_string(),
                old_state,
                new_state,
                timestamp: SystemTime::now(),
            })
            .await
    }
}

/// Builder para criação do [`Importer`]
#[derive(Default)]
pub struct ImporterBuilder {
    executor: Option<Arc<dyn Executor>>,
    introspector: Option<Arc<dyn SchemaIntrospector>>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
    options: LoadOptions,
    profile_options: ProfileOptions,
    matrix: TypeCompatibilityMatrix,
    profile: Option<TransformationProfile>,
}

impl ImporterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define o executor de comandos
    pub fn executor<E: Executor + 'static>(self, executor: E) -> Self {
        self.shared_executor(Arc::new(executor))
    }

    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Define a origem da estrutura das tabelas de destino
    pub fn introspector<S: SchemaIntrospector + 'static>(self, introspector: S) -> Self {
        self.shared_introspector(Arc::new(introspector))
    }

    pub fn shared_introspector(mut self, introspector: Arc<dyn SchemaIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    /// Define o event emitter
    pub fn event_emitter<EventEmitterType: EventEmitter + 'static>(mut self, emitter: EventEmitterType) -> Self {
        self.event_emitter = Some(Arc::new(emitter));
        self
    }

    pub fn options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Define o tamanho do lote
    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    pub fn partition_column(mut self, column: impl Into<String>) -> Self {
        self.options.partition_column = column.into();
        self
    }

    pub fn keep_staging(mut self, keep: bool) -> Self {
        self.options.keep_staging = keep;
        self
    }

    pub fn profile_options(mut self, options: ProfileOptions) -> Self {
        self.profile_options = options;
        self
    }

    pub fn profile(mut self, profile: TransformationProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn compatibility(mut self, matrix: TypeCompatibilityMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// Constrói o importador. Executor e introspecção são obrigatórios.
    pub fn build(self) -> Result<Importer> {
        let executor = self
            .executor
            .ok_or_else(|| ConfigError::MissingRequiredParameter("executor".to_string()))?;
        let introspector = self
            .introspector
            .ok_or_else(|| ConfigError::MissingRequiredParameter("introspector".to_string()))?;
        if self.options.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                param: "batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(Importer {
            executor,
            introspector,
            event_emitter: self
                .event_emitter
                .unwrap_or_else(|| Arc::new(LoggingEventEmitter::default())),
            options: self.options,
            profile_options: self.profile_options,
            matrix: self.matrix,
            profile: self.profile,
            state: Mutex::new(ImportState::Idle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::events::InMemoryEventEmitter;
    use crate::load::{DryRunExecutor, MemoryExecutor};
    use crate::schema::{ColumnDef, MemorySchemaIntrospector, TableRef};
    use crate::transform::ConversionKind;
    use crate::types::DataValue;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const PROFILE: &str = r#"
answers:
  table: survey.answers
  mapping:
    Q1: int
    Q2: ~
"#;

    fn introspector() -> MemorySchemaIntrospector {
        MemorySchemaIntrospector::new().with_table(
            TableRef::new("survey", "answers"),
            vec![
                ColumnDef::new("Q1", "integer", true),
                ColumnDef::new("submitted", "timestamp with time zone", false),
            ],
        )
    }

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn profile_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn importer(executor: MemoryExecutor, events: InMemoryEventEmitter) -> Importer {
        let mut importer = Importer::builder()
            .executor(executor)
            .introspector(introspector())
            .event_emitter(events)
            .partition_column("submitted")
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        importer.load_profile(profile_file(&dir, PROFILE)).unwrap();
        importer
    }

    #[derive(Debug)]
    struct StaticSource(Dataset);

    #[async_trait::async_trait]
    impl DataSource for StaticSource {
        async fn load(&self) -> Result<Dataset> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "memória".to_string()
        }
    }

    #[tokio::test]
    async fn test_resolves_two_columns_and_commits() {
        let executor = MemoryExecutor::new();
        let events = InMemoryEventEmitter::new();
        let importer = importer(executor.clone(), events.clone());
        let file = csv_file(",Q1,Q2,submitted\n0,5,a,1700000000\n1,7,b,1700003600\n");

        let source = crate::extract::CsvExtractor::new(file.path());
        let prepared = importer.prepare("answers", &source).await.unwrap();
        assert_eq!(
            prepared.columns,
            vec![
                LoadColumn::column("Q1", "Q1", Some(ConversionKind::Int)),
                LoadColumn::column("submitted", "submitted", Some(ConversionKind::Timestamp)),
            ]
        );

        let report = importer.import_file("answers", file.path()).await.unwrap();
        assert_eq!(report.rows_staged, 2);
        assert_eq!(report.table, "survey.answers");
        assert_eq!(importer.current_state().await, ImportState::Committed);

        let executed = executor.executed().await;
        assert!(executed.iter().any(|s| s.sql().starts_with(r#"DELETE FROM "survey"."answers""#)));
        assert_eq!(
            executed.iter().filter(|s| s.sql().starts_with("EXECUTE")).count(),
            2
        );
        assert!(executed
            .iter()
            .any(|s| s.sql() == r#"EXECUTE "answers_import_insert"(5,'2023-11-14T22:13:20+00:00')"#));

        assert_eq!(
            events.states().await[..6],
            [
                ImportState::Loaded,
                ImportState::Preprocessed,
                ImportState::ColumnsResolved,
                ImportState::Validated,
                ImportState::Loaded,
                ImportState::Preprocessed,
            ]
        );
        assert_eq!(events.states().await.last(), Some(&ImportState::Committed));
    }

    #[tokio::test]
    async fn test_indicator_builds_boolean_column() {
        let profile = r#"
answers:
  table: survey.answers
  prepare:
    - indicator: { "^Q3$": "Q3_answered" }
  mapping:
    Q3: ~
"#;
        let mut importer = Importer::builder()
            .executor(MemoryExecutor::new())
            .introspector(MemorySchemaIntrospector::new().with_table(
                TableRef::new("survey", "answers"),
                vec![ColumnDef::new("Q3_answered", "boolean", true)],
            ))
            .event_emitter(InMemoryEventEmitter::new())
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        importer.load_profile(profile_file(&dir, profile)).unwrap();

        let source = StaticSource(Dataset::from_rows(
            vec!["Q3".to_string()],
            vec![vec![DataValue::Null], vec![DataValue::from("x")]],
        ));
        let prepared = importer.prepare("answers", &source).await.unwrap();

        let column = prepared.dataset.column("Q3_answered").unwrap();
        assert_eq!(column.values, vec![DataValue::Boolean(false), DataValue::Boolean(true)]);
        assert_eq!(
            prepared.columns,
            vec![LoadColumn::column("Q3_answered", "Q3_answered", Some(ConversionKind::Bool))]
        );
    }

    #[tokio::test]
    async fn test_missing_required_column_aborts_without_mutation() {
        let executor = MemoryExecutor::new();
        let events = InMemoryEventEmitter::new();
        let mut importer = Importer::builder()
            .executor(executor.clone())
            .introspector(MemorySchemaIntrospector::new().with_table(
                TableRef::new("survey", "answers"),
                vec![
                    ColumnDef::new("Q1", "integer", true),
                    ColumnDef::new("region", "text", false),
                ],
            ))
            .event_emitter(events.clone())
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        importer.load_profile(profile_file(&dir, PROFILE)).unwrap();
        let file = csv_file("Q1\n1\n");

        let err = importer.import_file("answers", file.path()).await.unwrap_err();
        assert_eq!(
            err.validation_errors().unwrap(),
            &[ValidationError::MissingRequiredColumn {
                column: "region".to_string(),
                table: "survey.answers".to_string(),
            }]
        );
        assert!(executor.executed().await.is_empty());
        assert!(matches!(importer.current_state().await, ImportState::Aborted(_)));
        assert!(events
            .events()
            .await
            .iter()
            .any(|e| matches!(e, ImportEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_target_aborts_without_mutation() {
        let profile = r#"
answers:
  table: survey.answers
  mapping:
    Q1: { rename: score }
    Q2: { rename: score }
"#;
        let executor = MemoryExecutor::new();
        let mut importer = Importer::builder()
            .executor(executor.clone())
            .introspector(MemorySchemaIntrospector::new().with_table(
                TableRef::new("survey", "answers"),
                vec![ColumnDef::new("score", "integer", true)],
            ))
            .event_emitter(InMemoryEventEmitter::new())
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        importer.load_profile(profile_file(&dir, profile)).unwrap();

        let source = StaticSource(Dataset::from_rows(
            vec!["Q1".to_string(), "Q2".to_string()],
            vec![vec![DataValue::Integer(1), DataValue::Integer(2)]],
        ));
        let err = importer.import_table("answers", &source).await.unwrap_err();

        assert!(matches!(err, ETLError::Validation(_)));
        assert_eq!(
            err.validation_errors().unwrap(),
            &[ValidationError::DuplicateTarget {
                target: "score".to_string(),
                source_column: "Q2".to_string(),
            }]
        );
        assert!(executor.executed().await.is_empty());
        assert!(matches!(importer.current_state().await, ImportState::Aborted(_)));
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_run() {
        let file = csv_file(",Q1,Q2,submitted\n0,5,a,1700000000\n1,,b,1700003600\n");
        let dir = TempDir::new().unwrap();
        let profile = profile_file(&dir, PROFILE);

        let memory = MemoryExecutor::new();
        let mut real = Importer::builder()
            .shared_executor(Arc::new(memory.clone()))
            .introspector(introspector())
            .event_emitter(InMemoryEventEmitter::new())
            .partition_column("submitted")
            .build()
            .unwrap();
        real.load_profile(&profile).unwrap();
        real.import_file("answers", file.path()).await.unwrap();

        let dry = DryRunExecutor::new().quiet();
        let mut simulated = Importer::builder()
            .executor(dry.clone())
            .introspector(introspector())
            .event_emitter(InMemoryEventEmitter::new())
            .partition_column("submitted")
            .build()
            .unwrap();
        simulated.load_profile(&profile).unwrap();
        let report = simulated.import_file("answers", file.path()).await.unwrap();

        let printed: Vec<_> = dry
            .statements()
            .await
            .into_iter()
            .filter(|s| !s.sql().starts_with("SELECT"))
            .collect();
        assert_eq!(printed, memory.executed().await);
        assert!(report.dry_run);
        assert_eq!(report.rows_deleted + report.rows_inserted, 0);
    }

    #[tokio::test]
    async fn test_unknown_table_is_fatal() {
        let executor = MemoryExecutor::new();
        let importer = importer(executor.clone(), InMemoryEventEmitter::new());
        let file = csv_file("Q1\n1\n");

        let err = importer.import_file("weekly", file.path()).await.unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_TABLE");
        assert!(executor.executed().await.is_empty());
        assert!(matches!(importer.current_state().await, ImportState::Aborted(_)));
    }

    #[tokio::test]
    async fn test_preprocessor_failure_is_fatal() {
        let profile = r#"
answers:
  table: survey.answers
  prepare:
    - bool: { columns: [Q1] }
  mapping: {}
"#;
        let executor = MemoryExecutor::new();
        let mut importer = Importer::builder()
            .executor(executor.clone())
            .introspector(introspector())
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        importer.load_profile(profile_file(&dir, profile)).unwrap();
        let file = csv_file("Q1\ntalvez\n");

        match importer.import_file("answers", file.path()).await {
            Err(ETLError::Preprocess { index, name, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(name, "bool");
            }
            other => panic!("esperado erro de pré-processamento: {:?}", other.map(|r| r.table)),
        }
        assert!(executor.executed().await.is_empty());
    }

    #[tokio::test]
    async fn test_skip_prepare_profile_refuses_import() {
        let profile = r#"
answers:
  table: survey.answers
  prepare:
    - timeelapsed
  mapping: {}
"#;
        let mut importer = Importer::builder()
            .executor(MemoryExecutor::new())
            .introspector(introspector())
            .profile_options(ProfileOptions {
                skip_prepare: true,
                ..ProfileOptions::default()
            })
            .build()
            .unwrap();
        let dir = TempDir::new().unwrap();
        importer.load_profile(profile_file(&dir, profile)).unwrap();
        let file = csv_file("Q1\n1\n");

        let err = importer.import_file("answers", file.path()).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_builder_requires_executor() {
        let result = Importer::builder().introspector(introspector()).build();
        assert!(matches!(
            result,
            Err(ETLError::Config(ConfigError::MissingRequiredParameter(_)))
        ));
    }
}
