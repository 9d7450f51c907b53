//! # surveyload - Carga de extrações de pesquisas para PostgreSQL
//!
//! Lê extrações periódicas de respostas de pesquisas (CSV) e as grava em tabelas
//! do PostgreSQL, guiado por um perfil YAML declarativo por tabela.
//!
//! ## Características Principais
//!
//! - **Perfis declarativos**: regras por coluna (nomes exatos ou padrões glob),
//!   conversões de tipo, constantes e dicas de tipo para o CSV
//! - **Pré-processadores nomeados**: renomeação por regex, extração de JSON,
//!   indicadores, booleanos, tempo decorrido e migração de identificadores
//! - **Validação antes da carga**: todos os problemas de tipo e de cobertura do
//!   destino são acumulados antes de qualquer comando ser enviado
//! - **Carga atômica por partição**: staging, lotes transacionais e substituição
//!   do intervalo carregado
//! - **Simulação**: o modo dry run gera exatamente os mesmos comandos
//!
//! ## Exemplo Rápido
//!
//! ```rust,no_run
//! use surveyload::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut importer = Importer::builder()
//!         .executor(DryRunExecutor::new())
//!         .introspector(MemorySchemaIntrospector::new().with_table(
//!             TableRef::new("survey", "weekly"),
//!             vec![ColumnDef::new("q1", "integer", true)],
//!         ))
//!         .build()?;
//!
//!     importer.load_profile("profiles/weekly.yaml")?;
//!     let report = importer.import_file("weekly", "weekly.csv").await?;
//!     println!("{} linhas preparadas", report.rows_staged);
//!     Ok(())
//! }
//! ```
//!
//! ## Arquitetura
//!
//! ### Perfil
//! [`profile::TransformationProfile`] interpreta o YAML em definições de tabela
//! tipadas, já com os pré-processadores construídos.
//!
//! ### Transformações
//! [`transform::PreprocessorChain`] executa os pré-processadores sobre o
//! [`dataset::Dataset`]; [`transform::convert`] aplica as conversões de tipo.
//!
//! ### Carga
//! [`load::AtomicLoader`] gera os comandos e os envia por um [`traits::Executor`].
//!
//! ### Importação
//! [`pipeline::Importer`] encadeia as etapas e emite os eventos de estado.

pub mod config;
pub mod dataset;
pub mod error;
pub mod events;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod profile;
pub mod schema;
pub mod traits;
pub mod transform;
pub mod types;

// Re-exports para facilitar o uso
pub use config::LoaderConfig;
pub use dataset::Dataset;
pub use error::{ETLError, Result};
pub use events::{InMemoryEventEmitter, LoggingEventEmitter};
pub use pipeline::Importer;
pub use profile::TransformationProfile;
pub use traits::*;
pub use types::{DataValue, ImportEvent, ImportReport, ImportState};

/// Prelude com imports mais comuns
pub mod prelude {
    pub use crate::config::LoaderConfig;
    pub use crate::dataset::{Column, Dataset};
    pub use crate::error::{ETLError, Result, ValidationError};
    pub use crate::events::{InMemoryEventEmitter, LoggingEventEmitter};
    pub use crate::load::{DryRunExecutor, LoadColumn, LoadOptions, MemoryExecutor, Statement};
    pub use crate::pipeline::Importer;
    pub use crate::profile::{ProfileOptions, TransformationProfile};
    pub use crate::schema::{ColumnDef, MemorySchemaIntrospector, TableRef, TargetSchema};
    pub use crate::traits::{DataSource, EventEmitter, Executor, Preprocessor, SchemaIntrospector};
    pub use crate::types::{DataValue, ImportEvent, ImportReport, ImportState};

    #[cfg(feature = "csv")]
    pub use crate::extract::CsvExtractor;

    #[cfg(feature = "database")]
    pub use crate::load::PgExecutor;
    #[cfg(feature = "database")]
    pub use crate::schema::PgSchemaIntrospector;
}

/// Informações sobre a versão da biblioteca
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Informações sobre a biblioteca
pub fn about() -> &'static str {
    env!("CARGO_PKG_DESCRIPTION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_about() {
        assert!(!about().is_empty());
    }
}
