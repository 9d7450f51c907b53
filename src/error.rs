use thiserror::Error;

/// Tipo Result principal da biblioteca
pub type Result<T> = std::result::Result<T, ETLError>;

/// Erro principal da biblioteca
#[derive(Error, Debug)]
pub enum ETLError {
    #[error("Erro de extração: {0}")]
    Extract(#[from] ExtractError),

    #[error("Erro de configuração: {0}")]
    Config(#[from] ConfigError),

    #[error("Perfil de tabela desconhecido: '{0}'")]
    UnknownTable(String),

    #[error("Erro executando o pré-processador {index} ({name}): {source}")]
    Preprocess {
        index: usize,
        name: String,
        #[source]
        source: TransformError,
    },

    #[error("{0}")]
    Validation(ValidationReport),

    #[error("Erro de carga: {0}")]
    Load(#[from] LoadError),

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de serialização: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erro de YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Erro genérico: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Erros relacionados à extração de dados
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Arquivo não encontrado: {0}")]
    FileNotFound(String),

    #[error("Formato inválido: {0}")]
    InvalidFormat(String),

    #[error("Erro de parsing: {0}")]
    ParseError(String),

    #[error("Cabeçalho ausente em {0}")]
    MissingHeader(String),
}

/// Erros levantados pelos pré-processadores
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Coluna ausente: {0}")]
    MissingColumn(String),

    #[error("Coluna '{0}' já existe")]
    ColumnConflict(String),

    #[error("Valor inválido na coluna '{column}': {value}")]
    InvalidValue { column: String, value: String },

    #[error("JSON inválido na coluna '{column}': {reason}")]
    InvalidJson { column: String, reason: String },

    #[error("Erro de processamento: {0}")]
    ProcessingError(String),
}

/// Erros relacionados ao carregamento de dados
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Estrutura da tabela {schema}.{table} desconhecida")]
    UnknownTableStructure { schema: String, table: String },

    #[error("Erro na consulta {index} <<{statement}>>: {cause}")]
    BatchExecution {
        index: usize,
        statement: String,
        cause: String,
    },

    #[error("Erro de banco de dados: {0}")]
    Database(String),

    #[error("Erro de conexão de destino: {0}")]
    DestinationConnection(String),
}

/// Erros relacionados à configuração e ao perfil
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuração inválida: {0}")]
    InvalidConfig(String),

    #[error("Parâmetro obrigatório ausente: {0}")]
    MissingRequiredParameter(String),

    #[error("Valor inválido para {param}: {value}")]
    InvalidValue { param: String, value: String },

    #[error("Erro de parsing de configuração: {0}")]
    ParseError(String),

    #[error("Pré-processador desconhecido '{0}'")]
    UnknownPreprocessor(String),

    #[error("Tipo de conversão desconhecido '{kind}' para '{column}'")]
    UnknownConversion { column: String, kind: String },

    #[error("Parâmetros inválidos para o pré-processador '{name}': {reason}")]
    InvalidPreprocessor { name: String, reason: String },
}

/// Um problema encontrado durante a validação das colunas a importar.
///
/// A validação acumula todos os problemas antes de decidir pela carga.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Coluna '{column}': tipo {declared} ({canonical}) não é compatível com '{actual}'")]
    TypeMismatch {
        column: String,
        declared: String,
        canonical: String,
        actual: String,
    },

    #[error("Coluna '{target}' exportando {source_column} já está registrada como destino de outra coluna")]
    DuplicateTarget { target: String, source_column: String },

    #[error("Coluna '{target}' não existe na tabela de destino {table}")]
    UnknownTargetColumn { target: String, table: String },

    #[error("Tipo de banco desconhecido '{declared}' para a coluna '{column}'")]
    UnknownDbType { column: String, declared: String },

    #[error("Coluna '{column}': valor '{value}' não pode ser convertido para {kind}")]
    Conversion {
        column: String,
        kind: String,
        value: String,
    },

    #[error("Coluna obrigatória '{column}' da tabela {table} não tem origem")]
    MissingRequiredColumn { column: String, table: String },
}

/// Lista acumulada de erros de validação
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Converte o relatório em erro quando há problemas
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ETLError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} erro(s) de validação, importação cancelada:", self.errors.len())?;
        for error in &self.errors {
            writeln!(f, "  - {}", error)?;
        }
        Ok(())
    }
}

impl ETLError {
    /// Retorna o código de erro
    pub fn error_code(&self) -> &'static str {
        match self {
            ETLError::Extract(_) => "EXTRACT_ERROR",
            ETLError::Config(_) => "CONFIG_ERROR",
            ETLError::UnknownTable(_) => "UNKNOWN_TABLE",
            ETLError::Preprocess { .. } => "PREPROCESS_ERROR",
            ETLError::Validation(_) => "VALIDATION_ERROR",
            ETLError::Load(LoadError::BatchExecution { .. }) => "BATCH_EXECUTION_ERROR",
            ETLError::Load(LoadError::UnknownTableStructure { .. }) => "UNKNOWN_TABLE_STRUCTURE",
            ETLError::Load(_) => "LOAD_ERROR",
            ETLError::Io(_) => "IO_ERROR",
            ETLError::Serialization(_) => "SERIALIZATION_ERROR",
            ETLError::Yaml(_) => "YAML_ERROR",
            ETLError::Generic(_) => "GENERIC_ERROR",
        }
    }

    /// Erros de validação acumulados, se for o caso
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            ETLError::Validation(report) => Some(&report.errors),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for ETLError {
    fn from(err: config::ConfigError) -> Self {
        ETLError::Config(ConfigError::ParseError(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for ETLError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => ETLError::Io(io_err),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                ETLError::Load(LoadError::DestinationConnection(err.to_string()))
            }
            _ => ETLError::Load(LoadError::Database(err.to_string())),
        }
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for ETLError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(io_err) => ETLError::Io(std::io::Error::new(io_err.kind(), io_err.to_string())),
            csv::ErrorKind::Utf8 { .. } => {
                ETLError::Extract(ExtractError::InvalidFormat("UTF-8 inválido".to_string()))
            }
            _ => ETLError::Extract(ExtractError::ParseError(err.to_string())),
        }
    }
}
