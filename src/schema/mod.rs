//! # Schema
//!
//! Estrutura das tabelas de destino, tal como lida do banco, e normalização
//! dos tipos declarados para um conjunto canônico.

pub mod compat;
pub mod introspect;

use serde::{Deserialize, Serialize};

pub use compat::TypeCompatibilityMatrix;
pub use introspect::MemorySchemaIntrospector;
#[cfg(feature = "database")]
pub use introspect::PgSchemaIntrospector;

/// Schema usado quando a referência não traz um
pub const DEFAULT_SCHEMA: &str = "public";

/// Referência `schema.tabela`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Interpreta `tabela` ou `schema.tabela`
    pub fn parse(value: &str, default_schema: &str) -> Self {
        match value.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new(default_schema, value),
        }
    }

    /// Nome qualificado e citado, pronto para SQL
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}",
            crate::load::statement::quote_ident(&self.schema),
            crate::load::statement::quote_ident(&self.name)
        )
    }

    /// Referência derivada com sufixo no nome (tabela de staging)
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self::new(self.schema.clone(), format!("{}{}", self.name, suffix))
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Definição de uma coluna no destino
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable,
        }
    }

    pub fn canonical_type(&self) -> Option<CanonicalType> {
        CanonicalType::normalize(&self.declared_type)
    }
}

impl std::fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = if self.nullable { "?" } else { "" };
        write!(f, "{}:{}{}", self.name, marker, self.declared_type)
    }
}

/// Estrutura de uma tabela de destino
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSchema {
    pub table: TableRef,
    pub columns: Vec<ColumnDef>,
}

impl TargetSchema {
    pub fn new(table: TableRef, columns: Vec<ColumnDef>) -> Self {
        Self { table, columns }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == column)
    }

    /// Colunas que não aceitam nulo
    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.nullable)
    }
}

/// Tipo de destino normalizado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Int,
    Text,
    Varying,
    Bool,
    Date,
    TimestampTz,
}

impl CanonicalType {
    /// Normaliza um tipo declarado (`information_schema.columns.data_type`)
    pub fn normalize(declared: &str) -> Option<Self> {
        match declared.trim().to_lowercase().as_str() {
            "int" | "integer" | "int4" | "smallint" | "int2" | "bigint" | "int8" => Some(CanonicalType::Int),
            "text" => Some(CanonicalType::Text),
            "varying" | "character varying" | "varchar" => Some(CanonicalType::Varying),
            "bool" | "boolean" => Some(CanonicalType::Bool),
            "date" => Some(CanonicalType::Date),
            "timestamp with time zone" | "timestamptz" => Some(CanonicalType::TimestampTz),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalType::Int => "int",
            CanonicalType::Text => "text",
            CanonicalType::Varying => "varying",
            CanonicalType::Bool => "bool",
            CanonicalType::Date => "date",
            CanonicalType::TimestampTz => "timestamp with time zone",
        }
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
