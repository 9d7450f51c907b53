//! Geração do texto SQL enviado ao destino.
//!
//! Os valores são renderizados como literais no próprio texto, de modo que o
//! mesmo comando é produzido em uma execução real e em uma simulação.

use crate::schema::TableRef;
use crate::types::DataValue;

/// Comando SQL pronto para execução
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    sql: String,
}

/// Forma do resultado esperado de uma consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Todas as linhas
    All,
    /// Apenas a primeira linha
    One,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn drop_table_if_exists(table: &TableRef) -> Self {
        Self::new(format!("DROP TABLE IF EXISTS {}", table.qualified()))
    }

    /// `CREATE TABLE staging (LIKE destino)`
    pub fn create_table_like(table: &TableRef, like: &TableRef) -> Self {
        Self::new(format!("CREATE TABLE {} (LIKE {})", table.qualified(), like.qualified()))
    }

    /// `PREPARE plano AS INSERT INTO tabela(colunas) VALUES ($1..$n)`
    pub fn prepare_insert<S: AsRef<str>>(plan: &str, table: &TableRef, columns: &[S]) -> Self {
        let names: Vec<String> = columns.iter().map(|c| quote_ident(c.as_ref())).collect();
        let params: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        Self::new(format!(
            "PREPARE {} AS INSERT INTO {}({}) VALUES ({})",
            quote_ident(plan),
            table.qualified(),
            names.join(","),
            params.join(",")
        ))
    }

    /// `EXECUTE plano(literais)`
    pub fn execute_plan(plan: &str, values: &[DataValue]) -> Self {
        let literals: Vec<String> = values.iter().map(quote_literal).collect();
        Self::new(format!("EXECUTE {}({})", quote_ident(plan), literals.join(",")))
    }

    pub fn deallocate(plan: &str) -> Self {
        Self::new(format!("DEALLOCATE {}", quote_ident(plan)))
    }

    /// Remove as linhas cuja coluna de partição está no intervalo fechado `[min, max]`
    pub fn delete_range(table: &TableRef, column: &str, min: &DataValue, max: &DataValue) -> Self {
        Self::new(format!(
            "DELETE FROM {} WHERE {} >= {} AND {} <= {}",
            table.qualified(),
            quote_ident(column),
            quote_literal(min),
            quote_ident(column),
            quote_literal(max)
        ))
    }

    pub fn insert_select_all(table: &TableRef, from: &TableRef) -> Self {
        Self::new(format!("INSERT INTO {} SELECT * FROM {}", table.qualified(), from.qualified()))
    }

    pub fn count_rows(table: &TableRef) -> Self {
        Self::new(format!("SELECT count(*) FROM {}", table.qualified()))
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

/// Cita um identificador (`"nome"`), duplicando aspas internas
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Literal SQL de um valor. Nulos e NaN viram `NULL`.
pub fn quote_literal(value: &DataValue) -> String {
    match value {
        _ if value.is_null() => "NULL".to_string(),
        DataValue::Integer(i) => i.to_string(),
        DataValue::Float(f) if f.is_finite() => format!("{:?}", f),
        DataValue::Float(f) => format!("'{}'::float8", if f.is_sign_negative() { "-Infinity" } else { "Infinity" }),
        DataValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        DataValue::String(s) => quote_text(s),
        DataValue::Date(d) => quote_text(&d.format("%Y-%m-%d").to_string()),
        DataValue::Timestamp(ts) => quote_text(&ts.format("%Y-%m-%dT%H:%M:%S%.f%:z").to_string()),
        DataValue::Null => "NULL".to_string(),
    }
}

fn quote_text(s: &str) -> String {
    let escaped = s.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};

    #[test]
    fn test_literals() {
        assert_eq!(quote_literal(&DataValue::Null), "NULL");
        assert_eq!(quote_literal(&DataValue::Float(f64::NAN)), "NULL");
        assert_eq!(quote_literal(&DataValue::Integer(-3)), "-3");
        assert_eq!(quote_literal(&DataValue::Float(2.0)), "2.0");
        assert_eq!(quote_literal(&DataValue::Boolean(true)), "TRUE");
        assert_eq!(quote_literal(&DataValue::from("d'Arc")), "'d''Arc'");
        assert_eq!(quote_literal(&DataValue::from("a\\b")), "E'a\\\\b'");
        assert_eq!(
            quote_literal(&DataValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())),
            "'2024-02-29'"
        );
        assert_eq!(
            quote_literal(&DataValue::Timestamp(DateTime::from_timestamp(0, 0).unwrap())),
            "'1970-01-01T00:00:00+00:00'"
        );
    }

    #[test]
    fn test_statements() {
        let dest = TableRef::new("survey", "weekly");
        let staging = dest.with_suffix("_import");

        assert_eq!(
            Statement::create_table_like(&staging, &dest).sql(),
            r#"CREATE TABLE "survey"."weekly_import" (LIKE "survey"."weekly")"#
        );
        assert_eq!(
            Statement::prepare_insert("weekly_import_insert", &staging, &["Q1", "submitted"]).sql(),
            r#"PREPARE "weekly_import_insert" AS INSERT INTO "survey"."weekly_import"("Q1","submitted") VALUES ($1,$2)"#
        );
        assert_eq!(
            Statement::execute_plan("p", &[DataValue::Integer(1), DataValue::Null]).sql(),
            r#"EXECUTE "p"(1,NULL)"#
        );
        assert_eq!(
            Statement::delete_range(&dest, "timestamp", &DataValue::Integer(1), &DataValue::Integer(9)).sql(),
            r#"DELETE FROM "survey"."weekly" WHERE "timestamp" >= 1 AND "timestamp" <= 9"#
        );
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
