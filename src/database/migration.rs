//! Embedded SQL migrations, executed statement-by-statement and recorded in
//! `migration_versions` of the schema they were applied to.

use serde::Serialize;
use sqlx::MySqlPool;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration {version} statement {index} failed: {source}")]
    Statement {
        version: &'static str,
        index: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("migration bookkeeping failed: {0}")]
    Bookkeeping(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationScope {
    Master,
    Trust,
}

impl MigrationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationScope::Master => "master",
            MigrationScope::Trust => "trust",
        }
    }

    pub fn migrations(&self) -> &'static [Migration] {
        match self {
            MigrationScope::Master => MASTER_MIGRATIONS,
            MigrationScope::Trust => TRUST_MIGRATIONS,
        }
    }
}

#[derive(Debug)]
pub struct Migration {
    pub version: &'static str,
    pub sql: &'static str,
}

pub static MASTER_MIGRATIONS: &[Migration] = &[Migration {
    version: "001_init",
    sql: include_str!("../../migrations/master/001_init.sql"),
}];

pub static TRUST_MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_init",
        sql: include_str!("../../migrations/trust/001_init.sql"),
    },
    Migration {
        version: "002_message_filter_and_fee_scope",
        sql: include_str!("../../migrations/trust/002_message_filter_and_fee_scope.sql"),
    },
];

const VERSIONS_DDL: &str = "CREATE TABLE IF NOT EXISTS migration_versions (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    scope VARCHAR(20) NOT NULL,
    version VARCHAR(100) NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE KEY uq_migration_versions (scope, version)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

/// Apply every migration of `scope` not yet recorded. Returns applied versions.
pub async fn run_migrations(pool: &MySqlPool, scope: MigrationScope) -> Result<Vec<&'static str>, MigrationError> {
    sqlx::query(VERSIONS_DDL).execute(pool).await?;

    let applied: Vec<(String,)> = sqlx::query_as("SELECT version FROM migration_versions WHERE scope = ?")
        .bind(scope.as_str())
        .fetch_all(pool)
        .await?;
    let applied: Vec<String> = applied.into_iter().map(|(v,)| v).collect();

    let mut newly_applied = Vec::new();
    for migration in scope.migrations() {
        if applied.iter().any(|v| v == migration.version) {
            continue;
        }

        for (index, statement) in split_statements(migration.sql).iter().enumerate() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|source| MigrationError::Statement {
                    version: migration.version,
                    index,
                    source,
                })?;
        }

        sqlx::query("INSERT INTO migration_versions (scope, version) VALUES (?, ?)")
            .bind(scope.as_str())
            .bind(migration.version)
            .execute(pool)
            .await?;
        info!("Applied {} migration {}", scope.as_str(), migration.version);
        newly_applied.push(migration.version);
    }

    Ok(newly_applied)
}

/// Split a SQL script on `;`, ignoring semicolons inside quotes and comments.
/// Comments are dropped; empty statements are skipped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == '\\' && q != '`' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '#' => {
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons_outside_quotes() {
        let sql = "INSERT INTO t VALUES ('a;b');\nINSERT INTO t VALUES (\"c;d\");";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a;b')");
    }

    #[test]
    fn drops_comments() {
        let sql = "-- heading; with semicolon\nCREATE TABLE a (id INT); # trailing;\n/* block; */ CREATE TABLE b (id INT)";
        let statements = split_statements(sql);
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);
    }

    #[test]
    fn escaped_quote_does_not_end_literal() {
        let statements = split_statements(r"SELECT 'it\'s; fine'; SELECT 1");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], r"SELECT 'it\'s; fine'");
    }

    #[test]
    fn embedded_migrations_parse() {
        let master = split_statements(MASTER_MIGRATIONS[0].sql);
        assert!(master.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS trusts")));
        assert!(master.iter().all(|s| !s.starts_with("--")));

        let trust = split_statements(TRUST_MIGRATIONS[0].sql);
        assert!(trust.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS students")));
        assert!(trust.iter().any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS attendance_records")));

        let widening = split_statements(TRUST_MIGRATIONS[1].sql);
        assert_eq!(widening.len(), 3);
        assert_eq!(widening[0], "ALTER TABLE messages MODIFY audience_filter TEXT NULL");
    }
}
