use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use sharebridge_types::models::LogEntry;

use super::page_params;
use crate::Database;
use crate::filter::{PageRequest, WhereClause};
use crate::models::opt_uuid_col;

impl Database {
    /// Appends an audit row and returns its id. Log rows are never updated
    /// or deleted.
    pub fn append_log(&self, user_id: Option<Uuid>, action: &str, now: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO logs (user_id, action, created_at) VALUES (?1, ?2, ?3)",
                params![user_id.map(|id| id.to_string()), action, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_logs(&self, user_id: Option<Uuid>, page: &PageRequest) -> Result<(Vec<LogEntry>, u64)> {
        let mut clause = WhereClause::default();
        if let Some(user_id) = user_id {
            clause.push("g.user_id = ?", [Value::Text(user_id.to_string())]);
        }

        self.with_conn(|conn| {
            let where_sql = clause.sql();
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM logs g {where_sql}"),
                params_from_iter(clause.params.iter()),
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT g.id, g.user_id, u.email, g.action, g.created_at
                 FROM logs g
                 LEFT JOIN users u ON u.id = g.user_id
                 {where_sql}
                 ORDER BY g.id DESC
                 LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(page_params(clause.params.clone(), page)), |row| {
                    Ok(LogEntry {
                        id: row.get(0)?,
                        user_id: opt_uuid_col(row, 1)?,
                        user_email: row.get(2)?,
                        action: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }
}
