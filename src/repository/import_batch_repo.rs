// ==========================================
// 私募基金数据平台 - 导入批次日志仓储
// ==========================================
// 职责: import_batch 表的写入与查询（批次审计）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::ImportBatch;
use crate::domain::types::EntityKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct ImportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入导入批次记录
    pub fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, entity_kind, file_name,
                total_rows, created_rows, updated_rows, skipped_rows,
                imported_at, elapsed_ms, summary_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                batch.batch_id,
                batch.entity_kind.as_str(),
                batch.file_name,
                batch.total_rows,
                batch.created_rows,
                batch.updated_rows,
                batch.skipped_rows,
                batch.imported_at.to_rfc3339(),
                batch.elapsed_ms,
                batch.summary_json,
            ],
        )?;
        Ok(())
    }

    /// 查询最近的导入批次（新的在前）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, entity_kind, file_name,
                   total_rows, created_rows, updated_rows, skipped_rows,
                   imported_at, elapsed_ms, summary_json
            FROM import_batch
            ORDER BY imported_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, Option<String>>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut batches = Vec::with_capacity(rows.len());
        for (batch_id, kind, file_name, total, created, updated, skipped, at, elapsed, summary) in rows {
            let entity_kind = EntityKind::parse(&kind).ok_or_else(|| RepositoryError::FieldValueError {
                field: "entity_kind".to_string(),
                message: format!("未知实体种类: {}", kind),
            })?;
            let imported_at = DateTime::parse_from_rfc3339(&at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| RepositoryError::FieldValueError {
                    field: "imported_at".to_string(),
                    message: e.to_string(),
                })?;

            batches.push(ImportBatch {
                batch_id,
                entity_kind,
                file_name,
                total_rows: total,
                created_rows: created,
                updated_rows: updated,
                skipped_rows: skipped,
                imported_at,
                elapsed_ms: elapsed,
                summary_json: summary,
            });
        }

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use chrono::Duration;

    fn batch(id: &str, at: DateTime<Utc>) -> ImportBatch {
        ImportBatch {
            batch_id: id.to_string(),
            entity_kind: EntityKind::ProductNetValue,
            file_name: Some("nv.xlsx".to_string()),
            total_rows: 3,
            created_rows: 2,
            updated_rows: 0,
            skipped_rows: 1,
            imported_at: at,
            elapsed_ms: 12,
            summary_json: None,
        }
    }

    #[test]
    fn test_insert_and_list_recent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        let repo = ImportBatchRepository::from_connection(Arc::new(Mutex::new(conn)));

        let now = Utc::now();
        repo.insert_batch(&batch("b1", now - Duration::minutes(5))).unwrap();
        repo.insert_batch(&batch("b2", now)).unwrap();

        let recent = repo.list_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].batch_id, "b2");
        assert_eq!(recent[1].entity_kind, EntityKind::ProductNetValue);

        assert_eq!(repo.list_recent(1).unwrap().len(), 1);
    }
}
