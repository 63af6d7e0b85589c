// ==========================================
// 私募基金数据平台 - 风险测评数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（得分计算在领域层）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::risk_eval::RiskEvaluation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 风险测评仓储
/// 职责: 管理 data_risk_eval 表
pub struct RiskEvaluationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RiskEvaluationRepository {
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

    /// 保存测评（每次保存都按答案重新计分）
    ///
    /// # 返回
    /// - Ok(i32): 保存后的得分
    pub fn save(&self, evaluation: &mut RiskEvaluation) -> RepositoryResult<i32> {
        evaluation.recalc_score();
        let answer = serde_json::to_string(&evaluation.answer)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO data_risk_eval (user_id, iscomplete, answer, score)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                iscomplete = excluded.iscomplete,
                answer = excluded.answer,
                score = excluded.score
            "#,
            params![evaluation.user_id, evaluation.is_complete, answer, evaluation.score],
        )?;
        Ok(evaluation.score)
    }

    /// 按用户查询测评
    pub fn find_by_user(&self, user_id: i64) -> RepositoryResult<Option<RiskEvaluation>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT user_id, iscomplete, answer, score FROM data_risk_eval WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<bool>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i32>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((user_id, is_complete, answer, score)) => Ok(Some(RiskEvaluation {
                user_id,
                is_complete,
                answer: serde_json::from_str(&answer)?,
                score,
            })),
            None => Ok(None),
        }
    }
}
