// ==========================================
// 私募基金数据平台 - 导入批次领域模型
// ==========================================
// 职责: 行处理结果 / 批次汇总 / 批次日志
// 生命周期: 一次导入调用 = 一个批次
// ==========================================

use crate::domain::types::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ==========================================
// SkipReason - 跳过原因（仅用于诊断统计）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// 外键找不到对应实体
    UnresolvedReference { field: String },
    /// 与已存储实体完全一致
    Unchanged,
    /// 日期无法解析（仅 SKIP_ROW 策略下出现）
    InvalidValue { field: String, value: String },
}

// ==========================================
// RowAction - 单行处理动作
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RowAction {
    Create,
    Update,
    Skip(SkipReason),
}

// ==========================================
// RowResult - 单行处理结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowResult {
    pub row_number: usize, // 源文件中的行号（从 1 开始）
    pub identity: String,  // 业务标识（诊断用）
    pub action: RowAction,
}

// ==========================================
// ImportSummary - 批次汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub entity_kind: EntityKind,
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_unresolved: usize,
    pub skipped_unchanged: usize,
    pub skipped_invalid: usize,
    pub post_import_fired: bool,
}

impl ImportSummary {
    pub fn new(entity_kind: EntityKind) -> Self {
        Self {
            entity_kind,
            total_rows: 0,
            created: 0,
            updated: 0,
            skipped_unresolved: 0,
            skipped_unchanged: 0,
            skipped_invalid: 0,
            post_import_fired: false,
        }
    }

    /// 计入一行结果
    pub fn record(&mut self, action: &RowAction) {
        self.total_rows += 1;
        match action {
            RowAction::Create => self.created += 1,
            RowAction::Update => self.updated += 1,
            RowAction::Skip(SkipReason::UnresolvedReference { .. }) => self.skipped_unresolved += 1,
            RowAction::Skip(SkipReason::Unchanged) => self.skipped_unchanged += 1,
            RowAction::Skip(SkipReason::InvalidValue { .. }) => self.skipped_invalid += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_unresolved + self.skipped_unchanged + self.skipped_invalid
    }

    pub fn written(&self) -> usize {
        self.created + self.updated
    }

    /// 本批次是否写入了净值数据（决定是否刷新最新净值快照）
    pub fn touched_net_values(&self) -> bool {
        self.entity_kind == EntityKind::ProductNetValue && self.written() > 0
    }
}

// ==========================================
// ImportBatch - 批次日志记录
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub entity_kind: EntityKind,
    pub file_name: Option<String>,
    pub total_rows: i64,
    pub created_rows: i64,
    pub updated_rows: i64,
    pub skipped_rows: i64,
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub summary_json: Option<String>,
}

// ==========================================
// ImportReport - 导入调用返回值
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub batch: ImportBatch,
    pub summary: ImportSummary,
    pub rows: Vec<RowResult>,
    pub elapsed_time: Duration,
}
