// ==========================================
// 私募基金数据平台 - 行判定（写入 / 跳过）
// ==========================================
// 职责: 根据解码结果与已存储实体决定是否写入
// 规则（按顺序,先命中者为准）:
//   1. 任一字段外键未找到 → 跳过
//   2. 资源未开启未变更检测 → 写入
//   3. 无已存储实体 → 写入
//   4. 任一字段不同 → 写入；全部相同 → 跳过
// ==========================================

use crate::domain::import::SkipReason;
use crate::domain::resource::{CompareStrategy, FieldValue, ResourceSpec, StoredRecord};
use crate::importer::field_decoder::Decoded;

/// 一个字段的解码结果
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub attribute: String,
    pub compare: CompareStrategy,
    pub decoded: Decoded,
}

impl DecodedField {
    /// 已解析的值（未找到的外键返回 None）
    pub fn value(&self) -> Option<&FieldValue> {
        match &self.decoded {
            Decoded::Resolved(v) => Some(v),
            Decoded::Unresolved { .. } => None,
        }
    }
}

/// 行判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDecision {
    Write,
    Skip(SkipReason),
}

pub struct RowReconciler;

impl RowReconciler {
    /// 判定一行是否写入
    ///
    /// # 参数
    /// - spec: 资源声明（是否开启未变更检测）
    /// - fields: 本行出现的字段解码结果
    /// - existing: 按业务标识查到的已存储实体
    pub fn decide(
        &self,
        spec: &ResourceSpec,
        fields: &[DecodedField],
        existing: Option<&StoredRecord>,
    ) -> RowDecision {
        if let Some(unresolved) = fields.iter().find(|f| f.decoded.is_unresolved()) {
            return RowDecision::Skip(SkipReason::UnresolvedReference {
                field: unresolved.attribute.clone(),
            });
        }

        if !spec.skip_unchanged {
            return RowDecision::Write;
        }

        let existing = match existing {
            Some(record) => record,
            None => return RowDecision::Write,
        };

        let all_equal = fields.iter().all(|field| match field.value() {
            Some(incoming) => {
                let stored = existing.get(&field.attribute).unwrap_or(&FieldValue::Null);
                values_equal(field.compare, incoming, stored)
            }
            None => false,
        });

        if all_equal {
            RowDecision::Skip(SkipReason::Unchanged)
        } else {
            RowDecision::Write
        }
    }
}

/// 按比较策略判断两个值是否相同
fn values_equal(strategy: CompareStrategy, incoming: &FieldValue, stored: &FieldValue) -> bool {
    match strategy {
        CompareStrategy::Scalar => incoming == stored,
        CompareStrategy::IdentitySet => match (incoming.identity_set(), stored.identity_set()) {
            (Some(a), Some(b)) => a == b,
            _ => incoming == stored,
        },
    }
}
