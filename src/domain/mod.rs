// ==========================================
// 私募基金数据平台 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、导入资源声明
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod fund;
pub mod import;
pub mod resource;
pub mod risk_eval;
pub mod types;

// 重导出核心类型
pub use fund::{NetValueSnapshot, Product, ProductNetValue};
pub use import::{ImportBatch, ImportReport, ImportSummary, RowAction, RowResult, SkipReason};
pub use resource::{
    CompareStrategy, DecoderKind, EntityRef, FieldKind, FieldMapping, FieldValue, ResourceSpec,
    StoredRecord,
};
pub use risk_eval::{RiskEvaluation, RiskGrade};
pub use types::{EntityKind, ProductStatus, ProductType, VendorStatus};
