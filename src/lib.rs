// ==========================================
// 私募基金数据平台 - 数据导入导出核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格数据 → 业务实体的批量导入与导出
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体、类型与资源声明
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入导出层 - 解码、行判定、后处理
pub mod importer;

// 配置层 - 运行时配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EntityKind, ProductStatus, ProductType, VendorStatus};

// 领域实体
pub use domain::{
    ImportBatch, ImportReport, ImportSummary, Product, ProductNetValue, RiskEvaluation, RiskGrade,
};

// 导入导出
pub use importer::{
    Dataset, ImportError, ImportResult, NetValueSnapshotRefresher, ResourceExporter,
    ResourceImporter, ResourceImporterImpl,
};

// 仓储
pub use repository::{
    EntityStore, ImportBatchRepository, ProductRepository, RepositoryError,
    RiskEvaluationRepository, SqliteEntityStore,
};

// 配置
pub use config::{ConfigManager, ImportConfigReader};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "私募基金数据平台";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
