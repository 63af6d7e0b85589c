// ==========================================
// 私募基金数据平台 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有值使用参数化绑定,防止 SQL 注入
// ==========================================

pub mod entity_store;
pub mod entity_store_impl;
pub mod error;
pub mod import_batch_repo;
pub mod product_repo;
pub mod risk_eval_repo;

// 重导出核心仓储
pub use entity_store::{EntityStore, UpsertOutcome};
pub use entity_store_impl::SqliteEntityStore;
pub use error::{RepositoryError, RepositoryResult};
pub use import_batch_repo::ImportBatchRepository;
pub use product_repo::ProductRepository;
pub use risk_eval_repo::RiskEvaluationRepository;
