// ==========================================
// 私募基金数据平台 - 批次后处理
// ==========================================
// 职责: 批次结束后同步执行的后处理钩子
// 红线: 每个批次至多执行一次,不按行触发
// ==========================================

use crate::domain::import::ImportSummary;
use crate::importer::error::ImportResult;
use crate::repository::ProductRepository;
use tracing::info;

// ==========================================
// PostImportHook Trait
// ==========================================
pub trait PostImportHook {
    fn name(&self) -> &'static str;

    /// 本批次是否需要执行
    fn applies_to(&self, summary: &ImportSummary) -> bool;

    /// 执行后处理（失败时整个导入调用返回错误，已写入的行保留）
    fn run(&self, summary: &ImportSummary) -> ImportResult<()>;
}

// ==========================================
// NetValueSnapshotRefresher - 最新净值快照刷新
// ==========================================
// 触发条件: ProductNetValue 批次且至少写入一行
pub struct NetValueSnapshotRefresher {
    products: ProductRepository,
}

impl NetValueSnapshotRefresher {
    pub fn new(products: ProductRepository) -> Self {
        Self { products }
    }
}

impl PostImportHook for NetValueSnapshotRefresher {
    fn name(&self) -> &'static str {
        "net_value_snapshot_refresher"
    }

    fn applies_to(&self, summary: &ImportSummary) -> bool {
        summary.touched_net_values()
    }

    fn run(&self, summary: &ImportSummary) -> ImportResult<()> {
        let refreshed = self.products.refresh_latest_net_values()?;
        info!(
            written = summary.written(),
            refreshed_products = refreshed,
            "净值批次后处理完成"
        );
        Ok(())
    }
}
