// ==========================================
// 私募基金数据平台 - 基金领域模型
// ==========================================
// 职责: 基金产品 / 净值快照 / 净值明细
// 对齐: db.rs 中的 data_* 表
// ==========================================

use crate::domain::types::{ProductStatus, ProductType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// NetValueSnapshot - 最新净值快照
// ==========================================
// 红线: 派生字段,只由净值导入后处理维护,不接受直接导入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetValueSnapshot {
    pub net_value: Option<f64>,               // 净值(最新)
    pub accumulate_profit_ratio: Option<f64>, // 累计收益率(最新)
    pub annual_profit_ratio: Option<f64>,     // 年化收益率(最新)
    pub pdate: Option<NaiveDate>,             // 最新净值的日期
}

// ==========================================
// Product - 基金产品
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    // ===== 主键与归属 =====
    pub pcode: String,       // 基金代码
    pub vendor_code: String, // 私募公司(基金管理人)

    // ===== 基础信息 =====
    pub short_name: String,
    pub full_name: String,
    pub product_type: Option<i64>,
    pub issue: String,           // 基金发行方
    pub trustee: String,         // 基金托管人
    pub investor: String,        // 投资人
    pub legal_counsel: String,   // 法律顾问
    pub finance_counsel: String, // 财务顾问
    pub fund_purpose: String,    // 资金用途

    // ===== 时间与状态 =====
    pub establish_date: Option<NaiveDate>,
    pub down_date: Option<NaiveDate>,
    pub status: Option<i64>,

    // ===== 最新净值快照 =====
    pub latest: NetValueSnapshot,
}

impl Product {
    pub fn status(&self) -> Option<ProductStatus> {
        self.status.and_then(ProductStatus::from_code)
    }

    pub fn product_type(&self) -> Option<ProductType> {
        self.product_type.and_then(ProductType::from_code)
    }

    pub fn is_online(&self) -> bool {
        self.status().map(|s| s.is_online()).unwrap_or(false)
    }
}

// ==========================================
// ProductNetValue - 产品净值明细
// ==========================================
// 业务标识: (product_code, pdate)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductNetValue {
    pub id: i64,
    pub product_code: String,
    pub pdate: NaiveDate,
    pub net_value: Option<f64>,
    pub accumulate_profit_ratio: Option<f64>,
    pub annual_profit_ratio: Option<f64>,
}
