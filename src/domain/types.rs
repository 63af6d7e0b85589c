// ==========================================
// 私募基金数据平台 - 领域类型定义
// ==========================================
// 职责: 实体种类、状态码等基础枚举
// 序列化格式: snake_case (与命令行参数/批次日志一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体种类 (Entity Kind)
// ==========================================
// 导入/导出支持的五类实体
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Vendor,          // 私募公司
    Product,         // 基金产品
    BuyedProduct,    // 用户已买产品
    ProductNetValue, // 产品净值明细
    SalesDepartment, // 营业部
}

impl EntityKind {
    /// 全部实体种类（按依赖顺序：被引用者在前）
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Vendor,
        EntityKind::Product,
        EntityKind::BuyedProduct,
        EntityKind::ProductNetValue,
        EntityKind::SalesDepartment,
    ];

    /// 对应的数据表名
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Vendor => "data_vendor",
            EntityKind::Product => "data_product",
            EntityKind::BuyedProduct => "data_buyed_product",
            EntityKind::ProductNetValue => "data_product_net_value",
            EntityKind::SalesDepartment => "data_sales_department",
        }
    }

    /// 主键列名（外键解析按此列查找）
    pub fn key_column(&self) -> &'static str {
        match self {
            EntityKind::Vendor => "vcode",
            EntityKind::Product => "pcode",
            EntityKind::BuyedProduct
            | EntityKind::ProductNetValue
            | EntityKind::SalesDepartment => "id",
        }
    }

    /// 数据库/命令行中使用的字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Vendor => "vendor",
            EntityKind::Product => "product",
            EntityKind::BuyedProduct => "buyed_product",
            EntityKind::ProductNetValue => "product_net_value",
            EntityKind::SalesDepartment => "sales_department",
        }
    }

    /// 从字符串解析（大小写不敏感，允许 '-' 代替 '_'）
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 私募公司状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorStatus {
    Online,  // 上线 (1)
    Offline, // 下线 (2)
}

impl VendorStatus {
    pub fn code(&self) -> i64 {
        match self {
            VendorStatus::Online => 1,
            VendorStatus::Offline => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(VendorStatus::Online),
            2 => Some(VendorStatus::Offline),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VendorStatus::Online => "上线",
            VendorStatus::Offline => "下线",
        }
    }
}

// ==========================================
// 基金产品状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Collecting, // 募集 (1)
    Running,    // 运行 (2)
    Offline,    // 下线 (3)
}

impl ProductStatus {
    pub fn code(&self) -> i64 {
        match self {
            ProductStatus::Collecting => 1,
            ProductStatus::Running => 2,
            ProductStatus::Offline => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ProductStatus::Collecting),
            2 => Some(ProductStatus::Running),
            3 => Some(ProductStatus::Offline),
            _ => None,
        }
    }

    /// 募集中或运行中的产品对外展示
    pub fn is_online(&self) -> bool {
        matches!(self, ProductStatus::Collecting | ProductStatus::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProductStatus::Collecting => "募集",
            ProductStatus::Running => "运行",
            ProductStatus::Offline => "下线",
        }
    }
}

// ==========================================
// 基金产品类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Stock,       // 股票 (1)
    Quant,       // 量化 (2)
    Additional,  // 定增 (3)
    Combined,    // 组合 (4)
    Macro,       // 宏观 (5)
    FixedIncome, // 固收 (6)
}

impl ProductType {
    pub fn code(&self) -> i64 {
        match self {
            ProductType::Stock => 1,
            ProductType::Quant => 2,
            ProductType::Additional => 3,
            ProductType::Combined => 4,
            ProductType::Macro => 5,
            ProductType::FixedIncome => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ProductType::Stock),
            2 => Some(ProductType::Quant),
            3 => Some(ProductType::Additional),
            4 => Some(ProductType::Combined),
            5 => Some(ProductType::Macro),
            6 => Some(ProductType::FixedIncome),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProductType::Stock => "股票",
            ProductType::Quant => "量化",
            ProductType::Additional => "定增",
            ProductType::Combined => "组合",
            ProductType::Macro => "宏观",
            ProductType::FixedIncome => "固收",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parse() {
        assert_eq!(EntityKind::parse("vendor"), Some(EntityKind::Vendor));
        assert_eq!(
            EntityKind::parse(" Product-Net-Value "),
            Some(EntityKind::ProductNetValue)
        );
        assert_eq!(EntityKind::parse("investor"), None);
    }

    #[test]
    fn test_product_status_online() {
        assert!(ProductStatus::Collecting.is_online());
        assert!(ProductStatus::Running.is_online());
        assert!(!ProductStatus::Offline.is_online());
        assert_eq!(ProductStatus::from_code(2), Some(ProductStatus::Running));
        assert_eq!(ProductStatus::from_code(9), None);
    }

    #[test]
    fn test_product_type_codes() {
        for code in 1..=6 {
            let t = ProductType::from_code(code).unwrap();
            assert_eq!(t.code(), code);
        }
        assert_eq!(ProductType::FixedIncome.label(), "固收");
    }
}
