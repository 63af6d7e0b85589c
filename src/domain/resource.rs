// ==========================================
// 私募基金数据平台 - 导入资源声明
// ==========================================
// 职责: 每类实体的 {列名 → 字段, 解码器, 比较策略} 声明式映射
// 红线: 解码器/比较策略在配置时选定,不做运行时反射
// ==========================================

use crate::domain::types::EntityKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 小数字段保留位数（对齐 DECIMAL(12,4)）
pub const DECIMAL_PLACES: i32 = 4;

/// 按小数位数舍入
pub fn round_decimal(value: f64) -> f64 {
    let factor = 10f64.powi(DECIMAL_PLACES);
    (value * factor).round() / factor
}

// ==========================================
// FieldKind - 字段存储类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Date,
    Reference(EntityKind),    // 单值外键（存被引用实体的主键）
    ReferenceSet(EntityKind), // 多值关系（存被引用实体主键集合）
}

// ==========================================
// FieldValue - 解码后的字段值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Reference(String),
    ReferenceSet(BTreeSet<String>),
}

impl FieldValue {
    /// 关系字段的主键集合视图（单值外键视为单元素集合）
    pub fn identity_set(&self) -> Option<BTreeSet<String>> {
        match self {
            FieldValue::ReferenceSet(keys) => Some(keys.clone()),
            FieldValue::Reference(key) => Some(std::iter::once(key.clone()).collect()),
            FieldValue::Null => Some(BTreeSet::new()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Reference(key) => write!(f, "{}", key),
            FieldValue::ReferenceSet(keys) => {
                let joined: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

// ==========================================
// DecoderKind - 单元格解码器选择
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecoderKind {
    /// 按字段类型的默认解码
    Default,
    /// 旧表格日期（1899-12-25 起算的天数 / 字符串格式列表）
    Date1899,
    /// 外键解析，找不到被引用实体时标记整行跳过
    SkippingReference(EntityKind),
}

// ==========================================
// CompareStrategy - 未变更检测的比较策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareStrategy {
    /// 标量相等
    Scalar,
    /// 多值关系按主键集合相等（顺序无关）
    IdentitySet,
}

// ==========================================
// FieldMapping - 单列映射
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub column: String,    // 数据集列名
    pub attribute: String, // 实体字段名
    pub db_column: String, // 数据表列名
    pub kind: FieldKind,
    pub decoder: DecoderKind,
    pub compare: CompareStrategy,
}

impl FieldMapping {
    /// 列名 = 字段名 = 表列名，默认解码
    pub fn plain(name: &str, kind: FieldKind) -> Self {
        let compare = match kind {
            FieldKind::ReferenceSet(_) => CompareStrategy::IdentitySet,
            _ => CompareStrategy::Scalar,
        };
        Self {
            column: name.to_string(),
            attribute: name.to_string(),
            db_column: name.to_string(),
            kind,
            decoder: DecoderKind::Default,
            compare,
        }
    }

    pub fn with_decoder(mut self, decoder: DecoderKind) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_db_column(mut self, db_column: &str) -> Self {
        self.db_column = db_column.to_string();
        self
    }
}

// ==========================================
// ResourceSpec - 实体导入资源声明
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub kind: EntityKind,
    pub table: String,
    pub fields: Vec<FieldMapping>,        // 有序列清单
    pub import_id_fields: Vec<String>,    // 业务标识字段（可复合）
    pub skip_unchanged: bool,             // 是否跳过未变更行
}

impl ResourceSpec {
    /// 按实体种类取内置资源声明
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Vendor => Self::vendor(),
            EntityKind::Product => Self::product(),
            EntityKind::BuyedProduct => Self::buyed_product(),
            EntityKind::ProductNetValue => Self::product_net_value(),
            EntityKind::SalesDepartment => Self::sales_department(),
        }
    }

    fn vendor() -> Self {
        Self {
            kind: EntityKind::Vendor,
            table: EntityKind::Vendor.table_name().to_string(),
            fields: vec![
                FieldMapping::plain("vcode", FieldKind::Text),
                FieldMapping::plain("short_name", FieldKind::Text),
                FieldMapping::plain("full_name", FieldKind::Text),
                FieldMapping::plain("status", FieldKind::Integer),
            ],
            import_id_fields: vec!["vcode".to_string()],
            skip_unchanged: true,
        }
    }

    fn product() -> Self {
        Self {
            kind: EntityKind::Product,
            table: EntityKind::Product.table_name().to_string(),
            fields: vec![
                FieldMapping::plain("pcode", FieldKind::Text),
                FieldMapping::plain("short_name", FieldKind::Text),
                FieldMapping::plain("full_name", FieldKind::Text),
                FieldMapping::plain("issue", FieldKind::Text),
                FieldMapping::plain("trustee", FieldKind::Text),
                FieldMapping::plain("investor", FieldKind::Text),
                FieldMapping::plain("legal_counsel", FieldKind::Text),
                FieldMapping::plain("finance_counsel", FieldKind::Text),
                FieldMapping::plain("fund_purpose", FieldKind::Text),
                FieldMapping::plain("establish_date", FieldKind::Date)
                    .with_decoder(DecoderKind::Date1899),
                FieldMapping::plain("vendor", FieldKind::Reference(EntityKind::Vendor))
                    .with_decoder(DecoderKind::SkippingReference(EntityKind::Vendor))
                    .with_db_column("vendor_code"),
                FieldMapping::plain("type", FieldKind::Integer).with_db_column("product_type"),
                FieldMapping::plain("status", FieldKind::Integer),
            ],
            import_id_fields: vec!["pcode".to_string()],
            skip_unchanged: true,
        }
    }

    fn buyed_product() -> Self {
        Self {
            kind: EntityKind::BuyedProduct,
            table: EntityKind::BuyedProduct.table_name().to_string(),
            fields: vec![
                FieldMapping::plain("idno", FieldKind::Text),
                FieldMapping::plain("product", FieldKind::Reference(EntityKind::Product))
                    .with_decoder(DecoderKind::SkippingReference(EntityKind::Product))
                    .with_db_column("product_code"),
                FieldMapping::plain("share", FieldKind::Integer),
                FieldMapping::plain("trade_date", FieldKind::Date)
                    .with_decoder(DecoderKind::Date1899),
            ],
            import_id_fields: vec!["idno".to_string(), "product".to_string()],
            skip_unchanged: true,
        }
    }

    fn product_net_value() -> Self {
        Self {
            kind: EntityKind::ProductNetValue,
            table: EntityKind::ProductNetValue.table_name().to_string(),
            fields: vec![
                FieldMapping::plain("product", FieldKind::Reference(EntityKind::Product))
                    .with_decoder(DecoderKind::SkippingReference(EntityKind::Product))
                    .with_db_column("pid"),
                FieldMapping::plain("pdate", FieldKind::Date).with_decoder(DecoderKind::Date1899),
                FieldMapping::plain("net_value", FieldKind::Decimal),
                FieldMapping::plain("accumulate_profit_ratio", FieldKind::Decimal),
                FieldMapping::plain("annual_profit_ratio", FieldKind::Decimal),
            ],
            import_id_fields: vec!["product".to_string(), "pdate".to_string()],
            skip_unchanged: true,
        }
    }

    fn sales_department() -> Self {
        Self {
            kind: EntityKind::SalesDepartment,
            table: EntityKind::SalesDepartment.table_name().to_string(),
            fields: vec![
                FieldMapping::plain("id", FieldKind::Integer),
                FieldMapping::plain("name", FieldKind::Text),
            ],
            import_id_fields: vec!["id".to_string()],
            skip_unchanged: false,
        }
    }

    /// 按字段名查找映射
    pub fn field(&self, attribute: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.attribute == attribute)
    }

    /// 业务标识字段的映射（按声明顺序）
    pub fn identity_fields(&self) -> Vec<&FieldMapping> {
        self.import_id_fields
            .iter()
            .filter_map(|name| self.field(name))
            .collect()
    }

    pub fn is_identity(&self, attribute: &str) -> bool {
        self.import_id_fields.iter().any(|f| f == attribute)
    }

    /// 有序列名清单（导出表头）
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.clone()).collect()
    }
}

// ==========================================
// StoredRecord - 已存储实体的字段视图
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: EntityKind,
    pub values: BTreeMap<String, FieldValue>, // 字段名 → 值
}

impl StoredRecord {
    pub fn get(&self, attribute: &str) -> Option<&FieldValue> {
        self.values.get(attribute)
    }
}

// ==========================================
// EntityRef - 外键解析结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_and_skip_rules_per_entity() {
        let cases = [
            (EntityKind::Vendor, vec!["vcode"], true),
            (EntityKind::Product, vec!["pcode"], true),
            (EntityKind::BuyedProduct, vec!["idno", "product"], true),
            (EntityKind::ProductNetValue, vec!["product", "pdate"], true),
            (EntityKind::SalesDepartment, vec!["id"], false),
        ];
        for (kind, ids, skip) in cases {
            let spec = ResourceSpec::for_kind(kind);
            assert_eq!(spec.import_id_fields, ids, "{}", kind);
            assert_eq!(spec.skip_unchanged, skip, "{}", kind);
            assert_eq!(spec.identity_fields().len(), ids.len());
        }
    }

    #[test]
    fn test_decoder_overrides() {
        let product = ResourceSpec::for_kind(EntityKind::Product);
        assert_eq!(
            product.field("vendor").unwrap().decoder,
            DecoderKind::SkippingReference(EntityKind::Vendor)
        );
        assert_eq!(product.field("establish_date").unwrap().decoder, DecoderKind::Date1899);
        assert_eq!(product.field("short_name").unwrap().decoder, DecoderKind::Default);

        let nv = ResourceSpec::for_kind(EntityKind::ProductNetValue);
        assert_eq!(nv.field("pdate").unwrap().decoder, DecoderKind::Date1899);
        assert_eq!(nv.field("product").unwrap().db_column, "pid");

        let vendor = ResourceSpec::for_kind(EntityKind::Vendor);
        assert!(vendor.fields.iter().all(|f| f.decoder == DecoderKind::Default));
    }

    #[test]
    fn test_identity_set_view() {
        let set = FieldValue::ReferenceSet(["b", "a"].iter().map(|s| s.to_string()).collect());
        let same = FieldValue::ReferenceSet(["a", "b"].iter().map(|s| s.to_string()).collect());
        assert_eq!(set.identity_set(), same.identity_set());
        assert_eq!(FieldValue::Null.identity_set(), Some(BTreeSet::new()));
        assert_eq!(FieldValue::Integer(1).identity_set(), None);
    }

    #[test]
    fn test_round_decimal() {
        assert_eq!(round_decimal(1.234_56), 1.2346);
        assert_eq!(round_decimal(1.05), 1.05);
    }
}
