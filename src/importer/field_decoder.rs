// ==========================================
// 私募基金数据平台 - 单元格解码器
// ==========================================
// 职责: 原始单元格值 → 字段值（日期 / 外键 / 标量）
// 红线: 外键未找到不是错误,以 Decoded::Unresolved 返回给行判定
// 红线: 解码器无状态,不在实例上保留任何行级标记
// ==========================================

use crate::config::DEFAULT_DATE_INPUT_FORMATS;
use crate::domain::resource::{round_decimal, DecoderKind, FieldKind, FieldMapping, FieldValue};
use crate::domain::types::EntityKind;
use crate::importer::error::DecodeError;
use crate::importer::file_parser::CellValue;
use crate::repository::entity_store::EntityStore;
use crate::repository::error::RepositoryError;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

/// 旧表格日期起算日（1899-12-25）
pub const LEGACY_EPOCH: (i32, u32, u32) = (1899, 12, 25);

/// 天数偏移的合理上限（约 8000 年）
const MAX_DAY_OFFSET: f64 = 3_000_000.0;

// ==========================================
// Decoded - 单元格解码结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Resolved(FieldValue),
    /// 外键找不到对应实体（整行将被跳过）
    Unresolved { key: String },
}

impl Decoded {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Decoded::Unresolved { .. })
    }
}

// ==========================================
// 单元格 → 文本工具
// ==========================================

/// 单元格作为主键文本（整数值浮点不带小数部分）
fn key_text(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(format!("{}", *f as i64)),
        other => {
            let s = other.to_string();
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

/// 是否为"假值"（空、空串、0、false）
fn is_falsy(cell: &CellValue) -> bool {
    match cell {
        CellValue::Empty => true,
        CellValue::Text(s) => s.is_empty(),
        CellValue::Int(i) => *i == 0,
        CellValue::Float(f) => *f == 0.0,
        CellValue::Bool(b) => !*b,
        CellValue::Date(_) => false,
    }
}

// ==========================================
// CellDecoder - 按字段声明解码
// ==========================================
pub struct CellDecoder {
    date_formats: Vec<String>,
}

impl Default for CellDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_INPUT_FORMATS.iter().map(|s| s.to_string()).collect())
    }
}

impl CellDecoder {
    /// # 参数
    /// - date_formats: 字符串日期格式列表（按顺序尝试）
    pub fn new(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }

    /// 按字段映射解码一个单元格
    ///
    /// # 返回
    /// - Ok(Decoded::Resolved): 解码成功（包括"无值"）
    /// - Ok(Decoded::Unresolved): 外键未找到（仅 SkippingReference 解码器）
    /// - Err: 日期/数值无法识别，或外键查找时存储故障
    pub fn decode<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        mapping: &FieldMapping,
        cell: &CellValue,
    ) -> Result<Decoded, DecodeError> {
        match mapping.decoder {
            DecoderKind::Date1899 => {
                let date = self.decode_date_1899(cell)?;
                Ok(Decoded::Resolved(date.map(FieldValue::Date).unwrap_or(FieldValue::Null)))
            }
            DecoderKind::SkippingReference(target) => match mapping.kind {
                FieldKind::ReferenceSet(_) => decode_reference_set(store, target, cell, true),
                _ => decode_reference(store, target, cell, true),
            },
            DecoderKind::Default => self.decode_default(store, mapping.kind, cell),
        }
    }

    /// 旧表格日期解码
    ///
    /// # 规则（按顺序）
    /// 1. 假值（空 / 0 / false）→ None
    /// 2. 已是日期 → 原样返回
    /// 3. 数值 → 1899-12-25 + 天数（小数部分向下取整）
    /// 4. 字符串 → 依次尝试配置的格式
    /// 5. 否则 → InvalidDate
    pub fn decode_date_1899(&self, cell: &CellValue) -> Result<Option<NaiveDate>, DecodeError> {
        if is_falsy(cell) {
            return Ok(None);
        }

        match cell {
            CellValue::Date(d) => Ok(Some(*d)),
            CellValue::Int(i) => offset_date(*i as f64, cell).map(Some),
            CellValue::Float(f) => offset_date(*f, cell).map(Some),
            CellValue::Bool(_) => offset_date(1.0, cell).map(Some),
            CellValue::Text(s) => self.parse_date_text(s).map(Some),
            CellValue::Empty => Ok(None),
        }
    }

    /// 按格式列表解析日期字符串（先成功者为准）
    ///
    /// # 规则
    /// - %Y 只接受 4 位年份，%y 只接受 2 位年份
    /// - 2 位年份: 69-99 → 19xx，00-68 → 20xx
    fn parse_date_text(&self, raw: &str) -> Result<NaiveDate, DecodeError> {
        let value = raw.trim();
        self.date_formats
            .iter()
            .find_map(|fmt| parse_with_format(value, fmt))
            .ok_or_else(|| DecodeError::InvalidDate {
                value: raw.to_string(),
            })
    }

    /// 默认解码（按字段类型）
    fn decode_default<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        kind: FieldKind,
        cell: &CellValue,
    ) -> Result<Decoded, DecodeError> {
        let value = match kind {
            FieldKind::Text => FieldValue::Text(match cell {
                CellValue::Empty => String::new(),
                CellValue::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
                other => other.to_string(),
            }),
            FieldKind::Integer => decode_integer(cell)?,
            FieldKind::Decimal => decode_decimal(cell)?,
            FieldKind::Date => match cell {
                CellValue::Empty => FieldValue::Null,
                CellValue::Date(d) => FieldValue::Date(*d),
                CellValue::Text(s) => FieldValue::Date(self.parse_date_text(s)?),
                other => {
                    return Err(DecodeError::InvalidDate {
                        value: other.to_string(),
                    })
                }
            },
            // 严格外键：未找到即错误
            FieldKind::Reference(target) => return decode_reference(store, target, cell, false),
            FieldKind::ReferenceSet(target) => {
                return decode_reference_set(store, target, cell, false)
            }
        };
        Ok(Decoded::Resolved(value))
    }
}

/// 2 位年份的世纪划分点（小于此值归入 20xx）
const TWO_DIGIT_YEAR_PIVOT: i32 = 69;

/// 文本中的连续数字段
fn digit_runs(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
}

/// 按单个格式解析，并校验年份位数
///
/// chrono 的 %Y 接受 1-4 位年份，%y 将 69 归入 2069，这里收紧为固定位数。
fn parse_with_format(value: &str, fmt: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, fmt).ok()?;

    if fmt.contains("%Y") {
        let year = format!("{:04}", date.year());
        return digit_runs(value)
            .any(|run| run.len() == 4 && run == year)
            .then_some(date);
    }

    if fmt.contains("%y") {
        let yy = date.year().rem_euclid(100);
        if !digit_runs(value).any(|run| run == format!("{:02}", yy)) {
            return None;
        }
        let century = if yy >= TWO_DIGIT_YEAR_PIVOT { 1900 } else { 2000 };
        return date.with_year(century + yy);
    }

    Some(date)
}

/// 起算日 + 天数
fn offset_date(days: f64, cell: &CellValue) -> Result<NaiveDate, DecodeError> {
    let invalid = || DecodeError::InvalidDate {
        value: cell.to_string(),
    };

    if !days.is_finite() || days.abs() > MAX_DAY_OFFSET {
        return Err(invalid());
    }

    let (y, m, d) = LEGACY_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid)?;
    epoch
        .checked_add_signed(Duration::days(days.floor() as i64))
        .ok_or_else(invalid)
}

fn decode_integer(cell: &CellValue) -> Result<FieldValue, DecodeError> {
    let invalid = || DecodeError::InvalidNumber {
        value: cell.to_string(),
    };
    Ok(match cell {
        CellValue::Empty => FieldValue::Null,
        CellValue::Int(i) => FieldValue::Integer(*i),
        CellValue::Float(f) if f.is_finite() => FieldValue::Integer(f.trunc() as i64),
        CellValue::Bool(b) => FieldValue::Integer(i64::from(*b)),
        CellValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(i) => FieldValue::Integer(i),
            Err(_) => {
                let f = s.trim().parse::<f64>().map_err(|_| invalid())?;
                if !f.is_finite() {
                    return Err(invalid());
                }
                FieldValue::Integer(f.trunc() as i64)
            }
        },
        _ => return Err(invalid()),
    })
}

fn decode_decimal(cell: &CellValue) -> Result<FieldValue, DecodeError> {
    let invalid = || DecodeError::InvalidNumber {
        value: cell.to_string(),
    };
    Ok(match cell {
        CellValue::Empty => FieldValue::Null,
        CellValue::Int(i) => FieldValue::Decimal(*i as f64),
        CellValue::Float(f) if f.is_finite() => FieldValue::Decimal(round_decimal(*f)),
        CellValue::Text(s) => {
            let f = s.trim().parse::<f64>().map_err(|_| invalid())?;
            if !f.is_finite() {
                return Err(invalid());
            }
            FieldValue::Decimal(round_decimal(f))
        }
        _ => return Err(invalid()),
    })
}

/// 外键解码
///
/// # 参数
/// - tolerant: true 时"未找到"返回 Unresolved，false 时返回 NotFound 错误
///
/// # 规则
/// - 空单元格 → Null（不算未找到）
/// - 找到 → Reference(主键)
/// - 其他存储故障 → Lookup 错误
pub fn decode_reference<S: EntityStore + ?Sized>(
    store: &S,
    target: EntityKind,
    cell: &CellValue,
    tolerant: bool,
) -> Result<Decoded, DecodeError> {
    let key = match key_text(cell) {
        Some(k) => k,
        None => return Ok(Decoded::Resolved(FieldValue::Null)),
    };

    match store.find_one(target, &key)? {
        Some(found) => Ok(Decoded::Resolved(FieldValue::Reference(found.key))),
        None if tolerant => Ok(Decoded::Unresolved { key }),
        None => Err(DecodeError::Lookup(RepositoryError::NotFound {
            entity: target.to_string(),
            id: key,
        })),
    }
}

/// 多值外键解码（逗号分隔的主键列表）
fn decode_reference_set<S: EntityStore + ?Sized>(
    store: &S,
    target: EntityKind,
    cell: &CellValue,
    tolerant: bool,
) -> Result<Decoded, DecodeError> {
    let raw = key_text(cell).unwrap_or_default();
    let mut keys = BTreeSet::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match decode_reference(store, target, &CellValue::text(part), tolerant)? {
            Decoded::Resolved(FieldValue::Reference(key)) => {
                keys.insert(key);
            }
            Decoded::Unresolved { key } => return Ok(Decoded::Unresolved { key }),
            _ => {}
        }
    }

    Ok(Decoded::Resolved(FieldValue::ReferenceSet(keys)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{EntityRef, ResourceSpec, StoredRecord};
    use crate::repository::entity_store::UpsertOutcome;
    use crate::repository::error::RepositoryResult;

    /// 只认识固定主键集合的存储
    struct FixedStore {
        keys: Vec<&'static str>,
        fail: bool,
    }

    impl EntityStore for FixedStore {
        fn find_one(&self, kind: EntityKind, key: &str) -> RepositoryResult<Option<EntityRef>> {
            if self.fail {
                return Err(RepositoryError::DatabaseConnectionError("offline".to_string()));
            }
            Ok(self.keys.iter().find(|k| **k == key).map(|k| EntityRef {
                kind,
                key: k.to_string(),
            }))
        }

        fn find_by_identity(
            &self,
            _spec: &ResourceSpec,
            _identity: &[(String, FieldValue)],
        ) -> RepositoryResult<Option<StoredRecord>> {
            Ok(None)
        }

        fn upsert(
            &self,
            _spec: &ResourceSpec,
            _identity: &[(String, FieldValue)],
            _values: &[(String, FieldValue)],
        ) -> RepositoryResult<UpsertOutcome> {
            Ok(UpsertOutcome::Created)
        }

        fn list_all(&self, _spec: &ResourceSpec) -> RepositoryResult<Vec<StoredRecord>> {
            Ok(Vec::new())
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_numeric_offsets_from_legacy_epoch() {
        let decoder = CellDecoder::default();
        assert_eq!(decoder.decode_date_1899(&CellValue::Int(1)).unwrap(), Some(ymd(1899, 12, 26)));
        assert_eq!(decoder.decode_date_1899(&CellValue::Float(7.0)).unwrap(), Some(ymd(1900, 1, 1)));
        for d in [1i64, 31, 365, 43_831, 45_000] {
            let expected = ymd(1899, 12, 25) + Duration::days(d);
            assert_eq!(decoder.decode_date_1899(&CellValue::Int(d)).unwrap(), Some(expected));
        }
    }

    #[test]
    fn test_fractional_offset_is_floored() {
        let decoder = CellDecoder::default();
        assert_eq!(
            decoder.decode_date_1899(&CellValue::Float(1.75)).unwrap(),
            Some(ymd(1899, 12, 26))
        );
    }

    #[test]
    fn test_falsy_cells_decode_to_none() {
        let decoder = CellDecoder::default();
        for cell in [
            CellValue::Empty,
            CellValue::Text(String::new()),
            CellValue::Int(0),
            CellValue::Float(0.0),
            CellValue::Bool(false),
        ] {
            assert_eq!(decoder.decode_date_1899(&cell).unwrap(), None, "{:?}", cell);
        }
    }

    #[test]
    fn test_typed_date_passes_through() {
        let decoder = CellDecoder::default();
        let d = ymd(2020, 3, 1);
        assert_eq!(decoder.decode_date_1899(&CellValue::Date(d)).unwrap(), Some(d));
    }

    #[test]
    fn test_string_formats_agree_with_offsets() {
        let decoder = CellDecoder::default();
        let offset = (ymd(2020, 1, 1) - ymd(1899, 12, 25)).num_days();
        let by_offset = decoder.decode_date_1899(&CellValue::Int(offset)).unwrap();

        for text in ["2020-01-01", "01/01/2020", "Jan 01 2020", "January 1, 2020", "1 Jan 2020"] {
            let by_text = decoder
                .decode_date_1899(&CellValue::Text(text.to_string()))
                .unwrap();
            assert_eq!(by_text, by_offset, "{}", text);
        }
    }

    #[test]
    fn test_two_digit_years_use_short_year_pattern() {
        let decoder = CellDecoder::default();
        let cases = [
            ("01/01/20", ymd(2020, 1, 1)),
            ("01/01/68", ymd(2068, 1, 1)),
            ("01/01/69", ymd(1969, 1, 1)),
            ("12/31/99", ymd(1999, 12, 31)),
            ("10/25/06", ymd(2006, 10, 25)),
        ];
        for (text, expected) in cases {
            assert_eq!(
                decoder.decode_date_1899(&CellValue::Text(text.to_string())).unwrap(),
                Some(expected),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_four_digit_year_patterns_reject_short_years() {
        let decoder = CellDecoder::default();
        for text in ["Jan 01 20", "2020-1-1x", "01/01/20201"] {
            assert!(
                decoder.decode_date_1899(&CellValue::Text(text.to_string())).is_err(),
                "{}",
                text
            );
        }

        // 只配置 %Y 时 2 位年份无法识别
        let strict = CellDecoder::new(vec!["%m/%d/%Y".to_string()]);
        assert!(strict
            .decode_date_1899(&CellValue::Text("01/01/20".to_string()))
            .is_err());
        assert_eq!(
            strict.decode_date_1899(&CellValue::Text("1/5/2006".to_string())).unwrap(),
            Some(ymd(2006, 1, 5))
        );
    }

    #[test]
    fn test_unrecognized_string_is_invalid_date() {
        let decoder = CellDecoder::default();
        let err = decoder
            .decode_date_1899(&CellValue::Text("2020年1月1日".to_string()))
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDate { value } if value == "2020年1月1日"));
    }

    #[test]
    fn test_configured_formats_are_tried_in_order() {
        let decoder = CellDecoder::new(vec!["%d/%m/%Y".to_string(), "%m/%d/%Y".to_string()]);
        assert_eq!(
            decoder.decode_date_1899(&CellValue::Text("02/03/2020".to_string())).unwrap(),
            Some(ymd(2020, 3, 2))
        );
    }

    #[test]
    fn test_reference_found_and_unresolved() {
        let store = FixedStore {
            keys: vec!["P1", "123"],
            fail: false,
        };
        let found = decode_reference(&store, EntityKind::Product, &CellValue::Text("P1".into()), true).unwrap();
        assert_eq!(found, Decoded::Resolved(FieldValue::Reference("P1".to_string())));

        // 数值主键按整数文本查找
        let numeric = decode_reference(&store, EntityKind::Product, &CellValue::Float(123.0), true).unwrap();
        assert_eq!(numeric, Decoded::Resolved(FieldValue::Reference("123".to_string())));

        let missing = decode_reference(&store, EntityKind::Product, &CellValue::Text("NOPE".into()), true).unwrap();
        assert_eq!(
            missing,
            Decoded::Unresolved {
                key: "NOPE".to_string()
            }
        );

        let empty = decode_reference(&store, EntityKind::Product, &CellValue::Empty, true).unwrap();
        assert_eq!(empty, Decoded::Resolved(FieldValue::Null));
    }

    #[test]
    fn test_strict_reference_and_store_fault() {
        let store = FixedStore {
            keys: vec![],
            fail: false,
        };
        let strict = decode_reference(&store, EntityKind::Vendor, &CellValue::Text("V9".into()), false);
        assert!(matches!(strict, Err(DecodeError::Lookup(RepositoryError::NotFound { .. }))));

        let broken = FixedStore {
            keys: vec!["V1"],
            fail: true,
        };
        let fault = decode_reference(&broken, EntityKind::Vendor, &CellValue::Text("V1".into()), true);
        assert!(matches!(fault, Err(DecodeError::Lookup(RepositoryError::DatabaseConnectionError(_)))));
    }

    #[test]
    fn test_default_scalar_decoding() {
        let store = FixedStore {
            keys: vec![],
            fail: false,
        };
        let decoder = CellDecoder::default();

        let text = FieldMapping::plain("pcode", FieldKind::Text);
        assert_eq!(
            decoder.decode(&store, &text, &CellValue::Float(1001.0)).unwrap(),
            Decoded::Resolved(FieldValue::Text("1001".to_string()))
        );
        assert_eq!(
            decoder.decode(&store, &text, &CellValue::Empty).unwrap(),
            Decoded::Resolved(FieldValue::Text(String::new()))
        );

        let int = FieldMapping::plain("share", FieldKind::Integer);
        assert_eq!(
            decoder.decode(&store, &int, &CellValue::Text("12.9".into())).unwrap(),
            Decoded::Resolved(FieldValue::Integer(12))
        );
        assert!(matches!(
            decoder.decode(&store, &int, &CellValue::Text("abc".into())),
            Err(DecodeError::InvalidNumber { .. })
        ));

        let dec = FieldMapping::plain("net_value", FieldKind::Decimal);
        assert_eq!(
            decoder.decode(&store, &dec, &CellValue::Float(1.234_56)).unwrap(),
            Decoded::Resolved(FieldValue::Decimal(1.2346))
        );
    }

    #[test]
    fn test_reference_set_any_missing_is_unresolved() {
        let store = FixedStore {
            keys: vec!["P1", "P2"],
            fail: false,
        };
        let decoder = CellDecoder::default();
        let mapping = FieldMapping::plain("products", FieldKind::ReferenceSet(EntityKind::Product))
            .with_decoder(DecoderKind::SkippingReference(EntityKind::Product));

        let ok = decoder
            .decode(&store, &mapping, &CellValue::Text("P2, P1".into()))
            .unwrap();
        let expected: BTreeSet<String> = ["P1", "P2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ok, Decoded::Resolved(FieldValue::ReferenceSet(expected)));

        let partial = decoder
            .decode(&store, &mapping, &CellValue::Text("P1,P3".into()))
            .unwrap();
        assert!(partial.is_unresolved());
    }
}
