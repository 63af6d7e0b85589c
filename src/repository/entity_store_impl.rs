// ==========================================
// 私募基金数据平台 - 实体存储 SQLite 实现
// ==========================================
// 职责: 按资源声明生成参数化 SQL（表名/列名来自声明，值一律绑定参数）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::resource::{
    round_decimal, EntityRef, FieldKind, FieldMapping, FieldValue, ResourceSpec, StoredRecord,
};
use crate::domain::types::EntityKind;
use crate::repository::entity_store::{EntityStore, UpsertOutcome};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// 数据库中的日期存储格式
pub const DB_DATE_FORMAT: &str = "%Y-%m-%d";

// ==========================================
// SqliteEntityStore
// ==========================================
pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntityStore {
    /// 创建新的存储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建存储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查找标识对应的 rowid（重复时取最早写入的一条）
    fn find_rowid(
        conn: &Connection,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
    ) -> RepositoryResult<Option<i64>> {
        let (clause, params) = identity_clause(spec, identity)?;
        let sql = format!(
            "SELECT rowid FROM {} WHERE {} ORDER BY rowid LIMIT 1",
            checked_identifier(&spec.table)?,
            clause
        );
        let rowid = conn
            .query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(rowid)
    }
}

// ==========================================
// SQL 辅助函数
// ==========================================

/// 校验表名/列名只含 [A-Za-z0-9_]
fn checked_identifier(name: &str) -> RepositoryResult<&str> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(RepositoryError::InvalidResource(format!("非法标识符: {}", name)))
    }
}

/// 字段名 → 映射
fn mapping_for<'a>(spec: &'a ResourceSpec, attribute: &str) -> RepositoryResult<&'a FieldMapping> {
    spec.field(attribute).ok_or_else(|| {
        RepositoryError::InvalidResource(format!("{} 未声明字段 {}", spec.kind, attribute))
    })
}

/// 构造 "col1 IS ?1 AND col2 IS ?2"（NULL 安全比较）
fn identity_clause(
    spec: &ResourceSpec,
    identity: &[(String, FieldValue)],
) -> RepositoryResult<(String, Vec<Value>)> {
    if identity.is_empty() {
        return Err(RepositoryError::InvalidResource(format!(
            "{} 缺少业务标识",
            spec.kind
        )));
    }

    let mut parts = Vec::with_capacity(identity.len());
    let mut params = Vec::with_capacity(identity.len());
    for (idx, (attribute, value)) in identity.iter().enumerate() {
        let mapping = mapping_for(spec, attribute)?;
        parts.push(format!("{} IS ?{}", checked_identifier(&mapping.db_column)?, idx + 1));
        params.push(to_sql_value(value)?);
    }
    Ok((parts.join(" AND "), params))
}

/// 全部映射列的 SELECT 列表
fn select_list(spec: &ResourceSpec) -> RepositoryResult<String> {
    let columns = spec
        .fields
        .iter()
        .map(|f| checked_identifier(&f.db_column))
        .collect::<RepositoryResult<Vec<&str>>>()?;
    Ok(columns.join(", "))
}

/// 字段值 → SQLite 值
pub(crate) fn to_sql_value(value: &FieldValue) -> RepositoryResult<Value> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Decimal(d) => Value::Real(round_decimal(*d)),
        FieldValue::Date(d) => Value::Text(d.format(DB_DATE_FORMAT).to_string()),
        FieldValue::Reference(key) => Value::Text(key.clone()),
        FieldValue::ReferenceSet(keys) => Value::Text(serde_json::to_string(keys)?),
    })
}

fn value_error(mapping: &FieldMapping, message: String) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: mapping.attribute.clone(),
        message,
    }
}

/// SQLite 值 → 字段值（按声明的字段类型解释）
pub(crate) fn from_sql_value(mapping: &FieldMapping, value: Value) -> RepositoryResult<FieldValue> {
    let converted = match (mapping.kind, value) {
        // 空白文本统一为 ""
        (FieldKind::Text, Value::Null) => FieldValue::Text(String::new()),
        (FieldKind::Text, Value::Text(s)) => FieldValue::Text(s),
        (FieldKind::Text, Value::Integer(i)) => FieldValue::Text(i.to_string()),
        (FieldKind::Text, Value::Real(f)) => FieldValue::Text(f.to_string()),

        (FieldKind::Integer, Value::Null) => FieldValue::Null,
        (FieldKind::Integer, Value::Integer(i)) => FieldValue::Integer(i),
        (FieldKind::Integer, Value::Real(f)) => FieldValue::Integer(f.trunc() as i64),
        (FieldKind::Integer, Value::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| value_error(mapping, format!("无法解析为整数: {}", s)))?,

        (FieldKind::Decimal, Value::Null) => FieldValue::Null,
        (FieldKind::Decimal, Value::Real(f)) => FieldValue::Decimal(round_decimal(f)),
        (FieldKind::Decimal, Value::Integer(i)) => FieldValue::Decimal(i as f64),
        (FieldKind::Decimal, Value::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(|f| FieldValue::Decimal(round_decimal(f)))
            .map_err(|_| value_error(mapping, format!("无法解析为小数: {}", s)))?,

        (FieldKind::Date, Value::Null) => FieldValue::Null,
        (FieldKind::Date, Value::Text(s)) => NaiveDate::parse_from_str(&s, DB_DATE_FORMAT)
            .map(FieldValue::Date)
            .map_err(|_| value_error(mapping, format!("日期格式错误: {}", s)))?,

        (FieldKind::Reference(_), Value::Null) => FieldValue::Null,
        (FieldKind::Reference(_), Value::Text(s)) => FieldValue::Reference(s),
        (FieldKind::Reference(_), Value::Integer(i)) => FieldValue::Reference(i.to_string()),

        (FieldKind::ReferenceSet(_), Value::Null) => FieldValue::ReferenceSet(BTreeSet::new()),
        (FieldKind::ReferenceSet(_), Value::Text(s)) => {
            FieldValue::ReferenceSet(serde_json::from_str::<BTreeSet<String>>(&s)?)
        }

        (kind, other) => {
            return Err(value_error(
                mapping,
                format!("字段类型 {:?} 与存储值 {:?} 不匹配", kind, other),
            ))
        }
    };
    Ok(converted)
}

/// 查询结果行 → StoredRecord
fn read_record(spec: &ResourceSpec, raw: Vec<Value>) -> RepositoryResult<StoredRecord> {
    let mut values = BTreeMap::new();
    for (mapping, value) in spec.fields.iter().zip(raw) {
        values.insert(mapping.attribute.clone(), from_sql_value(mapping, value)?);
    }
    Ok(StoredRecord {
        kind: spec.kind,
        values,
    })
}

/// 读取一行的全部列
fn raw_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Vec<Value>> {
    (0..width).map(|i| row.get::<_, Value>(i)).collect()
}

// ==========================================
// EntityStore 实现
// ==========================================
impl EntityStore for SqliteEntityStore {
    fn find_one(&self, kind: EntityKind, key: &str) -> RepositoryResult<Option<EntityRef>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {col} FROM {table} WHERE {col} = ?1 LIMIT 1",
            col = kind.key_column(),
            table = kind.table_name()
        );

        let found = conn
            .query_row(&sql, [key], |row| row.get::<_, Value>(0))
            .optional()?;

        Ok(found.map(|value| EntityRef {
            kind,
            key: match value {
                Value::Text(s) => s,
                Value::Integer(i) => i.to_string(),
                _ => key.to_string(),
            },
        }))
    }

    fn find_by_identity(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
    ) -> RepositoryResult<Option<StoredRecord>> {
        let conn = self.get_conn()?;
        let (clause, params) = identity_clause(spec, identity)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY rowid LIMIT 1",
            select_list(spec)?,
            checked_identifier(&spec.table)?,
            clause
        );

        let width = spec.fields.len();
        let raw = conn
            .query_row(&sql, params_from_iter(params.iter()), |row| raw_row(row, width))
            .optional()?;

        raw.map(|r| read_record(spec, r)).transpose()
    }

    fn upsert(
        &self,
        spec: &ResourceSpec,
        identity: &[(String, FieldValue)],
        values: &[(String, FieldValue)],
    ) -> RepositoryResult<UpsertOutcome> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let outcome = match Self::find_rowid(&tx, spec, identity)? {
            Some(rowid) => {
                let mut assignments = Vec::new();
                let mut params = Vec::new();
                for (attribute, value) in values.iter().filter(|(a, _)| !spec.is_identity(a)) {
                    let mapping = mapping_for(spec, attribute)?;
                    params.push(to_sql_value(value)?);
                    assignments.push(format!(
                        "{} = ?{}",
                        checked_identifier(&mapping.db_column)?,
                        params.len()
                    ));
                }

                if !assignments.is_empty() {
                    params.push(Value::Integer(rowid));
                    let sql = format!(
                        "UPDATE {} SET {} WHERE rowid = ?{}",
                        checked_identifier(&spec.table)?,
                        assignments.join(", "),
                        params.len()
                    );
                    tx.execute(&sql, params_from_iter(params.iter()))?;
                }
                debug!(entity = %spec.kind, rowid = rowid, "实体已更新");
                UpsertOutcome::Updated
            }
            None => {
                // 标识字段 + 其余字段（去重，以 values 中的值为准）
                let mut columns = Vec::new();
                let mut params = Vec::new();
                let mut seen = BTreeSet::new();
                for (attribute, value) in values.iter().chain(identity.iter()) {
                    if !seen.insert(attribute.as_str()) {
                        continue;
                    }
                    let mapping = mapping_for(spec, attribute)?;
                    columns.push(checked_identifier(&mapping.db_column)?);
                    params.push(to_sql_value(value)?);
                }

                let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    checked_identifier(&spec.table)?,
                    columns.join(", "),
                    placeholders.join(", ")
                );
                tx.execute(&sql, params_from_iter(params.iter()))?;
                debug!(entity = %spec.kind, rowid = tx.last_insert_rowid(), "实体已新建");
                UpsertOutcome::Created
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn list_all(&self, spec: &ResourceSpec) -> RepositoryResult<Vec<StoredRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select_list(spec)?,
            checked_identifier(&spec.table)?
        );

        let width = spec.fields.len();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| raw_row(row, width))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(read_record(spec, row?)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup_store() -> SqliteEntityStore {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        SqliteEntityStore::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn vendor_values(vcode: &str, short_name: &str) -> Vec<(String, FieldValue)> {
        vec![
            ("vcode".to_string(), text(vcode)),
            ("short_name".to_string(), text(short_name)),
            ("status".to_string(), FieldValue::Integer(1)),
        ]
    }

    #[test]
    fn test_find_one_not_found_is_none() {
        let store = setup_store();
        let result = store.find_one(EntityKind::Vendor, "NOPE").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = setup_store();
        let spec = ResourceSpec::for_kind(EntityKind::Vendor);
        let identity = vec![("vcode".to_string(), text("V001"))];

        let outcome = store.upsert(&spec, &identity, &vendor_values("V001", "甲")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let outcome = store.upsert(&spec, &identity, &vendor_values("V001", "乙")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let record = store.find_by_identity(&spec, &identity).unwrap().unwrap();
        assert_eq!(record.get("short_name"), Some(&text("乙")));
        // 未写入的文本列读为空串
        assert_eq!(record.get("full_name"), Some(&text("")));

        let found = store.find_one(EntityKind::Vendor, "V001").unwrap();
        assert_eq!(
            found,
            Some(EntityRef {
                kind: EntityKind::Vendor,
                key: "V001".to_string()
            })
        );
    }

    #[test]
    fn test_composite_identity_lookup() {
        let store = setup_store();
        let vendor = ResourceSpec::for_kind(EntityKind::Vendor);
        store
            .upsert(&vendor, &[("vcode".to_string(), text("V1"))], &vendor_values("V1", "甲"))
            .unwrap();

        let product = ResourceSpec::for_kind(EntityKind::Product);
        let pid = vec![("pcode".to_string(), text("P1"))];
        store
            .upsert(
                &product,
                &pid,
                &[
                    ("pcode".to_string(), text("P1")),
                    ("vendor".to_string(), FieldValue::Reference("V1".to_string())),
                ],
            )
            .unwrap();

        let nv = ResourceSpec::for_kind(EntityKind::ProductNetValue);
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let identity = vec![
            ("product".to_string(), FieldValue::Reference("P1".to_string())),
            ("pdate".to_string(), FieldValue::Date(date)),
        ];
        let values = vec![
            ("product".to_string(), FieldValue::Reference("P1".to_string())),
            ("pdate".to_string(), FieldValue::Date(date)),
            ("net_value".to_string(), FieldValue::Decimal(1.05)),
        ];
        assert_eq!(store.upsert(&nv, &identity, &values).unwrap(), UpsertOutcome::Created);

        let record = store.find_by_identity(&nv, &identity).unwrap().unwrap();
        assert_eq!(record.get("net_value"), Some(&FieldValue::Decimal(1.05)));
        assert_eq!(record.get("accumulate_profit_ratio"), Some(&FieldValue::Null));

        let other_day = vec![
            ("product".to_string(), FieldValue::Reference("P1".to_string())),
            ("pdate".to_string(), FieldValue::Date(date.succ_opt().unwrap())),
        ];
        assert!(store.find_by_identity(&nv, &other_day).unwrap().is_none());
    }

    #[test]
    fn test_unresolved_foreign_key_rejected_by_store() {
        let store = setup_store();
        let product = ResourceSpec::for_kind(EntityKind::Product);
        let pid = vec![("pcode".to_string(), text("P1"))];
        let result = store.upsert(
            &product,
            &pid,
            &[("vendor".to_string(), FieldValue::Reference("MISSING".to_string()))],
        );
        assert!(matches!(result, Err(RepositoryError::ForeignKeyViolation(_))));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let store = setup_store();
        let mut spec = ResourceSpec::for_kind(EntityKind::Vendor);
        spec.table = "data_vendor; DROP TABLE data_vendor".to_string();
        let result = store.list_all(&spec);
        assert!(matches!(result, Err(RepositoryError::InvalidResource(_))));
    }

    #[test]
    fn test_reference_set_round_trip_through_sql_value() {
        let mapping = FieldMapping::plain("tags", FieldKind::ReferenceSet(EntityKind::Product));
        let keys: BTreeSet<String> = ["P2", "P1"].iter().map(|s| s.to_string()).collect();
        let stored = to_sql_value(&FieldValue::ReferenceSet(keys.clone())).unwrap();
        assert_eq!(from_sql_value(&mapping, stored).unwrap(), FieldValue::ReferenceSet(keys));
        assert_eq!(
            from_sql_value(&mapping, Value::Null).unwrap(),
            FieldValue::ReferenceSet(BTreeSet::new())
        );
    }
}
