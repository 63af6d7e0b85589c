// ==========================================
// 私募基金数据平台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{DateErrorPolicy, ImportConfigReader};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 默认字符串日期格式（按顺序尝试）
pub const DEFAULT_DATE_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d", // '2006-10-25'
    "%m/%d/%Y", // '10/25/2006'
    "%m/%d/%y", // '10/25/06'
    "%b %d %Y", // 'Oct 25 2006'
    "%b %d, %Y",
    "%d %b %Y",
    "%d %b, %Y",
    "%B %d %Y", // 'October 25 2006'
    "%B %d, %Y",
    "%d %B %Y",
    "%d %B, %Y",
];

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 随导入批次记录当时生效的配置
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_date_input_formats(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let defaults = || -> Vec<String> {
            DEFAULT_DATE_INPUT_FORMATS.iter().map(|s| s.to_string()).collect()
        };

        let raw = match self.get_config_value(config_keys::DATE_INPUT_FORMATS)? {
            Some(v) => v,
            None => return Ok(defaults()),
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(formats) if !formats.is_empty() => Ok(formats),
            _ => {
                warn!(value = %raw, "日期格式配置无效，使用默认格式列表");
                Ok(defaults())
            }
        }
    }

    fn get_date_error_policy(&self) -> Result<DateErrorPolicy, Box<dyn Error>> {
        let raw = match self.get_config_value(config_keys::DATE_ERROR_POLICY)? {
            Some(v) => v,
            None => return Ok(DateErrorPolicy::AbortBatch),
        };

        Ok(DateErrorPolicy::parse(&raw).unwrap_or_else(|| {
            warn!(value = %raw, "日期错误策略配置无效，使用 ABORT");
            DateErrorPolicy::AbortBatch
        }))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 日期解码
    pub const DATE_INPUT_FORMATS: &str = "import_date_input_formats"; // JSON 数组
    pub const DATE_ERROR_POLICY: &str = "import_date_error_policy"; // ABORT | SKIP_ROW
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let manager = setup_manager();
        let formats = manager.get_date_input_formats().unwrap();
        assert_eq!(formats.len(), DEFAULT_DATE_INPUT_FORMATS.len());
        assert_eq!(formats[0], "%Y-%m-%d");
        assert_eq!(manager.get_date_error_policy().unwrap(), DateErrorPolicy::AbortBatch);
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let manager = setup_manager();
        manager
            .set_global_config_value(config_keys::DATE_INPUT_FORMATS, r#"["%Y/%m/%d"]"#)
            .unwrap();
        manager
            .set_global_config_value(config_keys::DATE_ERROR_POLICY, "skip_row")
            .unwrap();
        assert_eq!(manager.get_date_input_formats().unwrap(), vec!["%Y/%m/%d".to_string()]);
        assert_eq!(manager.get_date_error_policy().unwrap(), DateErrorPolicy::SkipRow);

        manager
            .set_global_config_value(config_keys::DATE_INPUT_FORMATS, "not json")
            .unwrap();
        assert_eq!(
            manager.get_date_input_formats().unwrap().len(),
            DEFAULT_DATE_INPUT_FORMATS.len()
        );
    }

    #[test]
    fn test_config_snapshot() {
        let manager = setup_manager();
        manager.set_global_config_value("a", "1").unwrap();
        manager.set_global_config_value("a", "2").unwrap();
        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&manager.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get("a").map(String::as_str), Some("2"));
    }
}
