// ==========================================
// 私募基金数据平台 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/超时）
// - 建表脚本集中在此处，幂等执行
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "simu_data.db";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并写入 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS data_vendor (
            vcode TEXT PRIMARY KEY,
            short_name TEXT NOT NULL DEFAULT '',
            full_name TEXT NOT NULL DEFAULT '',
            status INTEGER
        );

        CREATE TABLE IF NOT EXISTS data_product (
            pcode TEXT PRIMARY KEY,
            short_name TEXT NOT NULL DEFAULT '',
            full_name TEXT NOT NULL DEFAULT '',
            product_type INTEGER,
            vendor_code TEXT NOT NULL REFERENCES data_vendor(vcode),
            issue TEXT NOT NULL DEFAULT '',
            trustee TEXT NOT NULL DEFAULT '',
            investor TEXT NOT NULL DEFAULT '',
            legal_counsel TEXT NOT NULL DEFAULT '',
            finance_counsel TEXT NOT NULL DEFAULT '',
            fund_purpose TEXT NOT NULL DEFAULT '',
            establish_date TEXT,
            down_date TEXT,
            status INTEGER,
            l_accumulate_profit_ratio REAL,
            l_annual_profit_ratio REAL,
            l_net_value REAL,
            l_pdate TEXT
        );

        CREATE TABLE IF NOT EXISTS data_buyed_product (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idno TEXT NOT NULL,
            product_code TEXT NOT NULL REFERENCES data_product(pcode),
            share INTEGER,
            trade_date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_buyed_product_idno_product
            ON data_buyed_product(idno, product_code);

        CREATE TABLE IF NOT EXISTS data_product_net_value (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pid TEXT NOT NULL REFERENCES data_product(pcode),
            pdate TEXT NOT NULL,
            net_value REAL,
            accumulate_profit_ratio REAL,
            annual_profit_ratio REAL
        );
        CREATE INDEX IF NOT EXISTS idx_product_net_value_pid_pdate
            ON data_product_net_value(pid, pdate);

        CREATE TABLE IF NOT EXISTS data_sales_department (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS data_risk_eval (
            user_id INTEGER PRIMARY KEY,
            iscomplete INTEGER,
            answer TEXT NOT NULL DEFAULT '{}',
            score INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS import_batch (
            batch_id TEXT PRIMARY KEY,
            entity_kind TEXT NOT NULL,
            file_name TEXT,
            total_rows INTEGER NOT NULL DEFAULT 0,
            created_rows INTEGER NOT NULL DEFAULT 0,
            updated_rows INTEGER NOT NULL DEFAULT 0,
            skipped_rows INTEGER NOT NULL DEFAULT 0,
            imported_at TEXT NOT NULL,
            elapsed_ms INTEGER NOT NULL DEFAULT 0,
            summary_json TEXT
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径
///
/// 优先级: 环境变量 SIMU_DATA_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("SIMU_DATA_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DEFAULT_DB_FILE);

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("simu-data");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DEFAULT_DB_FILE);
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO data_product (pcode, vendor_code) VALUES ('P1', 'NO_SUCH_VENDOR')",
            [],
        );
        assert!(result.is_err());
    }
}
