// ==========================================
// 私募基金数据平台 - 产品数据仓储
// ==========================================
// 职责: data_product / data_product_net_value 的查询与最新净值快照刷新
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::fund::{NetValueSnapshot, Product, ProductNetValue};
use crate::domain::types::ProductStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use tracing::info;

const PRODUCT_COLUMNS: &str = r#"
    pcode, vendor_code, short_name, full_name, product_type,
    issue, trustee, investor, legal_counsel, finance_counsel, fund_purpose,
    establish_date, down_date, status,
    l_net_value, l_accumulate_profit_ratio, l_annual_profit_ratio, l_pdate
"#;

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn map_product(row: &Row<'_>) -> SqliteResult<Product> {
    Ok(Product {
        pcode: row.get(0)?,
        vendor_code: row.get(1)?,
        short_name: row.get(2)?,
        full_name: row.get(3)?,
        product_type: row.get(4)?,
        issue: row.get(5)?,
        trustee: row.get(6)?,
        investor: row.get(7)?,
        legal_counsel: row.get(8)?,
        finance_counsel: row.get(9)?,
        fund_purpose: row.get(10)?,
        establish_date: parse_date(row.get(11)?),
        down_date: parse_date(row.get(12)?),
        status: row.get(13)?,
        latest: NetValueSnapshot {
            net_value: row.get(14)?,
            accumulate_profit_ratio: row.get(15)?,
            annual_profit_ratio: row.get(16)?,
            pdate: parse_date(row.get(17)?),
        },
    })
}

// ==========================================
// ProductRepository - 产品仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按基金代码查询
    ///
    /// # 返回
    /// - Ok(Some(Product)): 找到
    /// - Ok(None): 未找到
    pub fn find_by_code(&self, pcode: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM data_product WHERE pcode = ?1", PRODUCT_COLUMNS);
        let result = conn.query_row(&sql, params![pcode], map_product);

        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询在线产品（募集中 / 运行中）
    pub fn list_online(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM data_product WHERE status IN (?1, ?2) ORDER BY pcode",
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(
                params![ProductStatus::Collecting.code(), ProductStatus::Running.code()],
                map_product,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(products)
    }

    /// 查询产品的净值明细（按日期升序）
    pub fn list_net_values(&self, pcode: &str) -> RepositoryResult<Vec<ProductNetValue>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, pid, pdate, net_value, accumulate_profit_ratio, annual_profit_ratio
            FROM data_product_net_value
            WHERE pid = ?1
            ORDER BY pdate ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![pcode], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                ))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, product_code, pdate, net_value, accumulate, annual)| {
                let pdate = NaiveDate::parse_from_str(&pdate, "%Y-%m-%d").map_err(|_| {
                    RepositoryError::FieldValueError {
                        field: "pdate".to_string(),
                        message: format!("日期格式错误: {}", pdate),
                    }
                })?;
                Ok(ProductNetValue {
                    id,
                    product_code,
                    pdate,
                    net_value,
                    accumulate_profit_ratio: accumulate,
                    annual_profit_ratio: annual,
                })
            })
            .collect()
    }

    /// 刷新全部产品的最新净值快照
    ///
    /// 规则:
    /// - 取每个产品 pdate 最大的净值记录
    /// - 同一日期多条时取最后写入的一条
    /// - 没有净值记录的产品保持原值
    ///
    /// # 返回
    /// - Ok(usize): 被刷新的产品数
    pub fn refresh_latest_net_values(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"
            UPDATE data_product SET
                (l_net_value, l_accumulate_profit_ratio, l_annual_profit_ratio, l_pdate) = (
                    SELECT nv.net_value, nv.accumulate_profit_ratio, nv.annual_profit_ratio, nv.pdate
                    FROM data_product_net_value nv
                    WHERE nv.pid = data_product.pcode
                    ORDER BY nv.pdate DESC, nv.id DESC
                    LIMIT 1
                )
            WHERE EXISTS (
                SELECT 1 FROM data_product_net_value nv WHERE nv.pid = data_product.pcode
            )
            "#,
            [],
        )?;

        info!(updated_products = updated, "最新净值快照已刷新");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> (Arc<Mutex<Connection>>, ProductRepository) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO data_vendor (vcode, short_name, status) VALUES ('V1', '甲', 1);
            INSERT INTO data_product (pcode, vendor_code, short_name, status) VALUES ('P1', 'V1', '一号', 2);
            INSERT INTO data_product (pcode, vendor_code, short_name, status) VALUES ('P2', 'V1', '二号', 3);
            "#,
        )
        .unwrap();
        let shared = Arc::new(Mutex::new(conn));
        let repo = ProductRepository::from_connection(shared.clone());
        (shared, repo)
    }

    #[test]
    fn test_find_by_code() {
        let (_, repo) = setup();
        let product = repo.find_by_code("P1").unwrap().unwrap();
        assert_eq!(product.vendor_code, "V1");
        assert!(product.is_online());
        assert!(repo.find_by_code("NONE").unwrap().is_none());
    }

    #[test]
    fn test_list_online() {
        let (_, repo) = setup();
        let online = repo.list_online().unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].pcode, "P1");
    }

    #[test]
    fn test_refresh_latest_prefers_latest_date_then_latest_insert() {
        let (conn, repo) = setup();
        conn.lock()
            .unwrap()
            .execute_batch(
                r#"
                INSERT INTO data_product_net_value (pid, pdate, net_value) VALUES ('P1', '2020-01-02', 1.2);
                INSERT INTO data_product_net_value (pid, pdate, net_value) VALUES ('P1', '2020-01-05', 1.3);
                INSERT INTO data_product_net_value (pid, pdate, net_value) VALUES ('P1', '2020-01-05', 1.4);
                INSERT INTO data_product_net_value (pid, pdate, net_value) VALUES ('P1', '2020-01-01', 9.9);
                "#,
            )
            .unwrap();

        assert_eq!(repo.refresh_latest_net_values().unwrap(), 1);

        let p1 = repo.find_by_code("P1").unwrap().unwrap();
        assert_eq!(p1.latest.net_value, Some(1.4));
        assert_eq!(p1.latest.pdate, NaiveDate::from_ymd_opt(2020, 1, 5));

        let p2 = repo.find_by_code("P2").unwrap().unwrap();
        assert_eq!(p2.latest, NetValueSnapshot::default());

        let history = repo.list_net_values("P1").unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].pdate, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    }
}
