// 数据导入命令行工具
//
// 用法:
//   simu-import [--db PATH] import <kind> <file>
//   simu-import [--db PATH] export <kind>          (CSV 写到 stdout)
//   simu-import [--db PATH] refresh-net-values
//   simu-import [--db PATH] batches [limit]
//
// kind: vendor | product | buyed_product | product_net_value | sales_department

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::Connection;
use simu_data::db::{get_default_db_path, init_schema, open_sqlite_connection};
use simu_data::domain::RowAction;
use simu_data::{
    logging, ConfigManager, EntityKind, ImportBatchRepository, NetValueSnapshotRefresher,
    ProductRepository, ResourceExporter, ResourceImporter, ResourceImporterImpl,
    SqliteEntityStore,
};
use std::sync::{Arc, Mutex};
use tracing::info;

const USAGE: &str = "用法: simu-import [--db PATH] <import <kind> <file> | export <kind> | refresh-net-values | batches [limit]>";
const DEFAULT_BATCH_LIMIT: usize = 20;

fn parse_kind(raw: Option<String>) -> Result<EntityKind> {
    let raw = raw.ok_or_else(|| anyhow!("缺少实体种类\n{}", USAGE))?;
    EntityKind::parse(&raw).ok_or_else(|| anyhow!("未知实体种类: {}", raw))
}

fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = match args.iter().position(|a| a == "--db") {
        Some(idx) => {
            if idx + 1 >= args.len() {
                bail!("--db 缺少路径参数");
            }
            let path = args.remove(idx + 1);
            args.remove(idx);
            path
        }
        None => get_default_db_path(),
    };

    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!(USAGE))?;

    let conn = open_sqlite_connection(&db_path)
        .with_context(|| format!("打开数据库失败: {}", db_path))?;
    init_schema(&conn).context("初始化数据库结构失败")?;
    info!(db_path = %db_path, "数据库就绪");
    let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(conn));

    match command.as_str() {
        "import" => {
            let kind = parse_kind(args.next())?;
            let file = args.next().ok_or_else(|| anyhow!("缺少文件路径\n{}", USAGE))?;
            run_import(conn, kind, &file)
        }
        "export" => {
            let kind = parse_kind(args.next())?;
            let exporter = ResourceExporter::new(SqliteEntityStore::from_connection(conn));
            let stdout = std::io::stdout();
            exporter.write_csv(kind, stdout.lock())?;
            Ok(())
        }
        "refresh-net-values" => {
            let refreshed = ProductRepository::from_connection(conn).refresh_latest_net_values()?;
            println!("refreshed_products={}", refreshed);
            Ok(())
        }
        "batches" => {
            let limit = args
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(DEFAULT_BATCH_LIMIT);
            for batch in ImportBatchRepository::from_connection(conn).list_recent(limit)? {
                println!(
                    "{}\t{}\t{}\t{}\ttotal={} created={} updated={} skipped={}",
                    batch.imported_at.to_rfc3339(),
                    batch.batch_id,
                    batch.entity_kind,
                    batch.file_name.as_deref().unwrap_or("-"),
                    batch.total_rows,
                    batch.created_rows,
                    batch.updated_rows,
                    batch.skipped_rows,
                );
            }
            Ok(())
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}

fn run_import(conn: Arc<Mutex<Connection>>, kind: EntityKind, file: &str) -> Result<()> {
    let config = ConfigManager::from_connection(conn.clone()).map_err(|e| anyhow!(e.to_string()))?;
    let importer = ResourceImporterImpl::new(SqliteEntityStore::from_connection(conn.clone()), config)
        .with_hook(Box::new(NetValueSnapshotRefresher::new(
            ProductRepository::from_connection(conn.clone()),
        )))
        .with_batch_log(ImportBatchRepository::from_connection(conn));

    let report = importer.import_file(kind, file)?;

    for row in &report.rows {
        if let RowAction::Skip(reason) = &row.action {
            eprintln!("row {} [{}] skipped: {:?}", row.row_number, row.identity, reason);
        }
    }

    let summary = &report.summary;
    println!("batch_id={}", report.batch.batch_id);
    println!(
        "total={} created={} updated={} skipped_unresolved={} skipped_unchanged={} skipped_invalid={} post_import_fired={}",
        summary.total_rows,
        summary.created,
        summary.updated,
        summary.skipped_unresolved,
        summary.skipped_unchanged,
        summary.skipped_invalid,
        summary.post_import_fired,
    );
    Ok(())
}
