// ==========================================
// 私募基金数据平台 - 资源导入器实现
// ==========================================
// 职责: 整合导入流程，从数据集到数据库
// 流程: 列校验 → 逐行解码 → 查已存储实体 → 行判定 → 落库 → 后处理 → 批次日志
// ==========================================

use crate::config::{DateErrorPolicy, ImportConfigReader};
use crate::domain::import::{ImportBatch, ImportReport, ImportSummary, RowAction, RowResult, SkipReason};
use crate::domain::resource::{FieldMapping, FieldValue, ResourceSpec};
use crate::domain::types::EntityKind;
use crate::importer::error::{DecodeError, ImportError, ImportResult};
use crate::importer::field_decoder::{CellDecoder, Decoded};
use crate::importer::file_parser::{DataRow, Dataset, SourceFormat, UniversalFileParser};
use crate::importer::post_import::PostImportHook;
use crate::importer::resource_importer_trait::ResourceImporter;
use crate::importer::row_reconciler::{DecodedField, RowDecision, RowReconciler};
use crate::repository::{EntityStore, ImportBatchRepository, UpsertOutcome};
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 单行解码结果
enum RowOutcome {
    Decoded(Vec<DecodedField>),
    Invalid {
        identity: String,
        field: String,
        value: String,
    },
}

// ==========================================
// ResourceImporterImpl - 资源导入器实现
// ==========================================
pub struct ResourceImporterImpl<S, C>
where
    S: EntityStore,
    C: ImportConfigReader,
{
    // 数据访问层
    store: S,

    // 配置读取器
    config: C,

    // 导入组件
    file_parser: UniversalFileParser,
    reconciler: RowReconciler,
    hooks: Vec<Box<dyn PostImportHook>>,

    // 批次日志（可选）
    batch_repo: Option<ImportBatchRepository>,
}

impl<S, C> ResourceImporterImpl<S, C>
where
    S: EntityStore,
    C: ImportConfigReader,
{
    /// 创建新的 ResourceImporter 实例
    ///
    /// # 参数
    /// - store: 实体存储
    /// - config: 配置读取器
    pub fn new(store: S, config: C) -> Self {
        Self {
            store,
            config,
            file_parser: UniversalFileParser,
            reconciler: RowReconciler,
            hooks: Vec::new(),
            batch_repo: None,
        }
    }

    /// 注册批次后处理钩子（按注册顺序执行）
    pub fn with_hook(mut self, hook: Box<dyn PostImportHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// 启用批次日志
    pub fn with_batch_log(mut self, batch_repo: ImportBatchRepository) -> Self {
        self.batch_repo = Some(batch_repo);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 本数据集出现的映射列（列索引）
    ///
    /// # 错误
    /// - 任一业务标识列缺失 → MissingIdentityColumn
    fn plan_columns<'a>(
        spec: &'a ResourceSpec,
        dataset: &Dataset,
    ) -> ImportResult<Vec<(&'a FieldMapping, usize)>> {
        for id_field in spec.identity_fields() {
            if dataset.column_index(&id_field.column).is_none() {
                return Err(ImportError::MissingIdentityColumn {
                    entity: spec.kind,
                    column: id_field.column.clone(),
                });
            }
        }

        let present: Vec<(&FieldMapping, usize)> = spec
            .fields
            .iter()
            .filter_map(|mapping| dataset.column_index(&mapping.column).map(|idx| (mapping, idx)))
            .collect();

        let ignored: Vec<&String> = dataset
            .headers
            .iter()
            .filter(|h| !h.is_empty() && spec.fields.iter().all(|f| &f.column != *h))
            .collect();
        if !ignored.is_empty() {
            warn!(entity = %spec.kind, columns = ?ignored, "存在未声明的列，已忽略");
        }

        Ok(present)
    }

    /// 解码一行的全部出现字段
    fn decode_row(
        &self,
        decoder: &CellDecoder,
        policy: DateErrorPolicy,
        spec: &ResourceSpec,
        columns: &[(&FieldMapping, usize)],
        row: &DataRow,
    ) -> ImportResult<RowOutcome> {
        let mut fields = Vec::with_capacity(columns.len());
        for (pos, (mapping, idx)) in columns.iter().enumerate() {
            match decoder.decode(&self.store, mapping, row.cell(*idx)) {
                Ok(decoded) => fields.push(decoded_field(mapping, decoded)),
                Err(DecodeError::InvalidDate { value }) if policy == DateErrorPolicy::SkipRow => {
                    // 其后的标识列只为诊断文本而解码，失败留空
                    for (rest, rest_idx) in &columns[pos + 1..] {
                        if !spec.import_id_fields.contains(&rest.attribute) {
                            continue;
                        }
                        if let Ok(decoded) = decoder.decode(&self.store, rest, row.cell(*rest_idx)) {
                            fields.push(decoded_field(rest, decoded));
                        }
                    }

                    let identity = spec
                        .import_id_fields
                        .iter()
                        .map(|name| {
                            if name == &mapping.attribute {
                                value.clone()
                            } else {
                                identity_part(&fields, name)
                            }
                        })
                        .collect::<Vec<_>>()
                        .join("/");

                    return Ok(RowOutcome::Invalid {
                        identity,
                        field: mapping.attribute.clone(),
                        value,
                    });
                }
                Err(e) => return Err(ImportError::from_decode(row.row_number, &mapping.attribute, e)),
            }
        }
        Ok(RowOutcome::Decoded(fields))
    }

    /// 处理一行：判定 → 落库
    fn process_row(
        &self,
        spec: &ResourceSpec,
        fields: Vec<DecodedField>,
    ) -> ImportResult<(String, RowAction)> {
        let identity: Vec<(String, FieldValue)> = spec
            .import_id_fields
            .iter()
            .filter_map(|name| {
                fields
                    .iter()
                    .find(|f| &f.attribute == name)
                    .and_then(|f| f.value().map(|v| (name.clone(), v.clone())))
            })
            .collect();
        let identity_label = describe_identity(&fields, &spec.import_id_fields);

        // 外键未找到时标识不完整，不查已存储实体
        let existing = if fields.iter().any(|f| f.decoded.is_unresolved()) {
            None
        } else {
            self.store.find_by_identity(spec, &identity)?
        };

        let action = match self.reconciler.decide(spec, &fields, existing.as_ref()) {
            RowDecision::Skip(reason) => RowAction::Skip(reason),
            RowDecision::Write => {
                let values: Vec<(String, FieldValue)> = fields
                    .into_iter()
                    .filter_map(|f| match f.decoded {
                        Decoded::Resolved(v) => Some((f.attribute, v)),
                        Decoded::Unresolved { .. } => None,
                    })
                    .collect();

                match self.store.upsert(spec, &identity, &values)? {
                    UpsertOutcome::Created => RowAction::Create,
                    UpsertOutcome::Updated => RowAction::Update,
                }
            }
        };

        Ok((identity_label, action))
    }

    /// 执行适用的后处理钩子
    ///
    /// # 返回
    /// - Ok(true): 至少执行了一个钩子
    fn run_hooks(&self, summary: &ImportSummary) -> ImportResult<bool> {
        let mut fired = false;
        for hook in &self.hooks {
            if hook.applies_to(summary) {
                debug!(hook = hook.name(), "执行批次后处理");
                hook.run(summary)?;
                fired = true;
            }
        }
        Ok(fired)
    }
}

fn decoded_field(mapping: &FieldMapping, decoded: Decoded) -> DecodedField {
    DecodedField {
        attribute: mapping.attribute.clone(),
        compare: mapping.compare,
        decoded,
    }
}

/// 业务标识的诊断文本（复合标识以 "/" 连接）
fn describe_identity(fields: &[DecodedField], id_fields: &[String]) -> String {
    id_fields
        .iter()
        .map(|name| identity_part(fields, name))
        .collect::<Vec<_>>()
        .join("/")
}

fn identity_part(fields: &[DecodedField], name: &str) -> String {
    match fields.iter().find(|f| f.attribute == name).map(|f| &f.decoded) {
        Some(Decoded::Resolved(v)) => v.to_string(),
        Some(Decoded::Unresolved { key }) => key.clone(),
        None => String::new(),
    }
}

impl<S, C> ResourceImporter for ResourceImporterImpl<S, C>
where
    S: EntityStore,
    C: ImportConfigReader,
{
    #[instrument(skip(self, dataset), fields(batch_id))]
    fn import_dataset(
        &self,
        kind: EntityKind,
        dataset: &Dataset,
        file_name: Option<&str>,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        let spec = ResourceSpec::for_kind(kind);
        info!(batch_id = %batch_id, entity = %kind, rows = dataset.len(), "开始导入");

        // === 步骤 1: 读取配置 ===
        let date_formats = self
            .config
            .get_date_input_formats()
            .map_err(|e| ImportError::ConfigReadError(e.to_string()))?;
        let policy = self
            .config
            .get_date_error_policy()
            .map_err(|e| ImportError::ConfigReadError(e.to_string()))?;
        let decoder = CellDecoder::new(date_formats);
        debug!(policy = %policy, "配置读取完成");

        // === 步骤 2: 列校验 ===
        let columns = Self::plan_columns(&spec, dataset)?;
        debug!(columns = columns.len(), "列校验完成");

        // === 步骤 3: 逐行处理 ===
        let mut summary = ImportSummary::new(kind);
        let mut rows = Vec::with_capacity(dataset.len());

        for row in &dataset.rows {
            let (identity, action) = match self.decode_row(&decoder, policy, &spec, &columns, row)? {
                RowOutcome::Decoded(fields) => self.process_row(&spec, fields)?,
                RowOutcome::Invalid {
                    identity,
                    field,
                    value,
                } => (identity, RowAction::Skip(SkipReason::InvalidValue { field, value })),
            };

            match &action {
                RowAction::Skip(SkipReason::Unchanged) => {
                    debug!(row_number = row.row_number, identity = %identity, "未变更，跳过")
                }
                RowAction::Skip(reason) => {
                    warn!(row_number = row.row_number, identity = %identity, reason = ?reason, "跳过行")
                }
                _ => debug!(row_number = row.row_number, identity = %identity, action = ?action, "已写入"),
            }

            summary.record(&action);
            rows.push(RowResult {
                row_number: row.row_number,
                identity,
                action,
            });
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped(),
            "逐行处理完成"
        );

        // === 步骤 4: 批次后处理 ===
        summary.post_import_fired = self.run_hooks(&summary)?;

        // === 步骤 5: 批次日志 ===
        let elapsed_time = start_time.elapsed();
        let summary_json = serde_json::to_string(&summary)
            .map_err(|e| ImportError::InternalError(format!("汇总序列化失败: {}", e)))?;

        let batch = ImportBatch {
            batch_id: batch_id.clone(),
            entity_kind: kind,
            file_name: file_name.map(|s| s.to_string()),
            total_rows: summary.total_rows as i64,
            created_rows: summary.created as i64,
            updated_rows: summary.updated as i64,
            skipped_rows: summary.skipped() as i64,
            imported_at: Utc::now(),
            elapsed_ms: elapsed_time.as_millis() as i64,
            summary_json: Some(summary_json),
        };

        if let Some(repo) = &self.batch_repo {
            repo.insert_batch(&batch)?;
        }

        info!(
            batch_id = %batch_id,
            total = summary.total_rows,
            written = summary.written(),
            post_import_fired = summary.post_import_fired,
            elapsed_ms = elapsed_time.as_millis() as u64,
            "导入完成"
        );

        Ok(ImportReport {
            batch,
            summary,
            rows,
            elapsed_time,
        })
    }

    fn import_bytes(
        &self,
        kind: EntityKind,
        format: SourceFormat,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImportResult<ImportReport> {
        let dataset = self.file_parser.parse_bytes(format, bytes)?;
        debug!(format = ?format, rows = dataset.len(), "文件解析完成");
        self.import_dataset(kind, &dataset, file_name)
    }

    fn import_file<P: AsRef<Path>>(&self, kind: EntityKind, file_path: P) -> ImportResult<ImportReport> {
        let path = file_path.as_ref();
        let dataset = self.file_parser.parse(path)?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        self.import_dataset(kind, &dataset, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::file_parser::CellValue;
    use crate::repository::SqliteEntityStore;
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    struct FixedConfig(DateErrorPolicy);

    impl ImportConfigReader for FixedConfig {
        fn get_date_input_formats(&self) -> Result<Vec<String>, Box<dyn Error>> {
            Ok(vec!["%Y-%m-%d".to_string()])
        }

        fn get_date_error_policy(&self) -> Result<DateErrorPolicy, Box<dyn Error>> {
            Ok(self.0)
        }
    }

    fn importer(policy: DateErrorPolicy) -> ResourceImporterImpl<SqliteEntityStore, FixedConfig> {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        let store = SqliteEntityStore::from_connection(Arc::new(Mutex::new(conn)));
        ResourceImporterImpl::new(store, FixedConfig(policy))
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_identity_column_aborts_before_rows() {
        let importer = importer(DateErrorPolicy::AbortBatch);
        let dataset = Dataset::from_rows(headers(&["short_name"]), vec![vec![text("甲")]]);
        let result = importer.import_dataset(EntityKind::Vendor, &dataset, None);
        assert!(matches!(
            result,
            Err(ImportError::MissingIdentityColumn { column, .. }) if column == "vcode"
        ));
    }

    #[test]
    fn test_vendor_create_then_unchanged() {
        let importer = importer(DateErrorPolicy::AbortBatch);
        let dataset = Dataset::from_rows(
            headers(&["vcode", "short_name", "status"]),
            vec![vec![text("V1"), text("甲"), CellValue::Float(1.0)]],
        );

        let first = importer.import_dataset(EntityKind::Vendor, &dataset, None).unwrap();
        assert_eq!(first.summary.created, 1);
        assert_eq!(first.rows[0].identity, "V1");

        let second = importer.import_dataset(EntityKind::Vendor, &dataset, None).unwrap();
        assert_eq!(second.summary.skipped_unchanged, 1);
        assert_eq!(second.rows[0].action, RowAction::Skip(SkipReason::Unchanged));
        assert!(!second.summary.post_import_fired);
    }

    #[test]
    fn test_invalid_date_abort_and_skip_policies() {
        let dataset = Dataset::from_rows(
            headers(&["idno", "product", "trade_date"]),
            vec![vec![text("110"), text("P1"), text("not a date")]],
        );

        let abort = importer(DateErrorPolicy::AbortBatch);
        let err = abort
            .import_dataset(EntityKind::BuyedProduct, &dataset, None)
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidDate { row: 2, .. }));

        let skip = importer(DateErrorPolicy::SkipRow);
        let report = skip.import_dataset(EntityKind::BuyedProduct, &dataset, None).unwrap();
        assert_eq!(report.summary.skipped_invalid, 1);
        assert_eq!(report.summary.written(), 0);
        assert_eq!(report.rows[0].identity, "110/P1");
    }

    #[test]
    fn test_skipped_invalid_row_keeps_identity_label() {
        // 非法日期本身是标识列，且位于另一标识列之前
        let dataset = Dataset::from_rows(
            headers(&["pdate", "product", "net_value"]),
            vec![vec![text("someday"), text("P9"), CellValue::Float(1.0)]],
        );

        let report = importer(DateErrorPolicy::SkipRow)
            .import_dataset(EntityKind::ProductNetValue, &dataset, None)
            .unwrap();
        assert_eq!(report.summary.skipped_invalid, 1);
        assert_eq!(report.rows[0].identity, "P9/someday");
    }
}
