// ==========================================
// 私募基金数据平台 - 资源导出
// ==========================================
// 职责: 已存储实体 → Dataset → CSV
// 约束: 表头与资源声明的列一致,导出文件可原样回导
// ==========================================

use crate::domain::resource::{FieldValue, ResourceSpec};
use crate::domain::types::EntityKind;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{CellValue, Dataset};
use crate::repository::EntityStore;
use std::io::Write;
use tracing::info;

/// 字段值 → 导出单元格
fn export_cell(value: Option<&FieldValue>) -> CellValue {
    match value {
        None | Some(FieldValue::Null) => CellValue::Empty,
        Some(FieldValue::Integer(i)) => CellValue::Int(*i),
        Some(FieldValue::Decimal(d)) => CellValue::Float(*d),
        Some(other) => CellValue::text(&other.to_string()),
    }
}

pub struct ResourceExporter<S: EntityStore> {
    store: S,
}

impl<S: EntityStore> ResourceExporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 导出为数据集（按写入顺序）
    pub fn export_dataset(&self, kind: EntityKind) -> ImportResult<Dataset> {
        let spec = ResourceSpec::for_kind(kind);
        let records = self.store.list_all(&spec)?;

        let rows = records
            .iter()
            .map(|record| {
                spec.fields
                    .iter()
                    .map(|f| export_cell(record.get(&f.attribute)))
                    .collect()
            })
            .collect();

        Ok(Dataset::from_rows(spec.column_names(), rows))
    }

    /// 导出为 CSV
    ///
    /// # 返回
    /// - Ok(usize): 导出的数据行数
    pub fn write_csv<W: Write>(&self, kind: EntityKind, writer: W) -> ImportResult<usize> {
        let dataset = self.export_dataset(kind)?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&dataset.headers)?;
        for row in &dataset.rows {
            csv_writer.write_record(row.cells.iter().map(|c| c.to_string()))?;
        }
        csv_writer.flush()?;

        info!(entity = %kind, rows = dataset.len(), "CSV 导出完成");
        Ok(dataset.len())
    }
}
