// ==========================================
// 私募基金数据平台 - 导入导出层
// ==========================================
// 职责: 表格数据 ↔ 实体（解码 / 行判定 / 落库 / 后处理 / 导出）
// 支持: Excel (.xls/.xlsx), CSV
// ==========================================

// 模块声明
pub mod error;
pub mod exporter;
pub mod field_decoder;
pub mod file_parser;
pub mod post_import;
pub mod resource_importer_impl;
pub mod resource_importer_trait;
pub mod row_reconciler;

// 重导出核心类型
pub use error::{DecodeError, ImportError, ImportResult};
pub use exporter::ResourceExporter;
pub use field_decoder::{CellDecoder, Decoded};
pub use file_parser::{
    CellValue, CsvParser, DataRow, Dataset, FileParser, SourceFormat, SpreadsheetParser,
    UniversalFileParser,
};
pub use post_import::{NetValueSnapshotRefresher, PostImportHook};
pub use resource_importer_impl::ResourceImporterImpl;
pub use resource_importer_trait::ResourceImporter;
pub use row_reconciler::{DecodedField, RowDecision, RowReconciler};
