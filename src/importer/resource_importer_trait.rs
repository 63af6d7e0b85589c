// ==========================================
// 私募基金数据平台 - 资源导入 Trait
// ==========================================
// 职责: 定义按实体种类导入的接口（不包含实现）
// ==========================================

use crate::domain::import::ImportReport;
use crate::domain::types::EntityKind;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::{Dataset, SourceFormat};
use std::path::Path;

// ==========================================
// ResourceImporter Trait
// ==========================================
// 实现者: ResourceImporterImpl
pub trait ResourceImporter {
    /// 导入已解析的数据集（一次调用 = 一个批次）
    ///
    /// # 参数
    /// - kind: 实体种类（决定资源声明）
    /// - dataset: 表头 + 数据行
    /// - file_name: 源文件名（仅用于批次日志）
    ///
    /// # 返回
    /// - Ok(ImportReport): 批次汇总、逐行结果、耗时
    /// - Err: 缺少标识列、日期无法识别（ABORT 策略）、存储故障
    ///
    /// # 说明
    /// - 逐行按输入顺序处理，出错时已写入的行保留
    /// - 后处理钩子在批次成功结束后同步执行一次
    fn import_dataset(
        &self,
        kind: EntityKind,
        dataset: &Dataset,
        file_name: Option<&str>,
    ) -> ImportResult<ImportReport>;

    /// 从字节流导入（Excel 表头在第 2 行，CSV 表头在第 1 行）
    fn import_bytes(
        &self,
        kind: EntityKind,
        format: SourceFormat,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImportResult<ImportReport>;

    /// 从文件导入（按扩展名选择格式）
    fn import_file<P: AsRef<Path>>(&self, kind: EntityKind, file_path: P) -> ImportResult<ImportReport>;
}
