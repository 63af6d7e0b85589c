// ==========================================
// 私募基金数据平台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::EntityKind;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 单元格解码错误
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("无法识别的日期: {value}")]
    InvalidDate { value: String },

    #[error("无法识别的数值: {value}")]
    InvalidNumber { value: String },

    /// 外键查找时的存储故障（不包括"未找到"）
    #[error("外键查找失败: {0}")]
    Lookup(#[from] RepositoryError),
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("缺少表头行（表格行数不足）")]
    MissingHeaderRow,

    #[error("缺少业务标识列 (实体 {entity}): {column}")]
    MissingIdentityColumn { entity: EntityKind, column: String },

    #[error("日期格式错误 (行 {row}, 字段 {field}): {value}")]
    InvalidDate {
        row: usize,
        field: String,
        value: String,
    },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 存储错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 配置错误 =====
    #[error("配置读取失败: {0}")]
    ConfigReadError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 将单元格解码错误附加行号/字段上下文
    pub fn from_decode(row: usize, field: &str, err: DecodeError) -> Self {
        match err {
            DecodeError::InvalidDate { value } => ImportError::InvalidDate {
                row,
                field: field.to_string(),
                value,
            },
            DecodeError::InvalidNumber { value } => ImportError::TypeConversionError {
                row,
                field: field.to_string(),
                message: format!("无法识别的数值: {}", value),
            },
            DecodeError::Lookup(e) => ImportError::Repository(e),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
