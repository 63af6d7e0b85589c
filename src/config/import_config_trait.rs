// ==========================================
// 私募基金数据平台 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::error::Error;
use std::fmt;

// ==========================================
// DateErrorPolicy - 日期解码失败时的处理策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateErrorPolicy {
    /// 中止整个批次（已写入的行保留）
    AbortBatch,
    /// 跳过当前行并计为无效行，批次继续
    SkipRow,
}

impl DateErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateErrorPolicy::AbortBatch => "ABORT",
            DateErrorPolicy::SkipRow => "SKIP_ROW",
        }
    }

    /// 解析配置值（不区分大小写，未知值返回 None）
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ABORT" => Some(DateErrorPolicy::AbortBatch),
            "SKIP_ROW" => Some(DateErrorPolicy::SkipRow),
            _ => None,
        }
    }
}

impl fmt::Display for DateErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader {
    /// 获取字符串日期格式列表（按顺序尝试，先成功者为准）
    ///
    /// # 默认值
    /// - %Y-%m-%d, %m/%d/%Y, %m/%d/%y, %b %d %Y, %b %d, %Y, %d %b %Y,
    ///   %d %b, %Y, %B %d %Y, %B %d, %Y, %d %B %Y, %d %B, %Y
    fn get_date_input_formats(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// 获取日期解码失败策略
    ///
    /// # 默认值
    /// - ABORT
    fn get_date_error_policy(&self) -> Result<DateErrorPolicy, Box<dyn Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!(DateErrorPolicy::parse("abort"), Some(DateErrorPolicy::AbortBatch));
        assert_eq!(DateErrorPolicy::parse(" SKIP_ROW "), Some(DateErrorPolicy::SkipRow));
        assert_eq!(DateErrorPolicy::parse("ignore"), None);
        assert_eq!(DateErrorPolicy::SkipRow.to_string(), "SKIP_ROW");
    }
}
