// ==========================================
// 私募基金数据平台 - 文件解析器实现
// ==========================================
// 职责: 字节流 → Dataset（表头 + 数据行）
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 红线: Excel 表头固定取第 2 行（索引 1），第 1 行为标题行直接丢弃
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Excel 表头所在行索引（从 0 开始）
pub const SPREADSHEET_HEADER_INDEX: usize = 1;

/// CSV 表头所在行索引
pub const CSV_HEADER_INDEX: usize = 0;

// ==========================================
// CellValue - 原始单元格值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// 由文本构造（去首尾空白，空串视为空单元格）
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(v) => CellValue::Float(*v),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::String(s) => CellValue::text(s),
            // 日期单元格按序列号交给日期解码器
            Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::text(s),
            Data::DurationIso(s) => CellValue::text(s),
            Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        }
    }
}

// ==========================================
// Dataset - 表格数据
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub row_number: usize, // 源文件中的行号（从 1 开始）
    pub cells: Vec<CellValue>,
}

impl DataRow {
    /// 按列索引取值（越界视为空单元格）
    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<DataRow>,
}

impl Dataset {
    /// 由表头与数据行构造（行号按"表头在第 1 行"编号）
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| DataRow {
                row_number: idx + 2,
                cells,
            })
            .collect();
        Self { headers, rows }
    }

    /// 列名 → 列索引（首个同名列）
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 由网格构造 Dataset
///
/// # 参数
/// - grid: 以绝对行列定位的单元格网格
/// - header_index: 表头所在行索引
///
/// # 规则
/// - 表头行之前的行全部丢弃
/// - 完全空白的数据行丢弃
pub fn dataset_from_grid(grid: Vec<Vec<CellValue>>, header_index: usize) -> ImportResult<Dataset> {
    if grid.len() <= header_index {
        return Err(ImportError::MissingHeaderRow);
    }

    let mut rows_iter = grid.into_iter().enumerate().skip(header_index);
    let headers: Vec<String> = match rows_iter.next() {
        Some((_, header_row)) => header_row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Err(ImportError::MissingHeaderRow),
    };

    let mut rows = Vec::new();
    for (idx, cells) in rows_iter {
        if cells.iter().all(CellValue::is_blank) {
            continue;
        }
        rows.push(DataRow {
            row_number: idx + 1,
            cells,
        });
    }

    Ok(Dataset { headers, rows })
}

// ==========================================
// SourceFormat - 源文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xls,
    Xlsx,
    Csv,
}

impl SourceFormat {
    /// 根据扩展名判断格式（不区分大小写）
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "xls" => Ok(SourceFormat::Xls),
            "xlsx" => Ok(SourceFormat::Xlsx),
            "csv" => Ok(SourceFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser {
    /// 解析字节流为 Dataset
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<Dataset>;
}

// ==========================================
// Excel Parser 实现（xls / xlsx）
// ==========================================
pub struct SpreadsheetParser;

impl SpreadsheetParser {
    /// 读取第一个工作表为绝对定位网格
    fn read_first_sheet(bytes: &[u8]) -> ImportResult<Vec<Vec<CellValue>>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))??;

        // 已用区域可能不从 A1 开始
        let (start_row, start_col) = match range.start() {
            Some((r, c)) => (r as usize, c as usize),
            None => return Ok(Vec::new()),
        };

        let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); start_row];
        for row in range.rows() {
            let mut cells = vec![CellValue::Empty; start_col];
            cells.extend(row.iter().map(CellValue::from));
            grid.push(cells);
        }

        debug!(rows = grid.len(), start_row, start_col, "工作表读取完成");
        Ok(grid)
    }
}

impl FileParser for SpreadsheetParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<Dataset> {
        let grid = Self::read_first_sheet(bytes)?;
        dataset_from_grid(grid, SPREADSHEET_HEADER_INDEX)
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<Dataset> {
        // UTF-8 BOM
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        let mut grid = Vec::new();
        for result in reader.records() {
            let record = result?;
            grid.push(record.iter().map(CellValue::text).collect::<Vec<_>>());
        }

        dataset_from_grid(grid, CSV_HEADER_INDEX)
    }
}

// ==========================================
// 通用文件解析器（根据格式自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse_bytes(&self, format: SourceFormat, bytes: &[u8]) -> ImportResult<Dataset> {
        match format {
            SourceFormat::Xls | SourceFormat::Xlsx => SpreadsheetParser.parse_bytes(bytes),
            SourceFormat::Csv => CsvParser.parse_bytes(bytes),
        }
    }

    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<Dataset> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let format = SourceFormat::from_path(path)?;
        let bytes = std::fs::read(path)?;
        self.parse_bytes(format, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_spreadsheet_header_offset() {
        let grid = vec![
            vec![text("产品净值表")],
            vec![text("product"), text("pdate"), text("net_value")],
            vec![text("P1"), CellValue::Float(43831.0), CellValue::Float(1.05)],
            vec![text("P2"), CellValue::Float(43832.0), CellValue::Float(1.10)],
        ];

        let dataset = dataset_from_grid(grid, SPREADSHEET_HEADER_INDEX).unwrap();
        assert_eq!(dataset.headers, vec!["product", "pdate", "net_value"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows[0].row_number, 3);
        assert_eq!(dataset.rows[0].cell(0), &text("P1"));
        assert_eq!(dataset.rows[1].cell(9), &CellValue::Empty);
    }

    #[test]
    fn test_missing_header_row() {
        let grid = vec![vec![text("只有标题")]];
        let result = dataset_from_grid(grid, SPREADSHEET_HEADER_INDEX);
        assert!(matches!(result, Err(ImportError::MissingHeaderRow)));
    }

    #[test]
    fn test_blank_rows_dropped() {
        let grid = vec![
            vec![text("标题")],
            vec![text("vcode"), text("short_name")],
            vec![CellValue::Empty, text("  ")],
            vec![text("V1"), text("甲")],
        ];
        let dataset = dataset_from_grid(grid, SPREADSHEET_HEADER_INDEX).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows[0].row_number, 4);
    }

    #[test]
    fn test_csv_header_is_first_line() {
        let bytes = "vcode,short_name\nV001, 甲 \n,\nV002,乙\n".as_bytes();
        let dataset = CsvParser.parse_bytes(bytes).unwrap();

        assert_eq!(dataset.headers, vec!["vcode", "short_name"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows[0].row_number, 2);
        assert_eq!(dataset.rows[0].cell(1), &text("甲"));
        assert_eq!(dataset.rows[1].row_number, 4);
    }

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("a.XLSX")).unwrap(), SourceFormat::Xlsx);
        assert_eq!(SourceFormat::from_path(Path::new("a.xls")).unwrap(), SourceFormat::Xls);
        assert!(matches!(
            SourceFormat::from_path(Path::new("a.txt")),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_universal_parser_reads_csv_file() {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "id,name").unwrap();
        writeln!(temp_file, "1,总部").unwrap();

        let dataset = UniversalFileParser.parse(temp_file.path()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows[0].cell(0), &text("1"));
    }

    #[test]
    fn test_universal_parser_file_not_found() {
        let result = UniversalFileParser.parse("non_existent.csv");
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }
}
