// ==========================================
// 私募基金数据平台 - 风险测评领域模型
// ==========================================
// 依据: 私募投资基金投资者风险调查问卷（13 题评分表）
// 职责: 答案计分 + 风险等级划分
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==========================================
// 评分表 (题号 → 选项 → 分值)
// ==========================================
const MARK_SHEET: &[(&str, &[(&str, i32)])] = &[
    ("1", &[("A", 4), ("B", 5), ("C", 3), ("D", 2)]),
    ("2", &[("A", 2), ("B", 3), ("C", 4), ("D", 5)]),
    ("3", &[("A", 3), ("B", 4), ("C", 4), ("D", 5)]),
    ("4", &[("A", 3), ("B", 5), ("C", 6), ("D", 7), ("E", 8)]),
    ("5", &[("A", 2), ("B", 3), ("C", 4), ("D", 5)]),
    ("6", &[("A", 4), ("B", 5), ("C", 6)]),
    ("7", &[("A", 3), ("B", 5), ("C", 6), ("D", 7)]),
    ("8", &[("A", 3), ("B", 5), ("C", 6), ("D", 7), ("E", 8)]),
    ("9", &[("A", 4), ("B", 6), ("C", 7), ("D", 8)]),
    ("10", &[("A", 3), ("B", 5), ("C", 7)]),
    ("11", &[("A", 4), ("B", 6), ("C", 10), ("D", 12)]),
    ("12", &[("A", 4), ("B", 7), ("C", 10), ("D", 12)]),
    ("13", &[("A", 4), ("B", 7), ("C", 10), ("D", 12)]),
];

/// 查询单题得分（未知题号/选项得 0 分）
pub fn mark(question: &str, option: &str) -> i32 {
    let question = question.trim();
    let option = option.trim().to_uppercase();

    MARK_SHEET
        .iter()
        .find(|(q, _)| *q == question)
        .and_then(|(_, options)| options.iter().find(|(o, _)| *o == option))
        .map(|(_, score)| *score)
        .unwrap_or(0)
}

/// JSON 标量转文本（字符串不带引号）
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 根据答案计算得分
///
/// # 参数
/// - answers: JSON 对象 {"题号": "选项"}；也接受包含该对象的 JSON 字符串
///
/// # 规则
/// - 题号/选项去首尾空白，选项不区分大小写
/// - 空答案、未知题号、未知选项均计 0 分
pub fn calc_score(answers: &Value) -> i32 {
    match answers {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| scalar_text(v).map(|opt| mark(k, &opt)))
            .sum(),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(|v| v.is_object())
            .map(|v| calc_score(&v))
            .unwrap_or(0),
        _ => 0,
    }
}

// ==========================================
// RiskGrade - 风险等级
// ==========================================
// 风险等级  保守型    谨慎型   稳健型   积极型   进取型
// 分值区间  50分以下  51-60分  61-70分  71-85分  86-100分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskGrade {
    Conservative,
    Cautious,
    Steady,
    Active,
    Aggressive,
}

impl RiskGrade {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s <= 50 => RiskGrade::Conservative,
            51..=60 => RiskGrade::Cautious,
            61..=70 => RiskGrade::Steady,
            71..=85 => RiskGrade::Active,
            _ => RiskGrade::Aggressive,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskGrade::Conservative => "保守型",
            RiskGrade::Cautious => "谨慎型",
            RiskGrade::Steady => "稳健型",
            RiskGrade::Active => "积极型",
            RiskGrade::Aggressive => "进取型",
        }
    }

    /// 适合购买的产品风险类型
    pub fn suitable_products(&self) -> &'static str {
        match self {
            RiskGrade::Conservative => "低风险产品",
            RiskGrade::Cautious => "低、较低风险产品",
            RiskGrade::Steady => "低、较低、中等风险产品",
            RiskGrade::Active => "低、较低、中等、较高风险产品",
            RiskGrade::Aggressive => "所有风险类型产品",
        }
    }
}

// ==========================================
// RiskEvaluation - 用户风险测评信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvaluation {
    pub user_id: i64,
    pub is_complete: Option<bool>,
    pub answer: Value,
    pub score: i32,
}

impl RiskEvaluation {
    /// 创建测评记录（得分由答案计算）
    pub fn new(user_id: i64, is_complete: Option<bool>, answer: Value) -> Self {
        let score = calc_score(&answer);
        Self {
            user_id,
            is_complete,
            answer,
            score,
        }
    }

    /// 按当前答案重新计分
    pub fn recalc_score(&mut self) {
        self.score = calc_score(&self.answer);
    }

    /// 风险等级（未完成测评时为 None）
    pub fn risk_grade(&self) -> Option<RiskGrade> {
        if self.is_complete == Some(true) {
            Some(RiskGrade::from_score(self.score))
        } else {
            None
        }
    }
}
