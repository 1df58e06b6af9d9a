//! 数据分析工具（模拟）：把上一步结果当作数据摘要，给出基础统计与分析目标
//!
//! 不调用模型；从文本中提取数值做计数 / 最小 / 最大 / 平均，便于后续步骤引用。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::plan::ToolKind;
use crate::tools::{Tool, ToolInput};

#[derive(Debug, Default)]
pub struct DataAnalyzerTool;

impl DataAnalyzerTool {
    pub fn new() -> Self {
        Self
    }
}

/// 提取文本中的所有数值（整数 / 小数 / 负数）
fn extract_numbers(text: &str) -> Vec<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number regex"));
    re.find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// 生成模拟分析报告
pub fn simulate_analysis(data_summary: &str, objective: &str) -> String {
    let lines = data_summary.lines().filter(|l| !l.trim().is_empty()).count();
    let words = data_summary.split_whitespace().count();
    let numbers = extract_numbers(data_summary);

    let mut report = format!(
        "Simulated data analysis\nObjective: {}\nInput: {} lines, {} words, {} numeric values",
        objective,
        lines,
        words,
        numbers.len()
    );
    if !numbers.is_empty() {
        let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        report.push_str(&format!("\nmin={} max={} mean={:.2}", min, max, mean));
    }
    report
}

#[async_trait]
impl Tool for DataAnalyzerTool {
    fn kind(&self) -> ToolKind {
        ToolKind::DataAnalyzer
    }

    fn description(&self) -> &str {
        "Simulated analysis of the previous result against an objective."
    }

    async fn invoke(&self, input: &ToolInput) -> Result<String, String> {
        Ok(simulate_analysis(&input.context, &input.instruction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_and_stats() {
        let report = simulate_analysis("sales: 10, 20\nreturns: -5.5", "trend");
        assert!(report.contains("Objective: trend"));
        assert!(report.contains("2 lines"));
        assert!(report.contains("3 numeric values"));
        assert!(report.contains("min=-5.5 max=20 mean=8.17"));
    }

    #[test]
    fn test_no_numbers() {
        let report = simulate_analysis("no figures here", "check");
        assert!(report.contains("0 numeric values"));
        assert!(!report.contains("mean="));
    }
}
