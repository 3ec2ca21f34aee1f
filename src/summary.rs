use std::fmt::{self, Write};

use crate::types::{ImageRecord, MatchMode};

const RULE_HEAVY: &str = "============================================================";
const RULE_LIGHT: &str = "------------------------------------------------------------";

/// 扫描结果的统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub target: u32,
    pub mode: MatchMode,
    pub total: usize,
    pub matching: usize,
    /// 宽度满足条件的匹配图片数量
    pub width_matches: usize,
    /// 高度满足条件的匹配图片数量，与宽度分别统计，两者之和可能大于 `matching`
    pub height_matches: usize,
}

impl Summary {
    pub fn compute(
        all: &[ImageRecord],
        matching: &[ImageRecord],
        target: u32,
        mode: MatchMode,
    ) -> Self {
        let width_matches = matching.iter().filter(|r| mode.satisfies(r.width, target)).count();
        let height_matches = matching.iter().filter(|r| mode.satisfies(r.height, target)).count();
        Self {
            target,
            mode,
            total: all.len(),
            matching: matching.len(),
            width_matches,
            height_matches,
        }
    }

    /// 生成文字报告，匹配图片按 `matching` 的顺序列出
    pub fn render(&self, matching: &[ImageRecord]) -> String {
        let mut out = String::new();
        // String 的 fmt::Write 不会失败
        let _ = self.write_report(&mut out, matching);
        out
    }

    fn write_report(&self, out: &mut String, matching: &[ImageRecord]) -> fmt::Result {
        let criteria = format!("{}{}px", self.mode.symbol(), self.target);

        writeln!(out, "{RULE_HEAVY}")?;
        writeln!(out, "ANALYSIS SUMMARY")?;
        writeln!(out, "{RULE_HEAVY}")?;
        writeln!(out, "Total images analyzed: {}", self.total)?;
        writeln!(out, "Images matching criteria ({criteria}): {}", self.matching)?;

        if !matching.is_empty() {
            writeln!(out)?;
            writeln!(out, "Matching images ({}):", matching.len())?;
            writeln!(out, "{RULE_LIGHT}")?;
            for record in matching {
                writeln!(out, "  {}", record.name)?;
                writeln!(out, "    Path: {}", record.path)?;
                writeln!(out, "    Dimensions: {}x{} px", record.width, record.height)?;
                writeln!(out, "    Size: {:.2} MB", record.size_mb)?;
                writeln!(out)?;
            }
            writeln!(out, "{RULE_LIGHT}")?;
            writeln!(out, "Statistics:")?;
            writeln!(out, "  Images with width {criteria}: {}", self.width_matches)?;
            writeln!(out, "  Images with height {criteria}: {}", self.height_matches)?;
        }

        writeln!(out, "{RULE_HEAVY}")
    }
}
