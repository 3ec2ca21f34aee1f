use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 尺寸匹配模式
#[derive(ValueEnum, Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// 任意一边小于等于目标尺寸
    #[default]
    Lte,
    /// 任意一边恰好等于目标尺寸
    Exact,
}

impl MatchMode {
    /// 报告中使用的比较符号
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lte => "≤",
            Self::Exact => "=",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lte => f.write_str("lte"),
            Self::Exact => f.write_str("exact"),
        }
    }
}

/// 触发匹配的那一条边，宽度优先
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchedAxis {
    Width,
    Height,
    None,
}

impl fmt::Display for MatchedAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width => f.write_str("width"),
            Self::Height => f.write_str("height"),
            Self::None => f.write_str("none"),
        }
    }
}

/// 单张图片的探测结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// 文件的完整路径
    pub path: String,
    /// 文件名
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// 是否满足当前模式下的尺寸条件
    pub matches: bool,
    pub matched_axis: MatchedAxis,
    /// 解码器报告的图片格式，如 `JPEG`
    pub format: String,
    /// 像素模式，如 `RGB`
    pub color_mode: String,
    /// 文件大小，单位 MiB
    pub size_mb: f64,
}

/// 一次扫描的结果，`matching` 是 `all` 中满足条件的子集
#[derive(Debug, Clone, Default)]
pub struct ScanResultSet {
    pub all: Vec<ImageRecord>,
    pub matching: Vec<ImageRecord>,
}

impl ScanResultSet {
    /// 收集一条探测结果
    pub fn push(&mut self, record: ImageRecord) {
        if record.matches {
            self.matching.push(record.clone());
        }
        self.all.push(record);
    }
}
