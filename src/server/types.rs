use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::types::MatchMode;

fn default_directory() -> String {
    ".".to_string()
}

/// 提交扫描任务的参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// 扫描的根目录
    #[serde(default = "default_directory")]
    #[schema(default = ".")]
    pub directory: String,
    /// 目标尺寸，默认为 330
    pub dimension: Option<u32>,
    /// 匹配模式，默认为 lte
    pub mode: Option<MatchMode>,
    /// 并发探测线程数，默认为 4
    pub workers: Option<usize>,
}

/// 任务提交结果
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub job_id: String,
    pub status: String,
}

/// 目录浏览参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BrowseQuery {
    /// 要浏览的目录，默认为当前目录
    pub path: Option<String>,
}

/// 目录浏览结果
#[derive(Debug, Serialize, ToSchema)]
pub struct BrowseResponse {
    pub current_path: String,
    /// 上级目录及所有子目录
    pub items: Vec<BrowseItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BrowseItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl BrowseItem {
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self { name: name.into(), path: path.into(), kind: "directory".to_string() }
    }
}
