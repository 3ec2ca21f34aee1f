use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::discover::Extensions;
use crate::scanner::{DEFAULT_TARGET_DIMENSION, DEFAULT_WORKERS, ScanConfig};
use crate::types::MatchMode;

#[derive(Parser, Debug, Clone)]
pub struct ScanOptions {
    /// 并发探测的线程数
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
    /// 目标尺寸（像素）
    #[arg(short, long, value_name = "PIXELS", default_value_t = DEFAULT_TARGET_DIMENSION)]
    pub dimension: u32,
    /// 匹配模式：lte 为小于等于，exact 为恰好等于
    #[arg(long, value_enum, default_value_t = MatchMode::Lte)]
    pub mode: MatchMode,
    /// 扫描的文件后缀名，多个后缀用逗号分隔，不区分大小写
    #[arg(short, long, value_name = "LIST", default_value = "jpg,jpeg,png,tiff,tif,bmp,gif,webp")]
    pub extensions: Extensions,
}

impl ScanOptions {
    pub fn to_config(&self) -> ScanConfig {
        ScanConfig {
            target: self.dimension,
            mode: self.mode,
            workers: self.workers.max(1),
            extensions: self.extensions.clone(),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imscan", version, about = "按尺寸查找图片")]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描目录并导出 CSV
    Scan(ScanCommand),
    /// 启动 HTTP 任务服务
    Server(ServerCommand),
}
