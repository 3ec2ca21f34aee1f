use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::{error, info};
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, ScanOptions};
use crate::export::export;
use crate::scanner::scan;
use crate::summary::Summary;
use crate::utils::{file_timestamp, pb_style};

#[derive(Parser, Debug, Clone)]
pub struct ScanCommand {
    #[command(flatten)]
    pub scan: ScanOptions,
    /// 图片所在目录
    #[arg(default_value = ".")]
    pub directory: PathBuf,
    /// 保存所有图片信息的 CSV 文件，默认为 image_analysis_all_<时间>.csv
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// 只保存匹配图片的 CSV 文件，默认为 image_analysis_<尺寸>px_<时间>.csv
    #[arg(short, long, value_name = "FILE")]
    pub matches_output: Option<PathBuf>,
}

impl SubCommandExtend for ScanCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let directory = std::path::absolute(&self.directory)?;

        let config = self.scan.to_config();
        let ts = file_timestamp();
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("image_analysis_all_{ts}.csv")));
        let matches_output = self.matches_output.clone().unwrap_or_else(|| {
            PathBuf::from(format!("image_analysis_{}px_{ts}.csv", config.target))
        });

        info!("开始分析 {}", directory.display());
        info!("查找尺寸 {}{}px 的图片", config.mode.symbol(), config.target);

        let pb = ProgressBar::no_length().with_style(pb_style());
        let results = block_in_place(|| scan(&directory, &config, &pb))?;

        // 导出失败不影响汇总输出
        for (records, path) in [(&results.all, &output), (&results.matching, &matches_output)] {
            if let Err(e) = export(records, path) {
                error!("保存结果失败: {e}");
            }
        }

        let summary = Summary::compute(&results.all, &results.matching, config.target, config.mode);
        println!("\n{}", summary.render(&results.matching));

        info!("分析完成");
        Ok(())
    }
}
