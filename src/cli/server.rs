use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::job::JobStore;
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:5001")]
    pub addr: String,
    /// 任务结果 CSV 的保存目录
    #[arg(long, value_name = "DIR", default_value = "analysis_results")]
    pub results_dir: PathBuf,
    /// 最多保留的任务数量，超过后淘汰最早结束的任务
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub max_jobs: usize,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let jobs = JobStore::new(self.results_dir.clone(), self.max_jobs);
        std::fs::create_dir_all(jobs.results_dir())
            .with_context(|| format!("无法创建结果目录 {}", self.results_dir.display()))?;
        info!("任务结果保存到 {}", jobs.results_dir().display());

        // 创建应用
        let app = server::create_app(server::AppState::new(jobs));

        // 启动服务器
        info!("服务器启动：http://{}", &self.addr);
        info!("API 文档：http://{}/docs", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
