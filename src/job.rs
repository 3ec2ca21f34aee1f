use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Local};
use log::{error, info, warn};
use rand::distr::{Alphanumeric, SampleString};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::spawn_blocking;
use utoipa::ToSchema;

use crate::discover::check_root;
use crate::error::ScanError;
use crate::export::{ExportOutcome, export};
use crate::metrics;
use crate::scanner::{AtomicProgress, ScanConfig, scan};
use crate::types::MatchMode;
use crate::utils::file_timestamp;

/// 任务状态
#[derive(Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// 已结束的任务才允许被淘汰
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// 可下载的结果集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    All,
    Matching,
}

impl FromStr for ResultKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "matching" => Ok(Self::Matching),
            _ => Err(JobError::InvalidResultKind(s.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,
    #[error("Job not completed")]
    NotCompleted,
    #[error("File not found")]
    NoResultFile,
    #[error("Invalid file type: {0}")]
    InvalidResultKind(String),
    #[error(transparent)]
    InvalidDirectory(#[from] ScanError),
}

/// 提交一个扫描任务所需的参数
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub directory: PathBuf,
    pub config: ScanConfig,
}

/// 一个后台扫描任务
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub directory: PathBuf,
    pub config: ScanConfig,
    pub status: JobStatus,
    pub progress: Arc<AtomicProgress>,
    pub total_images: usize,
    pub matching_images: usize,
    pub all_results_file: Option<PathBuf>,
    pub matching_results_file: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Local>,
    pub start_time: Option<DateTime<Local>>,
    pub end_time: Option<DateTime<Local>>,
}

/// 任务状态快照
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct JobSnapshot {
    pub job_id: String,
    pub directory: String,
    pub target_dimension: u32,
    pub mode: MatchMode,
    pub workers: usize,
    pub status: JobStatus,
    /// 进度百分比，0 ~ 100
    pub progress: u32,
    /// 已探测的文件数量
    pub processed: usize,
    /// 发现的候选文件数量
    pub discovered: usize,
    pub total_images: usize,
    pub matching_images: usize,
    pub all_results_file: Option<String>,
    pub matching_results_file: Option<String>,
    pub error: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl Job {
    fn new(id: String, request: JobRequest) -> Self {
        Self {
            id,
            directory: request.directory,
            config: request.config,
            status: JobStatus::Pending,
            progress: Arc::new(AtomicProgress::default()),
            total_images: 0,
            matching_images: 0,
            all_results_file: None,
            matching_results_file: None,
            error: None,
            created_at: Local::now(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let (processed, discovered) = self.progress.get();
        let progress = match self.status {
            JobStatus::Completed => 100,
            _ if discovered == 0 => 0,
            _ => (processed * 100 / discovered).min(100) as u32,
        };
        JobSnapshot {
            job_id: self.id.clone(),
            directory: self.directory.display().to_string(),
            target_dimension: self.config.target,
            mode: self.config.mode,
            workers: self.config.workers,
            status: self.status,
            progress,
            processed,
            discovered,
            total_images: self.total_images,
            matching_images: self.matching_images,
            all_results_file: self.all_results_file.as_ref().map(|p| p.display().to_string()),
            matching_results_file: self
                .matching_results_file
                .as_ref()
                .map(|p| p.display().to_string()),
            error: self.error.clone(),
            start_time: self.start_time.map(|t| t.to_rfc3339()),
            end_time: self.end_time.map(|t| t.to_rfc3339()),
        }
    }
}

/// 扫描完成后的输出
struct JobOutput {
    total_images: usize,
    matching_images: usize,
    all_results_file: Option<PathBuf>,
    matching_results_file: Option<PathBuf>,
}

/// 任务注册表，由服务器状态持有
///
/// 任务数量超过 `max_jobs` 时，最早结束的任务会被淘汰；
/// 未结束的任务不会被淘汰。
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    results_dir: PathBuf,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(results_dir: PathBuf, max_jobs: usize) -> Arc<Self> {
        Arc::new(Self { jobs: RwLock::new(HashMap::new()), results_dir, max_jobs: max_jobs.max(1) })
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// 校验目录并在后台启动扫描，返回任务 ID
    pub async fn submit(self: &Arc<Self>, request: JobRequest) -> Result<String, JobError> {
        check_root(&request.directory)?;

        let id = Alphanumeric.sample_string(&mut rand::rng(), 16);
        let job = Job::new(id.clone(), request);
        let progress = job.progress.clone();
        let directory = job.directory.clone();
        let config = job.config.clone();

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(id.clone(), job);
            self.evict(&mut jobs);
        }
        metrics::inc_jobs(JobStatus::Pending.as_str());
        info!("创建任务 {id}: {}", directory.display());

        let store = self.clone();
        let job_id = id.clone();
        tokio::spawn(async move { store.run(job_id, directory, config, progress).await });

        Ok(id)
    }

    async fn run(
        self: Arc<Self>,
        id: String,
        directory: PathBuf,
        config: ScanConfig,
        progress: Arc<AtomicProgress>,
    ) {
        self.update(&id, |job| {
            job.status = JobStatus::Running;
            job.start_time = Some(Local::now());
        })
        .await;

        let results_dir = self.results_dir.clone();
        let job_id = id.clone();
        let result = spawn_blocking(move || {
            run_scan(&job_id, &directory, &config, &progress, &results_dir)
        })
        .await
        .context("扫描任务异常退出")
        .and_then(|r| r);

        match result {
            Ok(output) => {
                info!("任务 {id} 完成");
                metrics::inc_jobs(JobStatus::Completed.as_str());
                self.update(&id, |job| {
                    job.status = JobStatus::Completed;
                    job.total_images = output.total_images;
                    job.matching_images = output.matching_images;
                    job.all_results_file = output.all_results_file;
                    job.matching_results_file = output.matching_results_file;
                    job.end_time = Some(Local::now());
                })
                .await;
            }
            Err(e) => {
                error!("任务 {id} 失败: {e:#}");
                metrics::inc_jobs(JobStatus::Error.as_str());
                self.update(&id, |job| {
                    job.status = JobStatus::Error;
                    job.error = Some(format!("{e:#}"));
                    job.end_time = Some(Local::now());
                })
                .await;
            }
        }
    }

    async fn update(&self, id: &str, f: impl FnOnce(&mut Job)) {
        match self.jobs.write().await.get_mut(id) {
            Some(job) => f(job),
            None => warn!("任务 {id} 已被淘汰"),
        }
    }

    fn evict(&self, jobs: &mut HashMap<String, Job>) {
        if jobs.len() <= self.max_jobs {
            return;
        }
        let mut finished = jobs
            .values()
            .filter(|job| job.status.is_finished())
            .map(|job| (job.end_time.unwrap_or(job.created_at), job.id.clone()))
            .collect::<Vec<_>>();
        finished.sort();
        let excess = jobs.len() - self.max_jobs;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    pub async fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        self.jobs.read().await.get(id).map(Job::snapshot)
    }

    /// 按开始时间倒序返回最近的 `limit` 个任务
    pub async fn recent(&self, limit: usize) -> Vec<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let mut recent = jobs.values().collect::<Vec<_>>();
        recent.sort_by_key(|job| std::cmp::Reverse(job.start_time.unwrap_or(job.created_at)));
        recent.into_iter().take(limit).map(Job::snapshot).collect()
    }

    /// 获取已完成任务的结果文件路径
    pub async fn result_file(&self, id: &str, kind: ResultKind) -> Result<PathBuf, JobError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(id).ok_or(JobError::NotFound)?;
        if job.status != JobStatus::Completed {
            return Err(JobError::NotCompleted);
        }
        let file = match kind {
            ResultKind::All => &job.all_results_file,
            ResultKind::Matching => &job.matching_results_file,
        };
        match file {
            Some(path) if path.exists() => Ok(path.clone()),
            _ => Err(JobError::NoResultFile),
        }
    }
}

fn run_scan(
    id: &str,
    directory: &Path,
    config: &ScanConfig,
    progress: &AtomicProgress,
    results_dir: &Path,
) -> anyhow::Result<JobOutput> {
    let results = scan(directory, config, progress)?;

    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("无法创建结果目录 {}", results_dir.display()))?;
    let ts = file_timestamp();
    let all_file = results_dir.join(format!("web_analysis_all_{ts}_{id}.csv"));
    let matching_file = results_dir.join(format!("web_analysis_{}px_{ts}_{id}.csv", config.target));

    let written = |outcome: ExportOutcome, path: PathBuf| match outcome {
        ExportOutcome::Written(_) => Some(path),
        ExportOutcome::Empty => None,
    };
    let all_results_file = written(export(&results.all, &all_file)?, all_file);
    let matching_results_file = written(export(&results.matching, &matching_file)?, matching_file);

    Ok(JobOutput {
        total_images: results.all.len(),
        matching_images: results.matching.len(),
        all_results_file,
        matching_results_file,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::RgbImage;
    use tempfile::tempdir;

    use super::*;
    use crate::export::load;

    fn request(directory: &Path, mode: MatchMode) -> JobRequest {
        let config = ScanConfig { mode, ..Default::default() };
        JobRequest { directory: directory.to_path_buf(), config }
    }

    async fn wait_finished(store: &JobStore, id: &str) -> JobSnapshot {
        for _ in 0..500 {
            let snapshot = store.snapshot(id).await.unwrap();
            if snapshot.status.is_finished() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {id} did not finish");
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let images = tempdir().unwrap();
        let results = tempdir().unwrap();
        for (name, w, h) in [("a.png", 200, 150), ("b.png", 330, 500), ("c.png", 800, 600)] {
            RgbImage::new(w, h).save(images.path().join(name)).unwrap();
        }

        let store = JobStore::new(results.path().to_path_buf(), 10);
        let id = store.submit(request(images.path(), MatchMode::Exact)).await.unwrap();
        let snapshot = wait_finished(&store, &id).await;

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.total_images, 3);
        assert_eq!(snapshot.matching_images, 1);
        assert!(snapshot.start_time.is_some() && snapshot.end_time.is_some());

        let all = store.result_file(&id, ResultKind::All).await.unwrap();
        assert_eq!(load(&all).unwrap().len(), 3);
        let matching = store.result_file(&id, ResultKind::Matching).await.unwrap();
        assert_eq!(load(&matching).unwrap()[0].name, "b.png");
    }

    #[tokio::test]
    async fn test_empty_directory_has_no_files() {
        let images = tempdir().unwrap();
        let results = tempdir().unwrap();

        let store = JobStore::new(results.path().to_path_buf(), 10);
        let id = store.submit(request(images.path(), MatchMode::Lte)).await.unwrap();
        let snapshot = wait_finished(&store, &id).await;

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert!(snapshot.all_results_file.is_none());
        assert!(matches!(
            store.result_file(&id, ResultKind::All).await,
            Err(JobError::NoResultFile)
        ));
    }

    #[tokio::test]
    async fn test_invalid_directory_is_rejected() {
        let results = tempdir().unwrap();
        let store = JobStore::new(results.path().to_path_buf(), 10);

        let result = store.submit(request(&results.path().join("missing"), MatchMode::Lte)).await;
        assert!(matches!(result, Err(JobError::InvalidDirectory(ScanError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let results = tempdir().unwrap();
        let store = JobStore::new(results.path().to_path_buf(), 10);

        assert!(store.snapshot("missing").await.is_none());
        assert!(matches!(
            store.result_file("missing", ResultKind::All).await,
            Err(JobError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_eviction_keeps_latest_jobs() {
        let images = tempdir().unwrap();
        let results = tempdir().unwrap();
        let store = JobStore::new(results.path().to_path_buf(), 2);

        let mut ids = vec![];
        for _ in 0..4 {
            let id = store.submit(request(images.path(), MatchMode::Lte)).await.unwrap();
            wait_finished(&store, &id).await;
            ids.push(id);
        }

        assert_eq!(store.recent(10).await.len(), 2);
        assert!(store.snapshot(&ids[0]).await.is_none());
        assert!(store.snapshot(&ids[3]).await.is_some());
    }

    #[tokio::test]
    async fn test_download_before_completion() {
        let results = tempdir().unwrap();
        let store = JobStore::new(results.path().to_path_buf(), 10);
        let job = Job::new("pending".to_string(), request(results.path(), MatchMode::Lte));
        store.jobs.write().await.insert(job.id.clone(), job);

        assert!(matches!(
            store.result_file("pending", ResultKind::All).await,
            Err(JobError::NotCompleted)
        ));
        let snapshot = store.snapshot("pending").await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Pending);
        assert_eq!(snapshot.progress, 0);
    }

    #[test]
    fn test_parse_result_kind() {
        assert_eq!("all".parse::<ResultKind>().unwrap(), ResultKind::All);
        assert_eq!("matching".parse::<ResultKind>().unwrap(), ResultKind::Matching);
        assert!("other".parse::<ResultKind>().is_err());
    }
}
