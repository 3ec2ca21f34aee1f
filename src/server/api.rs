use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::{Stream, stream};
use log::info;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::job::{JobError, JobRequest, JobSnapshot, ResultKind};
use crate::metrics;
use crate::scanner::{DEFAULT_TARGET_DIMENSION, DEFAULT_WORKERS, ScanConfig};

/// 最近任务列表的长度
const RECENT_JOBS: usize = 10;
/// 单个任务允许的最大线程数
const MAX_WORKERS: usize = 256;
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// 提交扫描任务
#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, body = AnalyzeResponse),
        (status = 400, description = "目录不存在或不是目录，或线程数过多"),
    )
)]
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>> {
    let workers = data.workers.unwrap_or(DEFAULT_WORKERS);
    if workers > MAX_WORKERS {
        return Err(AppError::bad_request(anyhow!("workers must be at most {MAX_WORKERS}")));
    }
    let config = ScanConfig {
        target: data.dimension.unwrap_or(DEFAULT_TARGET_DIMENSION),
        mode: data.mode.unwrap_or_default(),
        workers: workers.max(1),
        ..Default::default()
    };
    let request = JobRequest { directory: PathBuf::from(&data.directory), config };
    let job_id = state.jobs.submit(request).await?;

    Ok(Json(AnalyzeResponse { job_id, status: "started".to_string() }))
}

/// 查询任务状态
#[utoipa::path(
    get,
    path = "/status/{job_id}",
    params(("job_id" = String, Path, description = "任务 ID")),
    responses(
        (status = 200, body = JobSnapshot),
        (status = 404, description = "任务不存在"),
    )
)]
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>> {
    let snapshot = state.jobs.snapshot(&job_id).await.ok_or(JobError::NotFound)?;
    Ok(Json(snapshot))
}

/// 下载结果 CSV
#[utoipa::path(
    get,
    path = "/download/{job_id}/{file_type}",
    params(
        ("job_id" = String, Path, description = "任务 ID"),
        ("file_type" = String, Path, description = "`all` 或 `matching`"),
    ),
    responses(
        (status = 200, body = String, content_type = "text/csv"),
        (status = 400, description = "无效的文件类型"),
        (status = 404, description = "任务或文件不存在"),
        (status = 412, description = "任务尚未完成"),
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path((job_id, file_type)): Path<(String, String)>,
) -> Result<Response> {
    let kind = file_type.parse::<ResultKind>()?;
    let path = state.jobs.result_file(&job_id, kind).await?;
    let file = tokio::fs::File::open(&path).await?;

    let filename = path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    info!("下载结果: {}", path.display());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        Body::from_stream(read_chunks(file)),
    )
        .into_response())
}

/// 将文件按块读取为字节流
fn read_chunks(file: File) -> impl Stream<Item = std::io::Result<Vec<u8>>> {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0; DOWNLOAD_CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((buf, file)))
    })
}

/// 浏览服务器上的目录，只列出子目录
#[utoipa::path(
    get,
    path = "/browse",
    params(BrowseQuery),
    responses(
        (status = 200, body = BrowseResponse),
        (status = 400, description = "目录无法访问"),
    )
)]
pub async fn browse_handler(Query(query): Query<BrowseQuery>) -> Result<Json<BrowseResponse>> {
    let path = query.path.unwrap_or_else(|| ".".to_string());
    let path = tokio::fs::canonicalize(&path).await.map_err(AppError::bad_request)?;

    let mut items = vec![];
    if let Some(parent) = path.parent() {
        items.push(BrowseItem::directory("..", parent.display().to_string()));
    }

    let mut dirs = vec![];
    let mut entries = tokio::fs::read_dir(&path).await.map_err(AppError::bad_request)?;
    while let Some(entry) = entries.next_entry().await.map_err(AppError::bad_request)? {
        let entry_path = entry.path();
        if tokio::fs::metadata(&entry_path).await.is_ok_and(|meta| meta.is_dir()) {
            dirs.push(entry_path);
        }
    }
    dirs.sort();
    items.extend(dirs.into_iter().map(|dir| {
        let name = dir.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        BrowseItem::directory(name, dir.display().to_string())
    }));

    Ok(Json(BrowseResponse { current_path: path.display().to_string(), items }))
}

/// 最近的任务
#[utoipa::path(
    get,
    path = "/recent",
    responses(
        (status = 200, body = Vec<JobSnapshot>),
    )
)]
pub async fn recent_handler(State(state): State<Arc<AppState>>) -> Json<Vec<JobSnapshot>> {
    Json(state.jobs.recent(RECENT_JOBS).await)
}

/// prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}
