use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use indicatif::ProgressBar;
use log::{error, info};
use rayon::ThreadPoolBuilder;

use crate::discover::{Extensions, check_root, walk};
use crate::error::{ProbeError, ScanError};
use crate::metrics;
use crate::probe::probe;
use crate::types::{ImageRecord, MatchMode, ScanResultSet};

/// 默认目标尺寸
pub const DEFAULT_TARGET_DIMENSION: u32 = 330;
/// 默认并发探测数量
pub const DEFAULT_WORKERS: usize = 4;

/// 一次扫描的参数
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub target: u32,
    pub mode: MatchMode,
    /// 并发探测的线程数，最小为 1
    pub workers: usize,
    pub extensions: Extensions,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET_DIMENSION,
            mode: MatchMode::Lte,
            workers: DEFAULT_WORKERS,
            extensions: Extensions::default(),
        }
    }
}

/// 扫描进度回调，只用于展示
pub trait ScanProgress: Send + Sync {
    /// 文件发现完成，`total` 为待探测的文件数
    fn start(&self, total: usize);
    /// 一个文件探测完成（无论成功与否）
    fn advance(&self);
    fn finish(&self) {}
}

impl ScanProgress for () {
    fn start(&self, _total: usize) {}

    fn advance(&self) {}
}

impl ScanProgress for ProgressBar {
    fn start(&self, total: usize) {
        self.set_length(total as u64);
    }

    fn advance(&self) {
        self.inc(1);
    }

    fn finish(&self) {
        self.finish_with_message("分析完成");
    }
}

/// 以原子计数器记录的进度，供后台任务轮询
#[derive(Debug, Default)]
pub struct AtomicProgress {
    pub total: AtomicUsize,
    pub processed: AtomicUsize,
}

impl AtomicProgress {
    /// 返回 `(已处理, 总数)`
    pub fn get(&self) -> (usize, usize) {
        (self.processed.load(Ordering::Relaxed), self.total.load(Ordering::Relaxed))
    }
}

impl ScanProgress for AtomicProgress {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn advance(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// 扫描目录下的所有图片并按尺寸分类
///
/// 文件探测在独立的线程池中并发执行，结果通过 channel 汇总到调用线程，
/// 因此返回结果的顺序为完成顺序。单个文件探测失败只会记录日志，
/// 不会中止整个扫描。
pub fn scan(
    root: &Path,
    config: &ScanConfig,
    progress: &dyn ScanProgress,
) -> Result<ScanResultSet, ScanError> {
    check_root(root)?;
    let root = root
        .canonicalize()
        .map_err(|source| ScanError::Unreadable { path: root.to_path_buf(), source })?;
    let start = Instant::now();

    info!("正在搜索图片: {}", root.display());
    let files = walk(&root, &config.extensions)?;
    info!("找到 {} 个图片文件", files.len());

    let workers = pool_size(config.workers, files.len());
    let (target, mode) = (config.target, config.mode);
    let results =
        probe_all(files, workers, mode, progress, move |path| probe(path, target, mode))?;

    metrics::observe_scan_duration(mode, workers, start.elapsed().as_secs_f32());
    info!(
        "扫描完成，共 {} 张图片，{} 张符合条件，用时 {:.2}s",
        results.all.len(),
        results.matching.len(),
        start.elapsed().as_secs_f32()
    );

    Ok(results)
}

/// 线程数不超过待探测的文件数，最少为 1
fn pool_size(workers: usize, files: usize) -> usize {
    workers.min(files).max(1)
}

/// 在 `workers` 个线程中对每个文件调用 `probe`，并在调用线程中汇总结果
///
/// `probe` 中的 panic 会被捕获并作为 [`ProbeError::Panicked`] 处理。
fn probe_all<F>(
    files: Vec<PathBuf>,
    workers: usize,
    mode: MatchMode,
    progress: &dyn ScanProgress,
    probe: F,
) -> Result<ScanResultSet, ScanError>
where
    F: Fn(&Path) -> Result<ImageRecord, ProbeError> + Send + Sync + 'static,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("imscan-probe-{i}"))
        .build()?;

    progress.start(files.len());

    let probe = Arc::new(probe);
    let (tx, rx) = crossbeam_channel::unbounded();
    for path in files {
        let tx = tx.clone();
        let probe = probe.clone();
        pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| probe(&path)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload);
                    Err(ProbeError::Panicked { path: path.clone(), message })
                });
            let _ = tx.send(outcome);
        });
    }
    drop(tx);

    let mut results = ScanResultSet::default();
    for outcome in rx {
        match outcome {
            Ok(record) => {
                metrics::inc_probed(mode, (record.width, record.height), record.matches);
                if record.matches {
                    info!("找到匹配: {} ({}x{})", record.name, record.width, record.height);
                }
                results.push(record);
            }
            Err(e) => {
                metrics::inc_probe_failed(mode);
                error!("分析失败: {e}");
            }
        }
        progress.advance();
    }
    progress.finish();

    Ok(results)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast_ref::<&str>() {
            Some(message) => message.to_string(),
            None => "unknown panic".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use image::RgbImage;
    use rstest::rstest;
    use tempfile::tempdir;

    use super::*;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        RgbImage::new(width, height).save(path).unwrap();
    }

    fn sample_dir() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        write_image(dir.path(), "small.png", 200, 150);
        write_image(dir.path(), "exact_width.jpg", 330, 500);
        write_image(dir.path(), "sub/exact_height.png", 400, 330);
        write_image(dir.path(), "sub/deeper/large.bmp", 800, 600);
        dir
    }

    fn names(records: &[ImageRecord]) -> BTreeSet<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    fn config(mode: MatchMode, workers: usize) -> ScanConfig {
        ScanConfig { mode, workers, ..Default::default() }
    }

    #[rstest]
    #[case::lte(MatchMode::Lte, 3)]
    #[case::exact(MatchMode::Exact, 2)]
    fn test_scan_modes(#[case] mode: MatchMode, #[case] matching: usize) {
        let dir = sample_dir();
        let result = scan(dir.path(), &config(mode, 4), &()).unwrap();

        assert_eq!(result.all.len(), 4);
        assert_eq!(result.matching.len(), matching);
        assert!(!names(&result.matching).contains("large.bmp"));
        for record in &result.all {
            assert_eq!(record.matches, mode.matches(record.width, record.height, 330));
        }
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let dir = sample_dir();
        let single = scan(dir.path(), &config(MatchMode::Lte, 1), &()).unwrap();
        let multi = scan(dir.path(), &config(MatchMode::Lte, 8), &()).unwrap();

        assert_eq!(names(&single.all), names(&multi.all));
        assert_eq!(names(&single.matching), names(&multi.matching));
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let dir = sample_dir();
        let result = scan(dir.path(), &config(MatchMode::Lte, 0), &()).unwrap();
        assert_eq!(result.all.len(), 4);
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(4, 100), 4);
        assert_eq!(pool_size(3000, 1), 1);
        assert_eq!(pool_size(0, 10), 1);
        assert_eq!(pool_size(8, 0), 1);
    }

    #[test]
    fn test_huge_worker_count_on_small_dir() {
        let dir = sample_dir();
        let result = scan(dir.path(), &config(MatchMode::Lte, 100_000), &()).unwrap();
        assert_eq!(result.all.len(), 4);
    }

    #[test]
    fn test_panicking_probe_is_isolated() {
        let dir = sample_dir();
        let mut files = walk(dir.path(), &Extensions::default()).unwrap();
        files.push(dir.path().join("boom.png"));

        let progress = AtomicProgress::default();
        let result = probe_all(files, 2, MatchMode::Lte, &progress, |path| {
            if path.ends_with("boom.png") {
                panic!("decoder exploded");
            }
            probe(path, 330, MatchMode::Lte)
        })
        .unwrap();

        assert_eq!(result.all.len(), 4);
        assert!(!names(&result.all).contains("boom.png"));
        assert_eq!(progress.get(), (5, 5));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new(format!("bad header {}", 42))), "bad header 42");
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }

    #[test]
    fn test_corrupted_image_is_excluded() {
        let dir = sample_dir();
        fs::write(dir.path().join("corrupted.jpg"), b"not an image").unwrap();

        let progress = AtomicProgress::default();
        let result = scan(dir.path(), &config(MatchMode::Lte, 2), &progress).unwrap();

        assert_eq!(result.all.len(), 4);
        assert!(!names(&result.all).contains("corrupted.jpg"));
        assert_eq!(progress.get(), (5, 5));
    }

    #[test]
    fn test_paths_are_absolute() {
        let dir = sample_dir();
        let result = scan(dir.path(), &ScanConfig::default(), &()).unwrap();
        assert!(result.all.iter().all(|r| Path::new(&r.path).is_absolute()));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let result = scan(dir.path(), &ScanConfig::default(), &()).unwrap();
        assert!(result.all.is_empty());
        assert!(result.matching.is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let result = scan(&dir.path().join("missing"), &ScanConfig::default(), &());
        assert!(matches!(result, Err(ScanError::NotFound(_))));
    }
}
