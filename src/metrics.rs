use std::sync::LazyLock;

use prometheus::*;

use crate::types::MatchMode;

static METRIC_PROBED_FILES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "imscan_probed_files",
        "count of the probed image files",
        &["mode", "outcome"]
    )
    .unwrap()
});

static METRIC_IMAGE_SIZE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "imscan_image_size_count",
        "count of the successfully probed images by area",
        &["size"]
    )
    .unwrap()
});

static METRIC_SCAN_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "imscan_scan_duration",
        "duration of the whole directory scan in seconds",
        &["mode", "workers"]
    )
    .unwrap()
});

static METRIC_JOBS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imscan_jobs", "count of the scan jobs by status", &["status"])
        .unwrap()
});

/// 记录一次成功的探测
pub fn inc_probed(mode: MatchMode, size: (u32, u32), matches: bool) {
    let outcome = if matches { "match" } else { "no_match" };
    METRIC_PROBED_FILES.with_label_values(&[mode.to_string().as_str(), outcome]).inc();
    METRIC_IMAGE_SIZE_COUNT.with_label_values(&[to_fixed_size(size)]).inc();
}

/// 记录一次失败的探测
pub fn inc_probe_failed(mode: MatchMode) {
    METRIC_PROBED_FILES.with_label_values(&[mode.to_string().as_str(), "failed"]).inc();
}

pub fn observe_scan_duration(mode: MatchMode, workers: usize, duration: f32) {
    let (mode, workers) = (mode.to_string(), workers.to_string());
    METRIC_SCAN_DURATION.with_label_values(&[mode.as_str(), workers.as_str()]).observe(duration as f64);
}

/// 记录任务进入某个状态
pub fn inc_jobs(status: &str) {
    METRIC_JOBS.with_label_values(&[status]).inc();
}

/// 以 prometheus 文本格式导出所有指标
pub fn gather_text() -> Result<String> {
    TextEncoder::new().encode_to_string(&prometheus::gather())
}

/// 将图像面积范围调整到几个固定值
fn to_fixed_size((width, height): (u32, u32)) -> &'static str {
    let area = width as u64 * height as u64;
    if area <= 128 * 128 {
        "128"
    } else if area <= 256 * 256 {
        "256"
    } else if area <= 512 * 512 {
        "512"
    } else if area <= 768 * 768 {
        "768"
    } else if area <= 1024 * 1024 {
        "1024"
    } else if area <= 1536 * 1536 {
        "1536"
    } else if area <= 2048 * 2048 {
        "2048"
    } else {
        "2048+"
    }
}
