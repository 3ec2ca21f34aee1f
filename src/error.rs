use std::path::PathBuf;

use thiserror::Error;

/// 扫描根目录无法使用，扫描在探测开始前中止
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory {0} does not exist")]
    NotFound(PathBuf),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Cannot read directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// 单个文件探测失败，不影响其它文件
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid dimensions {width}x{height} in {path}")]
    EmptyImage { path: PathBuf, width: u32, height: u32 },

    #[error("Decoder panicked on {path}: {message}")]
    Panicked { path: PathBuf, message: String },
}

/// 导出 CSV 失败，内存中的扫描结果不受影响
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
