use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use walkdir::WalkDir;

use crate::error::ScanError;

/// 默认扫描的图片后缀名
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp", "gif", "webp"];

/// 需要扫描的后缀名集合，统一保存为不带点的小写形式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions(BTreeSet<String>);

impl Extensions {
    pub fn new<I, S>(exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            exts.into_iter()
                .map(|s| s.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// 判断路径的后缀名是否在集合中，忽略大小写
    pub fn is_match(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| self.0.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new(SUPPORTED_FORMATS)
    }
}

impl FromStr for Extensions {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.split(',')))
    }
}

impl fmt::Display for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exts = self.0.iter().map(String::as_str).collect::<Vec<_>>();
        f.write_str(&exts.join(","))
    }
}

/// 检查扫描根目录是否存在且可读
pub fn check_root(root: &Path) -> Result<(), ScanError> {
    let meta = std::fs::metadata(root).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ScanError::NotFound(root.to_path_buf()),
        _ => ScanError::Unreadable { path: root.to_path_buf(), source },
    })?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root)
        .map_err(|source| ScanError::Unreadable { path: root.to_path_buf(), source })?;
    Ok(())
}

/// 递归查找 `root` 下所有后缀名匹配的文件
///
/// 返回的路径按发现顺序排列且不重复。根目录不可用时返回错误，
/// 子目录中无法访问的条目（如失效的符号链接）会被跳过。
pub fn discover(root: &Path, extensions: &Extensions) -> Result<Vec<PathBuf>, ScanError> {
    check_root(root)?;
    walk(root, extensions)
}

/// 与 [`discover`] 相同，但假定 `root` 已经通过 [`check_root`] 检查
pub(crate) fn walk(root: &Path, extensions: &Extensions) -> Result<Vec<PathBuf>, ScanError> {
    let mut seen = HashSet::new();
    let mut files = vec![];
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop at root"));
                return Err(ScanError::Unreadable { path: root.to_path_buf(), source });
            }
            Err(e) => {
                debug!("跳过无法访问的条目: {e}");
                continue;
            }
        };
        let path = entry.into_path();
        if extensions.is_match(&path) && path.is_file() && seen.insert(path.clone()) {
            files.push(path);
        }
    }

    Ok(files)
}
