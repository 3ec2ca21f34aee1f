use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ExportError;
use crate::types::{ImageRecord, MatchedAxis};

/// CSV 表头，顺序固定
pub const HEADER: [&str; 9] = [
    "filepath",
    "filename",
    "width",
    "height",
    "matches_criteria",
    "dimension_match",
    "format",
    "mode",
    "file_size_mb",
];

/// 导出结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// 写入了若干行记录
    Written(usize),
    /// 没有记录，未创建文件
    Empty,
}

#[derive(Serialize, Deserialize)]
struct CsvRow {
    filepath: String,
    filename: String,
    width: u32,
    height: u32,
    #[serde(serialize_with = "serialize_bool", deserialize_with = "deserialize_bool")]
    matches_criteria: bool,
    dimension_match: MatchedAxis,
    format: String,
    mode: String,
    file_size_mb: f64,
}

impl From<&ImageRecord> for CsvRow {
    fn from(r: &ImageRecord) -> Self {
        Self {
            filepath: r.path.clone(),
            filename: r.name.clone(),
            width: r.width,
            height: r.height,
            matches_criteria: r.matches,
            dimension_match: r.matched_axis,
            format: r.format.clone(),
            mode: r.color_mode.clone(),
            file_size_mb: r.size_mb,
        }
    }
}

impl From<CsvRow> for ImageRecord {
    fn from(r: CsvRow) -> Self {
        Self {
            path: r.filepath,
            name: r.filename,
            width: r.width,
            height: r.height,
            matches: r.matches_criteria,
            matched_axis: r.dimension_match,
            format: r.format,
            color_mode: r.mode,
            size_mb: r.file_size_mb,
        }
    }
}

fn serialize_bool<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}

fn deserialize_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let s = String::deserialize(deserializer)?;
    match s.as_str() {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid boolean: {other}"))),
    }
}

/// 将记录按给定顺序写入 CSV 文件
///
/// 记录为空时不会创建文件，返回 [`ExportOutcome::Empty`]。
pub fn export(records: &[ImageRecord], destination: &Path) -> Result<ExportOutcome, ExportError> {
    if records.is_empty() {
        warn!("没有可保存的结果: {}", destination.display());
        return Ok(ExportOutcome::Empty);
    }

    let csv_err = |source| ExportError::Csv { path: destination.to_path_buf(), source };
    let mut writer = csv::Writer::from_path(destination).map_err(csv_err)?;
    for record in records {
        writer.serialize(CsvRow::from(record)).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|source| ExportError::Io { path: destination.to_path_buf(), source })?;

    info!("结果已保存到 {}", destination.display());
    Ok(ExportOutcome::Written(records.len()))
}

/// 读取 [`export`] 写出的 CSV 文件
pub fn load(path: &Path) -> Result<Vec<ImageRecord>, ExportError> {
    let csv_err = |source| ExportError::Csv { path: path.to_path_buf(), source };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    reader
        .deserialize::<CsvRow>()
        .map(|row| row.map(ImageRecord::from).map_err(csv_err))
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn record(name: &str, width: u32, height: u32, matches: bool) -> ImageRecord {
        ImageRecord {
            path: format!("/path/to/{name}"),
            name: name.to_string(),
            width,
            height,
            matches,
            matched_axis: if matches { MatchedAxis::Width } else { MatchedAxis::None },
            format: "JPEG".to_string(),
            color_mode: "RGB".to_string(),
            size_mb: 0.123456789,
        }
    }

    #[test]
    fn test_export_format() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("results.csv");
        let records = [record("image1.jpg", 300, 200, true), record("image2.png", 500, 400, false)];

        assert_eq!(export(&records, &output).unwrap(), ExportOutcome::Written(2));

        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("/path/to/image1.jpg,image1.jpg,300,200,True,width,JPEG,RGB,0.123456789")
        );
        assert_eq!(
            lines.next(),
            Some("/path/to/image2.png,image2.png,500,400,False,none,JPEG,RGB,0.123456789")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_then_load() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("results.csv");
        let records = vec![record("b.jpg", 330, 500, true), record("a,comma.jpg", 800, 600, false)];

        export(&records, &output).unwrap();
        assert_eq!(load(&output).unwrap(), records);
    }

    #[test]
    fn test_export_empty_is_noop() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("empty.csv");

        assert_eq!(export(&[], &output).unwrap(), ExportOutcome::Empty);
        assert!(!output.exists());
    }

    #[test]
    fn test_export_unwritable() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("missing/results.csv");

        let result = export(&[record("a.jpg", 1, 1, true)], &output);
        assert!(matches!(result, Err(ExportError::Csv { .. })));
    }
}
