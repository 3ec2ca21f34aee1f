use std::path::Path;

use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};

use crate::error::ProbeError;
use crate::types::{ImageRecord, MatchMode, MatchedAxis};

const BYTES_PER_MB: f64 = 1024. * 1024.;

impl MatchMode {
    /// 单条边是否满足条件
    pub fn satisfies(self, value: u32, target: u32) -> bool {
        match self {
            Self::Lte => value <= target,
            Self::Exact => value == target,
        }
    }

    /// 宽或高任意一边满足条件即视为匹配
    pub fn matches(self, width: u32, height: u32, target: u32) -> bool {
        self.satisfies(width, target) || self.satisfies(height, target)
    }

    /// 返回触发匹配的边，两边都满足时固定报告宽度
    pub fn matched_axis(self, width: u32, height: u32, target: u32) -> MatchedAxis {
        if self.satisfies(width, target) {
            MatchedAxis::Width
        } else if self.satisfies(height, target) {
            MatchedAxis::Height
        } else {
            MatchedAxis::None
        }
    }
}

/// 读取图片头部信息并按目标尺寸分类
///
/// 只解析文件头，不解码像素数据。任何读取或解码错误都作为 [`ProbeError`] 返回，
/// 由调用方决定是否跳过该文件。
pub fn probe(path: &Path, target: u32, mode: MatchMode) -> Result<ImageRecord, ProbeError> {
    let io_err = |source| ProbeError::Io { path: path.to_path_buf(), source };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    let reader = ImageReader::open(path).map_err(io_err)?.with_guessed_format().map_err(io_err)?;
    let format = reader.format();
    let decoder = reader
        .into_decoder()
        .map_err(|source| ProbeError::Decode { path: path.to_path_buf(), source })?;

    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(ProbeError::EmptyImage { path: path.to_path_buf(), width, height });
    }
    let color_mode = color_mode_name(decoder.color_type());

    Ok(ImageRecord {
        path: path.to_string_lossy().to_string(),
        name: path.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default(),
        width,
        height,
        matches: mode.matches(width, height, target),
        matched_axis: mode.matched_axis(width, height, target),
        format: format.map(format_name).unwrap_or_default(),
        color_mode,
        size_mb: size as f64 / BYTES_PER_MB,
    })
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        other => format!("{other:?}").to_uppercase(),
    }
}

fn color_mode_name(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 => "LA".to_string(),
        ColorType::Rgb8 => "RGB".to_string(),
        ColorType::Rgba8 => "RGBA".to_string(),
        ColorType::L16 => "I;16".to_string(),
        ColorType::La16 => "LA;16".to_string(),
        ColorType::Rgb16 => "RGB;16".to_string(),
        ColorType::Rgba16 => "RGBA;16".to_string(),
        ColorType::Rgb32F => "RGBF".to_string(),
        ColorType::Rgba32F => "RGBAF".to_string(),
        other => format!("{other:?}"),
    }
}
