//! # 编码导出模块
//!
//! ## 设计思路
//!
//! 反色结果按原格式回写：PNG 保持 PNG 以保留透明度，JPEG 以固定质量重新编码。
//! 输出文件名统一为 `inverted_<原文件名>`，并剥离目录与非法字符，保证可安全落盘与打包。

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use once_cell::sync::Lazy;
use regex::Regex;

use super::source::SourceFormat;
use super::{InvertConfig, InvertError, InvertHandler};

/// 输出文件名前缀。
pub const OUTPUT_PREFIX: &str = "inverted_";

static UNSAFE_FILE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("valid file name regex"));

impl InvertHandler {
    /// 将反色后的位图编码为目标格式。
    pub(crate) fn encode_inverted(
        &self,
        pixels: &RgbaImage,
        format: SourceFormat,
        config: &InvertConfig,
    ) -> Result<Bytes, InvertError> {
        let (width, height) = pixels.dimensions();
        let mut buffer = Vec::new();

        match format {
            SourceFormat::Png => PngEncoder::new(&mut buffer)
                .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| InvertError::Encoding(format!("PNG 编码失败：{}", e)))?,
            SourceFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, config.jpeg_quality)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| InvertError::Encoding(format!("JPEG 编码失败：{}", e)))?
            }
        }

        if buffer.is_empty() {
            return Err(InvertError::Encoding("编码输出为空".to_string()));
        }

        log::debug!(
            "💾 编码完成 - 格式: {:?} 尺寸: {}x{} 大小: {}KB",
            format,
            width,
            height,
            buffer.len() / 1024
        );

        Ok(Bytes::from(buffer))
    }
}

/// 生成下载文件名：`inverted_<原文件名>`。
///
/// HEIC 输入预转换为 JPEG 后，扩展名改为 `.jpg`。
pub fn output_file_name(original: &str, converted_from_heic: bool) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let sanitized = UNSAFE_FILE_NAME_CHARS.replace_all(base, "_");
    let sanitized = if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "image".to_string()
    } else {
        sanitized.into_owned()
    };

    let name = if converted_from_heic {
        let stem = match sanitized.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => sanitized.as_str(),
        };
        format!("{}.{}", stem, SourceFormat::Jpeg.extension())
    } else {
        sanitized
    };

    format!("{}{}", OUTPUT_PREFIX, name)
}
