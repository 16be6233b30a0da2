//! # 解码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → RGBA”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 按已确认格式读取 header 尺寸（失败视为格式错误）
//! 2. 按像素 / 内存上限快速拒绝
//! 3. 完整解码（失败视为解码错误）
//! 4. 转换 RGBA，并校验字节长度一致性
//!
//! 位图统一为每通道 8 位（与浏览器 canvas 的 `ImageData` 一致），
//! 16 位 PNG 在此降为 8 位，反色输出也是 8 位 PNG。

use image::{GenericImageView, ImageReader};
use std::io::Cursor;

use super::source::{RawImageData, SourceImage};
use super::{InvertConfig, InvertError, InvertHandler};

impl InvertHandler {
    /// 将原始字节解码为不可变的 RGBA 位图。
    pub(crate) fn decode_source(
        &self,
        raw: RawImageData,
        config: &InvertConfig,
    ) -> Result<SourceImage, InvertError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory_with_format(&raw.bytes, raw.format.image_format())
            .map_err(|e| InvertError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        Self::validate_pixel_limits(config, width, height)?;
        Self::validate_decoded_memory_limits(config, width, height)?;

        if decoded.color().bytes_per_pixel() > decoded.color().channel_count() {
            log::debug!("↘️ {} 为高位深图片，按 8 位处理", raw.name);
        }
        let pixels = decoded.to_rgba8();

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(4))
            .ok_or_else(|| InvertError::TooLarge("图片尺寸导致内存溢出风险".to_string()))?;

        if pixels.as_raw().len() != expected_len {
            return Err(InvertError::Decode("解码后像素数据长度异常".to_string()));
        }

        log::info!(
            "✅ 图片解码成功 - 来源: {} 名称: {} 格式: {:?} 尺寸: {}x{}",
            raw.source_hint,
            raw.name,
            raw.format,
            width,
            height
        );

        Ok(SourceImage {
            name: raw.name,
            width,
            height,
            pixels,
            format: raw.format,
            original_mime: raw.original_mime,
            converted_from_heic: raw.converted_from_heic,
            original_size: raw.original_size,
        })
    }

    /// 仅通过内存中的图片头信息读取宽高。
    fn inspect_dimensions_from_memory(raw: &RawImageData) -> Result<(u32, u32), InvertError> {
        let mut reader = ImageReader::new(Cursor::new(&raw.bytes));
        reader.set_format(raw.format.image_format());

        reader
            .into_dimensions()
            .map_err(|e| InvertError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(
        config: &InvertConfig,
        width: u32,
        height: u32,
    ) -> Result<(), InvertError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| InvertError::TooLarge("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(InvertError::TooLarge(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &InvertConfig,
        width: u32,
        height: u32,
    ) -> Result<(), InvertError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| InvertError::TooLarge("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(InvertError::TooLarge(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}
