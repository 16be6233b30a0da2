//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（本地文件 / Data URL / 原始字节）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验。目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - Data URL：前缀解析 + 解码前体积预估 + 解码后体积限制。
//! - 字节：体积限制。
//! - 三者最终都走 `classify_bytes`：声明类型白名单 + 文件签名探测 + HEIC 预转换。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::source::{ImageSource, RawImageData, SourceFormat};
use super::{InvertConfig, InvertError, InvertHandler};

/// 允许的声明类型。HEIC/HEIF 仅在预转换后接受。
const ALLOWED_DECLARED_MIMES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/pjpeg",
    "image/heic",
    "image/heif",
];

/// 签名探测结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SniffedFormat {
    Supported(SourceFormat),
    /// 携带探测到的 `image/heic` 或 `image/heif`。
    Heic(&'static str),
}

impl SniffedFormat {
    fn mime(self) -> &'static str {
        match self {
            Self::Supported(format) => format.mime(),
            Self::Heic(mime) => mime,
        }
    }
}

impl InvertHandler {
    /// 按来源加载原始字节并确认格式。
    pub(super) fn load_source(
        &self,
        source: ImageSource,
        config: &InvertConfig,
    ) -> Result<RawImageData, InvertError> {
        match source {
            ImageSource::FilePath(path) => self.load_from_file(&path, config),
            ImageSource::DataUrl {
                name,
                data,
                declared_mime,
            } => self.load_from_data_url(name, &data, declared_mime, config),
            ImageSource::Bytes {
                name,
                declared_mime,
                bytes,
            } => self.load_from_bytes(name, declared_mime.as_deref(), bytes, config),
        }
    }

    /// 从本地路径加载图片原始字节。
    pub(super) fn load_from_file(
        &self,
        path: &str,
        config: &InvertConfig,
    ) -> Result<RawImageData, InvertError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(InvertError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| InvertError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > config.max_file_size {
            return Err(Self::too_large(metadata.len(), config.max_file_size));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| InvertError::FileSystem(format!("无法读取图片文件：{}", e)))?;

        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let declared = Self::mime_from_extension(file_path);

        let mut raw = self.classify_bytes(name, declared, bytes, config)?;
        raw.source_hint = "file";
        Ok(raw)
    }

    /// 从 Data URL / 纯 Base64 加载图片原始字节。
    ///
    /// 显式传入的 `declared_mime` 优先于 Data URL 前缀中的类型。
    pub(super) fn load_from_data_url(
        &self,
        name: String,
        data: &str,
        declared_mime: Option<String>,
        config: &InvertConfig,
    ) -> Result<RawImageData, InvertError> {
        log::info!("📝 开始处理 Data URL 图片 - 名称: {}", name);

        let (prefix_mime, bytes) = Self::parse_data_url_with_limit(data, config.max_file_size)?;
        let declared = declared_mime.or(prefix_mime);

        if bytes.len() as u64 > config.max_file_size {
            return Err(Self::too_large(bytes.len() as u64, config.max_file_size));
        }

        let mut raw = self.classify_bytes(name, declared.as_deref(), bytes, config)?;
        raw.source_hint = "data-url";
        Ok(raw)
    }

    /// 从原始字节加载（拖拽 / 文件选择器）。
    pub(super) fn load_from_bytes(
        &self,
        name: String,
        declared_mime: Option<&str>,
        bytes: Vec<u8>,
        config: &InvertConfig,
    ) -> Result<RawImageData, InvertError> {
        log::info!("📥 开始处理上传字节 - 名称: {} 大小: {}B", name, bytes.len());

        if bytes.len() as u64 > config.max_file_size {
            return Err(Self::too_large(bytes.len() as u64, config.max_file_size));
        }

        let mut raw = self.classify_bytes(name, declared_mime, bytes, config)?;
        raw.source_hint = "bytes";
        Ok(raw)
    }

    /// 白名单校验 + 签名探测 + 必要时 HEIC 预转换。
    fn classify_bytes(
        &self,
        name: String,
        declared_mime: Option<&str>,
        bytes: Vec<u8>,
        config: &InvertConfig,
    ) -> Result<RawImageData, InvertError> {
        if let Some(declared) = declared_mime {
            Self::validate_declared_mime(declared)?;
        }

        let original_size = bytes.len() as u64;
        let sniffed = Self::sniff_format(&bytes)?;

        if let Some(declared) = declared_mime {
            log::debug!("🔍 声明类型: {} 探测结果: {:?}", declared, sniffed);
        }

        let original_mime = declared_mime
            .map(Self::mime_essence)
            .unwrap_or_else(|| sniffed.mime().to_string());

        match sniffed {
            SniffedFormat::Supported(format) => Ok(RawImageData {
                name,
                bytes,
                format,
                original_size,
                original_mime,
                converted_from_heic: false,
                source_hint: "unknown",
            }),
            SniffedFormat::Heic(_) => {
                log::info!("🔁 检测到 HEIC/HEIF，执行 JPEG 预转换 - 名称: {}", name);
                let converted = self.heic_converter(config).convert_to_jpeg(&bytes)?;

                if converted.is_empty() {
                    return Err(InvertError::Decode("HEIC 预转换输出为空".to_string()));
                }
                if converted.len() as u64 > config.max_file_size {
                    return Err(Self::too_large(converted.len() as u64, config.max_file_size));
                }
                if Self::sniff_format(&converted)? != SniffedFormat::Supported(SourceFormat::Jpeg) {
                    return Err(InvertError::Decode("HEIC 预转换输出不是 JPEG".to_string()));
                }

                Ok(RawImageData {
                    name,
                    bytes: converted,
                    format: SourceFormat::Jpeg,
                    original_size,
                    original_mime,
                    converted_from_heic: true,
                    source_hint: "unknown",
                })
            }
        }
    }

    /// 校验声明类型是否在白名单内（忽略参数与大小写）。
    fn validate_declared_mime(declared: &str) -> Result<(), InvertError> {
        let essence = Self::mime_essence(declared);

        if ALLOWED_DECLARED_MIMES.contains(&essence.as_str()) {
            Ok(())
        } else {
            Err(InvertError::InvalidFormat(format!(
                "不支持的文件类型：{}（仅支持 PNG / JPEG / HEIC）",
                declared
            )))
        }
    }

    /// 去掉参数并转小写：`Image/PNG; q=1` → `image/png`。
    fn mime_essence(mime: &str) -> String {
        mime.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// 通过文件签名（magic bytes）确认真实格式。
    fn sniff_format(bytes: &[u8]) -> Result<SniffedFormat, InvertError> {
        if bytes.is_empty() {
            return Err(InvertError::InvalidFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| InvertError::InvalidFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(InvertError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        match kind.mime_type() {
            "image/png" => Ok(SniffedFormat::Supported(SourceFormat::Png)),
            "image/jpeg" => Ok(SniffedFormat::Supported(SourceFormat::Jpeg)),
            mime @ ("image/heif" | "image/heic") => Ok(SniffedFormat::Heic(mime)),
            other => Err(InvertError::InvalidFormat(format!(
                "不支持的图片格式：{}（仅支持 PNG / JPEG / HEIC）",
                other
            ))),
        }
    }

    /// 按扩展名推断声明类型，未知扩展名交给签名探测。
    fn mime_from_extension(path: &Path) -> Option<&'static str> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" | "jpe" | "jfif" => Some("image/jpeg"),
            "heic" => Some("image/heic"),
            "heif" => Some("image/heif"),
            "txt" | "md" | "csv" | "log" => Some("text/plain"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            "bmp" => Some("image/bmp"),
            "svg" => Some("image/svg+xml"),
            _ => None,
        }
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, InvertError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| InvertError::TooLarge("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| InvertError::TooLarge("Base64 解码体积估算溢出".to_string()))
    }

    /// 解析 Data URL（`data:<mime>;base64,<payload>`）或纯 Base64。
    ///
    /// 返回前缀中声明的 MIME（若有）与解码后的字节。
    pub(crate) fn parse_data_url_with_limit(
        data: &str,
        max_file_size: u64,
    ) -> Result<(Option<String>, Vec<u8>), InvertError> {
        let normalized = data.trim();

        let (mime, payload) = if let Some(rest) = normalized.strip_prefix("data:") {
            let marker = rest
                .find(";base64,")
                .ok_or_else(|| InvertError::InvalidFormat("缺少 base64 标记".to_string()))?;
            let mime = rest[..marker].trim();
            let mime = (!mime.is_empty()).then(|| mime.to_string());
            (mime, &rest[marker + ";base64,".len()..])
        } else {
            (None, normalized)
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(InvertError::TooLarge(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| InvertError::InvalidFormat(format!("Base64 解码失败：{}", e)))?;

        Ok((mime, bytes))
    }

    fn too_large(size: u64, limit: u64) -> InvertError {
        InvertError::TooLarge(format!(
            "{:.2} MB（限制：{:.2} MB）",
            size as f64 / 1024.0 / 1024.0,
            limit as f64 / 1024.0 / 1024.0
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverter::heic::HeicConverter;
    use base64::{Engine as _, engine::general_purpose};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::Arc;

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(2, 2, Rgba([10u8, 20, 30, 255]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("encode png failed");
        cursor.into_inner()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(2, 2, image::Rgb([10u8, 20, 30]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageFormat::Jpeg)
            .expect("encode jpeg failed");
        cursor.into_inner()
    }

    // ISO-BMFF ftyp box with the `heic` major brand.
    fn heic_header() -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 0x18];
        bytes.extend_from_slice(b"ftypheic");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"mif1heic");
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    struct FixedJpegConverter(Vec<u8>);

    impl HeicConverter for FixedJpegConverter {
        fn convert_to_jpeg(&self, _heic_bytes: &[u8]) -> Result<Vec<u8>, InvertError> {
            Ok(self.0.clone())
        }
    }

    fn handler() -> InvertHandler {
        InvertHandler::new(InvertConfig::default()).expect("handler init failed")
    }

    #[test]
    fn load_from_bytes_rejects_text_plain() {
        let result = handler().load_from_bytes(
            "notes.txt".into(),
            Some("text/plain"),
            b"hello".to_vec(),
            &InvertConfig::default(),
        );

        assert!(matches!(result, Err(InvertError::InvalidFormat(_))));
    }

    #[test]
    fn load_from_bytes_rejects_oversize_payload_before_sniffing() {
        let mut config = InvertConfig::default();
        config.max_file_size = 16;

        let result = handler().load_from_bytes("big.png".into(), Some("image/png"), png_bytes(), &config);

        assert!(matches!(result, Err(InvertError::TooLarge(_))));
    }

    #[test]
    fn load_from_bytes_trusts_signature_over_declared_type() {
        let raw = handler()
            .load_from_bytes(
                "mislabelled.png".into(),
                Some("image/png"),
                jpeg_bytes(),
                &InvertConfig::default(),
            )
            .expect("jpeg bytes should load");

        assert_eq!(raw.format, SourceFormat::Jpeg);
        assert_eq!(raw.source_hint, "bytes");
    }

    #[test]
    fn load_from_bytes_rejects_non_image_signature() {
        let result = handler().load_from_bytes(
            "page.png".into(),
            Some("image/png"),
            b"<html><body>not an image</body></html>".to_vec(),
            &InvertConfig::default(),
        );

        assert!(matches!(result, Err(InvertError::InvalidFormat(_))));
    }

    #[test]
    fn unsupported_image_signature_is_invalid_format() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let result = handler().load_from_bytes("a.gif".into(), None, gif, &InvertConfig::default());

        assert!(matches!(result, Err(InvertError::InvalidFormat(_))));
    }

    #[test]
    fn data_url_prefix_supplies_declared_type() {
        let encoded = general_purpose::STANDARD.encode(b"plain text");
        let data = format!("data:text/plain;base64,{}", encoded);

        let result = handler().load_from_data_url("a.txt".into(), &data, None, &InvertConfig::default());

        assert!(matches!(result, Err(InvertError::InvalidFormat(_))));
    }

    #[test]
    fn data_url_png_loads() {
        let data = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png_bytes()));
        let raw = handler()
            .load_from_data_url("a.png".into(), &data, None, &InvertConfig::default())
            .expect("png data url should load");

        assert_eq!(raw.format, SourceFormat::Png);
        assert_eq!(raw.source_hint, "data-url");
    }

    #[test]
    fn parse_data_url_with_limit_rejects_large_payload_before_decode() {
        let huge = "A".repeat(1024 * 1024);
        let result = InvertHandler::parse_data_url_with_limit(&huge, 32);

        assert!(matches!(result, Err(InvertError::TooLarge(_))));
    }

    #[test]
    fn missing_file_is_file_system_error() {
        let result = handler().load_from_file("/definitely/not/here.png", &InvertConfig::default());

        assert!(matches!(result, Err(InvertError::FileSystem(_))));
    }

    #[test]
    fn heic_without_converter_is_invalid_format() {
        let result = handler().load_from_bytes(
            "photo.heic".into(),
            Some("image/heic"),
            heic_header(),
            &InvertConfig::default(),
        );

        assert!(matches!(result, Err(InvertError::InvalidFormat(_))));
    }

    #[test]
    fn heic_with_converter_becomes_jpeg() {
        let handler = handler().with_heic_converter(Arc::new(FixedJpegConverter(jpeg_bytes())));
        let raw = handler
            .load_from_bytes(
                "photo.heic".into(),
                Some("image/heic"),
                heic_header(),
                &InvertConfig::default(),
            )
            .expect("converted heic should load");

        assert_eq!(raw.format, SourceFormat::Jpeg);
        assert!(raw.converted_from_heic);
        assert_eq!(raw.original_mime, "image/heic");
    }

    #[test]
    fn original_mime_falls_back_to_signature() {
        let raw = handler()
            .load_from_bytes("a.png".into(), None, png_bytes(), &InvertConfig::default())
            .expect("png should load");
        assert_eq!(raw.original_mime, "image/png");

        let raw = handler()
            .load_from_bytes("b.jpg".into(), Some("Image/JPEG; q=1"), jpeg_bytes(), &InvertConfig::default())
            .expect("jpeg should load");
        assert_eq!(raw.original_mime, "image/jpeg");
    }

    #[test]
    fn heic_converter_returning_png_is_rejected() {
        let handler = handler().with_heic_converter(Arc::new(FixedJpegConverter(png_bytes())));
        let result = handler.load_from_bytes(
            "photo.heic".into(),
            None,
            heic_header(),
            &InvertConfig::default(),
        );

        assert!(matches!(result, Err(InvertError::Decode(_))));
    }

    #[test]
    fn declared_mime_parameters_are_ignored() {
        assert!(InvertHandler::validate_declared_mime("IMAGE/PNG; charset=binary").is_ok());
        assert!(InvertHandler::validate_declared_mime("image/gif").is_err());
    }
}
