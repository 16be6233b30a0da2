//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已加载、已确认格式但未解码的字节
//! - `SourceImage` 表示解码完成、可逐像素访问的位图
//! - `InvertedImage` 表示反色并重新编码后的可下载结果

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 本地文件路径来源，声明类型由扩展名推断。
    FilePath(String),
    /// Data URL 或纯 Base64（浏览器 FileReader 交出的形态）。
    DataUrl {
        name: String,
        data: String,
        declared_mime: Option<String>,
    },
    /// 原始字节 + 声明的 MIME 类型（拖拽 / 文件选择器）。
    Bytes {
        name: String,
        declared_mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl ImageSource {
    /// 用于日志与结果展示的原始文件名。
    pub fn display_name(&self) -> String {
        match self {
            Self::FilePath(path) => std::path::Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone()),
            Self::DataUrl { name, .. } | Self::Bytes { name, .. } => name.clone(),
        }
    }
}

/// 支持反色输出的图片格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Png,
    Jpeg,
}

impl SourceFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// 加载阶段输出：已确认格式的原始字节。
#[derive(Debug)]
pub(crate) struct RawImageData {
    /// 原始文件名。
    pub(crate) name: String,
    /// 原始图片字节（HEIC 输入为预转换后的 JPEG 字节）。
    pub(crate) bytes: Vec<u8>,
    /// 签名探测得到的真实格式。
    pub(crate) format: SourceFormat,
    /// 原始文件体积（字节）。
    pub(crate) original_size: u64,
    /// 上传时的 MIME 类型（声明优先，否则取签名探测结果）。
    pub(crate) original_mime: String,
    /// 是否经过 HEIC → JPEG 预转换。
    pub(crate) converted_from_heic: bool,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 解码阶段输出：不可变的 RGBA 位图。
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// RGBA 像素缓冲（光栅顺序）。
    pub pixels: RgbaImage,
    /// 解码所用格式（HEIC 输入为预转换后的 JPEG）。
    pub format: SourceFormat,
    /// 上传时的 MIME 类型，HEIC 输入保留 `image/heic` / `image/heif`。
    pub original_mime: String,
    pub converted_from_heic: bool,
    pub original_size: u64,
}

impl SourceImage {
    /// 解码格式对应的 MIME，即重新编码后的输出类型。
    pub fn decoded_mime(&self) -> &'static str {
        self.format.mime()
    }
}

/// 反色并重新编码后的结果。
#[derive(Debug, Clone)]
pub struct InvertedImage {
    /// 下载文件名（`inverted_<原文件名>`）。
    pub file_name: String,
    pub format: SourceFormat,
    pub width: u32,
    pub height: u32,
    /// 编码后的图片字节，单文件下载与归档共享同一份数据。
    pub blob: Bytes,
}

impl InvertedImage {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    /// 生成可直接用于前端预览/下载的 Data URL。
    pub fn data_url(&self) -> String {
        to_data_url(self.mime(), &self.blob)
    }
}

pub(crate) fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}
