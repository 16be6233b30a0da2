//! # 图片反色模块（inverter）
//!
//! ## 设计思路
//!
//! 该模块将“来源加载校验 → 解码 → 反色 → 重新编码 → 批次汇总/打包 → 命令暴露”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `commands`：仅做前端入参/出参适配（薄封装）
//! - `service`：承载可注入状态（`InvertServiceState`）与批次会话
//! - `handler`：编排单文件流水线与批次循环
//! - `loader`：负责文件 / Data URL / 字节加载与类型、体积校验
//! - `heic`：HEIC/HEIF → JPEG 预转换
//! - `pipeline`：负责解码与像素上限
//! - `transform`：逐像素反色
//! - `exporter`：按原格式重新编码与输出命名
//! - `archive`：成功结果打包为 zip
//! - `batch/config/error/source`：批次模型、配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 前端 invoke / CLI
//!    ↓
//! commands.rs（参数适配）
//!    ↓
//! service.rs（批次状态：idle → processing → complete，清空/取消）
//!    ↓
//! handler.rs（按上传顺序逐个处理 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + 白名单 + 体积上限 + 签名探测）
//!    │    └─ heic.rs（HEIC 预转换）
//!    ├─ pipeline.rs（解码 + 像素限制）
//!    ├─ transform.rs（255 - v，Alpha 不变）
//!    └─ exporter.rs（PNG 保持 PNG，JPEG 固定质量）
//!    ↓
//! batch.rs（BatchResult）→ archive.rs（inverted_images.zip）
//! ```

pub mod commands;
mod archive;
mod batch;
mod config;
mod error;
mod exporter;
mod handler;
mod heic;
mod loader;
mod pipeline;
mod service;
mod source;
mod transform;

pub use archive::{ARCHIVE_FILE_NAME, ARCHIVE_MIME, build_archive, unique_file_name};
pub use batch::{
    BatchEntry, BatchProgress, BatchResult, BatchState, BatchSummary, EntrySummary, Outcome,
};
pub use config::{DEFAULT_JPEG_QUALITY, ExportProfile, InvertConfig};
pub use error::{FailureKind, InvertError};
pub use exporter::{OUTPUT_PREFIX, output_file_name};
pub use handler::InvertHandler;
pub use heic::{CommandHeicConverter, DisabledHeicConverter, HeicConverter};
pub use service::{InvertServiceState, NamedBlob};
pub use source::{ImageSource, InvertedImage, SourceFormat, SourceImage};
pub use transform::{invert_channel, invert_image, invert_rgba_in_place};
