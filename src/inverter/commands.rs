//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做前端参数接收与结果返回，不承载业务逻辑。
//! 入参/出参均为 serde 结构，前端上传的文件以路径或 Data URL 形式传入，
//! 下载内容以 Data URL 形式返回，可直接挂到 `<a download>` 上。
//! 所有实际处理交由 `InvertServiceState`，保持命令函数薄、稳定、易测试。

use serde::{Deserialize, Serialize};

use super::batch::{BatchState, BatchSummary};
use super::service::{InvertServiceState, NamedBlob};
use super::source::to_data_url;
use super::{ImageSource, InvertConfig, InvertError};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct InvertCommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<InvertError> for InvertCommandError {
    fn from(error: InvertError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// 前端上传的单个文件。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UploadedFile {
    /// 本地路径（桌面外壳的文件选择器）。
    Path { path: String },
    /// 浏览器 FileReader 读取的 Data URL，`mime` 为 `File.type`。
    #[serde(rename_all = "camelCase")]
    DataUrl {
        name: String,
        data: String,
        #[serde(default)]
        mime: Option<String>,
    },
}

impl From<UploadedFile> for ImageSource {
    fn from(file: UploadedFile) -> Self {
        match file {
            UploadedFile::Path { path } => ImageSource::FilePath(path),
            UploadedFile::DataUrl { name, data, mime } => ImageSource::DataUrl {
                name,
                data,
                declared_mime: mime,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvertBatchRequest {
    pub files: Vec<UploadedFile>,
}

/// 下载载荷。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPayload {
    pub file_name: String,
    pub mime: &'static str,
    pub size: usize,
    pub data_url: String,
}

impl From<NamedBlob> for DownloadPayload {
    fn from(blob: NamedBlob) -> Self {
        Self {
            data_url: to_data_url(blob.mime, &blob.bytes),
            size: blob.bytes.len(),
            file_name: blob.file_name,
            mime: blob.mime,
        }
    }
}

/// 批量反色上传的文件。
pub async fn invert_images(
    state: &InvertServiceState,
    request: InvertBatchRequest,
) -> Result<BatchSummary, InvertCommandError> {
    let sources = request.files.into_iter().map(ImageSource::from).collect();
    state
        .process_batch(sources, |progress| {
            log::debug!(
                "📊 批次进度 {}/{} - {}",
                progress.attempted,
                progress.total,
                progress.source_name
            );
        })
        .await
        .map_err(InvertCommandError::from)
}

pub fn get_batch_state(state: &InvertServiceState) -> Result<BatchState, AppError> {
    Ok(state.state()?)
}

pub fn get_batch_summary(state: &InvertServiceState) -> Result<Option<BatchSummary>, AppError> {
    Ok(state.summary()?)
}

/// 下载单个反色结果。
pub fn download_inverted_file(
    state: &InvertServiceState,
    index: usize,
) -> Result<DownloadPayload, InvertCommandError> {
    state
        .file_download(index)
        .map(DownloadPayload::from)
        .map_err(InvertCommandError::from)
}

/// 下载全部成功结果的归档。
pub fn download_inverted_archive(
    state: &InvertServiceState,
) -> Result<DownloadPayload, InvertCommandError> {
    state
        .archive_download()
        .map(DownloadPayload::from)
        .map_err(InvertCommandError::from)
}

pub fn clear_batch(state: &InvertServiceState) -> Result<bool, AppError> {
    Ok(state.clear_batch()?)
}

/// 切换导出档位。
pub fn set_export_profile(state: &InvertServiceState, profile: String) -> Result<(), AppError> {
    state.set_export_profile(&profile)?;
    Ok(())
}

/// 查询当前生效导出档位。
pub fn get_export_profile(state: &InvertServiceState) -> Result<String, AppError> {
    Ok(state.get_export_profile()?)
}

pub fn set_invert_config(state: &InvertServiceState, config: InvertConfig) -> Result<(), AppError> {
    state.set_config(config)?;
    Ok(())
}

pub fn get_invert_config(state: &InvertServiceState) -> Result<InvertConfig, AppError> {
    Ok(state.get_config()?)
}
