//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载反色链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 单个文件的失败最终会被折叠为 [`FailureKind`] 挂在批次条目上，
//! 只有批次级别的问题（状态锁、归档、取消）才会直接向上传播。

use serde::{Deserialize, Serialize};

/// 反色处理统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum InvertError {
    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("文件过大：{0}")]
    TooLarge(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encoding(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("归档错误：{0}")]
    Archive(String),

    #[error("已取消：{0}")]
    Cancelled(String),

    #[error("未找到：{0}")]
    NotFound(String),

    #[error("状态错误：{0}")]
    State(String),
}

impl InvertError {
    /// 稳定错误码，供前端按分支展示。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "invalid_format",
            Self::TooLarge(_) => "too_large",
            Self::Decode(_) => "decode_error",
            Self::Encoding(_) => "encoding_error",
            Self::FileSystem(_) => "file_system",
            Self::Archive(_) => "archive_error",
            Self::Cancelled(_) => "cancelled",
            Self::NotFound(_) => "not_found",
            Self::State(_) => "state_error",
        }
    }

    /// 出错阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) | Self::TooLarge(_) | Self::FileSystem(_) => "load",
            Self::Decode(_) => "decode",
            Self::Encoding(_) => "encode",
            Self::Archive(_) => "archive",
            Self::Cancelled(_) | Self::NotFound(_) | Self::State(_) => "batch",
        }
    }

    /// 将单文件错误折叠为批次条目上的失败分类。
    ///
    /// 读不出来的文件与损坏文件一样归为 `InvalidFormat`。
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::TooLarge(_) => FailureKind::TooLarge,
            Self::Decode(_) => FailureKind::DecodeError,
            Self::Encoding(_) => FailureKind::EncodingError,
            _ => FailureKind::InvalidFormat,
        }
    }
}

impl From<InvertError> for String {
    fn from(error: InvertError) -> Self {
        error.to_string()
    }
}

/// 单个文件失败的分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    InvalidFormat,
    TooLarge,
    DecodeError,
    EncodingError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidFormat => "InvalidFormat",
            Self::TooLarge => "TooLarge",
            Self::DecodeError => "DecodeError",
            Self::EncodingError => "EncodingError",
        }
    }
}
