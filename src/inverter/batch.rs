//! # 批次模型模块
//!
//! ## 设计思路
//!
//! 单个文件的处理结果用带标签的 `Outcome` 表示：成功时必有输出数据，
//! 失败时必有错误分类与消息，二者结构上互斥。
//! `BatchResult` 按上传顺序保存条目，并提供摘要、计数与归档入口。

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::archive;
use super::source::InvertedImage;
use super::{FailureKind, InvertError};

/// 单个文件的处理结果。
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(InvertedImage),
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn from_result(result: Result<InvertedImage, InvertError>) -> Self {
        match result {
            Ok(image) => Self::Success(image),
            Err(err) => Self::Failure {
                kind: err.failure_kind(),
                message: err.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// 批次中的一个条目，`index` 为上传顺序。
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub index: usize,
    pub source_name: String,
    pub outcome: Outcome,
}

/// 批次处理状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum BatchState {
    Idle,
    Processing { total: usize, attempted: usize },
    Complete { total: usize, succeeded: usize },
}

/// 进度回调载荷。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub attempted: usize,
    pub total: usize,
    pub source_name: String,
    pub succeeded: bool,
}

/// 一次批处理的完整结果。
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    pub started_at: String,
    pub completed_at: String,
}

impl BatchResult {
    pub(crate) fn new(entries: Vec<BatchEntry>, started_at: String) -> Self {
        Self {
            entries,
            started_at,
            completed_at: Local::now().to_rfc3339(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 成功条目，保持上传顺序。
    pub fn successes(&self) -> impl Iterator<Item = &InvertedImage> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            Outcome::Success(image) => Some(image),
            Outcome::Failure { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|entry| !entry.outcome.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn entry(&self, index: usize) -> Option<&BatchEntry> {
        self.entries.get(index)
    }

    /// 将所有成功条目打包，失败条目跳过。
    pub fn build_archive(&self) -> Result<bytes::Bytes, InvertError> {
        archive::build_archive(self.successes())
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.len(),
            succeeded: self.success_count(),
            failed: self.failure_count(),
            started_at: self.started_at.clone(),
            completed_at: self.completed_at.clone(),
            entries: self.entries.iter().map(EntrySummary::from).collect(),
        }
    }
}

/// 面向前端 / 报告文件的批次摘要。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: String,
    pub completed_at: String,
    pub entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EntrySummary {
    #[serde(rename_all = "camelCase")]
    Success {
        index: usize,
        source_name: String,
        file_name: String,
        mime: String,
        width: u32,
        height: u32,
        size: usize,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        index: usize,
        source_name: String,
        kind: FailureKind,
        message: String,
    },
}

impl From<&BatchEntry> for EntrySummary {
    fn from(entry: &BatchEntry) -> Self {
        match &entry.outcome {
            Outcome::Success(image) => Self::Success {
                index: entry.index,
                source_name: entry.source_name.clone(),
                file_name: image.file_name.clone(),
                mime: image.mime().to_string(),
                width: image.width,
                height: image.height,
                size: image.blob.len(),
            },
            Outcome::Failure { kind, message } => Self::Failure {
                index: entry.index,
                source_name: entry.source_name.clone(),
                kind: *kind,
                message: message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inverter::source::SourceFormat;
    use bytes::Bytes;

    fn success(index: usize, name: &str) -> BatchEntry {
        BatchEntry {
            index,
            source_name: name.to_string(),
            outcome: Outcome::Success(InvertedImage {
                file_name: format!("inverted_{}", name),
                format: SourceFormat::Png,
                width: 1,
                height: 1,
                blob: Bytes::from_static(b"png"),
            }),
        }
    }

    fn failure(index: usize, name: &str) -> BatchEntry {
        BatchEntry {
            index,
            source_name: name.to_string(),
            outcome: Outcome::from_result(Err(InvertError::InvalidFormat("text".into()))),
        }
    }

    #[test]
    fn counts_and_order_follow_entries() {
        let result = BatchResult::new(
            vec![success(0, "a.png"), failure(1, "b.txt"), success(2, "c.png")],
            Local::now().to_rfc3339(),
        );

        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
        let names: Vec<_> = result.successes().map(|img| img.file_name.as_str()).collect();
        assert_eq!(names, vec!["inverted_a.png", "inverted_c.png"]);
    }

    #[test]
    fn summary_serializes_tagged_entries() {
        let result = BatchResult::new(vec![success(0, "a.png"), failure(1, "b.txt")], "t0".into());
        let json = serde_json::to_value(result.summary()).expect("serialize summary failed");

        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["entries"][0]["status"], "success");
        assert_eq!(json["entries"][0]["fileName"], "inverted_a.png");
        assert_eq!(json["entries"][1]["status"], "failure");
        assert_eq!(json["entries"][1]["kind"], "invalidFormat");
    }

    #[test]
    fn batch_state_serializes_with_tag() {
        let json = serde_json::to_value(BatchState::Processing { total: 3, attempted: 1 }).unwrap();
        assert_eq!(json["state"], "processing");
        assert_eq!(json["attempted"], 1);
    }
}
