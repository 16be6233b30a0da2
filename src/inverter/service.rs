//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `InvertServiceState` 作为外壳持有的状态，替代全局单例函数。
//! 好处：
//! 1. 生命周期清晰（由 `main.rs` 或前端外壳统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//!
//! ## 实现思路
//!
//! 服务层维护一个“当前批次”会话：
//! - `idle → processing → complete`，全部文件尝试完毕后无条件进入 `complete`
//! - `clear_batch` 设置取消标志并回到 `idle`，处理中的批次在下一个文件前放弃
//! - 每个批次有递增 id，被清空的旧批次即便跑完也不会覆盖新状态

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::archive::{ARCHIVE_FILE_NAME, ARCHIVE_MIME};
use super::batch::{BatchProgress, BatchResult, BatchState, BatchSummary, Outcome};
use super::{ExportProfile, ImageSource, InvertConfig, InvertError, InvertHandler};

/// 可下载的命名数据块。
#[derive(Debug, Clone)]
pub struct NamedBlob {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Bytes,
}

#[derive(Debug)]
struct BatchSession {
    batch_id: u64,
    state: BatchState,
    result: Option<BatchResult>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl BatchSession {
    fn idle() -> Self {
        Self {
            batch_id: 0,
            state: BatchState::Idle,
            result: None,
            cancel_flag: None,
        }
    }
}

/// 反色服务状态。
pub struct InvertServiceState {
    handler: InvertHandler,
    session: Mutex<BatchSession>,
}

impl InvertServiceState {
    /// 使用默认配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_inverter::inverter::InvertServiceState;
    ///
    /// let service = InvertServiceState::new()?;
    /// # Ok::<(), image_inverter::inverter::InvertError>(())
    /// ```
    pub fn new() -> Result<Self, InvertError> {
        Self::with_config(InvertConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    pub fn with_config(config: InvertConfig) -> Result<Self, InvertError> {
        Ok(Self::with_handler(InvertHandler::new(config)?))
    }

    /// 使用已构建的处理器（例如注入了 HEIC 转换器）创建服务状态。
    pub fn with_handler(handler: InvertHandler) -> Self {
        Self {
            handler,
            session: Mutex::new(BatchSession::idle()),
        }
    }

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, BatchSession>, InvertError> {
        self.session
            .lock()
            .map_err(|_| InvertError::State("批次会话锁已中毒".to_string()))
    }

    /// 处理一个新批次，返回摘要。
    ///
    /// 已有批次在处理中时拒绝；上一个已完成的批次会被替换。
    pub async fn process_batch<P>(
        &self,
        sources: Vec<ImageSource>,
        on_progress: P,
    ) -> Result<BatchSummary, InvertError>
    where
        P: Fn(&BatchProgress) + Send + Sync,
    {
        let total = sources.len();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let batch_id = {
            let mut session = self.lock_session()?;
            if matches!(session.state, BatchState::Processing { .. }) {
                return Err(InvertError::State("已有批次正在处理".to_string()));
            }

            session.batch_id += 1;
            session.state = BatchState::Processing { total, attempted: 0 };
            session.result = None;
            session.cancel_flag = Some(Arc::clone(&cancel_flag));
            session.batch_id
        };

        let outcome = self
            .handler
            .process_batch_with_hooks(
                sources,
                |progress| {
                    if let Ok(mut session) = self.session.lock() {
                        if session.batch_id == batch_id {
                            session.state = BatchState::Processing {
                                total: progress.total,
                                attempted: progress.attempted,
                            };
                        }
                    }
                    on_progress(&progress);
                },
                || cancel_flag.load(Ordering::SeqCst),
            )
            .await;

        let mut session = self.lock_session()?;
        let still_current = session.batch_id == batch_id && !cancel_flag.load(Ordering::SeqCst);

        match outcome {
            Ok(result) if still_current => {
                let summary = result.summary();
                session.state = BatchState::Complete {
                    total: result.len(),
                    succeeded: result.success_count(),
                };
                session.result = Some(result);
                session.cancel_flag = None;
                Ok(summary)
            }
            Ok(_) => Err(InvertError::Cancelled("批次已被清空，结果已丢弃".to_string())),
            Err(err) => {
                if session.batch_id == batch_id {
                    session.state = BatchState::Idle;
                    session.cancel_flag = None;
                }
                Err(err)
            }
        }
    }

    /// 当前批次状态。
    pub fn state(&self) -> Result<BatchState, InvertError> {
        Ok(self.lock_session()?.state)
    }

    /// 最近一次完成批次的摘要。
    pub fn summary(&self) -> Result<Option<BatchSummary>, InvertError> {
        Ok(self.lock_session()?.result.as_ref().map(BatchResult::summary))
    }

    /// 清空批次：取消处理中的工作并丢弃结果。
    ///
    /// 返回是否确实清空了内容。
    pub fn clear_batch(&self) -> Result<bool, InvertError> {
        let mut session = self.lock_session()?;

        let had_content = session.result.is_some() || session.cancel_flag.is_some();
        if let Some(flag) = session.cancel_flag.take() {
            flag.store(true, Ordering::SeqCst);
            log::info!("🧹 已请求取消处理中的批次 #{}", session.batch_id);
        }

        session.result = None;
        session.state = BatchState::Idle;
        Ok(had_content)
    }

    /// 单文件下载。
    pub fn file_download(&self, index: usize) -> Result<NamedBlob, InvertError> {
        let session = self.lock_session()?;
        let result = session
            .result
            .as_ref()
            .ok_or_else(|| InvertError::NotFound("没有已完成的批次".to_string()))?;
        let entry = result
            .entry(index)
            .ok_or_else(|| InvertError::NotFound(format!("批次中不存在第 {} 个文件", index)))?;

        match &entry.outcome {
            Outcome::Success(image) => Ok(NamedBlob {
                file_name: image.file_name.clone(),
                mime: image.mime(),
                bytes: image.blob.clone(),
            }),
            Outcome::Failure { kind, message } => Err(InvertError::NotFound(format!(
                "{} 处理失败（{}），无可下载内容：{}",
                entry.source_name,
                kind.as_str(),
                message
            ))),
        }
    }

    /// 归档下载：打包全部成功文件，失败文件跳过。
    pub fn archive_download(&self) -> Result<NamedBlob, InvertError> {
        let session = self.lock_session()?;
        let result = session
            .result
            .as_ref()
            .ok_or_else(|| InvertError::NotFound("没有已完成的批次".to_string()))?;

        if result.success_count() == 0 {
            return Err(InvertError::Archive("没有成功处理的文件可打包".to_string()));
        }

        Ok(NamedBlob {
            file_name: ARCHIVE_FILE_NAME.to_string(),
            mime: ARCHIVE_MIME,
            bytes: result.build_archive()?,
        })
    }

    /// 切换导出档位（字符串语义）。
    pub fn set_export_profile(&self, profile: &str) -> Result<(), InvertError> {
        let profile = ExportProfile::from_str(profile)?;
        self.handler.set_export_profile(profile)
    }

    /// 读取当前导出档位。
    pub fn get_export_profile(&self) -> Result<String, InvertError> {
        Ok(self.handler.get_export_profile()?.as_str().to_string())
    }

    pub fn set_config(&self, config: InvertConfig) -> Result<(), InvertError> {
        self.handler.set_config(config)
    }

    pub fn get_config(&self) -> Result<InvertConfig, InvertError> {
        self.handler.config_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_source(name: &str) -> ImageSource {
        let img = ImageBuffer::from_pixel(2, 2, Rgba([9u8, 8, 7, 255]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");

        ImageSource::Bytes {
            name: name.to_string(),
            declared_mime: Some("image/png".to_string()),
            bytes: cursor.into_inner(),
        }
    }

    fn text_source(name: &str) -> ImageSource {
        ImageSource::Bytes {
            name: name.to_string(),
            declared_mime: Some("text/plain".to_string()),
            bytes: b"hello".to_vec(),
        }
    }

    #[tokio::test]
    async fn batch_moves_from_idle_to_complete() {
        let service = InvertServiceState::new().expect("service init failed");
        assert_eq!(service.state().unwrap(), BatchState::Idle);

        let summary = service
            .process_batch(vec![png_source("a.png"), text_source("b.txt")], |_| {})
            .await
            .expect("batch failed");

        assert_eq!(summary.succeeded, 1);
        assert_eq!(
            service.state().unwrap(),
            BatchState::Complete { total: 2, succeeded: 1 }
        );
    }

    #[tokio::test]
    async fn downloads_serve_successes_only() {
        let service = InvertServiceState::new().expect("service init failed");
        service
            .process_batch(vec![text_source("b.txt"), png_source("a.png")], |_| {})
            .await
            .expect("batch failed");

        assert!(matches!(service.file_download(0), Err(InvertError::NotFound(_))));
        let blob = service.file_download(1).expect("download failed");
        assert_eq!(blob.file_name, "inverted_a.png");
        assert_eq!(blob.mime, "image/png");

        let archive = service.archive_download().expect("archive failed");
        assert_eq!(archive.file_name, "inverted_images.zip");
    }

    #[tokio::test]
    async fn clear_returns_to_idle_and_drops_results() {
        let service = InvertServiceState::new().expect("service init failed");
        service
            .process_batch(vec![png_source("a.png")], |_| {})
            .await
            .expect("batch failed");

        assert!(service.clear_batch().unwrap());
        assert_eq!(service.state().unwrap(), BatchState::Idle);
        assert!(service.summary().unwrap().is_none());
        assert!(matches!(service.archive_download(), Err(InvertError::NotFound(_))));
        assert!(!service.clear_batch().unwrap());
    }

    #[tokio::test]
    async fn clear_during_processing_cancels_batch() {
        let service = InvertServiceState::new().expect("service init failed");

        let result = service
            .process_batch(vec![png_source("a.png"), png_source("b.png")], |progress| {
                if progress.attempted == 1 {
                    service.clear_batch().expect("clear failed");
                }
            })
            .await;

        assert!(matches!(result, Err(InvertError::Cancelled(_))));
        assert_eq!(service.state().unwrap(), BatchState::Idle);
    }

    #[tokio::test]
    async fn archive_without_successes_is_rejected() {
        let service = InvertServiceState::new().expect("service init failed");
        service
            .process_batch(vec![text_source("b.txt")], |_| {})
            .await
            .expect("batch failed");

        assert!(matches!(service.archive_download(), Err(InvertError::Archive(_))));
    }

    #[test]
    fn profile_strings_round_trip() {
        let service = InvertServiceState::new().expect("service init failed");
        service.set_export_profile("high").expect("set profile failed");
        assert_eq!(service.get_export_profile().unwrap(), "high");
        assert!(service.set_export_profile("nope").is_err());
    }
}
