//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `InvertHandler` 只负责流程编排与配置管理，不直接与外壳（CLI / 前端）绑定。
//! 单个文件的处理链路固定为：
//! 1. 按来源加载原始字节并确认格式
//! 2. 解码为 RGBA 位图
//! 3. 反色
//! 4. 按原格式重新编码
//!
//! 批次按上传顺序逐个处理，任一文件失败只记录在对应条目上，不影响其他文件。
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<InvertConfig>>` 支持运行时动态调整。
//! - 单个批次内使用“同一配置快照”，避免处理中途配置漂移。
//! - 每个文件的流水线在 `spawn_blocking` 中执行，调用方的异步任务保持响应。
//! - 记录 `load/decode/invert/encode/total` 阶段耗时，便于性能诊断。

use chrono::Local;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::batch::{BatchEntry, BatchProgress, BatchResult, Outcome};
use super::exporter::output_file_name;
use super::heic::{CommandHeicConverter, DisabledHeicConverter, HeicConverter};
use super::source::{ImageSource, InvertedImage};
use super::transform::invert_image;
use super::{ExportProfile, InvertConfig, InvertError};

/// 反色处理器。
///
/// 克隆开销很小（内部均为 `Arc`），可以移动到阻塞线程中使用。
#[derive(Clone)]
pub struct InvertHandler {
    pub(super) config: Arc<RwLock<InvertConfig>>,
    heic_override: Option<Arc<dyn HeicConverter>>,
}

impl InvertHandler {
    /// 根据初始配置创建处理器，配置不合法时直接拒绝。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use image_inverter::inverter::{InvertConfig, InvertHandler};
    ///
    /// let handler = InvertHandler::new(InvertConfig::default())?;
    /// # Ok::<(), image_inverter::inverter::InvertError>(())
    /// ```
    pub fn new(config: InvertConfig) -> Result<Self, InvertError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            heic_override: None,
        })
    }

    /// 注入自定义 HEIC 预转换器，优先于配置中的转换命令。
    pub fn with_heic_converter(mut self, converter: Arc<dyn HeicConverter>) -> Self {
        self.heic_override = Some(converter);
        self
    }

    pub(super) fn heic_converter(&self, config: &InvertConfig) -> Arc<dyn HeicConverter> {
        if let Some(converter) = &self.heic_override {
            return Arc::clone(converter);
        }

        match &config.heic_command {
            Some(command) => Arc::new(CommandHeicConverter::new(command.clone())),
            None => Arc::new(DisabledHeicConverter),
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单个批次使用一致参数。
    pub fn config_snapshot(&self) -> Result<InvertConfig, InvertError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| InvertError::State("配置读取锁已中毒".to_string()))
    }

    /// 整体替换配置（先校验）。
    pub fn set_config(&self, next: InvertConfig) -> Result<(), InvertError> {
        next.validate()?;

        let mut config = self
            .config
            .write()
            .map_err(|_| InvertError::State("配置写入锁已中毒".to_string()))?;
        *config = next;

        log::info!(
            "⚙️ 已更新反色配置（max_file_size={}, jpeg_quality={}, parallel_threshold={}, heic={}）",
            config.max_file_size,
            config.jpeg_quality,
            config.parallel_threshold_pixels,
            config.heic_command.is_some()
        );

        Ok(())
    }

    /// 设置导出档位。
    pub fn set_export_profile(&self, profile: ExportProfile) -> Result<(), InvertError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| InvertError::State("配置写入锁已中毒".to_string()))?;
        config.apply_export_profile(profile);

        log::info!(
            "⚙️ 已切换导出档位：{:?}（jpeg_quality={}）",
            profile,
            config.jpeg_quality
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_export_profile(&self) -> Result<ExportProfile, InvertError> {
        let config = self
            .config
            .read()
            .map_err(|_| InvertError::State("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_export_profile())
    }

    /// 单文件主流程：加载 → 解码 → 反色 → 编码。
    pub fn process_one(
        &self,
        source: ImageSource,
        config: &InvertConfig,
    ) -> Result<InvertedImage, InvertError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = self.load_source(source, config)?;
        let load_elapsed = load_start.elapsed();

        let decode_start = Instant::now();
        let source_image = self.decode_source(raw, config)?;
        let decode_elapsed = decode_start.elapsed();

        let invert_start = Instant::now();
        let inverted = invert_image(&source_image.pixels, config.parallel_threshold_pixels);
        let invert_elapsed = invert_start.elapsed();

        let encode_start = Instant::now();
        let blob = self.encode_inverted(&inverted, source_image.format, config)?;
        let encode_elapsed = encode_start.elapsed();

        let file_name = output_file_name(&source_image.name, source_image.converted_from_heic);

        log::info!(
            "✅ 反色完成 - {} -> {} load={}ms decode={}ms invert={}ms encode={}ms total={}ms",
            source_image.name,
            file_name,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            invert_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(InvertedImage {
            file_name,
            format: source_image.format,
            width: source_image.width,
            height: source_image.height,
            blob,
        })
    }

    /// 批处理入口：按上传顺序处理全部文件。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use image_inverter::inverter::{InvertConfig, InvertHandler, ImageSource};
    ///
    /// # async fn demo() -> Result<(), image_inverter::inverter::InvertError> {
    /// let handler = InvertHandler::new(InvertConfig::default())?;
    /// let result = handler
    ///     .process_batch(vec![ImageSource::FilePath("/tmp/a.png".into())])
    ///     .await?;
    /// println!("{} ok", result.success_count());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn process_batch(&self, sources: Vec<ImageSource>) -> Result<BatchResult, InvertError> {
        self.process_batch_with_hooks(sources, |_| {}, || false).await
    }

    /// 带进度与取消钩子的批处理。
    ///
    /// 只有取消会让整个批次返回 `Err`；单文件失败都记录在条目上。
    pub async fn process_batch_with_hooks<P, C>(
        &self,
        sources: Vec<ImageSource>,
        on_progress: P,
        is_cancelled: C,
    ) -> Result<BatchResult, InvertError>
    where
        P: Fn(BatchProgress) + Send + Sync,
        C: Fn() -> bool + Send + Sync,
    {
        let config = self.config_snapshot()?;
        let started_at = Local::now().to_rfc3339();
        let batch_start = Instant::now();
        let total = sources.len();
        let mut entries = Vec::with_capacity(total);

        log::info!("🚀 开始批量反色 - 文件数: {}", total);

        for (index, source) in sources.into_iter().enumerate() {
            if is_cancelled() {
                log::warn!("⛔ 批量反色已取消 - 已处理 {}/{}", index, total);
                return Err(InvertError::Cancelled(format!(
                    "批次已清空（已处理 {}/{}）",
                    index, total
                )));
            }

            let source_name = source.display_name();
            let handler = self.clone();
            let file_config = config.clone();

            let result = tokio::task::spawn_blocking(move || handler.process_one(source, &file_config))
                .await
                .unwrap_or_else(|e| Err(InvertError::Decode(format!("处理线程异常退出：{}", e))));

            if let Err(err) = &result {
                log::warn!(
                    "⚠️ 文件处理失败 - {} code={} stage={}: {}",
                    source_name,
                    err.code(),
                    err.stage(),
                    err
                );
            }

            let outcome = Outcome::from_result(result);
            on_progress(BatchProgress {
                attempted: index + 1,
                total,
                source_name: source_name.clone(),
                succeeded: outcome.is_success(),
            });

            entries.push(BatchEntry {
                index,
                source_name,
                outcome,
            });
        }

        let result = BatchResult::new(entries, started_at);
        log::info!(
            "🏁 批量反色结束 - 成功: {} 失败: {} 耗时: {}ms",
            result.success_count(),
            result.failure_count(),
            batch_start.elapsed().as_millis()
        );

        Ok(result)
    }
}
