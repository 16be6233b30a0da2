//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `InvertConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中导出档位（high / balanced / compact）作为高层语义，映射到 JPEG 质量等底层参数。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - `ExportProfile` 负责档位字符串解析与反向输出。
//! - `apply_export_profile` 将档位转换为 JPEG 质量。
//! - `infer_export_profile` 用于从当前配置反推档位（给前端展示状态）。
//! - `validate` 在写入前统一做范围校验。

use serde::{Deserialize, Serialize};

use super::InvertError;

/// 默认 JPEG 重新编码质量（与浏览器 canvas 导出的默认值一致）。
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// 反色处理配置。
///
/// 字段覆盖了读取、解码、反色与编码四个阶段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvertConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// JPEG 重新编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 像素数达到该值后按行并行反色。
    pub parallel_threshold_pixels: u64,
    /// HEIC/HEIF 预转换命令，`{input}` / `{output}` 为占位符。
    ///
    /// 为空时不接受 HEIC 输入。
    pub heic_command: Option<String>,
}

impl Default for InvertConfig {
    fn default() -> Self {
        Self {
            max_file_size: 25 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            parallel_threshold_pixels: 1_048_576,
            heic_command: None,
        }
    }
}

/// 导出档位（面向产品/用户语义）。
///
/// - `High`：尽量保真
/// - `Balanced`：质量与体积平衡
/// - `Compact`：优先压缩体积
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProfile {
    High,
    Balanced,
    Compact,
}

impl ExportProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use image_inverter::inverter::ExportProfile;
    ///
    /// let p = ExportProfile::from_str("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), image_inverter::inverter::InvertError>(())
    /// ```
    pub fn from_str(profile: &str) -> Result<Self, InvertError> {
        match profile.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "balanced" => Ok(Self::Balanced),
            "compact" => Ok(Self::Compact),
            other => Err(InvertError::InvalidFormat(format!(
                "未知导出档位：{}（可选：high / balanced / compact）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供前端展示与持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Balanced => "balanced",
            Self::Compact => "compact",
        }
    }

    fn jpeg_quality(self) -> u8 {
        match self {
            Self::High => 98,
            Self::Balanced => DEFAULT_JPEG_QUALITY,
            Self::Compact => 75,
        }
    }
}

impl InvertConfig {
    /// 基于当前参数反推导出档位。
    pub fn infer_export_profile(&self) -> ExportProfile {
        if self.jpeg_quality >= ExportProfile::High.jpeg_quality() {
            return ExportProfile::High;
        }

        if self.jpeg_quality <= ExportProfile::Compact.jpeg_quality() {
            return ExportProfile::Compact;
        }

        ExportProfile::Balanced
    }

    /// 应用指定导出档位：只改 JPEG 质量，体积上限与并行阈值保持不变。
    pub fn apply_export_profile(&mut self, profile: ExportProfile) {
        self.jpeg_quality = profile.jpeg_quality();
    }

    /// 校验配置范围，不合法时返回 `InvalidFormat`。
    pub fn validate(&self) -> Result<(), InvertError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(InvertError::InvalidFormat(
                "jpeg_quality 必须在 1~100 之间".to_string(),
            ));
        }
        if self.max_file_size < 1024 {
            return Err(InvertError::InvalidFormat("max_file_size 不能小于 1KB".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(InvertError::InvalidFormat("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.max_decoded_bytes < 1024 * 1024 {
            return Err(InvertError::InvalidFormat("max_decoded_bytes 不能小于 1MB".to_string()));
        }
        if let Some(command) = &self.heic_command {
            if command.trim().is_empty() {
                return Err(InvertError::InvalidFormat("heic_command 不能为空字符串".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_balanced() {
        let config = InvertConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.infer_export_profile(), ExportProfile::Balanced);
    }

    #[test]
    fn profile_round_trips_through_config() {
        let mut config = InvertConfig::default();

        for profile in [ExportProfile::High, ExportProfile::Balanced, ExportProfile::Compact] {
            config.apply_export_profile(profile);
            assert_eq!(config.infer_export_profile(), profile);
        }
    }

    #[test]
    fn profile_only_changes_jpeg_quality() {
        let mut config = InvertConfig {
            parallel_threshold_pixels: 4096,
            max_file_size: 2 * 1024 * 1024,
            ..InvertConfig::default()
        };
        config.apply_export_profile(ExportProfile::Compact);

        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.parallel_threshold_pixels, 4096);
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(matches!(
            ExportProfile::from_str("ultra"),
            Err(InvertError::InvalidFormat(_))
        ));
        assert_eq!(ExportProfile::from_str(" COMPACT ").unwrap(), ExportProfile::Compact);
    }

    #[test]
    fn validate_rejects_out_of_range_quality() {
        let mut config = InvertConfig::default();
        config.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(InvertError::InvalidFormat(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: InvertConfig =
            serde_json::from_str(r#"{ "jpeg_quality": 80 }"#).expect("parse config failed");

        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.max_file_size, InvertConfig::default().max_file_size);
        assert!(config.heic_command.is_none());
    }
}
