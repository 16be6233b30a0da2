//! # HEIC/HEIF 预转换模块
//!
//! ## 设计思路
//!
//! 反色流水线只处理 PNG / JPEG。HEIC 输入必须先转换为 JPEG，
//! 转换器通过 `HeicConverter` trait 注入，便于测试替换与后续接入原生解码库。
//!
//! ## 实现思路
//!
//! - `DisabledHeicConverter`：未配置转换命令时使用，直接拒绝。
//! - `CommandHeicConverter`：调用外部命令（如 `heif-convert {input} {output}`），
//!   通过临时文件交换数据，结束后清理临时文件。

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use super::InvertError;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// HEIC → JPEG 预转换器。
pub trait HeicConverter: Send + Sync {
    fn convert_to_jpeg(&self, heic_bytes: &[u8]) -> Result<Vec<u8>, InvertError>;
}

/// 未启用预转换时的占位实现。
pub struct DisabledHeicConverter;

impl HeicConverter for DisabledHeicConverter {
    fn convert_to_jpeg(&self, _heic_bytes: &[u8]) -> Result<Vec<u8>, InvertError> {
        Err(InvertError::InvalidFormat(
            "HEIC/HEIF 需要预转换为 JPEG，但未配置转换命令".to_string(),
        ))
    }
}

/// 通过外部命令完成预转换。
pub struct CommandHeicConverter {
    command: String,
}

impl CommandHeicConverter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// 展开命令模板；缺少占位符时按 `<cmd> <input> <output>` 追加。
    fn build_args(&self, input: &str, output: &str) -> Result<(String, Vec<String>), InvertError> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| InvertError::InvalidFormat("HEIC 转换命令为空".to_string()))?
            .to_string();

        let mut has_placeholder = false;
        let mut args: Vec<String> = parts
            .map(|part| {
                if part.contains("{input}") || part.contains("{output}") {
                    has_placeholder = true;
                }
                part.replace("{input}", input).replace("{output}", output)
            })
            .collect();

        if !has_placeholder {
            args.push(input.to_string());
            args.push(output.to_string());
        }

        Ok((program, args))
    }

    fn temp_paths() -> (PathBuf, PathBuf) {
        let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let stem = format!("image-inverter-{}-{}-{}", std::process::id(), stamp, seq);
        let dir = std::env::temp_dir();
        (dir.join(format!("{stem}.heic")), dir.join(format!("{stem}.jpg")))
    }
}

impl HeicConverter for CommandHeicConverter {
    fn convert_to_jpeg(&self, heic_bytes: &[u8]) -> Result<Vec<u8>, InvertError> {
        let (input_path, output_path) = Self::temp_paths();
        let input = input_path.to_string_lossy().into_owned();
        let output = output_path.to_string_lossy().into_owned();
        let (program, args) = self.build_args(&input, &output)?;

        std::fs::write(&input_path, heic_bytes)
            .map_err(|e| InvertError::FileSystem(format!("写入 HEIC 临时文件失败：{}", e)))?;

        log::debug!("🔁 HEIC 预转换 - 命令: {} {:?}", program, args);
        let status = Command::new(&program).args(&args).status();

        let result = match status {
            Ok(status) if status.success() => std::fs::read(&output_path)
                .map_err(|e| InvertError::Decode(format!("读取 HEIC 转换结果失败：{}", e))),
            Ok(status) => Err(InvertError::Decode(format!(
                "HEIC 转换命令退出码异常：{}",
                status
            ))),
            Err(e) => Err(InvertError::InvalidFormat(format!(
                "无法执行 HEIC 转换命令 {}：{}",
                program, e
            ))),
        };

        for path in [&input_path, &output_path] {
            if let Err(err) = std::fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("⚠️ 清理 HEIC 临时文件失败 {}: {}", path.display(), err);
                }
            }
        }

        result
    }
}
