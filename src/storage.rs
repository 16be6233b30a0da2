//! 输出目录管理模块
//!
//! # 设计思路
//!
//! 统一管理反色结果的落盘路径，支持用户自定义目录，
//! 并在目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 优先使用用户传入的目录，未设置时回退到当前目录下的 `inverted`。
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 写入的文件名只取最后一段路径，防止来源名中的 `..` 逃出输出目录。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::inverter::NamedBlob;

pub const DEFAULT_OUTPUT_DIR: &str = "inverted";

/// 输出目录信息
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub path: String,
    pub total_size: u64,
    pub file_count: u64,
}

/// 获取输出目录
///
/// # 参数
/// * `custom_dir` - 用户自定义目录（可选）
///
/// # 返回
/// - `Ok(PathBuf)`：可用的输出目录
/// - `Err(AppError::Storage)`：无法创建目录
pub fn resolve_output_dir(custom_dir: Option<&Path>) -> Result<PathBuf, AppError> {
    let dir = match custom_dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from(DEFAULT_OUTPUT_DIR),
    };

    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("创建输出目录 '{}' 失败: {}", dir.display(), e))
        })?;
    }
    if !dir.is_dir() {
        return Err(AppError::Storage(format!("'{}' 不是目录", dir.display())));
    }
    Ok(dir)
}

/// 将命名数据块写入输出目录，返回写入路径。
pub fn write_blob(dir: &Path, blob: &NamedBlob) -> Result<PathBuf, AppError> {
    let file_name = Path::new(&blob.file_name)
        .file_name()
        .ok_or_else(|| AppError::Storage(format!("非法输出文件名: {}", blob.file_name)))?;

    let path = dir.join(file_name);
    fs::write(&path, &blob.bytes)?;
    log::debug!("💾 已写入 {} ({} bytes)", path.display(), blob.bytes.len());
    Ok(path)
}

/// 获取输出目录信息（路径 + 占用大小 + 文件数）
pub fn get_output_dir_info(dir: &Path) -> Result<StorageInfo, AppError> {
    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;

    for entry in fs::read_dir(dir)?.flatten() {
        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                total_size += metadata.len();
                file_count += 1;
            }
        }
    }

    Ok(StorageInfo {
        path: dir.to_string_lossy().to_string(),
        total_size,
        file_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("image_inverter_storage_{}_{}", std::process::id(), name))
    }

    fn blob(name: &str, data: &'static [u8]) -> NamedBlob {
        NamedBlob {
            file_name: name.to_string(),
            mime: "image/png",
            bytes: Bytes::from_static(data),
        }
    }

    #[test]
    fn creates_missing_directory() {
        let dir = temp_dir("create").join("nested");
        let resolved = resolve_output_dir(Some(&dir)).expect("resolve failed");

        assert!(resolved.is_dir());
        let _ = fs::remove_dir_all(temp_dir("create"));
    }

    #[test]
    fn file_path_is_not_a_directory() {
        let file = temp_dir("plain_file");
        fs::write(&file, b"x").unwrap();

        let result = resolve_output_dir(Some(&file));
        let _ = fs::remove_file(&file);

        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[test]
    fn write_blob_strips_directories_from_name() {
        let dir = resolve_output_dir(Some(&temp_dir("strip"))).expect("resolve failed");
        let path = write_blob(&dir, &blob("../../inverted_a.png", b"abc")).expect("write failed");

        assert_eq!(path, dir.join("inverted_a.png"));
        let info = get_output_dir_info(&dir).expect("info failed");
        assert_eq!(info.file_count, 1);
        assert_eq!(info.total_size, 3);

        let _ = fs::remove_dir_all(&dir);
    }
}
