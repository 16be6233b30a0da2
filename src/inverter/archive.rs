//! # 归档模块
//!
//! 将批次中所有成功处理的文件打包为 `inverted_images.zip`，失败条目不进入归档。
//! PNG / JPEG 本身已压缩，条目使用 Stored 方式写入；同名条目追加 `_1`、`_2` 后缀。

use bytes::Bytes;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::InvertError;
use super::source::InvertedImage;

/// 归档文件名。
pub const ARCHIVE_FILE_NAME: &str = "inverted_images.zip";
/// 归档 MIME 类型。
pub const ARCHIVE_MIME: &str = "application/zip";

/// 按输入顺序将成功结果写入 zip。
pub fn build_archive<'a, I>(images: I) -> Result<Bytes, InvertError>
where
    I: IntoIterator<Item = &'a InvertedImage>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut used_names = HashSet::new();
    let mut count = 0usize;

    for image in images {
        let entry_name = unique_file_name(&image.file_name, &mut used_names);

        writer
            .start_file(entry_name.as_str(), options)
            .map_err(|e| InvertError::Archive(format!("创建归档条目 {} 失败：{}", entry_name, e)))?;
        writer
            .write_all(&image.blob)
            .map_err(|e| InvertError::Archive(format!("写入归档条目 {} 失败：{}", entry_name, e)))?;
        count += 1;
    }

    let cursor = writer
        .finish()
        .map_err(|e| InvertError::Archive(format!("完成归档失败：{}", e)))?;
    let bytes = cursor.into_inner();

    log::info!("📦 归档完成 - 条目: {} 大小: {}KB", count, bytes.len() / 1024);

    Ok(Bytes::from(bytes))
}

/// 在 `used` 中登记文件名，重名时追加 `_1`、`_2` 后缀。
///
/// 归档条目与 CLI 落盘共用同一规则，二者文件名保持一致。
pub fn unique_file_name(file_name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(file_name.to_string()) {
        return file_name.to_string();
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let mut n = 1usize;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
