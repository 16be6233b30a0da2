//! 设置文件读写
//!
//! 设置以 JSON 形式保存 `InvertConfig`，缺省字段回退为默认值。

use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::inverter::InvertConfig;

/// 读取设置文件；文件不存在时返回 `Ok(None)`。
pub fn load_settings(path: &Path) -> Result<Option<InvertConfig>, AppError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<InvertConfig>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;
    parsed.validate()?;

    log::info!("⚙️ 已加载设置文件: {}", path.display());
    Ok(Some(parsed))
}

pub fn save_settings(path: &Path, config: &InvertConfig) -> Result<(), AppError> {
    config.validate()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Settings(format!("创建设置目录失败: {}", e)))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("image_inverter_settings_{}_{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_yields_none() {
        let path = temp_path("missing.json");
        assert!(load_settings(&path).unwrap().is_none());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let path = temp_path("roundtrip.json");
        let config = InvertConfig {
            jpeg_quality: 80,
            heic_command: Some("heif-convert {input} {output}".into()),
            ..InvertConfig::default()
        };

        save_settings(&path, &config).expect("save failed");
        let loaded = load_settings(&path).expect("load failed").expect("settings missing");
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let path = temp_path("partial.json");
        fs::write(&path, r#"{ "jpeg_quality": 70 }"#).unwrap();

        let loaded = load_settings(&path).expect("load failed").expect("settings missing");
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.jpeg_quality, 70);
        assert_eq!(loaded.max_file_size, InvertConfig::default().max_file_size);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let path = temp_path("invalid.json");
        fs::write(&path, r#"{ "jpeg_quality": 0 }"#).unwrap();

        let result = load_settings(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(AppError::Image(_))));
    }

    #[test]
    fn malformed_json_is_a_settings_error() {
        let path = temp_path("malformed.json");
        fs::write(&path, "{ not json").unwrap();

        let result = load_settings(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(AppError::Settings(_))));
    }
}
