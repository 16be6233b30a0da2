//! # 图片批量反色工具 · 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果落盘。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use clap::Parser;
use image_inverter::error::AppError;
use image_inverter::inverter::{
    ARCHIVE_FILE_NAME, EntrySummary, ExportProfile, ImageSource, InvertConfig, InvertServiceState,
    unique_file_name,
};
use image_inverter::{settings, storage};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "image-inverter")]
#[command(version, about = "Batch colour inversion for PNG / JPEG / HEIC images", long_about = None)]
struct Cli {
    /// Input files or directories
    #[arg(value_name = "INPUTS", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Also write inverted_images.zip with every successful file
    #[arg(long)]
    archive: bool,

    /// Skip writing individual files
    #[arg(long)]
    no_files: bool,

    /// JSON settings file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective settings to a JSON file
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Export profile: "high", "balanced" or "compact"
    #[arg(short, long, value_name = "PROFILE")]
    profile: Option<String>,

    /// Maximum accepted input size in megabytes
    #[arg(long, value_name = "N")]
    max_file_size_mb: Option<u64>,

    /// External HEIC converter, e.g. "heif-convert {input} {output}"
    #[arg(long, value_name = "CMD")]
    heic_command: Option<String>,

    /// Write the batch summary as JSON
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ {}", err);
            ExitCode::FAILURE
        }
    }
}

/// 合并配置：默认值 ← 设置文件 ← 命令行参数。
fn build_config(cli: &Cli) -> Result<InvertConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => settings::load_settings(path)?.ok_or_else(|| {
            AppError::Settings(format!("设置文件不存在: {}", path.display()))
        })?,
        None => InvertConfig::default(),
    };

    if let Some(profile) = &cli.profile {
        config.apply_export_profile(ExportProfile::from_str(profile)?);
    }
    if let Some(quality) = cli.quality {
        config.jpeg_quality = quality;
    }
    if let Some(mb) = cli.max_file_size_mb {
        config.max_file_size = mb.saturating_mul(1024 * 1024);
    }
    if let Some(command) = &cli.heic_command {
        config.heic_command = Some(command.clone());
    }

    config.validate()?;
    Ok(config)
}

/// 展开输入：目录按文件名排序后取其中的文件。
fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<ImageSource>, AppError> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(input)?
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .collect();
            files.sort();
            sources.extend(files.iter().map(|path| path_source(path)));
        } else {
            sources.push(path_source(input));
        }
    }

    Ok(sources)
}

fn path_source(path: &Path) -> ImageSource {
    ImageSource::FilePath(path.to_string_lossy().into_owned())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = build_config(&cli)?;
    if let Some(path) = &cli.save_config {
        settings::save_settings(path, &config)?;
        log::info!("⚙️ 已保存设置到 {}", path.display());
    }

    let writes_output = !cli.no_files || cli.archive;
    let out_dir = if writes_output {
        Some(storage::resolve_output_dir(cli.out.as_deref())?)
    } else {
        None
    };

    let sources = collect_sources(&cli.inputs)?;
    log::info!(
        "🚀 开始处理 {} 个文件（导出档位: {}，JPEG 质量: {}）",
        sources.len(),
        config.infer_export_profile().as_str(),
        config.jpeg_quality
    );

    let service = InvertServiceState::with_config(config)?;
    let summary = service
        .process_batch(sources, |progress| {
            let mark = if progress.succeeded { "✅" } else { "⚠️" };
            log::info!(
                "{} [{}/{}] {}",
                mark,
                progress.attempted,
                progress.total,
                progress.source_name
            );
        })
        .await?;

    // 与归档条目同一套重名规则，避免同名输入互相覆盖
    let mut written_names = HashSet::new();
    for entry in &summary.entries {
        match entry {
            EntrySummary::Success { index, .. } => {
                if let (Some(dir), false) = (&out_dir, cli.no_files) {
                    let mut blob = service.file_download(*index)?;
                    let file_name = unique_file_name(&blob.file_name, &mut written_names);
                    if file_name != blob.file_name {
                        log::info!("📝 {} 重名，写入为 {}", blob.file_name, file_name);
                        blob.file_name = file_name;
                    }
                    storage::write_blob(dir, &blob)?;
                }
            }
            EntrySummary::Failure {
                source_name,
                kind,
                message,
                ..
            } => {
                log::warn!("❌ {} 处理失败 [{}]: {}", source_name, kind.as_str(), message);
            }
        }
    }

    if let (Some(dir), true) = (&out_dir, cli.archive) {
        if summary.succeeded > 0 {
            let path = storage::write_blob(dir, &service.archive_download()?)?;
            log::info!("📦 已写入归档 {}", path.display());
        } else {
            log::warn!("📦 没有成功处理的文件，跳过 {}", ARCHIVE_FILE_NAME);
        }
    }

    if let Some(path) = &cli.summary {
        let content = serde_json::to_string_pretty(&summary)
            .map_err(|e| AppError::Storage(format!("序列化批次摘要失败: {}", e)))?;
        fs::write(path, content)?;
    }

    log::info!(
        "🏁 完成：{} 个成功，{} 个失败，共 {} 个",
        summary.succeeded,
        summary.failed,
        summary.total
    );
    if let Some(dir) = &out_dir {
        let info = storage::get_output_dir_info(dir)?;
        log::info!(
            "📁 输出目录 {}：{} 个文件，{} bytes",
            info.path,
            info.file_count,
            info.total_size
        );
    }

    Ok(())
}
