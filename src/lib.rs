//! # 图片批量反色工具 · 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │        前端 (invoke 命令)  /  命令行 (main.rs + clap)      │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ serde DTO / Result<T, InvertCommandError | AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ inverter ─── 加载 → 解码 → 反色 → 编码 → 批次/归档    │
//! │  │   ├─ commands       前端入参/出参适配                   │
//! │  │   └─ service        批次会话 (idle/processing/complete) │
//! │  │                                                       │
//! │  ├─ settings           JSON 设置文件                      │
//! │  └─ storage            输出目录与落盘 (返回 Result)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`inverter`] | 图片加载校验、反色、重新编码、批次汇总与 zip 打包 |
//! | [`settings`] | `InvertConfig` 的 JSON 读写 |
//! | [`storage`] | 输出目录的获取、自动创建与文件写入 |

pub mod error;
pub mod inverter;
pub mod settings;
pub mod storage;
