//! Ember 工具集
//!
//! 提供日志初始化、资源路径管理、引擎配置等通用工具。
//!
//! # EmberPath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # EmberConfig
//! 从 `ember.toml` 读取窗口、着色器目录、工程文件等配置，文件缺失时使用默认值。

pub mod config;
pub mod init_log;
pub mod resource;
