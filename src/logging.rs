// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 日志
//!
//! 基于 log4rs。如果配置里的 `log_config` 指向一个存在的 YAML 文件，
//! 则完全交给该文件；否则同时输出到控制台和 `log_file`。
//!
//! 每条请求日志都以 [`ConnectionContext`] 开头，形如
//! `[ID3] 127.0.0.1:51234 | GET /retrieve?name=a.txt | 200 | ...`。

use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use log::LevelFilter;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
    Handle,
};

use crate::config::Config;

pub const LOG_PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S)}] {l:<5} | {m}{n}";

/// 已安装的日志组件，由 `main` 持有，退出前调用 [`Logging::shutdown`]。
pub struct Logging {
    handle: Option<Handle>,
    level: LevelFilter,
}

impl Logging {
    pub fn init(config: &Config) -> Result<Self, Box<dyn Error + Send + Sync>> {
        if let Some(file) = config.log_config() {
            if Path::new(file).is_file() {
                log4rs::init_file(file, Default::default())?;
                return Ok(Self {
                    handle: None,
                    level: log::max_level(),
                });
            }
        }

        let level = parse_level(config.log_level());
        let handle = log4rs::init_config(build_config(config.log_file(), level)?)?;
        Ok(Self {
            handle: Some(handle),
            level,
        })
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// 是否使用了内置的控制台 + 文件配置
    pub fn is_builtin(&self) -> bool {
        self.handle.is_some()
    }

    pub fn shutdown(self) {
        log::logger().flush();
    }
}

fn build_config(log_file: &str, level: LevelFilter) -> Result<LogConfig, Box<dyn Error + Send + Sync>> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(log_file)?;

    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(level),
        )?;
    Ok(config)
}

/// 无法识别的级别按 `info` 处理。
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// 单个连接的日志前缀
#[derive(Debug, Clone, Copy)]
pub struct ConnectionContext {
    pub id: u128,
    pub peer: SocketAddr,
}

impl ConnectionContext {
    pub fn new(id: u128, peer: SocketAddr) -> Self {
        Self { id, peer }
    }
}

impl fmt::Display for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ID{}] {}", self.id, self.peer)
    }
}
