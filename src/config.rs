use serde_derive::Deserialize;
use serde_derive::Serialize;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/development.toml";

/// 路由模式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    /// `POST /upload` 与 `GET|HEAD /retrieve?name=`，上传文件名由服务器生成
    Routed,
    /// 所有操作都在 `/` 上，文件名由 `?name=` 指定
    Single,
}

impl RouteMode {
    pub fn upload_path(&self) -> &'static str {
        match self {
            RouteMode::Routed => "/upload",
            RouteMode::Single => "/",
        }
    }

    pub fn retrieve_path(&self) -> &'static str {
        match self {
            RouteMode::Routed => "/retrieve",
            RouteMode::Single => "/",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    port: u16,
    local: bool,
    worker_threads: usize,
    serve_root: String,
    save_root: String,
    route_mode: RouteMode,
    header_buffer_size: usize,
    max_request_size: u64,
    max_file_size: u64,
    read_timeout_ms: u64,
    chunk_size: usize,
    enable_compressor: bool,
    compressor: Option<String>,
    compressor_delay_ms: u64,
    log_file: String,
    log_level: String,
    log_config: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "无法读取配置文件: {}", e),
            ConfigError::Parse(e) => write!(f, "无法解析配置文件: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 8080,
            local: false,
            worker_threads: 0,
            serve_root: "./serve".to_string(),
            save_root: "./save".to_string(),
            route_mode: RouteMode::Routed,
            header_buffer_size: 8192,
            max_request_size: 128 * 1024 * 1024,
            max_file_size: 128 * 1024 * 1024,
            read_timeout_ms: 30_000,
            chunk_size: 8192,
            enable_compressor: true,
            compressor: None,
            compressor_delay_ms: 1000,
            log_file: "./server.log".to_string(),
            log_level: "info".to_string(),
            log_config: None,
        }
    }

    /// 从 TOML 文件读取配置。未出现的字段取默认值。
    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(filename).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut raw_config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        raw_config.normalize();
        Ok(raw_config)
    }

    /// 把 0 之类的"自动"取值换成实际值。
    fn normalize(&mut self) {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.chunk_size == 0 {
            self.chunk_size = 8192;
        }
        // 至少要能放下一个请求行和分隔符
        if self.header_buffer_size < 64 {
            self.header_buffer_size = 64;
        }
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }

    pub fn serve_root(&self) -> &Path {
        Path::new(&self.serve_root)
    }

    pub fn save_root(&self) -> &Path {
        Path::new(&self.save_root)
    }

    pub fn route_mode(&self) -> RouteMode {
        self.route_mode
    }

    pub fn header_buffer_size(&self) -> usize {
        self.header_buffer_size
    }

    pub fn max_request_size(&self) -> u64 {
        self.max_request_size
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn enable_compressor(&self) -> bool {
        self.enable_compressor
    }

    pub fn compressor(&self) -> Option<PathBuf> {
        self.compressor.as_ref().map(PathBuf::from)
    }

    pub fn compressor_delay(&self) -> Duration {
        Duration::from_millis(self.compressor_delay_ms)
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn log_config(&self) -> Option<&str> {
        self.log_config.as_deref()
    }
}
