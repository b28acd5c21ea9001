// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # filedrop
//!
//! 一个极简的文件中转端点：
//! - `POST` 上传文件，先写临时文件再原子发布；
//! - `GET` / `HEAD` 取回文件，支持 ETag / Last-Modified 条件请求；
//! - 所有响应都带 CORS 头，每个连接只处理一个请求。
//!
//! 用法：`filedrop [配置文件路径]`，默认读取 `config/development.toml`。

use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::{net::TcpListener, runtime::Builder};

use filedrop::{
    config::{Config, ConfigError, RouteMode, DEFAULT_CONFIG_PATH},
    logging::Logging,
    param::SERVER_NAME,
    server::{bind_address, serve, AppState},
    storage::ensure_directory,
    util::format_file_size,
};

fn main() -> ExitCode {
    // 1. 读取配置：命令行第一个参数优先，失败时使用默认值
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let (config, config_error) = match Config::from_toml(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };

    // 2. 初始化日志
    let logging = match Logging::init(&config) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("无法初始化日志系统：{}", e);
            return ExitCode::FAILURE;
        }
    };
    match config_error {
        None => info!("配置文件已载入：{}", config_path),
        Some(ConfigError::Io(e)) => warn!("{}：{}，使用默认配置", config_path, e),
        Some(e) => error!("{}，使用默认配置", e),
    }
    if logging.is_builtin() {
        info!("日志文件：{}，级别：{}", config.log_file(), logging.level());
    }

    // 3. 准备目录
    for dir in [config.serve_root(), config.save_root()] {
        if let Err(e) = ensure_directory(dir) {
            error!("无法创建目录{}：{}", dir.display(), e);
            logging.shutdown();
            return ExitCode::FAILURE;
        }
    }

    // 4. 构建运行时
    let worker_threads = config.worker_threads();
    let runtime = match Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建tokio运行时：{}", e);
            logging.shutdown();
            return ExitCode::FAILURE;
        }
    };
    info!("工作线程数：{}", worker_threads);

    let code = runtime.block_on(run(config));
    runtime.shutdown_timeout(Duration::from_secs(1));
    logging.shutdown();
    code
}

async fn run(config: Config) -> ExitCode {
    let address = bind_address(&config);
    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定{}：{}", address, e);
            return ExitCode::FAILURE;
        }
    };
    info!("已在{}上监听", address);

    let state = Arc::new(AppState::new(config));
    match state.compressor().program() {
        Some(program) if !program.is_file() => {
            warn!("压缩程序{}不存在，上传后将跳过压缩", program.display())
        }
        Some(program) => info!("压缩程序：{}", program.display()),
        None => info!("压缩已关闭"),
    }
    print_banner(state.config(), address);

    serve(listener, state, shutdown_signal()).await;
    info!("服务器已停止");
    ExitCode::SUCCESS
}

fn print_banner(config: &Config, address: SocketAddr) {
    println!("== {} ==", SERVER_NAME);
    println!("监听地址:   http://{}", address);
    match config.route_mode() {
        RouteMode::Routed => {
            println!("上传:       POST {}", RouteMode::Routed.upload_path());
            println!(
                "下载:       GET|HEAD {}?name=<文件名>",
                RouteMode::Routed.retrieve_path()
            );
        }
        RouteMode::Single => {
            println!("上传:       POST /?name=<文件名>");
            println!("下载:       GET|HEAD /?name=<文件名>");
        }
    }
    println!("serve目录:  {}", config.serve_root().display());
    println!("save目录:   {}", config.save_root().display());
    println!("文件上限:   {}", format_file_size(config.max_file_size()));
    println!("CORS:       已启用（Access-Control-Allow-Origin: *）");
    println!("按 Ctrl+C 停止");
    println!("====================");
}

/// SIGINT 或 SIGTERM 任一到达即完成。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("无法监听Ctrl+C：{}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("无法监听SIGTERM：{}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到SIGINT"),
        _ = terminate => info!("收到SIGTERM"),
    }
}
