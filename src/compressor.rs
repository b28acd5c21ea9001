//! 上传后的后台压缩。
//!
//! 外部程序以 `<program> <input> <output>` 的形式调用，工作目录为程序所在目录。
//! 提交即返回，不等待结果，结果只写日志。

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::process::Command;

use crate::config::Config;

pub const DEFAULT_PROGRAM: &str = "compressor.sh";

#[derive(Debug, Clone)]
pub struct Compressor {
    program: Option<PathBuf>,
    delay: Duration,
}

impl Compressor {
    pub fn new(program: Option<PathBuf>, delay: Duration) -> Self {
        Self { program, delay }
    }

    pub fn from_config(config: &Config) -> Self {
        let program = if !config.enable_compressor() {
            None
        } else {
            match config.compressor() {
                Some(p) => Some(p),
                None => beside_executable(DEFAULT_PROGRAM),
            }
        };
        Self::new(program, config.compressor_delay())
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    /// 提交一次压缩任务。返回 `false` 表示程序不可用，任务没有提交。
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn submit(&self, input: &Path, output: &Path) -> bool {
        let program = match &self.program {
            Some(p) => p.clone(),
            None => {
                debug!("未配置压缩程序，跳过{}", input.display());
                return false;
            }
        };
        if !program.is_file() {
            error!("找不到压缩程序: {}", program.display());
            return false;
        }

        // 子进程的工作目录不同，相对路径要先转成绝对路径
        let input = absolute(input);
        let output = absolute(output);
        let workdir = program
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        let delay = self.delay;

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut command = Command::new(&program);
            command
                .arg(&input)
                .arg(&output)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            if let Some(dir) = &workdir {
                command.current_dir(dir);
            }
            match command.status().await {
                Ok(status) if status.success() => {
                    info!("压缩完成: {} -> {}", input.display(), output.display())
                }
                Ok(status) => warn!("压缩程序退出异常({}): {}", status, input.display()),
                Err(e) => error!("无法启动压缩程序{}: {}", program.display(), e),
            }
        });
        true
    }
}

fn beside_executable(name: &str) -> Option<PathBuf> {
    match env::current_exe() {
        Ok(exe) => exe.parent().map(|dir| dir.join(name)),
        Err(e) => {
            error!("无法获取可执行文件路径: {}", e);
            None
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
