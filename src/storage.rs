// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 存储写入
//!
//! 上传内容先完整写入 `<path>.tmp`，再用一次 rename 发布到 `<path>`。
//! rename 是读者唯一能观察到的边界：要么看不到文件，要么看到完整文件。
//! 任何失败都会删除临时文件。

use std::collections::HashMap;
use std::fs as std_fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::{debug, error, warn};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex as AsyncMutex};
use uuid::Uuid;

use crate::{exception::Exception, param::UPLOAD_EXTENSIONS};

const TEMP_SUFFIX: &str = ".tmp";

/// 以临时文件后缀结尾的名字会与另一次写入的临时文件重名，不能用作上传或下载的文件名。
pub fn is_temp_name(name: &str) -> bool {
    name.ends_with(TEMP_SUFFIX)
}

/// 目录不存在时以 0755 创建。路径已存在但不是目录时返回错误。
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    match std_fs::metadata(path) {
        Ok(m) if m.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} 已存在但不是目录", path.display()),
            ))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut builder = std_fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)
}

pub struct StorageWriter {
    save_root: PathBuf,
    serve_root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl StorageWriter {
    pub fn new(save_root: impl Into<PathBuf>, serve_root: impl Into<PathBuf>) -> Self {
        Self {
            save_root: save_root.into(),
            serve_root: serve_root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 调用方必须先用 `valid_filename` 校验 `name`。
    pub fn save_path(&self, name: &str) -> PathBuf {
        self.save_root.join(name)
    }

    pub fn serve_path(&self, name: &str) -> PathBuf {
        self.serve_root.join(name)
    }

    /// 把 `body` 发布到 save 目录下的 `name`，返回最终路径。
    ///
    /// 同一目标路径上的并发写入按到达顺序串行执行。
    pub async fn store(&self, name: &str, body: &Bytes) -> Result<PathBuf, Exception> {
        if is_temp_name(name) {
            warn!("拒绝保存临时文件名{}", name);
            return Err(Exception::InvalidFilename);
        }
        let path = self.save_path(name);
        let slot = self.acquire_slot(&path);
        let result = {
            let _guard = slot.lock().await;
            publish(&path, body).await
        };
        self.release_slot(&path, slot);
        result.map(|_| path)
    }

    fn acquire_slot(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    fn release_slot(&self, path: &Path, slot: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // 表中一份加上手里一份，说明没有其他等待者
        if Arc::strong_count(&slot) == 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn pending_slots(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// 未发布前离开作用域就删除临时文件。
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std_fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("无法删除临时文件{}: {}", self.path.display(), e);
                }
            }
        }
    }
}

async fn publish(path: &Path, body: &[u8]) -> Result<(), Exception> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(TEMP_SUFFIX);
    let mut temp = TempFile::new(PathBuf::from(temp_name));

    let mut file = fs::File::create(&temp.path).await.map_err(|e| {
        error!("无法创建临时文件{}: {}", temp.path.display(), e);
        Exception::InternalError
    })?;

    let written = async {
        file.write_all(body).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    drop(file);
    if let Err(e) = written {
        error!("写入临时文件{}失败: {}", temp.path.display(), e);
        return Err(Exception::WriteFailed);
    }

    if let Err(e) = fs::rename(&temp.path, path).await {
        error!(
            "无法将{}重命名为{}: {}",
            temp.path.display(),
            path.display(),
            e
        );
        return Err(Exception::SaveFailed);
    }
    temp.disarm();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, std_fs::Permissions::from_mode(0o600)).await {
            warn!("无法修改{}的权限: {}", path.display(), e);
        }
    }

    debug!("已保存{}（{}字节）", path.display(), body.len());
    Ok(())
}

/// 新的上传标识：32 位十六进制，不含连字符。
pub fn generate_name() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 上传文件的扩展名（带点）。
///
/// 先看 `Content-Type`（忽略 `;` 之后的参数），再按文件头魔数识别，
/// 都认不出来时为 `.bin`。
pub fn detect_extension(content_type: Option<&str>, body: &[u8]) -> String {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if let Some(ext) = UPLOAD_EXTENSIONS.get(essence.as_str()) {
            return ext.to_string();
        }
    }

    if let Some(kind) = infer::get(body) {
        if UPLOAD_EXTENSIONS.contains_key(kind.mime_type()) {
            return format!(".{}", kind.extension());
        }
    }

    ".bin".to_string()
}

/// `photo.jpg` -> `photo.webp`。没有扩展名时返回 `None`。
pub fn webp_name(name: &str) -> Option<String> {
    match name.rfind('.') {
        Some(dot) if dot > 0 => Some(format!("{}.webp", &name[..dot])),
        _ => None,
    }
}
