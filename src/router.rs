// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由
//!
//! 按方法和路径把一个已经分帧、解析完毕的请求分派到上传或下载。
//! 判定顺序：
//! 1. `OPTIONS` 无论路径如何都返回预检响应；
//! 2. 其他未知方法返回 501；
//! 3. 路径必须等于当前路由模式下的固定值；
//! 4. 下载需要合法的 `name`，上传的请求体不能超过文件大小上限。

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use log::{debug, info, warn};
use serde_json::json;
use tokio::fs;

use crate::{
    cache::{CacheDecision, CacheDescriptor},
    config::RouteMode,
    exception::Exception,
    filename::valid_filename,
    logging::ConnectionContext,
    param::{get_content_type, HttpRequestMethod},
    query::get_query_param,
    request::Request,
    server::AppState,
    storage::{detect_extension, generate_name, is_temp_name, webp_name},
};

/// 路由的处理结果，由连接处理器转换为实际的响应字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Preflight,
    NotModified(CacheDescriptor),
    File {
        path: PathBuf,
        descriptor: CacheDescriptor,
        content_type: &'static str,
        head_only: bool,
    },
    Json(String),
}

impl Reply {
    pub fn status_code(&self) -> u16 {
        match self {
            Reply::Preflight => 204,
            Reply::NotModified(_) => 304,
            Reply::File { .. } | Reply::Json(_) => 200,
        }
    }
}

pub async fn dispatch(
    request: &Request,
    body: Bytes,
    state: &AppState,
    ctx: &ConnectionContext,
) -> Result<Reply, Exception> {
    let mode = state.config().route_mode();
    let method = request.method();

    let accepted = match method {
        HttpRequestMethod::Options => return Ok(Reply::Preflight),
        HttpRequestMethod::Other(m) => {
            debug!("{} | 不支持的方法：{}", ctx, m);
            return Err(Exception::NotImplemented);
        }
        HttpRequestMethod::Get | HttpRequestMethod::Head => mode.retrieve_path(),
        HttpRequestMethod::Post => mode.upload_path(),
    };
    if request.path() != accepted {
        debug!("{} | 路径{}不被接受，期望{}", ctx, request.path(), accepted);
        return Err(Exception::InvalidPath);
    }

    match method {
        HttpRequestMethod::Post => match mode {
            RouteMode::Routed => upload_generated(request, body, state, ctx).await,
            RouteMode::Single => upload_named(request, body, state, ctx).await,
        },
        _ => {
            let head_only = *method == HttpRequestMethod::Head;
            retrieve(request, state, head_only, ctx).await
        }
    }
}

/// 从查询字符串里取出并校验 `name`。
fn resolve_name(request: &Request) -> Result<String, Exception> {
    let name = request
        .query()
        .and_then(|q| get_query_param(q, "name"))
        .ok_or(Exception::MissingParameter)?;
    if !valid_filename(&name) || is_temp_name(&name) {
        return Err(Exception::InvalidFilename);
    }
    Ok(name)
}

async fn retrieve(
    request: &Request,
    state: &AppState,
    head_only: bool,
    ctx: &ConnectionContext,
) -> Result<Reply, Exception> {
    let name = match resolve_name(request) {
        Ok(n) => n,
        Err(e) => {
            warn!("{} | 下载请求的文件名无效：{}", ctx, e);
            return Err(e);
        }
    };
    let path = state.storage().serve_path(&name);

    let metadata = match fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(Exception::FileNotFound),
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("{} | 无法读取{}的元数据：{}", ctx, path.display(), e);
            }
            return Err(Exception::FileNotFound);
        }
    };
    let descriptor = CacheDescriptor::from_metadata(&metadata).map_err(|e| {
        warn!("{} | 无法获取{}的修改时间：{}", ctx, path.display(), e);
        Exception::InternalError
    })?;

    match descriptor.evaluate(request.headers()) {
        CacheDecision::NotModified(by) => {
            debug!("{} | {}未修改（{:?}）", ctx, name, by);
            Ok(Reply::NotModified(descriptor))
        }
        CacheDecision::Full => Ok(Reply::File {
            path,
            descriptor,
            content_type: get_content_type(&name),
            head_only,
        }),
    }
}

fn check_file_size(body: &Bytes, state: &AppState, ctx: &ConnectionContext) -> Result<(), Exception> {
    let limit = state.config().max_file_size();
    if body.len() as u64 > limit {
        warn!("{} | 文件过大：{}字节（上限{}）", ctx, body.len(), limit);
        return Err(Exception::PayloadTooLarge);
    }
    Ok(())
}

/// `POST /upload`：文件名由服务器生成，返回压缩后的文件名。
async fn upload_generated(
    request: &Request,
    body: Bytes,
    state: &AppState,
    ctx: &ConnectionContext,
) -> Result<Reply, Exception> {
    check_file_size(&body, state, ctx)?;

    let extension = detect_extension(request.headers().get("Content-Type"), &body);
    let id = generate_name();
    let name = format!("{}{}", id, extension);
    let saved = state.storage().store(&name, &body).await?;
    info!("{} | 已保存上传文件{}（{}字节）", ctx, name, body.len());

    let compressed = format!("{}.webp", id);
    state
        .compressor()
        .submit(&saved, &state.storage().serve_path(&compressed));

    Ok(Reply::Json(json!({ "name": compressed }).to_string()))
}

/// `POST /?name=`：按调用方给出的文件名保存。
async fn upload_named(
    request: &Request,
    body: Bytes,
    state: &AppState,
    ctx: &ConnectionContext,
) -> Result<Reply, Exception> {
    let name = resolve_name(request)?;
    check_file_size(&body, state, ctx)?;
    let compressed = webp_name(&name).ok_or_else(|| {
        warn!("{} | 文件名{}没有扩展名", ctx, name);
        Exception::InvalidFilename
    })?;

    let saved = state.storage().store(&name, &body).await?;
    info!("{} | 已保存上传文件{}（{}字节）", ctx, name, body.len());

    state
        .compressor()
        .submit(&saved, &state.storage().serve_path(&compressed));

    Ok(Reply::Json(json!({ "status": "success" }).to_string()))
}
