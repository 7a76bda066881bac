//! Static file serving for the API documentation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use http::StatusCode;

use super::router::Handler;
use crate::core::{Context, Error, Request, Response, Result};

/// Route parameter holding the path below the mount point.
pub const PATH_PARAM: &str = "path";

const INDEX_FILE: &str = "index.html";

/// Serves files below `root` for a `{*path}` route.
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Handler for StaticFiles {
    async fn call(&self, req: Request, ctx: &mut Context) -> Result<Response> {
        let raw = ctx.param(PATH_PARAM).unwrap_or("");
        let relative =
            resolve_relative(raw).ok_or_else(|| Error::NotFound(req.path().to_string()))?;

        let mut file_path = self.root.join(relative);
        if tokio::fs::metadata(&file_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            file_path.push(INDEX_FILE);
        }

        let contents = match tokio::fs::read(&file_path).await {
            Ok(contents) => contents,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Err(Error::NotFound(req.path().to_string()));
            }
            Err(e) => {
                tracing::error!("Failed to read file {:?}: {}", file_path, e);
                return Err(Error::Io(e));
            }
        };

        let mime = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();

        Ok(Response::builder()
            .status(StatusCode::OK)
            .content_type(&mime)
            .body(contents)
            .build())
    }
}

/// Decode a request path and reduce it to safe relative components.
///
/// Returns `None` for paths that try to leave the root.
fn resolve_relative(raw: &str) -> Option<PathBuf> {
    let decoded = percent_encoding::percent_decode_str(raw).decode_utf8_lossy();

    let mut relative = PathBuf::new();
    for part in decoded.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            _ if part.contains('\\') || part.contains('\0') => return None,
            _ => relative.push(part),
        }
    }
    Some(relative)
}
