//! Static file routes.
//!
//! A static route maps a URL prefix onto a directory. Resolution strips the
//! prefix, cleans `.`/`..` segments and refuses anything that ends up outside
//! the directory, whether or not the target exists.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::compress::{compress_response, Level};
use crate::config::StaticConfig;
use crate::error::{Result, RouterError};
use crate::request::Request;
use crate::response::Response;

/// A URL prefix served from a directory.
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pub prefix: String,
    pub directory: PathBuf,
    pub config: StaticConfig,
}

impl StaticRoute {
    pub fn new(
        prefix: impl Into<String>,
        directory: impl Into<PathBuf>,
        config: StaticConfig,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            directory: directory.into(),
            config,
        }
    }

    /// Returns the part of `path` below this route's prefix, if it applies.
    ///
    /// The prefix must end on a segment boundary: `/static` covers
    /// `/static/app.js` but not `/staticfiles`.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        let prefix = self.prefix.trim_end_matches('/');
        let rest = path.strip_prefix(prefix)?;
        (rest.is_empty() || rest.starts_with('/') || prefix.is_empty()).then_some(rest)
    }

    /// Maps a path below the prefix to a file path inside the directory.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let mut clean = PathBuf::new();
        for part in relative.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    if !clean.pop() {
                        return Err(RouterError::Forbidden(relative.to_string()));
                    }
                }
                part => {
                    // Reject anything the OS would read as more than a name.
                    let mut components = Path::new(part).components();
                    match (components.next(), components.next()) {
                        (Some(Component::Normal(name)), None) => clean.push(name),
                        _ => return Err(RouterError::Forbidden(relative.to_string())),
                    }
                }
            }
        }
        let target = self.directory.join(&clean);
        if !target.starts_with(&self.directory) {
            return Err(RouterError::Forbidden(relative.to_string()));
        }
        Ok(target)
    }
}

#[derive(Clone)]
struct CachedFile {
    data: Arc<Vec<u8>>,
    stored_at: Instant,
}

/// Time-bounded cache of file contents keyed by resolved path.
///
/// Entries go stale after the TTL; filesystem changes are not observed.
pub struct StaticCache {
    entries: RwLock<HashMap<PathBuf, CachedFile>>,
    ttl: Duration,
}

impl StaticCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Vec<u8>>> {
        let entries = self.entries.read();
        let entry = entries.get(path)?;
        (entry.stored_at.elapsed() < self.ttl).then(|| Arc::clone(&entry.data))
    }

    pub fn insert(&self, path: PathBuf, data: Arc<Vec<u8>>) {
        self.entries.write().insert(
            path,
            CachedFile {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops one entry; returns whether it was cached.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.write().remove(path).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Serves `request` from `route`.
///
/// Returns `None` when the target does not exist so the caller can fall
/// through to the not-found handling.
pub async fn serve(
    route: &StaticRoute,
    cache: &StaticCache,
    request: &Request,
) -> Option<Response> {
    let relative = route.strip(&request.path)?;
    let mut target = match route.resolve(relative) {
        Ok(target) => target,
        Err(err) => {
            warn!(path = %request.path, error = %err, "Rejected static path traversal");
            return Some(Response::forbidden());
        }
    };

    let metadata = tokio::fs::metadata(&target).await.ok()?;
    let escaped = escapes_root(&route.directory, &target).await;
    if escaped.unwrap_or(false) {
        warn!(path = %request.path, "Rejected static path escaping through a link");
        return Some(Response::forbidden());
    }

    if metadata.is_dir() {
        if route.config.directory_listing {
            return Some(match directory_listing(&target, &request.path).await {
                Ok(html) => Response::html(html),
                Err(err) => {
                    error!(file = %target.display(), error = %err, "Failed to read directory");
                    Response::plain(500, "Error reading directory")
                }
            });
        }
        target.push(&route.config.index);
        let index = tokio::fs::metadata(&target).await;
        if !index.is_ok_and(|m| m.is_file()) {
            return None;
        }
    }

    let data = match cache.get(&target) {
        Some(data) => {
            debug!(file = %target.display(), "Static cache hit");
            data
        }
        None => match tokio::fs::read(&target).await {
            Ok(bytes) => {
                let data = Arc::new(bytes);
                cache.insert(target.clone(), Arc::clone(&data));
                data
            }
            Err(err) => {
                error!(file = %target.display(), error = %err, "Error reading file");
                return Some(Response::plain(500, "Error reading file"));
            }
        },
    };

    let mut response = Response::ok().header("Content-Type", content_type(&target));
    if let Some(cache_control) = &route.config.cache_control {
        response.set_header("Cache-Control", cache_control.as_str());
    }

    if route.config.byte_range {
        response.set_header("Accept-Ranges", "bytes");
        if let Some(range) = request.get_header("Range") {
            return Some(match parse_range(range, data.len()) {
                Ok((start, end)) => {
                    response.set_header(
                        "Content-Range",
                        format!("bytes {start}-{end}/{}", data.len()),
                    );
                    response.status(206).body(data[start..=end].to_vec())
                }
                Err(_) => Response::new(416)
                    .header("Content-Range", format!("bytes */{}", data.len())),
            });
        }
    }

    response.body = data.to_vec();
    if route.config.compress {
        compress_response(
            &mut response,
            request.get_header("Accept-Encoding"),
            Level(route.config.compression_level),
            0,
        );
    }
    Some(response)
}

/// Checks, through canonical paths, that an existing target stays under root.
async fn escapes_root(root: &Path, target: &Path) -> std::io::Result<bool> {
    let root = tokio::fs::canonicalize(root).await?;
    let target = tokio::fs::canonicalize(target).await?;
    Ok(!target.starts_with(root))
}

/// Parses a single `bytes=` range into inclusive offsets.
pub fn parse_range(header: &str, len: usize) -> Result<(usize, usize)> {
    let range = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RouterError::InvalidRange)?;
    if range.contains(',') || len == 0 {
        return Err(RouterError::InvalidRange);
    }
    let (start, end) = range.split_once('-').ok_or(RouterError::InvalidRange)?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| RouterError::InvalidRange)
    };
    let (start, end) = match (start.trim().is_empty(), end.trim().is_empty()) {
        (true, false) => {
            let suffix = parse(end)?;
            if suffix == 0 {
                return Err(RouterError::InvalidRange);
            }
            (len.saturating_sub(suffix), len - 1)
        }
        (false, true) => (parse(start)?, len - 1),
        (false, false) => (parse(start)?, parse(end)?.min(len - 1)),
        (true, true) => return Err(RouterError::InvalidRange),
    };
    if start > end || start >= len {
        return Err(RouterError::InvalidRange);
    }
    Ok((start, end))
}

async fn directory_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let base = request_path.trim_end_matches('/');
    let title = escape_html(request_path);
    let mut html = format!(
        "<html><head><meta charset=\"UTF-8\"><title>Directory listing</title></head><body>\
         <h1>Directory listing for {title}</h1><ul>"
    );
    for name in names {
        let name = escape_html(&name);
        let _ = write!(html, "<li><a href=\"{base}/{name}\">{name}</a></li>");
    }
    html.push_str("</ul></body></html>");
    Ok(html)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Guesses a `Content-Type` from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
