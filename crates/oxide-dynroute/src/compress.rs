//! Response body compression negotiated from `Accept-Encoding`.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::response::Response;

/// Default brotli quality for dynamic responses.
const DEFAULT_BROTLI_QUALITY: u32 = 5;
/// Default gzip level for dynamic responses.
const DEFAULT_GZIP_LEVEL: u32 = 6;
const BROTLI_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

/// A content coding the router can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Brotli,
    Gzip,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
        }
    }
}

/// Lists the codings to try for an `Accept-Encoding` value, preferred first.
pub fn negotiate(accept_encoding: &str) -> Vec<Encoding> {
    let mut accepted = Vec::with_capacity(2);
    if accept_encoding.contains("br") {
        accepted.push(Encoding::Brotli);
    }
    if accept_encoding.contains("gzip") {
        accepted.push(Encoding::Gzip);
    }
    accepted
}

pub fn gzip(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn brotli(data: &[u8], quality: u32) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut writer =
            brotli::CompressorWriter::new(&mut out, BROTLI_BUFFER, quality.min(11), BROTLI_WINDOW);
        writer.write_all(data)?;
        writer.flush()?;
    }
    Ok(out)
}

/// Compression strength. `None` uses the per-codec defaults; levels are
/// clamped to what each codec supports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Level(pub Option<u32>);

/// Compresses `data` with the first accepted coding that succeeds.
///
/// Returns `None` when the client accepts nothing we produce or every codec
/// failed; the caller then sends the body as is.
pub fn compress(accept_encoding: &str, data: &[u8], level: Level) -> Option<(Encoding, Vec<u8>)> {
    for encoding in negotiate(accept_encoding) {
        let result = match encoding {
            Encoding::Brotli => brotli(data, level.0.unwrap_or(DEFAULT_BROTLI_QUALITY)),
            Encoding::Gzip => gzip(data, level.0.unwrap_or(DEFAULT_GZIP_LEVEL)),
        };
        match result {
            Ok(compressed) => return Some((encoding, compressed)),
            Err(err) => {
                debug!(encoding = encoding.as_str(), error = %err, "Compression failed");
            }
        }
    }
    None
}

/// Compresses a response body in place if the request accepts it.
///
/// Empty bodies and responses that already carry a `Content-Encoding` are
/// left alone.
pub fn compress_response(
    response: &mut Response,
    accept_encoding: Option<&str>,
    level: Level,
    min_size: usize,
) {
    let Some(accept) = accept_encoding else {
        return;
    };
    if response.body.is_empty()
        || response.body.len() < min_size
        || response.get_header("Content-Encoding").is_some()
    {
        return;
    }
    if let Some((encoding, compressed)) = compress(accept, &response.body, level) {
        response.body = compressed;
        response.set_header("Content-Encoding", encoding.as_str());
        response.set_header("Vary", "Accept-Encoding");
    }
}
