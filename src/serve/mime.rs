//! Content-Type guessing for served files.

use std::path::Path;

pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const RSS: &str = "application/rss+xml";
    pub const ATOM: &str = "application/atom+xml";
    pub const PDF: &str = "application/pdf";
    pub const WASM: &str = "application/wasm";
    pub const OCTET_STREAM: &str = "application/octet-stream";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";
    pub const MP3: &str = "audio/mpeg";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
}

pub fn from_path(path: &Path) -> &'static str {
    use types::*;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html" | "htm") => HTML,
        Some("txt" | "md") => PLAIN,
        Some("css") => CSS,
        Some("js" | "mjs") => JAVASCRIPT,
        Some("json" | "map") => JSON,
        Some("xml") => XML,
        Some("rss") => RSS,
        Some("atom") => ATOM,
        Some("pdf") => PDF,
        Some("wasm") => WASM,
        Some("png") => PNG,
        Some("jpg" | "jpeg") => JPEG,
        Some("gif") => GIF,
        Some("webp") => WEBP,
        Some("avif") => AVIF,
        Some("svg") => SVG,
        Some("ico") => ICO,
        Some("mp4") => MP4,
        Some("webm") => WEBM,
        Some("mp3") => MP3,
        Some("woff") => WOFF,
        Some("woff2") => WOFF2,
        Some("ttf") => TTF,
        _ => OCTET_STREAM,
    }
}
