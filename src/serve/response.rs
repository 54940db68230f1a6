//! HTTP response helpers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::mime::{self, types};
use super::reload::maybe_inject_reload_script;

/// Respond with a file from the target directory.
pub fn respond_file(request: Request, path: &Path, ws_port: Option<u16>) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = maybe_inject_reload_script(body, content_type, ws_port);

    send_body(request, 200, content_type, body)
}

/// Respond with `404.html` from the target directory, or a plain message.
pub fn respond_not_found(request: Request, target_dir: &Path, ws_port: Option<u16>) -> Result<()> {
    let custom = target_dir.join("404.html");
    let has_custom = custom.is_file();

    if is_head_request(&request) {
        let content_type = if has_custom { types::HTML } else { types::PLAIN };
        return send_head(request, 404, content_type);
    }

    if has_custom && let Ok(body) = fs::read(&custom) {
        let body = maybe_inject_reload_script(body, types::HTML, ws_port);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    let response = Response::from_data(b"405 Method Not Allowed".to_vec())
        .with_status_code(StatusCode(405))
        .with_header(header("Content-Type", types::PLAIN)?)
        .with_header(header("Allow", "GET, HEAD")?);
    request.respond(response)?;
    Ok(())
}

pub fn is_read_request(request: &Request) -> bool {
    matches!(request.method(), Method::Get | Method::Head)
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response = Response::empty(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header {name}: {value}"))
}
