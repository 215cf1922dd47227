//! HTML status page: live stream plus the access log.

use super::response::Response;
use crate::core::event_log;
use std::path::PathBuf;

const STYLE: &str = "body{font-family:sans-serif; background:#222; color:#fff; text-align:center;} \
img{border: 2px solid #0f0; max-width:100%;} \
pre{background:#333; padding:10px; text-align:left; max-height:300px; overflow:auto;}";

/// Renders the page around `log_text`. The text is inserted as-is.
pub fn render_page(log_text: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset='utf-8'><title>RPi Cam</title>\
<style>{style}</style></head><body>\
<h1>🔴 Live Secure Feed</h1>\
<img src='/video_feed' alt='Live Stream' />\
<h3>Access Logs</h3><pre>{logs}</pre>\
<a href='/' style='color:#0f0'>Refresh</a>\
</body></html>",
        style = STYLE,
        logs = log_text
    )
}

#[derive(Debug, Clone)]
pub struct PageHandler {
    log_path: PathBuf,
}

impl PageHandler {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    pub fn respond(&self) -> Response {
        let logs = event_log::read_text(&self.log_path);
        Response::html(render_page(&logs))
    }
}
