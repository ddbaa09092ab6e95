//! Telegram message bodies (HTML parse mode).

use std::time::Duration;

use jiff::Zoned;

use crate::models::SourceKind;
use crate::sources::Artifact;

/// Human-readable size with one decimal: `512.0 B`, `1.5 KB`, `3.2 GB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Short caption attached to the uploaded document.
pub fn document_caption(artifact: &Artifact) -> String {
    format!(
        "<b>{}</b>\nSHA-256: <code>{}</code>",
        escape_html(&artifact.file_name),
        artifact.checksum
    )
}

pub fn success_message(
    source_name: &str,
    kind: SourceKind,
    artifact: &Artifact,
    duration: Duration,
    completed_at: &Zoned,
) -> String {
    format!(
        "✅ <b>Backup Completed Successfully</b>\n\n\
         📋 <b>Source:</b> {}\n\
         📁 <b>File:</b> {}\n\
         📊 <b>Size:</b> {}\n\
         🔧 <b>Type:</b> {}\n\
         ⏱️ <b>Duration:</b> {:.1}s\n\
         🕐 <b>Completed:</b> {}",
        escape_html(source_name),
        escape_html(&artifact.file_name),
        format_file_size(artifact.size),
        kind,
        duration.as_secs_f64(),
        completed_at.strftime("%Y-%m-%d %H:%M:%S %Z"),
    )
}

pub fn failure_message(source_name: &str, kind: SourceKind, error: &str, failed_at: &Zoned) -> String {
    format!(
        "❌ <b>Backup Failed</b>\n\n\
         📋 <b>Source:</b> {}\n\
         🔧 <b>Type:</b> {}\n\
         ⚠️ <b>Error:</b> {}\n\
         🕐 <b>Failed at:</b> {}",
        escape_html(source_name),
        kind,
        escape_html(error),
        failed_at.strftime("%Y-%m-%d %H:%M:%S %Z"),
    )
}
