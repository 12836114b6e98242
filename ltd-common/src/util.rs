//! Small helpers shared by the API and CLI layers.

use std::path::Path;
use std::time::Duration;

/// Mask an API token for logging, keeping a short prefix.
///
/// ```text
/// "eyJhbGciOiJSUzI1NiIs" -> "eyJh***"
/// "abc"                  -> "***"
/// ```
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 8 {
        return "***".to_string();
    }
    format!("{visible}***")
}

/// Replace spaces so names can be used as file names on every agent.
pub fn file_safe(name: &str) -> String {
    name.replace(' ', "_")
}

/// True when the path has an `.osp` or `.oap` extension (any case).
pub fn is_valid_os_package(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("osp") || ext.eq_ignore_ascii_case("oap"))
}

/// Human-friendly rendering of elapsed time, e.g. "1m 20s".
pub fn humanize_duration(duration: Duration) -> String {
    humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

/// Byte count with a binary unit suffix, e.g. "1.5 MB".
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} bytes")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
