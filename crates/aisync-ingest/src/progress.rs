//! Progress indicators for downloads

use indicatif::{ProgressBar, ProgressStyle};

const DOWNLOAD_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})";

const UNKNOWN_SIZE_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} ({bytes_per_sec})";

/// Progress bar for one download; `total` is `None` when the server sends no length
///
/// Returns a hidden bar when `visible` is false so callers never branch.
pub fn download_progress(total: Option<u64>, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let (pb, template) = match total {
        Some(size) => (ProgressBar::new(size), DOWNLOAD_TEMPLATE),
        None => (ProgressBar::new_spinner(), UNKNOWN_SIZE_TEMPLATE),
    };

    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_download_progress_length() {
        let pb = download_progress(Some(1024), "AIS_2020_01_01.zip", true);
        assert_eq!(pb.length(), Some(1024));
        pb.finish_and_clear();
    }

    #[test]
    fn test_hidden_progress() {
        let pb = download_progress(Some(10), "AIS_2020_01_01.zip", false);
        assert!(pb.is_hidden());
    }
}
