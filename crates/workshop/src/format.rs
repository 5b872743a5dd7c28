//! Display formatting for sizes, timestamps and file names

use chrono::{Local, TimeZone};

use crate::model::WorkshopItem;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Characters that cannot appear in common file system names
const ILLEGAL_FILE_NAME_CHARS: &[char] =
    &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\r', '\n'];

/// Format a byte count with 1024-based units
///
/// Returns `None` for zero, which upstream uses when the size is unknown.
pub fn size_format(bytes: u64) -> Option<String> {
    if bytes == 0 {
        return None;
    }

    let formatted = if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    };
    Some(formatted)
}

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM:SS` in the local time zone
pub fn timestamp_to_date(epoch_millis: i64) -> String {
    match Local.timestamp_millis_opt(epoch_millis).earliest() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// File name used when delivering `item`
///
/// An explicit override is used verbatim. Otherwise the title is cleaned of
/// illegal characters and the upstream file extension is appended.
pub fn format_file_name(item: &WorkshopItem, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_string();
    }

    let name: String = item
        .title
        .chars()
        .map(|c| if ILLEGAL_FILE_NAME_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    format!("{}{}", name.trim(), extension(&item.filename))
}

/// Extension of `filename` including the dot, empty when there is none
fn extension(filename: &str) -> &str {
    filename.rfind('.').map_or("", |index| &filename[index..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::item;

    #[test]
    fn test_size_format_units() {
        assert_eq!(size_format(500).as_deref(), Some("500 B"));
        assert_eq!(size_format(1023).as_deref(), Some("1023 B"));
        assert_eq!(size_format(1024).as_deref(), Some("1.00 KB"));
        assert_eq!(size_format(2048).as_deref(), Some("2.00 KB"));
        assert_eq!(size_format(1536).as_deref(), Some("1.50 KB"));
        assert_eq!(size_format(MB - 1).as_deref(), Some("1024.00 KB"));
        assert_eq!(size_format(MB).as_deref(), Some("1.00 MB"));
        assert_eq!(size_format(5 * MB + MB / 4).as_deref(), Some("5.25 MB"));
        assert_eq!(size_format(GB).as_deref(), Some("1.00 GB"));
        assert_eq!(size_format(3 * GB).as_deref(), Some("3.00 GB"));
    }

    #[test]
    fn test_size_format_zero() {
        assert_eq!(size_format(0), None);
    }

    #[test]
    fn test_timestamp_to_date_zero_pads() {
        let local = Local.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).earliest().unwrap();
        assert_eq!(timestamp_to_date(local.timestamp_millis()), "2024-03-05 08:00:00");

        let local = Local.with_ymd_and_hms(2023, 11, 28, 23, 59, 9).earliest().unwrap();
        assert_eq!(timestamp_to_date(local.timestamp_millis()), "2023-11-28 23:59:09");
    }

    #[test]
    fn test_timestamp_to_date_is_deterministic() {
        assert_eq!(timestamp_to_date(1_700_000_000_000), timestamp_to_date(1_700_000_000_000));
    }

    #[test]
    fn test_format_file_name_strips_illegal_chars() {
        let mut workshop_item = item(1, "My/Cool:Mod");
        workshop_item.filename = "foo.zip".to_string();
        assert_eq!(format_file_name(&workshop_item, None), "My Cool Mod.zip");

        workshop_item.title = " a\\b*c?d\"e<f>g|h\r\ni ".to_string();
        assert_eq!(format_file_name(&workshop_item, None), "a b c d e f g h  i.zip");
    }

    #[test]
    fn test_format_file_name_keeps_last_extension() {
        let mut workshop_item = item(1, "Archive");
        workshop_item.filename = "pack.tar.gz".to_string();
        assert_eq!(format_file_name(&workshop_item, None), "Archive.gz");

        workshop_item.filename = "noext".to_string();
        assert_eq!(format_file_name(&workshop_item, None), "Archive");
    }

    #[test]
    fn test_format_file_name_override() {
        let workshop_item = item(1, "Ignored");
        assert_eq!(format_file_name(&workshop_item, Some("custom name.bin")), "custom name.bin");
    }
}
