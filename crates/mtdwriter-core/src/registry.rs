//! Device registry lookup
//!
//! The Linux kernel lists MTD partitions in `/proc/mtd`:
//!
//! ```text
//! dev:    size   erasesize  name
//! mtd0: 00030000 00010000 "u-boot"
//! mtd1: 00010000 00010000 "u-boot-env"
//! mtd2: 007b0000 00010000 "firmware"
//! ```
//!
//! A device is selected by label: the first `mtdN:` line containing the
//! label as a substring wins. The match runs over the whole line, so a
//! label like `mtd2` or a size field also selects a device.

use std::convert::Infallible;
use std::io::{self, BufRead};

/// One device listed in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdEntry {
    /// Device index (N in `mtdN`)
    pub index: u32,
    /// Partition size in bytes, if listed
    pub size: Option<u64>,
    /// Erase block size in bytes, if listed
    pub erase_size: Option<u64>,
    /// Partition name without quotes
    pub name: String,
    /// Raw registry line the entry was parsed from
    pub line: String,
}

impl MtdEntry {
    /// Build an entry the way the kernel would list it
    pub fn new(index: u32, size: u64, erase_size: u64, name: &str) -> Self {
        Self {
            index,
            size: Some(size),
            erase_size: Some(erase_size),
            name: name.to_string(),
            line: format!("mtd{}: {:08x} {:08x} \"{}\"", index, size, erase_size, name),
        }
    }

    /// Whether the registry line contains `label`
    pub fn matches(&self, label: &str) -> bool {
        self.line.contains(label)
    }
}

/// Parse one registry line
///
/// Only the `mtd<N>:` prefix is required. Header and unrelated lines
/// yield `None`.
pub fn parse_line(line: &str) -> Option<MtdEntry> {
    let line = line.trim_end_matches(['\n', '\r']);
    let rest = line.strip_prefix("mtd")?;
    let colon = rest.find(':')?;
    let index = rest[..colon].parse::<u32>().ok()?;

    let mut fields = rest[colon + 1..].split_whitespace();
    let size = fields.next().and_then(parse_hex);
    let erase_size = fields.next().and_then(parse_hex);

    let name = match (line.find('"'), line.rfind('"')) {
        (Some(open), Some(close)) if close > open => line[open + 1..close].to_string(),
        _ => String::new(),
    };

    Some(MtdEntry {
        index,
        size,
        erase_size,
        name,
        line: line.to_string(),
    })
}

fn parse_hex(field: &str) -> Option<u64> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u64::from_str_radix(digits, 16).ok()
}

/// Scan a registry listing for the first device whose line contains `label`
pub fn find_by_label<R: BufRead>(reader: R, label: &str) -> io::Result<Option<MtdEntry>> {
    for line in reader.lines() {
        let line = line?;
        if let Some(entry) = parse_line(&line) {
            if entry.matches(label) {
                log::debug!("Label '{}' matched registry line '{}'", label, entry.line);
                return Ok(Some(entry));
            }
        }
    }
    Ok(None)
}

/// Resolves a device label to a registry entry
pub trait DeviceRegistry {
    /// Error returned when the registry itself cannot be read
    type Error: std::error::Error + 'static;

    /// Find the first device matching `label`, re-reading the registry
    fn lookup(&self, label: &str) -> Result<Option<MtdEntry>, Self::Error>;
}

/// A registry held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    entries: Vec<MtdEntry>,
}

impl StaticRegistry {
    /// Create a registry from a list of entries
    pub fn new(entries: Vec<MtdEntry>) -> Self {
        Self { entries }
    }

    /// Parse a registry from `/proc/mtd` formatted text
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().filter_map(parse_line).collect())
    }

    /// Listed entries
    pub fn entries(&self) -> &[MtdEntry] {
        &self.entries
    }
}

impl DeviceRegistry for StaticRegistry {
    type Error = Infallible;

    fn lookup(&self, label: &str) -> Result<Option<MtdEntry>, Self::Error> {
        Ok(self.entries.iter().find(|e| e.matches(label)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_MTD: &str = "dev:    size   erasesize  name\n\
mtd0: 00030000 00010000 \"u-boot\"\n\
mtd1: 00010000 00010000 \"u-boot-env\"\n\
mtd2: 00010000 00010000 \"factory\"\n\
mtd3: 007b0000 00010000 \"firmware\"\n\
mtd4: 00800000 00010000 \"ALL\"\n";

    #[test]
    fn test_parse_line() {
        let entry = parse_line("mtd3: 007b0000 00010000 \"firmware\"").unwrap();
        assert_eq!(entry.index, 3);
        assert_eq!(entry.size, Some(0x7b0000));
        assert_eq!(entry.erase_size, Some(0x10000));
        assert_eq!(entry.name, "firmware");
    }

    #[test]
    fn test_parse_line_rejects_header() {
        assert!(parse_line("dev:    size   erasesize  name").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("mtdX: 0 0 \"bad\"").is_none());
    }

    #[test]
    fn test_parse_line_prefix_only() {
        let entry = parse_line("mtd12:").unwrap();
        assert_eq!(entry.index, 12);
        assert_eq!(entry.size, None);
        assert_eq!(entry.name, "");
    }

    #[test]
    fn test_find_by_label_first_substring_match() {
        // "u-boot" is a substring of both mtd0 and mtd1; the first wins
        let entry = find_by_label(PROC_MTD.as_bytes(), "u-boot").unwrap().unwrap();
        assert_eq!(entry.index, 0);

        let entry = find_by_label(PROC_MTD.as_bytes(), "boot-env").unwrap().unwrap();
        assert_eq!(entry.index, 1);

        let entry = find_by_label(PROC_MTD.as_bytes(), "ALL").unwrap().unwrap();
        assert_eq!(entry.index, 4);
    }

    #[test]
    fn test_find_by_label_not_found() {
        assert!(find_by_label(PROC_MTD.as_bytes(), "kernel")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_header_words_do_not_match() {
        // "erasesize" only appears in the header line
        assert!(find_by_label(PROC_MTD.as_bytes(), "erasesize")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_static_registry() {
        let registry = StaticRegistry::parse(PROC_MTD);
        assert_eq!(registry.entries().len(), 5);
        let entry = registry.lookup("factory").unwrap().unwrap();
        assert_eq!(entry.index, 2);
        assert!(registry.lookup("missing").unwrap().is_none());
    }

    #[test]
    fn test_entry_new_formats_like_kernel() {
        let entry = MtdEntry::new(4, 0x800000, 0x10000, "ALL");
        assert_eq!(entry.line, "mtd4: 00800000 00010000 \"ALL\"");
        assert_eq!(parse_line(&entry.line), Some(entry));
    }
}
