//! CLI argument parsing

use clap::Parser;
use mtdwriter_linux_mtd::PROC_MTD;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u64
fn parse_hex_u64(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u64>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a chunk size as a hex or decimal usize
fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let value = parse_hex_u64(s)?;
    usize::try_from(value).map_err(|_| format!("Chunk size too large: {}", value))
}

/// Parse the reboot flag: only the integer 1 requests a reboot
///
/// Like `atoi`, leading whitespace and trailing garbage are ignored and
/// anything that does not start with a number counts as 0.
fn parse_reboot_flag(s: &str) -> Result<bool, String> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(0) * sign;
    Ok(value == 1)
}

#[derive(Parser, Debug)]
#[command(name = "mtdwriter")]
#[command(
    author,
    version,
    about = "Write an image to an MTD flash partition while verifying it",
    after_help = "Example: To write openwrt.bin to the partition labeled ALL at offset 327680 \
                  from device start, and reboot afterwards:\n  mtdwriter openwrt.bin ALL 327680 1"
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Bytes written and verified per round, at most the erase size
    /// [default: 1024 or the erase size, whichever is smaller]
    #[arg(long, value_parser = parse_chunk_size)]
    pub chunk_size: Option<usize>,

    /// MTD partition listing used to resolve the device label
    #[arg(long, default_value = PROC_MTD)]
    pub proc_mtd: PathBuf,

    /// Image file to write
    pub imagefile: PathBuf,

    /// Device label, matched as a substring of its /proc/mtd line
    pub device: String,

    /// Offset in the device to start writing at (decimal or 0x hex),
    /// must be a multiple of the erase size
    #[arg(value_parser = parse_hex_u64)]
    pub devoffset: u64,

    /// Reboot after a successful write if 1
    #[arg(action = clap::ArgAction::Set, value_parser = parse_reboot_flag)]
    pub reboot_after: bool,
}
