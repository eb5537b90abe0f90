//! Man page generator for mtdwriter
//!
//! mtdwriter needs root and reboots the host, so the page goes into
//! section 8 (system administration).
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

const MAN_SECTION: &str = "8";

/// Render the page and return its file name (`<name>.<section>`)
fn render(buffer: &mut Vec<u8>) -> std::io::Result<String> {
    let cmd = cli::Cli::command();
    let file_name = format!("{}.{}", cmd.get_name(), MAN_SECTION);
    clap_mangen::Man::new(cmd).section(MAN_SECTION).render(buffer)?;
    Ok(file_name)
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Default to ./man directory
    let output_dir = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("man")
    };

    fs::create_dir_all(&output_dir)?;

    let mut buffer = Vec::new();
    let file_name = render(&mut buffer)?;

    let output_path = output_dir.join(file_name);
    fs::write(&output_path, buffer)?;

    println!("Man page generated at: {}", output_path.display());
    println!("  man -l {}", output_path.display());

    Ok(())
}
