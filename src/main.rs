//! mtdwriter - Write an image to an MTD flash partition while verifying it
//!
//! ```text
//! mtdwriter <imagefile> <device-label> <devoffset> <reboot_after>
//! ```
//!
//! The partition is selected by label from `/proc/mtd`. Each erase block is
//! erased right before it is first written, every chunk is read back and
//! compared, and the system reboots afterwards if `reboot_after` is 1.
//!
//! Exits with status 0 on success and 1 on any failure.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use commands::{IndicatifProgress, WriteRequest};
use mtdwriter_core::WriterConfig;
use mtdwriter_linux_mtd::{LinuxMtdOpener, LinuxSystem, ProcMtdRegistry};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit with 1 like every other failure, so
            // clap's own exit (code 2) is not used
            // A failed print means stderr is gone; the exit code still reports
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let request = WriteRequest {
        image: &cli.imagefile,
        label: &cli.device,
        offset: cli.devoffset,
        reboot_after: cli.reboot_after,
        config: WriterConfig {
            chunk_size: cli.chunk_size,
        },
    };

    let registry = ProcMtdRegistry::with_path(&cli.proc_mtd);
    let opener = LinuxMtdOpener::new();
    let mut system = LinuxSystem;
    let mut progress = IndicatifProgress::new();

    commands::run_write(&request, &registry, &opener, &mut system, &mut progress)?;

    Ok(())
}
