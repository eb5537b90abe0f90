//! Write command implementation

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use mtdwriter_core::{
    DeviceOpener, DeviceRegistry, FlashWriter, ImageStream, SystemController, WriteProgress,
    WriteStats, WriterConfig,
};
use std::path::Path;
use thiserror::Error;

/// Failures of the write command outside the core write sequence
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No MTD device matching label '{0}'")]
    UnknownLabel(String),
    #[error("Reboot request failed: {0}")]
    RebootFailed(#[source] std::io::Error),
}

/// Progress reporter using an indicatif progress bar
///
/// The bar message shows the current phase marker: `[e]` erase,
/// `[w]` write, `[s]` sync, `[v]` verify.
#[derive(Default)]
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    /// Create a reporter; the bar appears once the write starts
    pub fn new() -> Self {
        Self::default()
    }

    fn phase(&self, marker: &'static str) {
        if let Some(pb) = &self.bar {
            pb.set_message(marker);
        }
    }
}

impl WriteProgress for IndicatifProgress {
    fn starting(&mut self, image_len: u64) {
        let pb = ProgressBar::new(image_len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.bar = Some(pb);
    }

    fn unlocking(&mut self, _start: u64, _len: u64) {
        self.phase("Unlocking device...");
    }

    fn erasing(&mut self, _offset: u64) {
        self.phase("[e]");
    }

    fn writing(&mut self, _offset: u64, _len: usize) {
        self.phase("[w]");
    }

    fn syncing(&mut self) {
        self.phase("[s]");
    }

    fn verifying(&mut self, _offset: u64, _len: usize) {
        self.phase("[v]");
    }

    fn chunk_done(&mut self, bytes_written: u64) {
        if let Some(pb) = &self.bar {
            pb.set_position(bytes_written);
        }
    }

    fn complete(&mut self, _stats: &WriteStats) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("Done!");
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.abandon();
        }
    }
}

/// Arguments of a write run
#[derive(Debug, Clone)]
pub struct WriteRequest<'a> {
    /// Image file to write
    pub image: &'a Path,
    /// Device label to resolve through the registry
    pub label: &'a str,
    /// Device offset
    pub offset: u64,
    /// Reboot once the write has succeeded
    pub reboot_after: bool,
    /// Writer tunables
    pub config: WriterConfig,
}

/// Run the write command
///
/// The image and device handles are closed before the reboot request,
/// which is only issued after a fully successful write.
pub fn run_write<G, O, S, P>(
    request: &WriteRequest<'_>,
    registry: &G,
    opener: &O,
    system: &mut S,
    progress: &mut P,
) -> Result<WriteStats, Box<dyn std::error::Error>>
where
    G: DeviceRegistry,
    O: DeviceOpener,
    S: SystemController,
    P: WriteProgress,
{
    let stats = write_image(request, registry, opener, progress)?;

    if request.reboot_after {
        system.reboot().map_err(CommandError::RebootFailed)?;
    }

    Ok(stats)
}

/// Open the image and device, write, and release both handles
fn write_image<G, O, P>(
    request: &WriteRequest<'_>,
    registry: &G,
    opener: &O,
    progress: &mut P,
) -> Result<WriteStats, Box<dyn std::error::Error>>
where
    G: DeviceRegistry,
    O: DeviceOpener,
    P: WriteProgress,
{
    let mut image = ImageStream::open(request.image)?;

    let entry = registry
        .lookup(request.label)?
        .ok_or_else(|| CommandError::UnknownLabel(request.label.to_string()))?;
    info!(
        "Device label '{}' resolved to mtd{} ('{}')",
        request.label, entry.index, entry.name
    );

    let mut device = opener.open(&entry)?;

    let writer = FlashWriter::new(request.config);
    let stats = writer.write(&mut image, &mut device, request.offset, progress)?;

    Ok(stats)
}
