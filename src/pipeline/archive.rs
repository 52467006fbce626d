//! Archive assembly: transparent PNGs → one in-memory ZIP.
//!
//! The builder is owned by a single packager call. If that call fails the
//! builder is simply dropped, so a partially written archive can never
//! reach the caller.

use crate::config::ArchiveCompression;
use crate::error::CutoutError;
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Suffix appended to every entry stem.
pub const ENTRY_SUFFIX: &str = "_transparent.png";

/// Where archive bytes are written while the batch runs.
pub trait ArchiveSink: Write + Seek {
    fn into_bytes(self) -> Vec<u8>;
}

impl ArchiveSink for Cursor<Vec<u8>> {
    fn into_bytes(self) -> Vec<u8> {
        self.into_inner()
    }
}

/// Accumulates archive entries in input order.
pub struct ArchiveBuilder<W: ArchiveSink = Cursor<Vec<u8>>> {
    writer: ZipWriter<W>,
    options: SimpleFileOptions,
    used_names: HashSet<String>,
    reserved: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new(compression: ArchiveCompression) -> Self {
        Self::with_sink(Cursor::new(Vec::new()), compression)
    }
}

impl<W: ArchiveSink> ArchiveBuilder<W> {
    pub fn with_sink(sink: W, compression: ArchiveCompression) -> Self {
        let method = match compression {
            ArchiveCompression::Stored => CompressionMethod::Stored,
            ArchiveCompression::Deflated => CompressionMethod::Deflated,
        };
        Self {
            writer: ZipWriter::new(sink),
            options: SimpleFileOptions::default()
                .compression_method(method)
                .unix_permissions(0o644),
            used_names: HashSet::new(),
            reserved: HashSet::new(),
        }
    }

    /// Keep `name` free for the input whose own entry name it is.
    ///
    /// Numbered names handed out for repeated stems skip reserved names, so
    /// `a.png, a.jpg, a_2.png` archives `a.jpg` as `a_3_transparent.png`
    /// and leaves `a_2_transparent.png` to `a_2.png`.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.reserved.insert(name.into());
    }

    /// Entry name for `stem`, unique within this archive.
    ///
    /// The first `photo` becomes `photo_transparent.png`; later ones become
    /// `photo_2_transparent.png`, `photo_3_transparent.png`, … skipping any
    /// name already used or reserved.
    pub fn unique_entry_name(&self, stem: &str) -> String {
        let first = format!("{stem}{ENTRY_SUFFIX}");
        if !self.used_names.contains(&first) {
            return first;
        }
        (2usize..)
            .map(|n| format!("{stem}_{n}{ENTRY_SUFFIX}"))
            .find(|candidate| {
                !self.used_names.contains(candidate) && !self.reserved.contains(candidate)
            })
            .unwrap_or(first)
    }

    /// Append one file.
    pub fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), CutoutError> {
        if self.used_names.contains(name) {
            return Err(CutoutError::ArchiveFailure {
                detail: format!("duplicate entry name '{name}'"),
            });
        }

        self.writer
            .start_file(name, self.options)
            .map_err(|e| CutoutError::ArchiveFailure {
                detail: format!("start entry '{name}': {e}"),
            })?;
        self.writer
            .write_all(bytes)
            .map_err(|e| CutoutError::ArchiveFailure {
                detail: format!("write entry '{name}': {e}"),
            })?;

        self.used_names.insert(name.to_string());
        debug!("Archived {} ({} bytes)", name, bytes.len());
        Ok(())
    }

    /// Write the central directory and return the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>, CutoutError> {
        let sink = self
            .writer
            .finish()
            .map_err(|e| CutoutError::ArchiveFailure {
                detail: format!("finalise archive: {e}"),
            })?;
        Ok(sink.into_bytes())
    }
}
