//! Selecting messages from a GRIB2 file on disk.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;
use wx_common::GribSelector;

use crate::message::Grib2Message;
use crate::reader::Grib2Reader;
use crate::Grib2Error;

/// Anything messages can be selected from.
///
/// `close` releases the underlying handle and must be safe to call more
/// than once.
pub trait GribSource: Send {
    /// All messages matching `selector`, in file order.
    ///
    /// Returns [`Grib2Error::NoMatch`] when nothing matches.
    fn select(&mut self, selector: &GribSelector) -> Result<Vec<Grib2Message>, Grib2Error>;

    fn close(&mut self);
}

/// An open GRIB2 file.
pub struct GribFile {
    path: PathBuf,
    reader: Option<Grib2Reader<BufReader<File>>>,
}

impl GribFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Grib2Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            reader: Some(Grib2Reader::new(BufReader::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Every field in the file.
    pub fn messages(&mut self) -> Result<Vec<Grib2Message>, Grib2Error> {
        let reader = self.reader.as_mut().ok_or(Grib2Error::Closed)?;
        reader.rewind()?;
        reader.read_all()
    }
}

impl GribSource for GribFile {
    fn select(&mut self, selector: &GribSelector) -> Result<Vec<Grib2Message>, Grib2Error> {
        let reader = self.reader.as_mut().ok_or(Grib2Error::Closed)?;
        reader.rewind()?;

        let mut selected = Vec::new();
        while let Some(messages) = reader.next_message()? {
            selected.extend(messages.into_iter().filter(|msg| {
                selector.matches(msg.short_name(), msg.level(), msg.step_type())
            }));
        }

        if selected.is_empty() {
            return Err(Grib2Error::NoMatch(format!(
                "{}:{}{}",
                selector.short_name,
                selector.level,
                selector
                    .step_type
                    .map(|s| format!(":{}", s.as_str()))
                    .unwrap_or_default()
            )));
        }

        debug!(
            path = %self.path.display(),
            short_name = %selector.short_name,
            level = %selector.level,
            count = selected.len(),
            "Selected GRIB messages"
        );
        Ok(selected)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), "Closed GRIB file");
        }
    }
}
