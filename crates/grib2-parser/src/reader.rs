//! Sequential reader over concatenated GRIB2 messages.

use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use tracing::trace;

use crate::message::Grib2Message;
use crate::sections::{parse_indicator, INDICATOR_LEN};
use crate::Grib2Error;

pub struct Grib2Reader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read + Seek> Grib2Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Byte offset of the next message.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn rewind(&mut self) -> Result<(), Grib2Error> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        Ok(())
    }

    /// Read the next physical message and split it into fields.
    ///
    /// Returns `Ok(None)` at a clean end of input.
    pub fn next_message(&mut self) -> Result<Option<Vec<Grib2Message>>, Grib2Error> {
        let mut header = [0u8; INDICATOR_LEN];
        let n = read_full(&mut self.inner, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < INDICATOR_LEN {
            return Err(Grib2Error::InvalidFormat(format!(
                "Truncated indicator at offset {}",
                self.offset
            )));
        }

        let indicator = parse_indicator(&header)?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "Message length {} too large",
                indicator.message_length
            ))
        })?;

        let mut buf = BytesMut::zeroed(length);
        buf[..INDICATOR_LEN].copy_from_slice(&header);
        let body = read_full(&mut self.inner, &mut buf[INDICATOR_LEN..])?;
        if body < length - INDICATOR_LEN {
            return Err(Grib2Error::InvalidFormat(format!(
                "Truncated message at offset {}: expected {} bytes, got {}",
                self.offset,
                length,
                body + INDICATOR_LEN
            )));
        }

        trace!(offset = self.offset, length, "Read GRIB2 message");
        self.offset += length as u64;

        let raw: Bytes = buf.freeze();
        Grib2Message::parse_all(raw).map(Some)
    }

    /// Read every field from the current position to the end.
    pub fn read_all(&mut self) -> Result<Vec<Grib2Message>, Grib2Error> {
        let mut out = Vec::new();
        while let Some(messages) = self.next_message()? {
            out.extend(messages);
        }
        Ok(out)
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, Grib2Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
