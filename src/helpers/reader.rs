use crate::error::RustySurveyError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// A seekable byte source: either a file on disk or an uploaded buffer
pub(crate) enum UnifiedReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer (uploads, cached bytes)
    Memory(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local file for reading.
    pub(crate) fn open(path: &Path) -> Result<UnifiedReader, RustySurveyError> {
        let file = File::open(path)?;
        Ok(UnifiedReader::Local(BufReader::new(file)))
    }

    /// Wraps an owned buffer.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> UnifiedReader {
        UnifiedReader::Memory(Cursor::new(bytes))
    }

    /// Reads up to `length` leading bytes and rewinds, used for format sniffing.
    pub(crate) fn peek_prefix(&mut self, length: usize) -> Result<Vec<u8>, RustySurveyError> {
        let mut prefix = Vec::with_capacity(length);
        self.seek(SeekFrom::Start(0))?;
        self.by_ref().take(length as u64).read_to_end(&mut prefix)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(prefix)
    }

    /// Consumes the reader and returns the complete content.
    pub(crate) fn into_bytes(self) -> Result<Vec<u8>, RustySurveyError> {
        match self {
            UnifiedReader::Local(mut reader) => {
                let mut bytes = Vec::new();
                reader.seek(SeekFrom::Start(0))?;
                reader.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            UnifiedReader::Memory(cursor) => Ok(cursor.into_inner()),
        }
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Memory(reader) => reader.seek(pos),
        }
    }
}
