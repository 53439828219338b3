use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// A script to be loaded, read from a file or from a one-shot byte stream.
pub struct ScriptModule {
    chunk_name: String,
    source: ScriptSource,
}

enum ScriptSource {
    File(PathBuf),
    Stream {
        reader: Option<Box<dyn Read>>,
        cached: Option<String>,
    },
}

impl ScriptModule {
    /// The chunk name is the path as given.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            chunk_name: path.display().to_string(),
            source: ScriptSource::File(path),
        }
    }

    /// The stream is read on first load and kept for later reloads.
    pub fn from_stream(reader: impl Read + 'static, chunk_name: impl Into<String>) -> Self {
        Self {
            chunk_name: chunk_name.into(),
            source: ScriptSource::Stream {
                reader: Some(Box::new(reader)),
                cached: None,
            },
        }
    }

    pub fn from_source(source: impl Into<String>, chunk_name: impl Into<String>) -> Self {
        Self {
            chunk_name: chunk_name.into(),
            source: ScriptSource::Stream {
                reader: None,
                cached: Some(source.into()),
            },
        }
    }

    pub fn chunk_name(&self) -> &str {
        &self.chunk_name
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ScriptSource::File(path) => Some(path),
            ScriptSource::Stream { .. } => None,
        }
    }

    pub(crate) fn read_source(&mut self) -> io::Result<String> {
        match &mut self.source {
            ScriptSource::File(path) => fs::read_to_string(path),
            ScriptSource::Stream { reader, cached } => {
                if let Some(text) = cached {
                    return Ok(text.clone());
                }
                let Some(mut stream) = reader.take() else {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "script stream has no data",
                    ));
                };
                let mut text = String::new();
                stream.read_to_string(&mut text)?;
                *cached = Some(text.clone());
                Ok(text)
            }
        }
    }
}

impl fmt::Debug for ScriptModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptModule")
            .field("chunk_name", &self.chunk_name)
            .field("path", &self.path())
            .finish()
    }
}

pub(crate) fn source_digest(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn stream_is_read_once_and_cached() {
        let mut module = ScriptModule::from_stream(Cursor::new("let x = 1;"), "inline");
        assert_eq!(module.read_source().expect("first"), "let x = 1;");
        assert_eq!(module.read_source().expect("second"), "let x = 1;");
        assert!(module.path().is_none());
    }

    #[test]
    fn stream_errors_surface() {
        let mut module = ScriptModule::from_stream(FailingReader, "broken");
        assert!(module.read_source().is_err());
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = source_digest("abc");
        assert_eq!(digest.len(), 64);
        assert!(digest.starts_with("ba7816bf"));
    }
}
