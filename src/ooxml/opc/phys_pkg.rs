//! Provides a general interface to a physical OPC package.
//!
//! The engine only needs three things from a container: the content-type manifest, the
//! relationship manifest of a source, and the bytes of a member. [`PhysPkgReader`] captures
//! that, with a ZIP implementation and one for a package extracted into a directory.
//! [`PhysPkgWriter`] is the write-side counterpart.

use crate::common::detection::{ContainerKind, sniff_container};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PackURI};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Upper bound on the buffer reserved up front for one member.
const MAX_PREALLOC: u64 = 1 << 24;

/// Capacity to reserve for a member whose header declares `declared` bytes.
///
/// The declared size is untrusted; larger members grow the buffer while reading.
#[inline]
fn prealloc_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Read access to the members of a physical package.
pub trait PhysPkgReader {
    /// Get the binary content of a member.
    ///
    /// A missing member is reported as [`OpcError::PartNotFound`].
    fn blob_for(&mut self, partname: &PackURI) -> Result<Vec<u8>>;

    /// Get the [Content_Types].xml content. Its absence is an error.
    fn content_types_xml(&mut self) -> Result<Vec<u8>> {
        self.blob_for(&PackURI::new(CONTENT_TYPES_URI)?)
    }

    /// Get the relationships XML for a source (a part, or the package itself).
    ///
    /// Returns None if the source has no relationships member.
    fn rels_xml_for(&mut self, source_uri: &PackURI) -> Result<Option<Vec<u8>>> {
        match self.blob_for(&source_uri.rels_uri()?) {
            Ok(blob) => Ok(Some(blob)),
            Err(OpcError::PartNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Write access to the members of a physical package.
pub trait PhysPkgWriter {
    /// Write one member.
    fn write(&mut self, partname: &PackURI, blob: &[u8]) -> Result<()>;
}

/// Physical package reader over a ZIP archive.
pub struct ZipPhysReader<R: Read + Seek> {
    archive: ZipArchive<R>,

    /// Lowercase member name to stored member name, for producers that disagree on case
    folded: HashMap<String, String>,
}

impl ZipPhysReader<BufReader<File>> {
    /// Open an OPC package from a file path.
    ///
    /// # Errors
    /// Returns [`OpcError::PackageNotFound`] if the file does not exist, and the same errors
    /// as [`ZipPhysReader::from_reader`] otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl ZipPhysReader<Cursor<Vec<u8>>> {
    /// Create a reader over an in-memory package.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }
}

impl<R: Read + Seek> ZipPhysReader<R> {
    /// Create a reader from any seekable byte source.
    ///
    /// # Errors
    /// * [`OpcError::EncryptedPackage`] if the input is an OLE2 compound file, which is how
    ///   password-protected OOXML packages are stored
    /// * [`OpcError::NotZipPackage`] if the input is empty or not a ZIP archive
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let mut header = Vec::with_capacity(8);
        reader.by_ref().take(8).read_to_end(&mut header)?;
        reader.seek(SeekFrom::Start(0))?;

        match sniff_container(&header) {
            ContainerKind::Ole2 => return Err(OpcError::EncryptedPackage),
            ContainerKind::Empty => {
                return Err(OpcError::NotZipPackage("input is empty".to_string()));
            },
            ContainerKind::Zip | ContainerKind::Unknown => {},
        }

        let archive = ZipArchive::new(reader).map_err(|e| OpcError::NotZipPackage(e.to_string()))?;
        let folded = archive
            .file_names()
            .map(|name| (name.to_ascii_lowercase(), name.to_string()))
            .collect();

        Ok(Self { archive, folded })
    }

    /// Get the number of members in the package.
    #[inline]
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// List all member names in the package.
    pub fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(String::from).collect()
    }

    /// Check if a specific member exists in the package.
    pub fn contains(&self, pack_uri: &PackURI) -> bool {
        self.resolve_member(pack_uri).is_some()
    }

    fn resolve_member(&self, pack_uri: &PackURI) -> Option<&str> {
        self.folded
            .get(&pack_uri.membername().to_ascii_lowercase())
            .map(String::as_str)
    }

    fn read_member(&mut self, membername: &str) -> std::result::Result<Vec<u8>, ZipError> {
        let mut file = self.archive.by_name(membername)?;
        let mut buffer = Vec::with_capacity(prealloc_hint(file.size()));
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

impl<R: Read + Seek> PhysPkgReader for ZipPhysReader<R> {
    fn blob_for(&mut self, pack_uri: &PackURI) -> Result<Vec<u8>> {
        match self.read_member(pack_uri.membername()) {
            Ok(blob) => Ok(blob),
            Err(ZipError::FileNotFound) => {
                let stored = self
                    .resolve_member(pack_uri)
                    .map(str::to_string)
                    .ok_or_else(|| OpcError::PartNotFound(pack_uri.to_string()))?;
                Ok(self.read_member(&stored)?)
            },
            Err(e) => Err(e.into()),
        }
    }
}

/// Physical package reader over a package extracted into a directory.
///
/// Member `word/document.xml` is the file `<root>/word/document.xml`.
#[derive(Debug, Clone)]
pub struct DirPhysReader {
    root: PathBuf,
}

impl DirPhysReader {
    /// Open an extracted package.
    ///
    /// Returns [`OpcError::PackageNotFound`] if `root` is not a directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(OpcError::PackageNotFound(root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn member_path(&self, pack_uri: &PackURI) -> PathBuf {
        pack_uri
            .membername()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl PhysPkgReader for DirPhysReader {
    fn blob_for(&mut self, pack_uri: &PackURI) -> Result<Vec<u8>> {
        let path = self.member_path(pack_uri);
        if !path.is_file() {
            return Err(OpcError::PartNotFound(pack_uri.to_string()));
        }
        Ok(std::fs::read(path)?)
    }
}

/// Physical package writer producing a ZIP archive with Deflate compression.
pub struct ZipPhysWriter<W: Write + Seek> {
    zip_writer: ZipWriter<W>,
}

impl ZipPhysWriter<Cursor<Vec<u8>>> {
    /// Create a new package writer that writes to memory.
    pub fn in_memory() -> Self {
        Self::new(Cursor::new(Vec::new()))
    }
}

impl ZipPhysWriter<BufWriter<File>> {
    /// Create (or truncate) a package file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Seek> ZipPhysWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip_writer: ZipWriter::new(writer),
        }
    }

    /// Finish writing the central directory and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        Ok(self.zip_writer.finish()?)
    }
}

impl<W: Write + Seek> PhysPkgWriter for ZipPhysWriter<W> {
    fn write(&mut self, pack_uri: &PackURI, blob: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip_writer.start_file(pack_uri.membername(), options)?;
        self.zip_writer.write_all(blob)?;
        Ok(())
    }
}
