#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod binary_utils;
pub mod consts;
pub mod mdl;
pub mod phy;
pub mod vtx;
pub mod vvd;

use std::{
    fmt::{self, Display},
    fs::File,
    io,
    path::{Path, PathBuf},
    result,
};

use thiserror::Error;

pub use binary_utils::F32;
pub use mdl::{HeaderFlags, HeaderRef, Mdl, Skeleton};
pub use phy::{Phy, PhyHeader};
pub use vtx::{Vtx, VtxHeader};
pub use vvd::{ThinVertices, Vertex, VertexFile, VertexFileKind};

use vtx::VTX_EXTENSIONS;

#[derive(Debug, Clone, Error, Hash, PartialEq, Eq)]
pub enum Error {
    #[error("io error reading `{path}`: {error}")]
    Io { path: String, error: String },
    #[error("not a {ty} file: invalid signature `{signature}`")]
    InvalidSignature { ty: FileType, signature: String },
    #[error("unsupported {ty} version {version}")]
    UnsupportedVersion { ty: FileType, version: i32 },
    #[error("{0} checksum doesn't match mdl checksum")]
    ChecksumMismatch(FileType),
    #[error("{ty} corrupted: {error}")]
    Corrupted { ty: FileType, error: &'static str },
    #[error("{ty} {what} out of bounds: {count} records at offset {offset}, file is {len} bytes")]
    OutOfBounds {
        ty: FileType,
        what: &'static str,
        offset: i64,
        count: i64,
        len: usize,
    },
    #[error("too many {what}: {count}, at most {max} supported")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        max: usize,
    },
    #[error("bone {bone} has invalid parent {parent}")]
    InvalidBoneParent { bone: usize, parent: i32 },
    #[error("bone {bone} is part of a parent cycle")]
    BoneCycle { bone: usize },
    #[error("invalid thin vertices: {0}")]
    InvalidThinVertices(&'static str),
    #[error("{ty} {feature} unsupported")]
    Unsupported { ty: FileType, feature: &'static str },
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FileType {
    Mdl,
    Vvd,
    Vvc,
    Vtx,
    Phy,
}

pub type Result<T> = result::Result<T, Error>;

impl Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::Mdl => "mdl",
            FileType::Vvd => "vvd",
            FileType::Vvc => "vvc",
            FileType::Vtx => "vtx",
            FileType::Phy => "phy",
        })
    }
}

impl Error {
    fn from_io(err: &io::Error, path: &Path) -> Self {
        Self::Io {
            path: path.display().to_string(),
            error: err.to_string(),
        }
    }
}

/// Which companion files [`Model::read`] looks for and how strictly [`Model::verify`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    pub require_vtx: bool,
    pub require_vvd: bool,
    pub read_vvc: bool,
    pub read_phy: bool,
    /// Check array counts against the engine limits of the file version.
    pub enforce_limits: bool,
}

impl ModelConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            require_vtx: true,
            require_vvd: true,
            read_vvc: true,
            read_phy: true,
            enforce_limits: true,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens a companion file, `None` if it doesn't exist.
fn open_optional(path: &Path) -> Result<Option<(PathBuf, File)>> {
    match File::open(path) {
        Ok(file) => Ok(Some((path.to_owned(), file))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::from_io(&err, path)),
    }
}

fn open_companion(path: &Path, required: bool) -> Result<Option<(PathBuf, File)>> {
    let opened = open_optional(path)?;

    if opened.is_none() {
        if required {
            return Err(Error::Io {
                path: path.display().to_string(),
                error: "file not found".to_owned(),
            });
        }
        tracing::warn!("`{}` not found", path.display());
    }

    Ok(opened)
}

fn find_vtx(mdl_path: &Path, required: bool) -> Result<Option<(PathBuf, File)>> {
    for extension in VTX_EXTENSIONS {
        if let Some(found) = open_optional(&mdl_path.with_extension(extension))? {
            return Ok(Some(found));
        }
    }

    let path = mdl_path.with_extension("*.vtx");
    if required {
        return Err(Error::Io {
            path: path.display().to_string(),
            error: "could not find a supported vtx file".to_owned(),
        });
    }
    tracing::warn!("`{}` not found", path.display());
    Ok(None)
}

/// An mdl file together with whichever companion files were found next to it.
#[derive(Debug, Clone)]
pub struct Model {
    config: ModelConfig,
    mdl: Mdl,
    vvd: Option<VertexFile>,
    vvc: Option<VertexFile>,
    vtx: Option<Vtx>,
    phy: Option<Phy>,
}

impl Model {
    /// # Errors
    ///
    /// Returns `Err` if reading the mdl file fails, if a required companion file is
    /// missing or if reading a companion file fails.
    pub fn read(path: impl AsRef<Path>, config: &ModelConfig) -> Result<Self> {
        let path = path.as_ref();

        let mdl_file = File::open(path).map_err(|err| Error::from_io(&err, path))?;
        let mdl = Mdl::read(mdl_file).map_err(|err| Error::from_io(&err, path))?;

        let vvd = open_companion(&path.with_extension("vvd"), config.require_vvd)?
            .map(|(path, file)| {
                VertexFile::read(VertexFileKind::Vvd, file).map_err(|err| Error::from_io(&err, &path))
            })
            .transpose()?;

        let vvc = if config.read_vvc {
            open_optional(&path.with_extension("vvc"))?
                .map(|(path, file)| {
                    VertexFile::read(VertexFileKind::Vvc, file)
                        .map_err(|err| Error::from_io(&err, &path))
                })
                .transpose()?
        } else {
            None
        };

        let vtx = find_vtx(path, config.require_vtx)?
            .map(|(path, file)| Vtx::read(file).map_err(|err| Error::from_io(&err, &path)))
            .transpose()?;

        let phy = if config.read_phy {
            open_optional(&path.with_extension("phy"))?
                .map(|(path, file)| Phy::read(file).map_err(|err| Error::from_io(&err, &path)))
                .transpose()?
        } else {
            None
        };

        tracing::debug!(
            "read `{}` (vvd: {}, vvc: {}, vtx: {}, phy: {})",
            path.display(),
            vvd.is_some(),
            vvc.is_some(),
            vtx.is_some(),
            phy.is_some(),
        );

        Ok(Self {
            config: *config,
            mdl,
            vvd,
            vvc,
            vtx,
            phy,
        })
    }

    /// Bundles already loaded files.
    #[must_use]
    pub fn from_parts(
        config: ModelConfig,
        mdl: Mdl,
        vvd: Option<VertexFile>,
        vvc: Option<VertexFile>,
        vtx: Option<Vtx>,
        phy: Option<Phy>,
    ) -> Self {
        Self {
            config,
            mdl,
            vvd,
            vvc,
            vtx,
            phy,
        }
    }

    #[must_use]
    pub fn mdl(&self) -> &Mdl {
        &self.mdl
    }

    /// # Errors
    ///
    /// Returns `Err` if a signature or header is invalid, a version is unsupported, an
    /// array is out of bounds, the skeleton is invalid or a companion checksum does not
    /// match the mdl checksum.
    pub fn verify(&self) -> Result<Verified> {
        self.mdl.check_signature()?;
        self.mdl.check_version()?;

        let header = self.mdl.header()?;
        header.check_bounds()?;
        if self.config.enforce_limits {
            header.check_limits()?;
        }
        let skeleton = header.skeleton()?;
        let checksum = header.checksum();

        let vvd = self.vvd.as_ref().map(verify_vertex_file).transpose()?;
        let vvc = self.vvc.as_ref().map(verify_vertex_file).transpose()?;

        for vertex_header in vvd.iter().chain(&vvc) {
            if vertex_header.checksum() != checksum {
                return Err(Error::ChecksumMismatch(vertex_header.file_type()));
            }
        }

        let vtx = self
            .vtx
            .as_ref()
            .map(|vtx| {
                vtx.check_version()?;
                vtx.header()
            })
            .transpose()?;

        if vtx.as_ref().map_or(false, |vtx| vtx.checksum.get() != checksum) {
            return Err(Error::ChecksumMismatch(FileType::Vtx));
        }

        let phy = self.phy.as_ref().map(Phy::header).transpose()?;

        if phy.as_ref().map_or(false, |phy| phy.checksum.get() != checksum) {
            return Err(Error::ChecksumMismatch(FileType::Phy));
        }

        Ok(Verified {
            header,
            skeleton,
            vvd,
            vtx,
            phy,
        })
    }
}

fn verify_vertex_file(file: &VertexFile) -> Result<vvd::HeaderRef> {
    file.check_signature()?;
    file.check_version()?;
    file.header()
}

/// A model whose files have been checked against each other.
#[derive(Debug, Clone)]
pub struct Verified<'a> {
    header: HeaderRef<'a>,
    skeleton: Skeleton,
    vvd: Option<vvd::HeaderRef<'a>>,
    vtx: Option<VtxHeader>,
    phy: Option<PhyHeader>,
}

impl<'a> Verified<'a> {
    #[must_use]
    pub fn header(&self) -> &HeaderRef<'a> {
        &self.header
    }

    #[must_use]
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[must_use]
    pub fn is_static_prop(&self) -> bool {
        self.header.is_static_prop()
    }

    /// # Errors
    ///
    /// Returns `Err` if reading the name fails.
    pub fn name(&self) -> Result<&'a str> {
        self.header.name()
    }

    #[must_use]
    pub fn vtx_header(&self) -> Option<&VtxHeader> {
        self.vtx.as_ref()
    }

    #[must_use]
    pub fn phy_header(&self) -> Option<&PhyHeader> {
        self.phy.as_ref()
    }

    /// Vertices of a lod, `None` if there is no vvd or no such lod.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the vertex data is corrupted.
    pub fn lod_vertices(&self, lod: usize) -> Result<Option<Vec<Vertex>>> {
        match &self.vvd {
            Some(vvd) => vvd.lod_vertices(lod),
            None => Ok(None),
        }
    }

    /// Thin copy of the root lod vertices, `None` if there is no vvd.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the vertex data is corrupted.
    pub fn thin_vertices(&self) -> Result<Option<ThinVertices>> {
        self.vvd.as_ref().map(vvd::HeaderRef::thin_vertices).transpose()
    }
}
