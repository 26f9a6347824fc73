mod thin;

#[cfg(test)]
mod tests;

use std::{fmt, io::Read};

use byteorder::{ByteOrder, LE};
use glam::{Vec2, Vec3, Vec4};
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{parse_slice, read_file, F32};
use crate::consts::{make_magic, MAX_LODS, VVC_ID, VVC_MAGIC_BE, VVC_MAGIC_LE, VVD_ID, VVD_VERSION};
use crate::mdl::Record;
use crate::{Error, FileType, Result};

pub use thin::{pack_normal, unpack_normal, ThinVertices};

/// `vertexFileHeader_t`, shared by `.vvd` and `.vvc` files.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct VertexFileHeader {
    pub id: [u8; 4],
    pub version: I32<LE>,
    /// Must match the mdl checksum.
    pub checksum: I32<LE>,
    pub lod_count: I32<LE>,
    pub lod_vertex_counts: [I32<LE>; MAX_LODS],
    pub fixup_count: I32<LE>,
    pub fixup_table_offset: I32<LE>,
    pub vertex_data_offset: I32<LE>,
    pub tangent_data_offset: I32<LE>,
}

impl Record for VertexFileHeader {
    const NAME: &'static str = "vertex file header";
}

/// `mstudioboneweight_t`
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BoneWeight {
    pub weights: [F32; 3],
    pub bones: [u8; 3],
    pub bone_count: u8,
}

impl BoneWeight {
    /// `(bone, weight)` pairs of the influences actually in use.
    pub fn influences(&self) -> impl Iterator<Item = (u8, f32)> + '_ {
        self.bones
            .iter()
            .zip(&self.weights)
            .take(usize::from(self.bone_count))
            .map(|(&bone, weight)| (bone, weight.get()))
    }
}

/// `mstudiovertex_t`
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Vertex {
    pub bone_weight: BoneWeight,
    pub position: [F32; 3],
    pub normal: [F32; 3],
    pub tex_coord: [F32; 2],
}

impl Record for Vertex {
    const NAME: &'static str = "vertex";
}

impl Vertex {
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.position[0].get(),
            self.position[1].get(),
            self.position[2].get(),
        )
    }

    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::new(
            self.normal[0].get(),
            self.normal[1].get(),
            self.normal[2].get(),
        )
    }

    #[must_use]
    pub fn tex_coord(&self) -> Vec2 {
        Vec2::new(self.tex_coord[0].get(), self.tex_coord[1].get())
    }
}

/// `vertexFileFixup_t`, a run of vertices shared by all lods up to `lod`.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Fixup {
    pub lod: I32<LE>,
    pub source_vertex_id: I32<LE>,
    pub vertex_count: I32<LE>,
}

impl Record for Fixup {
    const NAME: &'static str = "fixup";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Matches a file tag against the two spellings of the vvc magic.
///
/// `I D C V` is the big-endian spelling, `V C D I` the little-endian one.
#[must_use]
pub fn detect_vvc_byte_order(tag: [u8; 4]) -> Option<Endian> {
    match make_magic(&tag) {
        VVC_MAGIC_BE => Some(Endian::Big),
        VVC_MAGIC_LE => Some(Endian::Little),
        _ => None,
    }
}

/// Which companion a [`VertexFile`] was read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFileKind {
    Vvd,
    Vvc,
}

impl VertexFileKind {
    #[must_use]
    pub fn file_type(self) -> FileType {
        match self {
            Self::Vvd => FileType::Vvd,
            Self::Vvc => FileType::Vvc,
        }
    }

    fn id(self) -> &'static [u8; 4] {
        match self {
            Self::Vvd => VVD_ID,
            Self::Vvc => VVC_ID,
        }
    }
}

/// A `.vvd` or `.vvc` file held in memory.
#[derive(Clone)]
pub struct VertexFile {
    kind: VertexFileKind,
    bytes: Vec<u8>,
}

impl VertexFile {
    #[must_use]
    pub fn from_bytes(kind: VertexFileKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    /// # Errors
    ///
    /// Returns `Err` if reading fails.
    pub fn read(kind: VertexFileKind, reader: impl Read) -> std::io::Result<Self> {
        read_file(reader).map(|bytes| Self::from_bytes(kind, bytes))
    }

    #[must_use]
    pub fn kind(&self) -> VertexFileKind {
        self.kind
    }

    fn ty(&self) -> FileType {
        self.kind.file_type()
    }

    /// # Errors
    ///
    /// Returns `Err` if the signature does not match the file kind, or if the file is a
    /// byte swapped vvc.
    pub fn check_signature(&self) -> Result<()> {
        let signature = self.bytes.get(0..4).ok_or(Error::Corrupted {
            ty: self.ty(),
            error: "eof reading signature",
        })?;

        if signature == self.kind.id() {
            return Ok(());
        }

        if self.kind == VertexFileKind::Vvc {
            let mut tag = [0; 4];
            tag.copy_from_slice(signature);

            if detect_vvc_byte_order(tag) == Some(Endian::Little) {
                return Err(Error::Unsupported {
                    ty: FileType::Vvc,
                    feature: "byte swapped files",
                });
            }
        }

        Err(Error::InvalidSignature {
            ty: self.ty(),
            signature: String::from_utf8_lossy(signature).into_owned(),
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a version.
    pub fn version(&self) -> Result<i32> {
        let version = self.bytes.get(4..8).ok_or(Error::Corrupted {
            ty: self.ty(),
            error: "eof reading version",
        })?;
        Ok(LE::read_i32(version))
    }

    /// # Errors
    ///
    /// Returns `Err` if the version is not supported.
    pub fn check_version(&self) -> Result<i32> {
        let version = self.version()?;

        if version == VVD_VERSION {
            Ok(version)
        } else {
            Err(Error::UnsupportedVersion {
                ty: self.ty(),
                version,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a header.
    pub fn header(&self) -> Result<HeaderRef> {
        let header = VertexFileHeader::load(&self.bytes, 0).ok_or(Error::Corrupted {
            ty: self.ty(),
            error: "eof reading header",
        })?;

        Ok(HeaderRef {
            kind: self.kind,
            header,
            bytes: &self.bytes,
        })
    }
}

impl fmt::Debug for VertexFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexFile")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct HeaderRef<'a> {
    kind: VertexFileKind,
    header: VertexFileHeader,
    bytes: &'a [u8],
}

impl<'a> HeaderRef<'a> {
    #[must_use]
    pub fn header(&self) -> &VertexFileHeader {
        &self.header
    }

    #[must_use]
    pub fn checksum(&self) -> i32 {
        self.header.checksum.get()
    }

    #[must_use]
    pub fn file_type(&self) -> FileType {
        self.kind.file_type()
    }

    fn corrupted(&self, error: &'static str) -> Error {
        Error::Corrupted {
            ty: self.file_type(),
            error,
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the lod count is negative or above [`MAX_LODS`].
    pub fn lod_count(&self) -> Result<usize> {
        usize::try_from(self.header.lod_count.get())
            .ok()
            .filter(|&count| count <= MAX_LODS)
            .ok_or_else(|| self.corrupted("lod count is invalid"))
    }

    /// Number of vertices used by a lod, `None` past the last lod.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the count is negative.
    pub fn lod_vertex_count(&self, lod: usize) -> Result<Option<usize>> {
        if lod >= self.lod_count()? {
            return Ok(None);
        }

        let count = self.header.lod_vertex_counts.get(lod).map_or(0, |c| c.get());
        usize::try_from(count)
            .map(Some)
            .map_err(|_| self.corrupted("lod vertex count is negative"))
    }

    /// All vertices of the root lod, in file order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the vertices are out of bounds, or if the file stores compressed
    /// vertex data.
    pub fn vertices(&self) -> Result<&'a [Vertex]> {
        if self.kind == VertexFileKind::Vvc {
            return Err(Error::Unsupported {
                ty: FileType::Vvc,
                feature: "compressed vertex data",
            });
        }

        let offset = usize::try_from(self.header.vertex_data_offset.get())
            .map_err(|_| self.corrupted("vertex offset is negative"))?;
        let count = usize::try_from(self.header.lod_vertex_counts[0].get())
            .map_err(|_| self.corrupted("vertex count is negative"))?;

        parse_slice(self.bytes, offset, count).ok_or_else(|| self.corrupted("vertices out of bounds"))
    }

    /// Per vertex tangents, `w` holding the binormal sign.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the tangents are out of bounds.
    pub fn tangents(&self) -> Result<Vec<Vec4>> {
        let offset = self.header.tangent_data_offset.get();
        if offset == 0 {
            return Ok(Vec::new());
        }

        let offset = usize::try_from(offset).map_err(|_| self.corrupted("tangent offset is negative"))?;
        let count = usize::try_from(self.header.lod_vertex_counts[0].get())
            .map_err(|_| self.corrupted("vertex count is negative"))?;

        let tangents: &[[F32; 4]] = parse_slice(self.bytes, offset, count)
            .ok_or_else(|| self.corrupted("tangents out of bounds"))?;

        Ok(tangents
            .iter()
            .map(|t| Vec4::new(t[0].get(), t[1].get(), t[2].get(), t[3].get()))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if the fixup table is out of bounds.
    pub fn fixups(&self) -> Result<&'a [Fixup]> {
        let offset = usize::try_from(self.header.fixup_table_offset.get())
            .map_err(|_| self.corrupted("fixup offset is negative"))?;
        let count = usize::try_from(self.header.fixup_count.get())
            .map_err(|_| self.corrupted("fixup count is negative"))?;

        parse_slice(self.bytes, offset, count).ok_or_else(|| self.corrupted("fixups out of bounds"))
    }

    /// Vertices of a lod, rebuilt through the fixup table. `None` past the last lod.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the vertices or the fixup table are out of bounds.
    pub fn lod_vertices(&self, lod: usize) -> Result<Option<Vec<Vertex>>> {
        let vertices = self.vertices()?;
        let fixups = self.fixups()?;

        if fixups.is_empty() {
            if lod == 0 {
                return Ok(Some(vertices.to_vec()));
            }
            return Ok(None);
        }

        let Some(vertex_count) = self.lod_vertex_count(lod)? else {
            return Ok(None);
        };

        let mut lod_vertices = Vec::with_capacity(vertex_count);

        for fixup in fixups
            .iter()
            .filter(|f| usize::try_from(f.lod.get()).map_or(false, |l| l >= lod))
        {
            let start = usize::try_from(fixup.source_vertex_id.get())
                .map_err(|_| self.corrupted("fixup vertex index is negative"))?;
            let count = usize::try_from(fixup.vertex_count.get())
                .map_err(|_| self.corrupted("fixup vertex count is negative"))?;

            let fixup_vertices = start
                .checked_add(count)
                .and_then(|end| vertices.get(start..end))
                .ok_or_else(|| self.corrupted("fixup vertices out of bounds"))?;

            lod_vertices.extend_from_slice(fixup_vertices);
        }

        Ok(Some(lod_vertices))
    }

    /// Thin copy of the root lod vertices.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the vertices are out of bounds or carry more influences than supported.
    pub fn thin_vertices(&self) -> Result<ThinVertices> {
        ThinVertices::from_vertices(self.vertices()?)
    }
}
