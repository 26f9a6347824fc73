use std::{fmt, io::Read};

use byteorder::{ByteOrder, LE};
use zerocopy::{
    byteorder::{I32, U16},
    AsBytes, FromBytes, Unaligned,
};

use crate::binary_utils::read_file;
use crate::consts::VTX_VERSION;
use crate::mdl::Record;
use crate::{Error, FileType, Result};

/// Extensions of the vtx file, in the order they are preferred.
pub const VTX_EXTENSIONS: [&str; 6] = ["dx90.vtx", "dx80.vtx", "dx11.vtx", "sw.vtx", "xbox.vtx", "vtx"];

/// `OptimizedModel::FileHeader_t`. Only the header is exposed, strip data is not decoded.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct VtxHeader {
    pub version: I32<LE>,

    pub vertex_cache_size: I32<LE>,
    pub max_bones_per_strip: U16<LE>,
    pub max_bones_per_tri: U16<LE>,
    pub max_bones_per_vertex: I32<LE>,

    /// Must match the mdl checksum.
    pub checksum: I32<LE>,

    pub lod_count: I32<LE>,

    pub material_replacement_list_offset: I32<LE>,

    pub body_part_count: I32<LE>,
    pub body_part_offset: I32<LE>,
}

impl Record for VtxHeader {
    const NAME: &'static str = "vtx header";
}

/// A vtx file held in memory.
#[derive(Clone)]
pub struct Vtx {
    bytes: Vec<u8>,
}

impl Vtx {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// # Errors
    ///
    /// Returns `Err` if reading fails.
    pub fn read(reader: impl Read) -> std::io::Result<Self> {
        read_file(reader).map(Self::from_bytes)
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a version.
    pub fn version(&self) -> Result<i32> {
        let version = self.bytes.get(0..4).ok_or(Error::Corrupted {
            ty: FileType::Vtx,
            error: "eof reading version",
        })?;
        Ok(LE::read_i32(version))
    }

    /// # Errors
    ///
    /// Returns `Err` if the version is not supported.
    pub fn check_version(&self) -> Result<i32> {
        let version = self.version()?;

        if version == VTX_VERSION {
            Ok(version)
        } else {
            Err(Error::UnsupportedVersion {
                ty: FileType::Vtx,
                version,
            })
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a header.
    pub fn header(&self) -> Result<VtxHeader> {
        VtxHeader::load(&self.bytes, 0).ok_or(Error::Corrupted {
            ty: FileType::Vtx,
            error: "eof reading header",
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a header.
    pub fn checksum(&self) -> Result<i32> {
        self.header().map(|header| header.checksum.get())
    }
}

impl fmt::Debug for Vtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vtx").finish_non_exhaustive()
    }
}
