use byteorder::LE;
use glam::Vec3;
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{null_terminated_prefix, vec3, F32};
use crate::consts::MAX_LODS;
use crate::vvd::Vertex;
use crate::{Error, FileType, Result};

use super::record::{Record, RecordArray, RecordRef, Records};

/// `mstudiobodyparts_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BodyPart {
    pub name_offset: I32<LE>,
    pub model_count: I32<LE>,
    pub base: I32<LE>,
    pub model_offset: I32<LE>,
}

impl Record for BodyPart {
    const NAME: &'static str = "body part";
}

impl<'a> RecordRef<'a, BodyPart> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "body part name is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the models are out of bounds.
    pub fn models(&self) -> Result<Records<'a, Model>> {
        self.children(RecordArray::new(
            self.model_count.get(),
            self.model_offset.get(),
        ))
    }
}

/// `mstudiomodel_t`, one renderable sub-object of a body part.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Model {
    pub name: [u8; 64],
    /// Meaning unknown, kept as is.
    pub kind: I32<LE>,
    pub bounding_radius: F32,

    pub mesh_count: I32<LE>,
    pub mesh_offset: I32<LE>,

    pub vertex_count: I32<LE>,
    /// Byte offset into the vertex data of the vvd file.
    pub vertex_offset: I32<LE>,
    pub tangent_offset: I32<LE>,

    pub attachment_count: I32<LE>,
    pub attachment_offset: I32<LE>,

    pub eyeball_count: I32<LE>,
    pub eyeball_offset: I32<LE>,

    /// Runtime only.
    pub vertex_data_pointer: I32<LE>,
    /// Runtime only.
    pub tangent_data_pointer: I32<LE>,

    pub unused: [I32<LE>; 8],
}

impl Record for Model {
    const NAME: &'static str = "model";

    fn clear_runtime_fields(&mut self) {
        self.vertex_data_pointer = I32::new(0);
        self.tangent_data_pointer = I32::new(0);
    }
}

impl Model {
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius.get()
    }

    /// Index of the first vertex of this model in the vvd vertex array.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the vertex offset is negative or not a whole vertex.
    pub fn first_vertex(&self) -> Result<usize> {
        let offset = usize::try_from(self.vertex_offset.get()).map_err(|_| Error::Corrupted {
            ty: FileType::Mdl,
            error: "model vertex offset is negative",
        })?;

        if offset % Vertex::SIZE != 0 {
            return Err(Error::Corrupted {
                ty: FileType::Mdl,
                error: "model vertex offset is not vertex aligned",
            });
        }

        Ok(offset / Vertex::SIZE)
    }
}

impl<'a> RecordRef<'a, Model> {
    /// # Errors
    ///
    /// Returns `Err` if the name is not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        let name = self
            .bytes()
            .get(self.offset()..self.offset() + 64)
            .and_then(null_terminated_prefix)
            .ok_or(Error::Corrupted {
                ty: FileType::Mdl,
                error: "model name out of bounds",
            })?;

        std::str::from_utf8(name).map_err(|_| Error::Corrupted {
            ty: FileType::Mdl,
            error: "model name is not valid utf8",
        })
    }

    /// # Errors
    ///
    /// Returns `Err` if the meshes are out of bounds.
    pub fn meshes(&self) -> Result<Records<'a, Mesh>> {
        self.children(RecordArray::new(
            self.mesh_count.get(),
            self.mesh_offset.get(),
        ))
    }
}

/// `mstudiomesh_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Mesh {
    pub material_index: I32<LE>,
    /// Negative offset back to the owning model.
    pub model_offset: I32<LE>,

    pub vertex_count: I32<LE>,
    /// Relative to the first vertex of the model.
    pub vertex_index_start: I32<LE>,

    pub flex_count: I32<LE>,
    pub flex_offset: I32<LE>,

    /// Meaning unknown, kept as is.
    pub material_type: I32<LE>,
    /// Meaning unknown, kept as is.
    pub material_param: I32<LE>,

    /// Unique ordinal of this mesh.
    pub id: I32<LE>,
    pub center: [F32; 3],

    /// Runtime only.
    pub vertex_data_pointer: I32<LE>,
    pub lod_vertex_counts: [I32<LE>; MAX_LODS],

    pub unused: [I32<LE>; 8],
}

impl Record for Mesh {
    const NAME: &'static str = "mesh";

    fn clear_runtime_fields(&mut self) {
        self.vertex_data_pointer = I32::new(0);
    }
}

impl Mesh {
    #[must_use]
    pub fn center(&self) -> Vec3 {
        vec3(self.center)
    }

    #[must_use]
    pub fn flexes(&self) -> RecordArray {
        RecordArray::new(self.flex_count.get(), self.flex_offset.get())
    }

    /// Vertex range of this mesh within its model.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the start or count is negative.
    pub fn vertex_range(&self) -> Result<std::ops::Range<usize>> {
        let start = usize::try_from(self.vertex_index_start.get()).map_err(|_| Error::Corrupted {
            ty: FileType::Mdl,
            error: "mesh vertex index start is negative",
        })?;
        let count = usize::try_from(self.vertex_count.get()).map_err(|_| Error::Corrupted {
            ty: FileType::Mdl,
            error: "mesh vertex count is negative",
        })?;

        Ok(start..start + count)
    }
}

/// `mstudiomodelgroup_t`, an included model file.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct ModelGroup {
    pub label_offset: I32<LE>,
    pub file_name_offset: I32<LE>,
}

impl Record for ModelGroup {
    const NAME: &'static str = "include model";
}

impl<'a> RecordRef<'a, ModelGroup> {
    /// # Errors
    ///
    /// Returns `Err` if the label is out of bounds or not valid utf8.
    pub fn label(&self) -> Result<Option<&'a str>> {
        self.optional_string(self.label_offset.get(), "include model label is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the file name is out of bounds or not valid utf8.
    pub fn file_name(&self) -> Result<&'a str> {
        self.string(
            self.file_name_offset.get(),
            "include model file name is invalid",
        )
    }
}
