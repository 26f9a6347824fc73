use byteorder::LE;
use glam::Vec3;
use zerocopy::{
    byteorder::{I32, U32},
    AsBytes, FromBytes, Unaligned,
};

use crate::binary_utils::{matrix_3x4, F32};
use crate::Result;

use super::record::{Record, RecordRef};

/// `mstudioattachment_t`, a named transform relative to a bone.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Attachment {
    pub name_offset: I32<LE>,
    pub flags: U32<LE>,
    pub local_bone_index: I32<LE>,
    pub matrix: [F32; 12],
    pub unused: [I32<LE>; 8],
}

impl Record for Attachment {
    const NAME: &'static str = "attachment";
}

impl Attachment {
    #[must_use]
    pub fn bone(&self) -> Option<usize> {
        usize::try_from(self.local_bone_index.get()).ok()
    }

    /// Row-major 3x4 transform relative to the bone.
    #[must_use]
    pub fn matrix(&self) -> [[f32; 4]; 3] {
        matrix_3x4(self.matrix)
    }

    #[must_use]
    pub fn translation(&self) -> Vec3 {
        let [r0, r1, r2] = self.matrix();
        Vec3::new(r0[3], r1[3], r2[3])
    }
}

impl<'a> RecordRef<'a, Attachment> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "attachment name is invalid")
    }
}
