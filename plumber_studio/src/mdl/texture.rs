use byteorder::LE;
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::Result;

use super::record::{Record, RecordRef};

/// `mstudiotexture_t`, a material reference.
///
/// The material path is found by joining one of the texture directories with the name.
/// The layout carries the `unused1` slot of the public SDK, so the runtime material pointers
/// sit at +16 and +20.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Texture {
    pub name_offset: I32<LE>,
    pub flags: I32<LE>,
    pub used: I32<LE>,
    pub unused_1: I32<LE>,
    /// Runtime only.
    pub material_pointer: I32<LE>,
    /// Runtime only.
    pub client_material_pointer: I32<LE>,
    pub unused: [I32<LE>; 10],
}

impl Record for Texture {
    const NAME: &'static str = "texture";

    fn clear_runtime_fields(&mut self) {
        self.material_pointer = I32::new(0);
        self.client_material_pointer = I32::new(0);
    }
}

impl<'a> RecordRef<'a, Texture> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "texture name is invalid")
    }
}
