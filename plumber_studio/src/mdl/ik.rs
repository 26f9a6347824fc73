use byteorder::LE;
use glam::Vec3;
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{vec3, F32};
use crate::Result;

use super::record::{Record, RecordArray, RecordRef, Records};

/// `mstudioikchain_t`, a chain of bones solved by inverse kinematics.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct IkChain {
    pub name_offset: I32<LE>,
    pub link_type: I32<LE>,
    pub link_count: I32<LE>,
    pub link_offset: I32<LE>,
}

impl Record for IkChain {
    const NAME: &'static str = "ik chain";
}

impl<'a> RecordRef<'a, IkChain> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "ik chain name is invalid")
    }

    /// Links from the chain root to the end effector.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the links are out of bounds.
    pub fn links(&self) -> Result<Records<'a, IkLink>> {
        self.children(RecordArray::new(
            self.link_count.get(),
            self.link_offset.get(),
        ))
    }
}

/// `mstudioiklink_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct IkLink {
    pub bone: I32<LE>,
    pub ideal_bending_direction: [F32; 3],
    pub unused: [F32; 3],
}

impl Record for IkLink {
    const NAME: &'static str = "ik link";
}

impl IkLink {
    #[must_use]
    pub fn bone(&self) -> Option<usize> {
        usize::try_from(self.bone.get()).ok()
    }

    #[must_use]
    pub fn ideal_bending_direction(&self) -> Vec3 {
        vec3(self.ideal_bending_direction)
    }
}

/// `mstudioiklock_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct IkLock {
    pub chain: I32<LE>,
    pub pos_weight: F32,
    pub local_q_weight: F32,
    pub flags: I32<LE>,
    pub unused: [I32<LE>; 4],
}

impl Record for IkLock {
    const NAME: &'static str = "ik lock";
}

impl IkLock {
    #[must_use]
    pub fn chain(&self) -> Option<usize> {
        usize::try_from(self.chain.get()).ok()
    }
}
