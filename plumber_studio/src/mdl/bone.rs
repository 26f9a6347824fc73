use bitflags::bitflags;
use byteorder::LE;
use glam::{Mat4, Quat, Vec3, Vec4};
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{matrix_3x4, quat, vec3, F32};
use crate::Result;

use super::record::{Record, RecordArray, RecordRef, Records};

/// `mstudiobone_t`, one node of the skeleton.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Bone {
    pub name_offset: I32<LE>,
    /// `-1` for root bones.
    pub parent_bone_index: I32<LE>,
    /// `-1` means no controller.
    pub bone_controller_indexes: [I32<LE>; 6],

    pub position: [F32; 3],
    pub quat: [F32; 4],
    /// Euler angles in radians.
    pub rotation: [F32; 3],
    pub position_scale: [F32; 3],
    pub rotation_scale: [F32; 3],

    pub pose_to_bone: [F32; 12],

    pub q_alignment: [F32; 4],

    pub flags: I32<LE>,

    pub procedural_rule_type: I32<LE>,
    pub procedural_rule_offset: I32<LE>,
    pub physics_bone_index: I32<LE>,
    pub surface_prop_name_offset: I32<LE>,
    /// `CONTENTS_*` flags of the bsp format.
    pub contents: I32<LE>,

    pub unused: [I32<LE>; 8],
}

impl Record for Bone {
    const NAME: &'static str = "bone";
}

impl Bone {
    #[must_use]
    pub fn parent(&self) -> Option<usize> {
        usize::try_from(self.parent_bone_index.get()).ok()
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        vec3(self.position)
    }

    #[must_use]
    pub fn quat(&self) -> Quat {
        quat(self.quat)
    }

    #[must_use]
    pub fn rotation(&self) -> Vec3 {
        vec3(self.rotation)
    }

    #[must_use]
    pub fn position_scale(&self) -> Vec3 {
        vec3(self.position_scale)
    }

    #[must_use]
    pub fn rotation_scale(&self) -> Vec3 {
        vec3(self.rotation_scale)
    }

    #[must_use]
    pub fn q_alignment(&self) -> Quat {
        quat(self.q_alignment)
    }

    /// Row-major 3x4 pose to bone transform.
    #[must_use]
    pub fn pose_to_bone(&self) -> [[f32; 4]; 3] {
        matrix_3x4(self.pose_to_bone)
    }

    #[must_use]
    pub fn pose_to_bone_matrix(&self) -> Mat4 {
        let [r0, r1, r2] = self.pose_to_bone();
        Mat4::from_cols(
            Vec4::new(r0[0], r1[0], r2[0], 0.0),
            Vec4::new(r0[1], r1[1], r2[1], 0.0),
            Vec4::new(r0[2], r1[2], r2[2], 0.0),
            Vec4::new(r0[3], r1[3], r2[3], 1.0),
        )
    }

    #[must_use]
    pub fn flags(&self) -> BoneFlags {
        BoneFlags::from_bits_retain(self.flags.get())
    }

    /// Bone controller indexes per degree of freedom, `None` where unused.
    pub fn bone_controllers(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.bone_controller_indexes
            .iter()
            .map(|index| usize::try_from(index.get()).ok())
    }

    #[must_use]
    pub fn physics_bone(&self) -> Option<usize> {
        usize::try_from(self.physics_bone_index.get()).ok()
    }
}

impl<'a> RecordRef<'a, Bone> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "bone name is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface prop is out of bounds or not valid utf8.
    pub fn surface_prop(&self) -> Result<Option<&'a str>> {
        self.optional_string(
            self.surface_prop_name_offset.get(),
            "bone surface prop is invalid",
        )
    }
}

bitflags! {
    /// `BONE_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BoneFlags: i32 {
        const PHYSICALLY_SIMULATED = 0x01;
        const PHYSICS_PROCEDURAL = 0x02;
        const ALWAYS_PROCEDURAL = 0x04;
        const SCREEN_ALIGN_SPHERE = 0x08;
        const SCREEN_ALIGN_CYLINDER = 0x10;
        const USED_BY_HITBOX = 0x100;
        const USED_BY_ATTACHMENT = 0x200;
        const USED_BY_VERTEX_LOD0 = 0x400;
        const USED_BY_VERTEX_LOD1 = 0x800;
        const USED_BY_VERTEX_LOD2 = 0x1000;
        const USED_BY_VERTEX_LOD3 = 0x2000;
        const USED_BY_VERTEX_LOD4 = 0x4000;
        const USED_BY_VERTEX_LOD5 = 0x8000;
        const USED_BY_VERTEX_LOD6 = 0x10000;
        const USED_BY_VERTEX_LOD7 = 0x20000;
        const USED_BY_BONE_MERGE = 0x40000;
        const FIXED_ALIGNMENT = 0x0010_0000;
        const HAS_SAVEFRAME_POS = 0x0020_0000;
        const HAS_SAVEFRAME_ROT = 0x0040_0000;
    }
}

/// `mstudiobonecontroller_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BoneController {
    pub bone_index: I32<LE>,
    /// `STUDIO_X` and friends.
    pub kind: I32<LE>,
    pub start: F32,
    pub end: F32,
    pub rest_index: I32<LE>,
    pub input_field: I32<LE>,
    pub unused: [I32<LE>; 8],
}

impl Record for BoneController {
    const NAME: &'static str = "bone controller";
}

/// `mstudiohitboxset_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct HitboxSet {
    pub name_offset: I32<LE>,
    pub hitbox_count: I32<LE>,
    pub hitbox_offset: I32<LE>,
}

impl Record for HitboxSet {
    const NAME: &'static str = "hitbox set";
}

impl<'a> RecordRef<'a, HitboxSet> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "hitbox set name is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the hitboxes are out of bounds.
    pub fn hitboxes(&self) -> Result<Records<'a, Hitbox>> {
        self.children(RecordArray::new(
            self.hitbox_count.get(),
            self.hitbox_offset.get(),
        ))
    }
}

/// `mstudiobbox_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Hitbox {
    pub bone_index: I32<LE>,
    pub group: I32<LE>,
    pub bb_min: [F32; 3],
    pub bb_max: [F32; 3],
    pub name_offset: I32<LE>,
    pub unused: [I32<LE>; 8],
}

impl Record for Hitbox {
    const NAME: &'static str = "hitbox";
}

impl Hitbox {
    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (vec3(self.bb_min), vec3(self.bb_max))
    }
}

impl<'a> RecordRef<'a, Hitbox> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<Option<&'a str>> {
        self.optional_string(self.name_offset.get(), "hitbox name is invalid")
    }
}

/// `mstudiosrcbonetransform_t`, stored in header 2.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BoneTransform {
    pub name_offset: I32<LE>,
    pub pre_transform: [F32; 12],
    pub post_transform: [F32; 12],
}

impl Record for BoneTransform {
    const NAME: &'static str = "source bone transform";
}

impl BoneTransform {
    #[must_use]
    pub fn pre_transform(&self) -> [[f32; 4]; 3] {
        matrix_3x4(self.pre_transform)
    }

    #[must_use]
    pub fn post_transform(&self) -> [[f32; 4]; 3] {
        matrix_3x4(self.post_transform)
    }
}

impl<'a> RecordRef<'a, BoneTransform> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "source bone transform name is invalid")
    }
}

/// `mstudiolinearbone_t`, a structure of arrays copy of the bone table.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct LinearBone {
    pub bone_count: I32<LE>,
    pub flags_offset: I32<LE>,
    pub parent_offset: I32<LE>,
    pub pos_offset: I32<LE>,
    pub quat_offset: I32<LE>,
    pub rot_offset: I32<LE>,
    pub pose_to_bone_offset: I32<LE>,
    pub pos_scale_offset: I32<LE>,
    pub rot_scale_offset: I32<LE>,
    pub q_alignment_offset: I32<LE>,
    pub unused: [I32<LE>; 6],
}

impl Record for LinearBone {
    const NAME: &'static str = "linear bone table";
}

impl<'a> RecordRef<'a, LinearBone> {
    /// # Errors
    ///
    /// Returns `Err` if the parent array is out of bounds.
    pub fn parents(&self) -> Result<Vec<i32>> {
        let parents: &[I32<LE>] = self.values(
            RecordArray::new(self.bone_count.get(), self.parent_offset.get()),
            "linear bone parents",
        )?;
        Ok(parents.iter().map(|p| p.get()).collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if the flag array is out of bounds.
    pub fn flags(&self) -> Result<Vec<BoneFlags>> {
        let flags: &[I32<LE>] = self.values(
            RecordArray::new(self.bone_count.get(), self.flags_offset.get()),
            "linear bone flags",
        )?;
        Ok(flags
            .iter()
            .map(|f| BoneFlags::from_bits_retain(f.get()))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if the position array is out of bounds.
    pub fn positions(&self) -> Result<Vec<Vec3>> {
        let positions: &[[F32; 3]] = self.values(
            RecordArray::new(self.bone_count.get(), self.pos_offset.get()),
            "linear bone positions",
        )?;
        Ok(positions.iter().map(|&p| vec3(p)).collect())
    }
}
