//! Numeric limits and identifiers of the studio model file family.

pub const MDL_ID: &[u8; 4] = b"IDST";
pub const VVD_ID: &[u8; 4] = b"IDSV";
pub const VVC_ID: &[u8; 4] = b"IDCV";

pub const MDL_MIN_VERSION: i32 = 48;
pub const MDL_MAX_VERSION: i32 = 52;

pub const MAX_TRIANGLES: usize = 65536;
pub const MAX_VERTICES: usize = 65536;
pub const MAX_FLEX_VERTICES: usize = 10000;
pub const MAX_SKINS: usize = 32;
pub const V48_MAX_BONES: usize = 128;
pub const V52_MAX_BONES: usize = 256;
pub const MAX_BONE_CONTROLLERS: usize = 4;
pub const MAX_BONE_BITS: u32 = 7;
pub const MAX_BONES_PER_VERTEX: usize = 3;
pub const MAX_FLEXES: usize = 1024;
pub const MAX_FLEX_CONTROLLERS: usize = 96;
pub const MAX_POSE_PARAMETERS: usize = 24;
pub const MAX_ANIMATION_BLOCKS: usize = 256;

pub const VVD_VERSION: i32 = 4;
pub const MAX_LODS: usize = 8;

pub const VTX_VERSION: i32 = 7;

/// Packs a four character tag the way the engine's `MAKEID` style macros do,
/// first character in the most significant byte.
#[must_use]
pub const fn make_magic(tag: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*tag)
}

pub const VVC_MAGIC_BE: u32 = make_magic(b"IDCV");
pub const VVC_MAGIC_LE: u32 = make_magic(b"VCDI");

#[must_use]
pub fn max_bones(version: i32) -> usize {
    if version >= 52 {
        V52_MAX_BONES
    } else {
        V48_MAX_BONES
    }
}
