use std::ops::Range;

use bitflags::bitflags;
use byteorder::LE;
use glam::Vec3;
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{null_terminated_prefix, vec3, F32};
use crate::consts;

use super::record::{Record, RecordArray};

/// `studiohdr_t`, found at the start of every mdl file.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct StudioHeader {
    pub id: [u8; 4],
    pub version: I32<LE>,
    /// Must match the checksum in the vvd, vtx and phy files of the same model.
    pub checksum: I32<LE>,
    pub name: [u8; 64],
    pub data_length: I32<LE>,

    pub eye_position: [F32; 3],
    pub illum_position: [F32; 3],
    pub hull_min: [F32; 3],
    pub hull_max: [F32; 3],
    pub view_bb_min: [F32; 3],
    pub view_bb_max: [F32; 3],

    pub flags: I32<LE>,

    pub bone_count: I32<LE>,
    pub bone_offset: I32<LE>,

    pub bone_controller_count: I32<LE>,
    pub bone_controller_offset: I32<LE>,

    pub hitbox_set_count: I32<LE>,
    pub hitbox_set_offset: I32<LE>,

    pub local_anim_count: I32<LE>,
    pub local_anim_offset: I32<LE>,

    pub local_seq_count: I32<LE>,
    pub local_seq_offset: I32<LE>,

    pub activity_list_version: I32<LE>,
    pub events_indexed: I32<LE>,

    pub texture_count: I32<LE>,
    pub texture_offset: I32<LE>,

    pub texture_dir_count: I32<LE>,
    pub texture_dir_offset: I32<LE>,

    pub skin_reference_count: I32<LE>,
    pub skin_family_count: I32<LE>,
    pub skin_family_offset: I32<LE>,

    pub body_part_count: I32<LE>,
    pub body_part_offset: I32<LE>,

    pub attachment_count: I32<LE>,
    pub attachment_offset: I32<LE>,

    pub local_node_count: I32<LE>,
    pub local_node_offset: I32<LE>,
    pub local_node_name_offset: I32<LE>,

    pub flex_desc_count: I32<LE>,
    pub flex_desc_offset: I32<LE>,

    pub flex_controller_count: I32<LE>,
    pub flex_controller_offset: I32<LE>,

    pub flex_rule_count: I32<LE>,
    pub flex_rule_offset: I32<LE>,

    pub ik_chain_count: I32<LE>,
    pub ik_chain_offset: I32<LE>,

    pub mouth_count: I32<LE>,
    pub mouth_offset: I32<LE>,

    pub local_pose_param_count: I32<LE>,
    pub local_pose_param_offset: I32<LE>,

    pub surface_prop_offset: I32<LE>,

    pub key_value_offset: I32<LE>,
    pub key_value_size: I32<LE>,

    pub ik_autoplay_lock_count: I32<LE>,
    pub ik_autoplay_lock_offset: I32<LE>,

    pub mass: F32,
    pub contents: I32<LE>,

    pub include_model_count: I32<LE>,
    pub include_model_offset: I32<LE>,

    /// Runtime only.
    pub virtual_model: I32<LE>,

    pub anim_block_name_offset: I32<LE>,
    pub anim_block_count: I32<LE>,
    pub anim_block_offset: I32<LE>,

    /// Runtime only.
    pub anim_block_model: I32<LE>,

    pub bone_table_by_name_offset: I32<LE>,

    /// Runtime only, cached with the virtual model.
    pub vertex_base: I32<LE>,
    /// Runtime only, cached with the virtual model.
    pub index_base: I32<LE>,

    /// Only meaningful with [`HeaderFlags::CONSTANT_DIRECTIONAL_LIGHT_DOT`].
    pub directional_light_dot: u8,
    pub root_lod: u8,
    pub allowed_root_lod_count: u8,
    pub unused: u8,
    pub unused_2: I32<LE>,

    pub flex_controller_ui_count: I32<LE>,
    pub flex_controller_ui_offset: I32<LE>,

    /// Only meaningful with [`HeaderFlags::VERT_ANIM_FIXED_POINT_SCALE`].
    pub vert_anim_fixed_point_scale: F32,
    /// Cached by the engine at load time, never saved.
    pub surface_prop_lookup: I32<LE>,

    pub header_2_offset: I32<LE>,

    pub unused_3: I32<LE>,
}

impl Record for StudioHeader {
    const NAME: &'static str = "studio header";

    fn clear_runtime_fields(&mut self) {
        self.virtual_model = I32::new(0);
        self.anim_block_model = I32::new(0);
        self.vertex_base = I32::new(0);
        self.index_base = I32::new(0);
        self.surface_prop_lookup = I32::new(0);
    }
}

impl StudioHeader {
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version.get()
    }

    /// The embedded 64 byte name, without the null padding.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        null_terminated_prefix(&self.name).unwrap_or_default()
    }

    #[must_use]
    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_retain(self.flags.get())
    }

    /// Bone ceiling for this header's version.
    #[must_use]
    pub fn max_bones(&self) -> usize {
        consts::max_bones(self.version())
    }

    #[must_use]
    pub fn eye_position(&self) -> Vec3 {
        vec3(self.eye_position)
    }

    #[must_use]
    pub fn illum_position(&self) -> Vec3 {
        vec3(self.illum_position)
    }

    #[must_use]
    pub fn hull(&self) -> (Vec3, Vec3) {
        (vec3(self.hull_min), vec3(self.hull_max))
    }

    #[must_use]
    pub fn view_bounds(&self) -> (Vec3, Vec3) {
        (vec3(self.view_bb_min), vec3(self.view_bb_max))
    }

    #[must_use]
    pub fn mass(&self) -> f32 {
        self.mass.get()
    }

    /// Light intensity override for static props, normalized to `0..=1`.
    #[must_use]
    pub fn constant_directional_light_dot(&self) -> Option<f32> {
        self.flags()
            .contains(HeaderFlags::CONSTANT_DIRECTIONAL_LIGHT_DOT)
            .then(|| f32::from(self.directional_light_dot) / 255.0)
    }

    #[must_use]
    pub fn vert_anim_fixed_point_scale(&self) -> f32 {
        if self
            .flags()
            .contains(HeaderFlags::VERT_ANIM_FIXED_POINT_SCALE)
        {
            self.vert_anim_fixed_point_scale.get()
        } else {
            1.0 / 4096.0
        }
    }

    #[must_use]
    pub fn array(&self, kind: ArrayKind) -> RecordArray {
        let (count, offset) = match kind {
            ArrayKind::Bones => (self.bone_count, self.bone_offset),
            ArrayKind::BoneControllers => (self.bone_controller_count, self.bone_controller_offset),
            ArrayKind::HitboxSets => (self.hitbox_set_count, self.hitbox_set_offset),
            ArrayKind::Animations => (self.local_anim_count, self.local_anim_offset),
            ArrayKind::Sequences => (self.local_seq_count, self.local_seq_offset),
            ArrayKind::Textures => (self.texture_count, self.texture_offset),
            ArrayKind::TextureDirs => (self.texture_dir_count, self.texture_dir_offset),
            ArrayKind::SkinTable => {
                return RecordArray::new(self.skin_table_len(), self.skin_family_offset.get())
            }
            ArrayKind::BodyParts => (self.body_part_count, self.body_part_offset),
            ArrayKind::Attachments => (self.attachment_count, self.attachment_offset),
            ArrayKind::NodeNames => (self.local_node_count, self.local_node_name_offset),
            ArrayKind::NodeTransitions => {
                let count = self.local_node_count.get();
                let count = if count < 0 {
                    -1
                } else {
                    count.saturating_mul(count)
                };
                return RecordArray::new(count, self.local_node_offset.get());
            }
            ArrayKind::FlexDescs => (self.flex_desc_count, self.flex_desc_offset),
            ArrayKind::FlexControllers => (self.flex_controller_count, self.flex_controller_offset),
            ArrayKind::FlexRules => (self.flex_rule_count, self.flex_rule_offset),
            ArrayKind::IkChains => (self.ik_chain_count, self.ik_chain_offset),
            ArrayKind::Mouths => (self.mouth_count, self.mouth_offset),
            ArrayKind::PoseParameters => (self.local_pose_param_count, self.local_pose_param_offset),
            ArrayKind::IkAutoplayLocks => (self.ik_autoplay_lock_count, self.ik_autoplay_lock_offset),
            ArrayKind::IncludeModels => (self.include_model_count, self.include_model_offset),
            ArrayKind::AnimationBlocks => (self.anim_block_count, self.anim_block_offset),
            ArrayKind::FlexControllerUis => {
                (self.flex_controller_ui_count, self.flex_controller_ui_offset)
            }
            ArrayKind::KeyValues => (self.key_value_size, self.key_value_offset),
        };

        RecordArray::new(count.get(), offset.get())
    }

    /// Number of `i16` entries in the skin table, `-1` if either dimension is negative.
    fn skin_table_len(&self) -> i32 {
        let references = self.skin_reference_count.get();
        let families = self.skin_family_count.get();

        if references < 0 || families < 0 {
            -1
        } else {
            references.saturating_mul(families)
        }
    }
}

/// `studiohdr2_t`, located by [`StudioHeader::header_2_offset`].
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct StudioHeader2 {
    pub src_bone_transform_count: I32<LE>,
    pub src_bone_transform_offset: I32<LE>,

    pub illum_position_attachment_index: I32<LE>,

    /// Defaults to cos(30) when zero.
    pub max_eye_deflection: F32,

    pub linear_bone_offset: I32<LE>,

    pub name_offset: I32<LE>,

    pub bone_flex_driver_count: I32<LE>,
    pub bone_flex_driver_offset: I32<LE>,

    /// Room for later format revisions, never interpreted.
    pub reserved: [I32<LE>; 56],
}

/// Size of the part of [`StudioHeader2`] that precedes the reserved block.
pub(crate) const HEADER_2_KNOWN_SIZE: usize = 32;

/// Byte range of [`StudioHeader::name`], after the id, version and checksum.
pub(crate) const HEADER_NAME_RANGE: Range<usize> = 12..76;

impl Record for StudioHeader2 {
    const NAME: &'static str = "studio header 2";
}

impl StudioHeader2 {
    #[must_use]
    pub fn max_eye_deflection(&self) -> f32 {
        let value = self.max_eye_deflection.get();
        if value == 0.0 {
            0.866
        } else {
            value
        }
    }

    #[must_use]
    pub fn bone_transforms(&self) -> RecordArray {
        RecordArray::new(
            self.src_bone_transform_count.get(),
            self.src_bone_transform_offset.get(),
        )
    }

    #[must_use]
    pub fn bone_flex_drivers(&self) -> RecordArray {
        RecordArray::new(
            self.bone_flex_driver_count.get(),
            self.bone_flex_driver_offset.get(),
        )
    }

    /// Decodes the known fields from a block that may be shorter than the full record.
    pub(crate) fn read_known_prefix(bytes: &[u8], offset: usize) -> Option<Self> {
        let known = bytes.get(offset..offset.checked_add(HEADER_2_KNOWN_SIZE)?)?;

        let mut header = Self::zeroed();
        header.as_bytes_mut()[..HEADER_2_KNOWN_SIZE].copy_from_slice(known);
        Some(header)
    }
}

bitflags! {
    /// `STUDIOHDR_FLAGS_*`. Bits 19 and 20 are reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: i32 {
        /// No hitbox information was specified when compiling.
        const AUTO_GENERATED_HITBOX = 1 << 0;
        /// Set at load time.
        const USES_ENV_CUBEMAP = 1 << 1;
        /// Translucent parts are not sorted.
        const FORCE_OPAQUE = 1 << 2;
        /// Opaque parts render in the opaque pass, translucent parts in the translucent pass.
        const TRANSLUCENT_TWO_PASS = 1 << 3;
        /// `$staticprop`: no bones and no transforms.
        const STATIC_PROP = 1 << 4;
        /// Set at load time.
        const USES_FB_TEXTURE = 1 << 5;
        /// The last lod is a separate `$shadowlod`.
        const HAS_SHADOW_LOD = 1 << 6;
        /// Set at load time.
        const USES_BUMP_MAPPING = 1 << 7;
        /// Use the actual materials on the shadow lod.
        const USE_SHADOW_LOD_MATERIALS = 1 << 8;
        const OBSOLETE = 1 << 9;
        const UNUSED = 1 << 10;
        const NO_FORCED_FADE = 1 << 11;
        /// Viseme checks always include two phonemes.
        const FORCE_PHONEME_CROSS_FADE = 1 << 12;
        /// `$constantdirectionallight`, only valid together with `STATIC_PROP`.
        const CONSTANT_DIRECTIONAL_LIGHT_DOT = 1 << 13;
        /// Delta flexes were converted from disk format to memory format.
        const FLEXES_CONVERTED = 1 << 14;
        const BUILT_IN_PREVIEW_MODE = 1 << 15;
        /// Runtime flag.
        const AMBIENT_BOOST = 1 << 16;
        const DO_NOT_CAST_SHADOWS = 1 << 17;
        /// Alpha textures cast shadows in vrad, prop_static only.
        const CAST_TEXTURE_SHADOWS = 1 << 18;
        const VERT_ANIM_FIXED_POINT_SCALE = 1 << 21;
    }
}

/// The `(count, offset)` sub-array categories of [`StudioHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    Bones,
    BoneControllers,
    HitboxSets,
    Animations,
    Sequences,
    Textures,
    TextureDirs,
    SkinTable,
    BodyParts,
    Attachments,
    NodeNames,
    NodeTransitions,
    FlexDescs,
    FlexControllers,
    FlexRules,
    IkChains,
    Mouths,
    PoseParameters,
    IkAutoplayLocks,
    IncludeModels,
    AnimationBlocks,
    FlexControllerUis,
    KeyValues,
}

impl ArrayKind {
    pub const ALL: [Self; 23] = [
        Self::Bones,
        Self::BoneControllers,
        Self::HitboxSets,
        Self::Animations,
        Self::Sequences,
        Self::Textures,
        Self::TextureDirs,
        Self::SkinTable,
        Self::BodyParts,
        Self::Attachments,
        Self::NodeNames,
        Self::NodeTransitions,
        Self::FlexDescs,
        Self::FlexControllers,
        Self::FlexRules,
        Self::IkChains,
        Self::Mouths,
        Self::PoseParameters,
        Self::IkAutoplayLocks,
        Self::IncludeModels,
        Self::AnimationBlocks,
        Self::FlexControllerUis,
        Self::KeyValues,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bones => "bones",
            Self::BoneControllers => "bone controllers",
            Self::HitboxSets => "hitbox sets",
            Self::Animations => "animations",
            Self::Sequences => "sequences",
            Self::Textures => "textures",
            Self::TextureDirs => "texture dirs",
            Self::SkinTable => "skin table",
            Self::BodyParts => "body parts",
            Self::Attachments => "attachments",
            Self::NodeNames => "node names",
            Self::NodeTransitions => "node transitions",
            Self::FlexDescs => "flex descs",
            Self::FlexControllers => "flex controllers",
            Self::FlexRules => "flex rules",
            Self::IkChains => "ik chains",
            Self::Mouths => "mouths",
            Self::PoseParameters => "pose parameters",
            Self::IkAutoplayLocks => "ik autoplay locks",
            Self::IncludeModels => "include models",
            Self::AnimationBlocks => "animation blocks",
            Self::FlexControllerUis => "flex controller uis",
            Self::KeyValues => "key values",
        }
    }

    /// Size of one element of the array on disk.
    #[must_use]
    pub fn record_size(self) -> usize {
        use super::{animation, bone, flex, ik, model, sequence, texture};

        match self {
            Self::Bones => bone::Bone::SIZE,
            Self::BoneControllers => bone::BoneController::SIZE,
            Self::HitboxSets => bone::HitboxSet::SIZE,
            Self::Animations => animation::Animation::SIZE,
            Self::Sequences => sequence::Sequence::SIZE,
            Self::Textures => texture::Texture::SIZE,
            Self::TextureDirs | Self::NodeNames => 4,
            Self::SkinTable => 2,
            Self::BodyParts => model::BodyPart::SIZE,
            Self::Attachments => super::attachment::Attachment::SIZE,
            Self::NodeTransitions | Self::KeyValues => 1,
            Self::FlexDescs => flex::FlexDesc::SIZE,
            Self::FlexControllers => flex::FlexController::SIZE,
            Self::FlexRules => flex::FlexRule::SIZE,
            Self::IkChains => ik::IkChain::SIZE,
            Self::Mouths => flex::Mouth::SIZE,
            Self::PoseParameters => sequence::PoseParameter::SIZE,
            Self::IkAutoplayLocks => ik::IkLock::SIZE,
            Self::IncludeModels => model::ModelGroup::SIZE,
            Self::AnimationBlocks => animation::AnimationBlock::SIZE,
            Self::FlexControllerUis => flex::FlexControllerUi::SIZE,
        }
    }

    /// Upper bound on the element count for the given file version, if the engine has one.
    #[must_use]
    pub fn limit(self, version: i32) -> Option<usize> {
        match self {
            Self::Bones => Some(consts::max_bones(version)),
            Self::BoneControllers => Some(consts::MAX_BONE_CONTROLLERS),
            Self::FlexDescs => Some(consts::MAX_FLEXES),
            Self::FlexControllers => Some(consts::MAX_FLEX_CONTROLLERS),
            Self::PoseParameters => Some(consts::MAX_POSE_PARAMETERS),
            Self::AnimationBlocks => Some(consts::MAX_ANIMATION_BLOCKS),
            _ => None,
        }
    }
}
