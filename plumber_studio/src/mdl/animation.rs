use bitflags::bitflags;
use byteorder::LE;
use glam::{Quat, Vec3};
use zerocopy::{
    byteorder::{I16, I32},
    AsBytes, FromBytes, Unaligned,
};

use crate::binary_utils::{quat, vec3, F32};
use crate::Result;

use super::record::{Record, RecordArray, RecordRef, Records};

bitflags! {
    /// `STUDIO_*` flags shared by animation and sequence descriptions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AnimationDescFlags: i32 {
        const LOOPING = 0x0001;
        const SNAP = 0x0002;
        const DELTA = 0x0004;
        const AUTOPLAY = 0x0008;
        const POST = 0x0010;
        const ALL_ZEROS = 0x0020;
        const FRAME_ANIM = 0x0040;
        const CYCLE_POSE = 0x0080;
        const REALTIME = 0x0100;
        const LOCAL = 0x0200;
        const HIDDEN = 0x0400;
        const OVERRIDE = 0x0800;
        const ACTIVITY = 0x1000;
        const EVENT = 0x2000;
        const WORLD = 0x4000;
        const NO_FORCE_LOOP = 0x8000;
        const EVENT_CLIENT = 0x0001_0000;
    }
}

/// `mstudioanimdesc_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Animation {
    /// Negative offset back to the studio header.
    pub base_header_offset: I32<LE>,
    pub name_offset: I32<LE>,
    pub fps: F32,
    pub flags: I32<LE>,
    pub frame_count: I32<LE>,

    pub movement_count: I32<LE>,
    pub movement_offset: I32<LE>,

    pub ik_rule_zero_frame_offset: I32<LE>,
    pub unused: [I32<LE>; 5],

    /// Non-zero when the animation data lives in an animation block.
    pub anim_block: I32<LE>,
    pub anim_offset: I32<LE>,

    pub ik_rule_count: I32<LE>,
    pub ik_rule_offset: I32<LE>,
    pub anim_block_ik_rule_offset: I32<LE>,

    pub local_hierarchy_count: I32<LE>,
    pub local_hierarchy_offset: I32<LE>,

    pub section_offset: I32<LE>,
    /// Frames per fast lookup section, zero if sections are not used.
    pub section_frame_count: I32<LE>,

    pub zero_frame_span: I16<LE>,
    pub zero_frame_count: I16<LE>,
    pub zero_frame_offset: I32<LE>,
    pub zero_frame_stall_time: F32,
}

impl Record for Animation {
    const NAME: &'static str = "animation";
}

/// Where the frame data of an [`Animation`] is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStorage {
    /// In the mdl, relative to the animation description.
    Inline { offset: i32 },
    /// In an external animation block, relative to the block start.
    Block { block: usize, offset: i32 },
    /// Split into sections of `frames_per_section` frames each.
    Sections { frames_per_section: usize },
}

impl Animation {
    #[must_use]
    pub fn fps(&self) -> f32 {
        self.fps.get()
    }

    #[must_use]
    pub fn flags(&self) -> AnimationDescFlags {
        AnimationDescFlags::from_bits_retain(self.flags.get())
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        usize::try_from(self.frame_count.get()).unwrap_or_default()
    }

    #[must_use]
    pub fn storage(&self) -> AnimationStorage {
        if let Ok(frames_per_section @ 1..) = usize::try_from(self.section_frame_count.get()) {
            return AnimationStorage::Sections { frames_per_section };
        }

        match usize::try_from(self.anim_block.get()) {
            Ok(block @ 1..) => AnimationStorage::Block {
                block,
                offset: self.anim_offset.get(),
            },
            _ => AnimationStorage::Inline {
                offset: self.anim_offset.get(),
            },
        }
    }

    /// Number of entries in the section table, including the separately stored last frame.
    #[must_use]
    pub fn section_count(&self) -> usize {
        match self.storage() {
            AnimationStorage::Sections { frames_per_section } => {
                self.frame_count() / frames_per_section + 2
            }
            _ => 0,
        }
    }

    /// Maps a frame to `(section, frame within section)` for sectioned animations.
    ///
    /// The last frame of an animation longer than one section is stored in its own section.
    #[must_use]
    pub fn section_frame(&self, frame: usize) -> Option<(usize, usize)> {
        let AnimationStorage::Sections { frames_per_section } = self.storage() else {
            return None;
        };
        let frame_count = self.frame_count();

        if frame >= frame_count {
            return None;
        }

        if frame_count > frames_per_section && frame == frame_count - 1 {
            return Some((frame_count / frames_per_section + 1, 0));
        }

        let section = frame / frames_per_section;
        Some((section, frame - section * frames_per_section))
    }

    #[must_use]
    pub fn movements(&self) -> RecordArray {
        RecordArray::new(self.movement_count.get(), self.movement_offset.get())
    }

    #[must_use]
    pub fn ik_rules(&self) -> RecordArray {
        RecordArray::new(self.ik_rule_count.get(), self.ik_rule_offset.get())
    }

    #[must_use]
    pub fn local_hierarchy(&self) -> RecordArray {
        RecordArray::new(
            self.local_hierarchy_count.get(),
            self.local_hierarchy_offset.get(),
        )
    }
}

impl<'a> RecordRef<'a, Animation> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "animation name is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the movements are out of bounds.
    pub fn movements(&self) -> Result<Records<'a, Movement>> {
        self.children(self.record().movements())
    }

    /// # Errors
    ///
    /// Returns `Err` if the section table is out of bounds.
    pub fn sections(&self) -> Result<Records<'a, AnimationSection>> {
        let count = i32::try_from(self.section_count()).unwrap_or(i32::MAX);
        self.children(RecordArray::new(count, self.section_offset.get()))
    }

    /// Ik rules stored in the mdl. Rules stored in an animation block are not resolved.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the ik rules are out of bounds.
    pub fn ik_rules(&self) -> Result<Records<'a, IkRule>> {
        if self.anim_block.get() != 0 && self.ik_rule_offset.get() == 0 {
            return self.children(RecordArray::default());
        }
        self.children(self.record().ik_rules())
    }

    /// # Errors
    ///
    /// Returns `Err` if the local hierarchy is out of bounds.
    pub fn local_hierarchy(&self) -> Result<Records<'a, LocalHierarchy>> {
        self.children(self.record().local_hierarchy())
    }
}

/// `mstudiomovement_t`, piecewise movement of an animation.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Movement {
    pub end_frame_index: I32<LE>,
    pub motion_flags: I32<LE>,
    /// Velocity at start of block.
    pub v0: F32,
    /// Velocity at end of block.
    pub v1: F32,
    /// YAW rotation at end of block.
    pub angle: F32,
    pub vector: [F32; 3],
    pub position: [F32; 3],
}

impl Record for Movement {
    const NAME: &'static str = "movement";
}

impl Movement {
    #[must_use]
    pub fn vector(&self) -> Vec3 {
        vec3(self.vector)
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        vec3(self.position)
    }
}

/// `mstudioanimsections_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct AnimationSection {
    pub anim_block: I32<LE>,
    pub anim_offset: I32<LE>,
}

impl Record for AnimationSection {
    const NAME: &'static str = "animation section";
}

/// `mstudioanimblock_t`, a byte range of the external animation file.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct AnimationBlock {
    pub data_start: I32<LE>,
    pub data_end: I32<LE>,
}

impl Record for AnimationBlock {
    const NAME: &'static str = "animation block";
}

impl AnimationBlock {
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_end
            .get()
            .checked_sub(self.data_start.get())
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `mstudioikrule_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct IkRule {
    pub index: I32<LE>,
    pub kind: I32<LE>,
    pub chain: I32<LE>,
    pub bone: I32<LE>,

    pub slot: I32<LE>,
    pub height: F32,
    pub radius: F32,
    pub floor: F32,

    pub pos: [F32; 3],
    pub q: [F32; 4],

    pub compressed_ik_error_offset: I32<LE>,
    pub unused_1: I32<LE>,
    pub ik_error_index_start: I32<LE>,
    pub ik_error_offset: I32<LE>,

    pub influence_start: F32,
    pub influence_peak: F32,
    pub influence_tail: F32,
    pub influence_end: F32,

    pub unused_2: F32,
    pub contact: F32,
    pub drop: F32,
    pub top: F32,

    pub unused_3: I32<LE>,
    pub unused_4: I32<LE>,
    pub unused_5: I32<LE>,

    pub attachment_name_offset: I32<LE>,

    pub unused: [I32<LE>; 7],
}

impl Record for IkRule {
    const NAME: &'static str = "ik rule";
}

impl IkRule {
    #[must_use]
    pub fn position(&self) -> Vec3 {
        vec3(self.pos)
    }

    #[must_use]
    pub fn rotation(&self) -> Quat {
        quat(self.q)
    }
}

impl<'a> RecordRef<'a, IkRule> {
    /// # Errors
    ///
    /// Returns `Err` if the attachment name is out of bounds or not valid utf8.
    pub fn attachment_name(&self) -> Result<Option<&'a str>> {
        self.optional_string(
            self.attachment_name_offset.get(),
            "ik rule attachment name is invalid",
        )
    }
}

/// `mstudiolocalhierarchy_t`, a temporary reparenting of a bone during an animation.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct LocalHierarchy {
    pub bone_index: I32<LE>,
    pub bone_new_parent_index: I32<LE>,

    pub start_influence: F32,
    pub peak_influence: F32,
    pub tail_influence: F32,
    pub end_influence: F32,

    pub start_frame_index: I32<LE>,
    pub local_anim_offset: I32<LE>,
    pub unused: [I32<LE>; 4],
}

impl Record for LocalHierarchy {
    const NAME: &'static str = "local hierarchy";
}
