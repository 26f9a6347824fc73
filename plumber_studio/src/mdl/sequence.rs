use byteorder::LE;
use glam::Vec3;
use zerocopy::{
    byteorder::{I16, I32},
    AsBytes, FromBytes, Unaligned,
};

use crate::binary_utils::{null_terminated_prefix, vec3, F32};
use crate::{Error, FileType, Result};

use super::animation::AnimationDescFlags;
use super::ik::IkLock;
use super::record::{Record, RecordArray, RecordRef, Records};

/// `mstudioseqdesc_t`, a playback unit blending animations over up to two axes.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Sequence {
    pub base_header_offset: I32<LE>,
    pub label_offset: I32<LE>,
    pub activity_name_offset: I32<LE>,
    pub flags: I32<LE>,
    /// Set by the game at load time.
    pub activity: I32<LE>,
    pub activity_weight: I32<LE>,

    pub event_count: I32<LE>,
    pub event_offset: I32<LE>,

    pub bb_min: [F32; 3],
    pub bb_max: [F32; 3],

    pub blend_count: I32<LE>,
    /// Table of `group_size[0] * group_size[1]` animation indexes.
    pub anim_index_offset: I32<LE>,
    pub movement_offset: I32<LE>,
    pub group_size: [I32<LE>; 2],
    pub param_index: [I32<LE>; 2],
    pub param_start: [F32; 2],
    pub param_end: [F32; 2],
    pub param_parent: I32<LE>,

    pub fade_in_time: F32,
    pub fade_out_time: F32,

    pub local_entry_node_index: I32<LE>,
    pub local_exit_node_index: I32<LE>,
    pub node_flags: I32<LE>,

    pub entry_phase: F32,
    pub exit_phase: F32,
    pub last_frame: F32,

    pub next_seq: I32<LE>,
    pub pose: I32<LE>,

    pub ik_rule_count: I32<LE>,
    pub auto_layer_count: I32<LE>,
    pub auto_layer_offset: I32<LE>,
    pub weight_list_offset: I32<LE>,
    pub pose_key_offset: I32<LE>,

    pub ik_lock_count: I32<LE>,
    pub ik_lock_offset: I32<LE>,
    pub key_value_offset: I32<LE>,
    pub key_value_size: I32<LE>,
    pub cycle_pose_index: I32<LE>,

    pub activity_modifier_offset: I32<LE>,
    pub activity_modifier_count: I32<LE>,

    pub unused: [I32<LE>; 5],
}

impl Record for Sequence {
    const NAME: &'static str = "sequence";
}

impl Sequence {
    #[must_use]
    pub fn flags(&self) -> AnimationDescFlags {
        AnimationDescFlags::from_bits_retain(self.flags.get())
    }

    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (vec3(self.bb_min), vec3(self.bb_max))
    }

    /// Width and height of the blend grid.
    #[must_use]
    pub fn group_size(&self) -> (usize, usize) {
        (
            usize::try_from(self.group_size[0].get()).unwrap_or_default(),
            usize::try_from(self.group_size[1].get()).unwrap_or_default(),
        )
    }

    /// `(parameter index, start, end)` of each blend axis, `None` where the axis is unused.
    #[must_use]
    pub fn blend_axes(&self) -> [Option<(usize, f32, f32)>; 2] {
        [0, 1].map(|axis| {
            usize::try_from(self.param_index[axis].get())
                .ok()
                .map(|index| (index, self.param_start[axis].get(), self.param_end[axis].get()))
        })
    }

    #[must_use]
    pub fn fade_times(&self) -> (f32, f32) {
        (self.fade_in_time.get(), self.fade_out_time.get())
    }

    /// Entry and exit transition nodes, `None` where the sequence has no node.
    #[must_use]
    pub fn transition_nodes(&self) -> (Option<usize>, Option<usize>) {
        let node = |index: i32| usize::try_from(index).ok().filter(|&i| i > 0).map(|i| i - 1);
        (
            node(self.local_entry_node_index.get()),
            node(self.local_exit_node_index.get()),
        )
    }

    #[must_use]
    pub fn events(&self) -> RecordArray {
        RecordArray::new(self.event_count.get(), self.event_offset.get())
    }

    #[must_use]
    pub fn auto_layers(&self) -> RecordArray {
        RecordArray::new(self.auto_layer_count.get(), self.auto_layer_offset.get())
    }

    #[must_use]
    pub fn ik_locks(&self) -> RecordArray {
        RecordArray::new(self.ik_lock_count.get(), self.ik_lock_offset.get())
    }
}

/// The animation indexes of a sequence, `width` columns by `height` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendGrid {
    pub width: usize,
    pub height: usize,
    pub indexes: Vec<i16>,
}

impl BlendGrid {
    /// Animation index at `(x, y)`, clamping out of range coordinates to the last column or row.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<i16> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.indexes.get(y * self.width + x).copied()
    }
}

impl<'a> RecordRef<'a, Sequence> {
    /// # Errors
    ///
    /// Returns `Err` if the label is out of bounds or not valid utf8.
    pub fn label(&self) -> Result<&'a str> {
        self.string(self.label_offset.get(), "sequence label is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the activity name is out of bounds or not valid utf8.
    pub fn activity_name(&self) -> Result<Option<&'a str>> {
        self.optional_string(
            self.activity_name_offset.get(),
            "sequence activity name is invalid",
        )
    }

    /// # Errors
    ///
    /// Returns `Err` if the events are out of bounds.
    pub fn events(&self) -> Result<Records<'a, Event>> {
        self.children(self.record().events())
    }

    /// # Errors
    ///
    /// Returns `Err` if the animation index table is out of bounds.
    pub fn blend_grid(&self) -> Result<BlendGrid> {
        let (width, height) = self.group_size();
        let count = width.checked_mul(height).ok_or(Error::Corrupted {
            ty: FileType::Mdl,
            error: "sequence blend grid is too large",
        })?;

        let indexes: &[I16<LE>] = self.values(
            RecordArray::new(
                i32::try_from(count).unwrap_or(-1),
                self.anim_index_offset.get(),
            ),
            "sequence animation indexes",
        )?;

        Ok(BlendGrid {
            width,
            height,
            indexes: indexes.iter().map(|i| i.get()).collect(),
        })
    }

    /// Animation index at `(x, y)` of the blend grid, see [`BlendGrid::get`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the animation index table is out of bounds.
    pub fn animation_index(&self, x: usize, y: usize) -> Result<Option<usize>> {
        Ok(self
            .blend_grid()?
            .get(x, y)
            .and_then(|index| usize::try_from(index).ok()))
    }

    /// # Errors
    ///
    /// Returns `Err` if the auto layers are out of bounds.
    pub fn auto_layers(&self) -> Result<Records<'a, AutoLayer>> {
        self.children(self.record().auto_layers())
    }

    /// # Errors
    ///
    /// Returns `Err` if the ik locks are out of bounds.
    pub fn ik_locks(&self) -> Result<Records<'a, IkLock>> {
        self.children(self.record().ik_locks())
    }

    /// Per bone blend weights.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the weight list is out of bounds.
    pub fn bone_weights(&self, bone_count: usize) -> Result<Vec<f32>> {
        let weights: &[F32] = self.values(
            RecordArray::new(
                i32::try_from(bone_count).unwrap_or(-1),
                self.weight_list_offset.get(),
            ),
            "sequence bone weights",
        )?;
        Ok(weights.iter().map(|w| w.get()).collect())
    }

    /// Pose parameter values of each blend grid column followed by each row.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the pose keys are out of bounds.
    pub fn pose_keys(&self) -> Result<Vec<f32>> {
        if self.pose_key_offset.get() == 0 {
            return Ok(Vec::new());
        }

        let (width, height) = self.group_size();
        let keys: &[F32] = self.values(
            RecordArray::new(
                i32::try_from(width + height).unwrap_or(-1),
                self.pose_key_offset.get(),
            ),
            "sequence pose keys",
        )?;
        Ok(keys.iter().map(|k| k.get()).collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if the activity modifiers are out of bounds.
    pub fn activity_modifiers(&self) -> Result<Records<'a, ActivityModifier>> {
        self.children(RecordArray::new(
            self.activity_modifier_count.get(),
            self.activity_modifier_offset.get(),
        ))
    }
}

/// `mstudioevent_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Event {
    pub cycle: F32,
    pub event: I32<LE>,
    pub kind: I32<LE>,
    pub options: [u8; 64],
    pub name_offset: I32<LE>,
}

impl Record for Event {
    const NAME: &'static str = "event";
}

impl Event {
    #[must_use]
    pub fn options(&self) -> &[u8] {
        null_terminated_prefix(&self.options).unwrap_or_default()
    }
}

impl<'a> RecordRef<'a, Event> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<Option<&'a str>> {
        self.optional_string(self.name_offset.get(), "event name is invalid")
    }
}

/// `mstudioautolayer_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct AutoLayer {
    pub sequence: I16<LE>,
    pub pose: I16<LE>,
    pub flags: I32<LE>,
    pub start: F32,
    pub peak: F32,
    pub tail: F32,
    pub end: F32,
}

impl Record for AutoLayer {
    const NAME: &'static str = "auto layer";
}

/// `mstudioactivitymodifier_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct ActivityModifier {
    pub name_offset: I32<LE>,
}

impl Record for ActivityModifier {
    const NAME: &'static str = "activity modifier";
}

impl<'a> RecordRef<'a, ActivityModifier> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "activity modifier name is invalid")
    }
}

/// `mstudioposeparamdesc_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct PoseParameter {
    pub name_offset: I32<LE>,
    pub flags: I32<LE>,
    pub start: F32,
    pub end: F32,
    /// Looping range, zero if the parameter does not wrap.
    pub loop_range: F32,
}

impl Record for PoseParameter {
    const NAME: &'static str = "pose parameter";
}

impl PoseParameter {
    #[must_use]
    pub fn range(&self) -> (f32, f32) {
        (self.start.get(), self.end.get())
    }
}

impl<'a> RecordRef<'a, PoseParameter> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "pose parameter name is invalid")
    }
}
