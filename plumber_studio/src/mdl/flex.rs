use byteorder::LE;
use glam::Vec3;
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{vec3, F32};
use crate::Result;

use super::record::{Record, RecordArray, RecordRef, Records};

/// `mstudioflexdesc_t`, a facial action unit.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FlexDesc {
    pub facs_name_offset: I32<LE>,
}

impl Record for FlexDesc {
    const NAME: &'static str = "flex desc";
}

impl<'a> RecordRef<'a, FlexDesc> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.facs_name_offset.get(), "flex desc name is invalid")
    }
}

/// `mstudioflexcontroller_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FlexController {
    pub type_name_offset: I32<LE>,
    pub name_offset: I32<LE>,
    /// Runtime only.
    pub local_to_global: I32<LE>,
    pub min: F32,
    pub max: F32,
}

impl Record for FlexController {
    const NAME: &'static str = "flex controller";

    fn clear_runtime_fields(&mut self) {
        self.local_to_global = I32::new(0);
    }
}

impl FlexController {
    #[must_use]
    pub fn range(&self) -> (f32, f32) {
        (self.min.get(), self.max.get())
    }
}

impl<'a> RecordRef<'a, FlexController> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "flex controller name is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the type name is out of bounds or not valid utf8.
    pub fn type_name(&self) -> Result<&'a str> {
        self.string(
            self.type_name_offset.get(),
            "flex controller type name is invalid",
        )
    }
}

/// `mstudioflexrule_t`, an expression driving one flex desc.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FlexRule {
    pub flex: I32<LE>,
    pub op_count: I32<LE>,
    pub op_offset: I32<LE>,
}

impl Record for FlexRule {
    const NAME: &'static str = "flex rule";
}

impl<'a> RecordRef<'a, FlexRule> {
    /// Operations of the rule in postfix order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the operations are out of bounds.
    pub fn ops(&self) -> Result<Records<'a, FlexOp>> {
        self.children(RecordArray::new(
            self.op_count.get(),
            self.op_offset.get(),
        ))
    }
}

/// `mstudioflexop_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FlexOp {
    pub op: I32<LE>,
    /// An index, or a float for [`FlexOpKind::Const`].
    pub data: I32<LE>,
}

impl Record for FlexOp {
    const NAME: &'static str = "flex op";
}

/// `STUDIO_*` flex expression opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexOpKind {
    Const,
    Fetch1,
    Fetch2,
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Exp,
    Open,
    Close,
    Comma,
    Max,
    Min,
    TwoWay0,
    TwoWay1,
    NWay,
    Combo,
    Dominate,
    DmeLowerEyelid,
    DmeUpperEyelid,
    Unknown(i32),
}

impl FlexOp {
    #[must_use]
    pub fn kind(&self) -> FlexOpKind {
        match self.op.get() {
            1 => FlexOpKind::Const,
            2 => FlexOpKind::Fetch1,
            3 => FlexOpKind::Fetch2,
            4 => FlexOpKind::Add,
            5 => FlexOpKind::Sub,
            6 => FlexOpKind::Mul,
            7 => FlexOpKind::Div,
            8 => FlexOpKind::Neg,
            9 => FlexOpKind::Exp,
            10 => FlexOpKind::Open,
            11 => FlexOpKind::Close,
            12 => FlexOpKind::Comma,
            13 => FlexOpKind::Max,
            14 => FlexOpKind::Min,
            15 => FlexOpKind::TwoWay0,
            16 => FlexOpKind::TwoWay1,
            17 => FlexOpKind::NWay,
            18 => FlexOpKind::Combo,
            19 => FlexOpKind::Dominate,
            20 => FlexOpKind::DmeLowerEyelid,
            21 => FlexOpKind::DmeUpperEyelid,
            other => FlexOpKind::Unknown(other),
        }
    }

    #[must_use]
    pub fn index(&self) -> i32 {
        self.data.get()
    }

    #[must_use]
    pub fn value(&self) -> f32 {
        f32::from_bits(u32::from_ne_bytes(self.data.get().to_ne_bytes()))
    }
}

/// `mstudioflexcontrollerui_t`, how flex controllers are presented to an animator.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct FlexControllerUi {
    pub name_offset: I32<LE>,
    /// Offsets from this record to up to three flex controllers.
    pub controller_offsets: [I32<LE>; 3],
    pub remap_type: u8,
    pub stereo: u8,
    pub unused: [u8; 2],
}

impl Record for FlexControllerUi {
    const NAME: &'static str = "flex controller ui";
}

/// `FLEXCONTROLLER_REMAP_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexRemapType {
    PassThrough,
    TwoWay,
    NWay,
    Eyelid,
    Unknown(u8),
}

impl FlexControllerUi {
    #[must_use]
    pub fn remap_type(&self) -> FlexRemapType {
        match self.remap_type {
            0 => FlexRemapType::PassThrough,
            1 => FlexRemapType::TwoWay,
            2 => FlexRemapType::NWay,
            3 => FlexRemapType::Eyelid,
            other => FlexRemapType::Unknown(other),
        }
    }

    #[must_use]
    pub fn is_stereo(&self) -> bool {
        self.stereo != 0
    }
}

impl<'a> RecordRef<'a, FlexControllerUi> {
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        self.string(self.name_offset.get(), "flex controller ui name is invalid")
    }

    /// The controllers driven by this ui entry, skipping unset slots.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a controller is out of bounds.
    pub fn controllers(&self) -> Result<Vec<RecordRef<'a, FlexController>>> {
        let mut controllers = Vec::new();

        for offset in &self.controller_offsets {
            if offset.get() == 0 {
                continue;
            }
            controllers.extend(self.children(RecordArray::new(1, offset.get()))?);
        }

        Ok(controllers)
    }
}

/// `mstudiomouth_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct Mouth {
    pub bone: I32<LE>,
    pub forward: [F32; 3],
    pub flex_desc: I32<LE>,
}

impl Record for Mouth {
    const NAME: &'static str = "mouth";
}

impl Mouth {
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        vec3(self.forward)
    }
}

/// `mstudioboneflexdriver_t`, flex controllers driven by a bone's translation.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BoneFlexDriver {
    pub bone_index: I32<LE>,
    pub control_count: I32<LE>,
    pub control_offset: I32<LE>,
    pub unused: [I32<LE>; 3],
}

impl Record for BoneFlexDriver {
    const NAME: &'static str = "bone flex driver";
}

impl<'a> RecordRef<'a, BoneFlexDriver> {
    /// # Errors
    ///
    /// Returns `Err` if the controls are out of bounds.
    pub fn controls(&self) -> Result<Records<'a, BoneFlexDriverControl>> {
        self.children(RecordArray::new(
            self.control_count.get(),
            self.control_offset.get(),
        ))
    }
}

/// `mstudioboneflexdrivercontrol_t`
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct BoneFlexDriverControl {
    /// Translation component, 0 to 2 for x to z.
    pub bone_component: I32<LE>,
    pub flex_controller_index: I32<LE>,
    pub min: F32,
    pub max: F32,
}

impl Record for BoneFlexDriverControl {
    const NAME: &'static str = "bone flex driver control";
}
