mod animation;
mod attachment;
mod bone;
mod flex;
mod header;
mod ik;
mod model;
mod record;
mod sequence;
mod skeleton;
mod texture;

#[cfg(test)]
mod tests;

use std::{fmt, io::Read, str};

use byteorder::{ByteOrder, LE};
use glam::Vec3;
use itertools::Itertools;
use zerocopy::byteorder::{I16, I32};

use crate::binary_utils::{null_terminated_prefix, offset_from, read_file};
use crate::consts::{MAX_SKINS, MDL_ID, MDL_MAX_VERSION, MDL_MIN_VERSION};
use crate::{Error, FileType, Result};

pub use animation::{
    Animation, AnimationBlock, AnimationDescFlags, AnimationSection, AnimationStorage, IkRule,
    LocalHierarchy, Movement,
};
pub use attachment::Attachment;
pub use bone::{
    Bone, BoneController, BoneFlags, BoneTransform, Hitbox, HitboxSet, LinearBone,
};
pub use flex::{
    BoneFlexDriver, BoneFlexDriverControl, FlexController, FlexControllerUi, FlexDesc, FlexOp,
    FlexOpKind, FlexRemapType, FlexRule, Mouth,
};
pub use header::{ArrayKind, HeaderFlags, StudioHeader, StudioHeader2};
pub use ik::{IkChain, IkLink, IkLock};
pub use model::{BodyPart, Mesh, Model, ModelGroup};
pub use record::{Record, RecordArray, RecordRef, Records};
pub use sequence::{ActivityModifier, AutoLayer, BlendGrid, Event, PoseParameter, Sequence};
pub use skeleton::Skeleton;
pub use texture::Texture;

use header::{HEADER_2_KNOWN_SIZE, HEADER_NAME_RANGE};
use record::{read_string, resolve, resolve_values};

/// An mdl file held in memory.
#[derive(Clone)]
pub struct Mdl {
    bytes: Vec<u8>,
}

impl Mdl {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// # Errors
    ///
    /// Returns `Err` if reading fails.
    pub fn read(reader: impl Read) -> std::io::Result<Self> {
        read_file(reader).map(Self::from_bytes)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// # Errors
    ///
    /// Returns `Err` if the file does not start with `IDST`.
    pub fn check_signature(&self) -> Result<()> {
        let signature = self.bytes.get(0..4).ok_or(Error::Corrupted {
            ty: FileType::Mdl,
            error: "eof reading signature",
        })?;

        if signature == MDL_ID {
            Ok(())
        } else {
            Err(Error::InvalidSignature {
                ty: FileType::Mdl,
                signature: String::from_utf8_lossy(signature).into_owned(),
            })
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the file is too short to hold a version.
    pub fn version(&self) -> Result<i32> {
        let version = self.bytes.get(4..8).ok_or(Error::Corrupted {
            ty: FileType::Mdl,
            error: "eof reading version",
        })?;
        Ok(LE::read_i32(version))
    }

    /// # Errors
    ///
    /// Returns `Err` if the version is not supported.
    pub fn check_version(&self) -> Result<i32> {
        let version = self.version()?;

        if (MDL_MIN_VERSION..=MDL_MAX_VERSION).contains(&version) {
            Ok(version)
        } else {
            Err(Error::UnsupportedVersion {
                ty: FileType::Mdl,
                version,
            })
        }
    }

    /// Loads the studio header and its extension block, if any.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the version is unsupported or either header is out of bounds.
    pub fn header(&self) -> Result<HeaderRef> {
        self.check_version()?;

        let header = StudioHeader::load(&self.bytes, 0).ok_or(Error::Corrupted {
            ty: FileType::Mdl,
            error: "eof reading header",
        })?;

        let header_2 = match usize::try_from(header.header_2_offset.get()) {
            Ok(offset @ 1..) => Some((offset, self.header_2(offset)?)),
            _ => None,
        };

        Ok(HeaderRef {
            header,
            header_2,
            bytes: &self.bytes,
        })
    }

    fn header_2(&self, offset: usize) -> Result<StudioHeader2> {
        if let Some(header_2) = StudioHeader2::load(&self.bytes, offset) {
            return Ok(header_2);
        }

        let header_2 =
            StudioHeader2::read_known_prefix(&self.bytes, offset).ok_or(Error::Corrupted {
                ty: FileType::Mdl,
                error: "header 2 out of bounds",
            })?;

        tracing::debug!(
            "header 2 at {} is truncated after {} known bytes, treating reserved data as zero",
            offset,
            HEADER_2_KNOWN_SIZE,
        );

        Ok(header_2)
    }
}

impl fmt::Debug for Mdl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mdl").finish_non_exhaustive()
    }
}

/// A loaded studio header with access to everything it points at.
#[derive(Debug, Clone)]
pub struct HeaderRef<'a> {
    header: StudioHeader,
    header_2: Option<(usize, StudioHeader2)>,
    bytes: &'a [u8],
}

impl<'a> HeaderRef<'a> {
    #[must_use]
    pub fn header(&self) -> &StudioHeader {
        &self.header
    }

    #[must_use]
    pub fn header_2(&self) -> Option<&StudioHeader2> {
        self.header_2.as_ref().map(|(_, header_2)| header_2)
    }

    #[must_use]
    pub fn checksum(&self) -> i32 {
        self.header.checksum.get()
    }

    #[must_use]
    pub fn version(&self) -> i32 {
        self.header.version()
    }

    /// The model name, preferring the untruncated name from header 2.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the name is out of bounds or not valid utf8.
    pub fn name(&self) -> Result<&'a str> {
        if let Some((offset, header_2)) = &self.header_2 {
            if header_2.name_offset.get() > 0 {
                return read_string(
                    self.bytes,
                    offset_from(*offset, header_2.name_offset.get()),
                    "header 2 name is invalid",
                );
            }
        }

        let name = self
            .bytes
            .get(HEADER_NAME_RANGE)
            .and_then(null_terminated_prefix)
            .ok_or(Error::Corrupted {
                ty: FileType::Mdl,
                error: "eof reading header name",
            })?;

        str::from_utf8(name).map_err(|_| Error::Corrupted {
            ty: FileType::Mdl,
            error: "header name is not valid utf8",
        })
    }

    #[must_use]
    pub fn flags(&self) -> HeaderFlags {
        self.header.flags()
    }

    #[must_use]
    pub fn is_static_prop(&self) -> bool {
        self.flags().contains(HeaderFlags::STATIC_PROP)
    }

    #[must_use]
    pub fn mass(&self) -> f32 {
        self.header.mass()
    }

    #[must_use]
    pub fn eye_position(&self) -> Vec3 {
        self.header.eye_position()
    }

    #[must_use]
    pub fn hull(&self) -> (Vec3, Vec3) {
        self.header.hull()
    }

    #[must_use]
    pub fn view_bounds(&self) -> (Vec3, Vec3) {
        self.header.view_bounds()
    }

    /// # Errors
    ///
    /// Returns `Err` if the surface prop is out of bounds or not valid utf8.
    pub fn surface_prop(&self) -> Result<Option<&'a str>> {
        self.optional_string(self.header.surface_prop_offset.get(), "surface prop is invalid")
    }

    /// # Errors
    ///
    /// Returns `Err` if the animation block file name is out of bounds or not valid utf8.
    pub fn animation_block_name(&self) -> Result<Option<&'a str>> {
        self.optional_string(
            self.header.anim_block_name_offset.get(),
            "animation block name is invalid",
        )
    }

    /// The embedded key values text, `None` if the model has none.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the text is out of bounds or not valid utf8.
    pub fn key_values(&self) -> Result<Option<&'a str>> {
        let array = self.header.array(ArrayKind::KeyValues);
        if array.is_empty() {
            return Ok(None);
        }

        let text: &[u8] = resolve_values(self.bytes, 0, array, "key values")?;
        let text = null_terminated_prefix(text).unwrap_or_default();

        str::from_utf8(text).map(Some).map_err(|_| Error::Corrupted {
            ty: FileType::Mdl,
            error: "key values are not valid utf8",
        })
    }

    fn optional_string(&self, offset: i32, what: &'static str) -> Result<Option<&'a str>> {
        if offset == 0 {
            return Ok(None);
        }
        read_string(self.bytes, usize::try_from(offset).ok(), what).map(Some)
    }

    fn records<T: Record>(&self, kind: ArrayKind) -> Result<Records<'a, T>> {
        resolve(self.bytes, 0, self.header.array(kind))
    }

    /// Reads the strings behind a table of absolute string offsets. A zero offset is an empty string.
    fn string_table(&self, kind: ArrayKind) -> Result<Vec<&'a str>> {
        let offsets: &[I32<LE>] = resolve_values(self.bytes, 0, self.header.array(kind), kind.name())?;

        offsets
            .iter()
            .map(|offset| match offset.get() {
                0 => Ok(""),
                offset => read_string(self.bytes, usize::try_from(offset).ok(), kind.name()),
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns `Err` if the bones are out of bounds.
    pub fn bones(&self) -> Result<Records<'a, Bone>> {
        self.records(ArrayKind::Bones)
    }

    /// # Errors
    ///
    /// Returns `Err` if the bone controllers are out of bounds.
    pub fn bone_controllers(&self) -> Result<Records<'a, BoneController>> {
        self.records(ArrayKind::BoneControllers)
    }

    /// # Errors
    ///
    /// Returns `Err` if the hitbox sets are out of bounds.
    pub fn hitbox_sets(&self) -> Result<Records<'a, HitboxSet>> {
        self.records(ArrayKind::HitboxSets)
    }

    /// # Errors
    ///
    /// Returns `Err` if the animations are out of bounds.
    pub fn animations(&self) -> Result<Records<'a, Animation>> {
        self.records(ArrayKind::Animations)
    }

    /// # Errors
    ///
    /// Returns `Err` if the sequences are out of bounds.
    pub fn sequences(&self) -> Result<Records<'a, Sequence>> {
        self.records(ArrayKind::Sequences)
    }

    /// # Errors
    ///
    /// Returns `Err` if the textures are out of bounds.
    pub fn textures(&self) -> Result<Records<'a, Texture>> {
        self.records(ArrayKind::Textures)
    }

    /// Directories searched for the textures, in order.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a path is out of bounds or not valid utf8.
    pub fn texture_paths(&self) -> Result<Vec<&'a str>> {
        self.string_table(ArrayKind::TextureDirs)
    }

    /// Texture index replacements, one row per skin family.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the skin table is out of bounds.
    pub fn skin_table(&self) -> Result<Vec<Vec<i16>>> {
        let entries: &[I16<LE>] =
            resolve_values(self.bytes, 0, self.header.array(ArrayKind::SkinTable), "skin table")?;

        let references = usize::try_from(self.header.skin_reference_count.get()).unwrap_or_default();
        if references == 0 {
            return Ok(Vec::new());
        }

        Ok(entries
            .chunks_exact(references)
            .map(|family| family.iter().map(|i| i.get()).collect())
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Err` if the body parts are out of bounds.
    pub fn body_parts(&self) -> Result<Records<'a, BodyPart>> {
        self.records(ArrayKind::BodyParts)
    }

    /// # Errors
    ///
    /// Returns `Err` if the attachments are out of bounds.
    pub fn attachments(&self) -> Result<Records<'a, Attachment>> {
        self.records(ArrayKind::Attachments)
    }

    /// # Errors
    ///
    /// Returns `Err` if the flex descs are out of bounds.
    pub fn flex_descs(&self) -> Result<Records<'a, FlexDesc>> {
        self.records(ArrayKind::FlexDescs)
    }

    /// # Errors
    ///
    /// Returns `Err` if the flex controllers are out of bounds.
    pub fn flex_controllers(&self) -> Result<Records<'a, FlexController>> {
        self.records(ArrayKind::FlexControllers)
    }

    /// # Errors
    ///
    /// Returns `Err` if the flex rules are out of bounds.
    pub fn flex_rules(&self) -> Result<Records<'a, FlexRule>> {
        self.records(ArrayKind::FlexRules)
    }

    /// # Errors
    ///
    /// Returns `Err` if the ik chains are out of bounds.
    pub fn ik_chains(&self) -> Result<Records<'a, IkChain>> {
        self.records(ArrayKind::IkChains)
    }

    /// # Errors
    ///
    /// Returns `Err` if the mouths are out of bounds.
    pub fn mouths(&self) -> Result<Records<'a, Mouth>> {
        self.records(ArrayKind::Mouths)
    }

    /// # Errors
    ///
    /// Returns `Err` if the pose parameters are out of bounds.
    pub fn pose_parameters(&self) -> Result<Records<'a, PoseParameter>> {
        self.records(ArrayKind::PoseParameters)
    }

    /// # Errors
    ///
    /// Returns `Err` if the ik locks are out of bounds.
    pub fn ik_autoplay_locks(&self) -> Result<Records<'a, IkLock>> {
        self.records(ArrayKind::IkAutoplayLocks)
    }

    /// # Errors
    ///
    /// Returns `Err` if the include models are out of bounds.
    pub fn include_models(&self) -> Result<Records<'a, ModelGroup>> {
        self.records(ArrayKind::IncludeModels)
    }

    /// # Errors
    ///
    /// Returns `Err` if the animation blocks are out of bounds.
    pub fn animation_blocks(&self) -> Result<Records<'a, AnimationBlock>> {
        self.records(ArrayKind::AnimationBlocks)
    }

    /// # Errors
    ///
    /// Returns `Err` if the flex controller uis are out of bounds.
    pub fn flex_controller_uis(&self) -> Result<Records<'a, FlexControllerUi>> {
        self.records(ArrayKind::FlexControllerUis)
    }

    /// # Errors
    ///
    /// Returns `Err` if a node name is out of bounds or not valid utf8.
    pub fn local_node_names(&self) -> Result<Vec<&'a str>> {
        self.string_table(ArrayKind::NodeNames)
    }

    /// Row-major `node_count * node_count` transition table between sequence nodes.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the table is out of bounds.
    pub fn node_transitions(&self) -> Result<&'a [u8]> {
        resolve_values(
            self.bytes,
            0,
            self.header.array(ArrayKind::NodeTransitions),
            "node transitions",
        )
    }

    fn header_2_records<T: Record>(
        &self,
        array: impl FnOnce(&StudioHeader2) -> RecordArray,
    ) -> Result<Records<'a, T>> {
        match &self.header_2 {
            Some((offset, header_2)) => resolve(self.bytes, *offset, array(header_2)),
            None => resolve(self.bytes, 0, RecordArray::default()),
        }
    }

    /// # Errors
    ///
    /// Returns `Err` if the bone transforms are out of bounds.
    pub fn bone_transforms(&self) -> Result<Records<'a, BoneTransform>> {
        self.header_2_records(StudioHeader2::bone_transforms)
    }

    /// # Errors
    ///
    /// Returns `Err` if the bone flex drivers are out of bounds.
    pub fn bone_flex_drivers(&self) -> Result<Records<'a, BoneFlexDriver>> {
        self.header_2_records(StudioHeader2::bone_flex_drivers)
    }

    /// The structure of arrays bone table, `None` if the model has none.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the table is out of bounds.
    pub fn linear_bones(&self) -> Result<Option<RecordRef<'a, LinearBone>>> {
        let Some((offset, header_2)) = &self.header_2 else {
            return Ok(None);
        };

        match header_2.linear_bone_offset.get() {
            0 => Ok(None),
            linear_bone_offset => {
                Ok(resolve(self.bytes, *offset, RecordArray::new(1, linear_bone_offset))?.next())
            }
        }
    }

    /// Checks every header array against the file length.
    ///
    /// # Errors
    ///
    /// Returns `Err` for the first array that is out of bounds.
    pub fn check_bounds(&self) -> Result<()> {
        for kind in ArrayKind::ALL {
            let array = self.header.array(kind);
            if array
                .byte_range(0, kind.record_size(), self.bytes.len())
                .is_none()
            {
                return Err(array.out_of_bounds(FileType::Mdl, kind.name(), 0, self.bytes.len()));
            }
        }

        if let Some((offset, header_2)) = &self.header_2 {
            for (array, size, what) in [
                (
                    header_2.bone_transforms(),
                    BoneTransform::SIZE,
                    BoneTransform::NAME,
                ),
                (
                    header_2.bone_flex_drivers(),
                    BoneFlexDriver::SIZE,
                    BoneFlexDriver::NAME,
                ),
            ] {
                if array.byte_range(*offset, size, self.bytes.len()).is_none() {
                    return Err(array.out_of_bounds(FileType::Mdl, what, *offset, self.bytes.len()));
                }
            }
        }

        Ok(())
    }

    /// Checks the array counts against the engine limits of the file version.
    ///
    /// # Errors
    ///
    /// Returns `Err` for the first count over its limit.
    pub fn check_limits(&self) -> Result<()> {
        let version = self.version();

        for kind in ArrayKind::ALL {
            let Some(max) = kind.limit(version) else {
                continue;
            };
            let count = usize::try_from(self.header.array(kind).count).unwrap_or_default();

            if count > max {
                return Err(Error::LimitExceeded {
                    what: kind.name(),
                    count,
                    max,
                });
            }
        }

        let skin_families = usize::try_from(self.header.skin_family_count.get()).unwrap_or_default();
        if skin_families > MAX_SKINS {
            return Err(Error::LimitExceeded {
                what: "skin families",
                count: skin_families,
                max: MAX_SKINS,
            });
        }

        Ok(())
    }

    /// Runs [`Self::check_bounds`] and [`Self::check_limits`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if either check fails.
    pub fn validate(&self) -> Result<()> {
        self.check_bounds()?;
        self.check_limits()
    }

    /// # Errors
    ///
    /// Returns `Err` if the bones are out of bounds or do not form a valid hierarchy.
    pub fn skeleton(&self) -> Result<Skeleton> {
        Skeleton::new(&self.bones()?.map(RecordRef::into_record).collect_vec())
    }
}
