use std::{
    fs::{self, File},
    io::{self, BufReader, ErrorKind},
    path::{Path, PathBuf},
};

use glam::{Vec2, Vec3};
use serde::Deserialize;
use serde_json::de::from_reader;
use walkdir::WalkDir;

use plumber_studio::{
    consts::{MAX_LODS, VTX_VERSION, VVD_VERSION},
    mdl::{
        Animation, AnimationBlock, Attachment, BodyPart, Bone, BoneFlexDriver,
        BoneFlexDriverControl, BoneTransform, Event, FlexController, FlexControllerUi, IkChain,
        IkLink, LinearBone, Mesh, Model, ModelGroup, PoseParameter, Record, Sequence,
        StudioHeader, StudioHeader2, Texture,
    },
    vvd::{BoneWeight, VertexFileHeader},
    PhyHeader, Vertex, VtxHeader, F32,
};

pub trait FileSpec
where
    for<'de> Self: Deserialize<'de>,
{
    type Type;

    fn extension() -> &'static str;

    fn read(file: File) -> Self::Type;

    fn verify(&self, data: Self::Type);

    /// Verifies every file with the spec's extension under `path` against the json
    /// spec stored next to it. Returns how many files were verified.
    fn verify_from_path(path: &Path) -> usize {
        let files = discover_test_files(path, Self::extension());
        let mut verified = 0;

        for file in files {
            let spec_path = file.path.with_extension("json");

            let spec_file = match File::open(spec_path) {
                Ok(f) => f,
                Err(e) => {
                    if e.kind() == ErrorKind::NotFound {
                        continue;
                    }
                    Err(e).unwrap()
                }
            };

            eprintln!("Verifying against {}", file.name);

            let data = Self::read(File::open(&file.path).unwrap());
            let spec: Self = from_reader(BufReader::new(spec_file)).unwrap();

            spec.verify(data);
            verified += 1;
        }

        verified
    }
}

struct TestFile {
    name: String,
    path: PathBuf,
}

fn discover_test_files(path: &Path, extension: &str) -> Vec<TestFile> {
    let mut files = Vec::new();

    for result in WalkDir::new(path) {
        let entry = result.unwrap();

        let file_name = entry.path().strip_prefix(path).unwrap();
        let name_with_ext = file_name.to_string_lossy();
        let Some(name) = name_with_ext.strip_suffix(extension) else {
            continue;
        };

        files.push(TestFile {
            name: name.to_owned(),
            path: entry.into_path(),
        });
    }

    files
}

#[derive(Debug, Clone)]
pub struct BoneSpec {
    pub name: String,
    pub parent: i32,
    pub position: Vec3,
    pub surface_prop: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MeshSpec {
    pub material: i32,
    pub vertex_count: usize,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub meshes: Vec<MeshSpec>,
}

#[derive(Debug, Clone)]
pub struct BodyPartSpec {
    pub name: String,
    pub models: Vec<ModelSpec>,
}

#[derive(Debug, Clone)]
pub struct AnimationSpec {
    pub name: String,
    pub fps: f32,
    pub flags: i32,
    pub frame_count: i32,
    pub section_frame_count: i32,
}

#[derive(Debug, Clone)]
pub struct EventSpec {
    pub cycle: f32,
    pub event: i32,
    pub options: String,
}

#[derive(Debug, Clone)]
pub struct SequenceSpec {
    pub label: String,
    pub activity: Option<String>,
    pub group_size: (usize, usize),
    /// Row-major blend grid, `group_size.0 * group_size.1` animation indexes.
    pub animations: Vec<i16>,
    pub events: Vec<EventSpec>,
    /// One weight per bone, defaults to all ones.
    pub bone_weights: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct AttachmentSpec {
    pub name: String,
    pub bone: i32,
    pub translation: Vec3,
}

#[derive(Debug, Clone)]
pub struct PoseParameterSpec {
    pub name: String,
    pub start: f32,
    pub end: f32,
}

#[derive(Debug, Clone)]
pub struct IkChainSpec {
    pub name: String,
    /// `(bone, ideal bending direction)` from the chain root.
    pub links: Vec<(i32, Vec3)>,
}

#[derive(Debug, Clone)]
pub struct FlexControllerSpec {
    pub type_name: String,
    pub name: String,
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone)]
pub struct FlexControllerUiSpec {
    pub name: String,
    /// Indexes into the flex controllers, at most three.
    pub controllers: Vec<usize>,
    pub remap_type: u8,
}

#[derive(Debug, Clone)]
pub struct IncludeModelSpec {
    pub label: Option<String>,
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct BoneTransformSpec {
    pub name: String,
    pub pre_translation: Vec3,
    pub post_translation: Vec3,
}

#[derive(Debug, Clone)]
pub struct BoneFlexControlSpec {
    pub bone_component: i32,
    pub flex_controller: i32,
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone)]
pub struct BoneFlexDriverSpec {
    pub bone: i32,
    pub controls: Vec<BoneFlexControlSpec>,
}

#[derive(Debug, Clone)]
pub struct VertexSpec {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub bones: Vec<(u8, f32)>,
}

impl Default for VertexSpec {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            tex_coord: Vec2::ZERO,
            bones: vec![(0, 1.0)],
        }
    }
}

/// Builds a small, internally consistent model file set in memory.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    pub name: String,
    pub long_name: Option<String>,
    pub version: i32,
    pub checksum: i32,
    pub flags: i32,
    pub mass: f32,
    pub surface_prop: Option<String>,
    pub key_values: Option<String>,
    pub bones: Vec<BoneSpec>,
    pub textures: Vec<String>,
    pub texture_paths: Vec<String>,
    pub skin_families: Vec<Vec<i16>>,
    pub body_parts: Vec<BodyPartSpec>,
    pub animations: Vec<AnimationSpec>,
    pub sequences: Vec<SequenceSpec>,
    pub attachments: Vec<AttachmentSpec>,
    pub pose_parameters: Vec<PoseParameterSpec>,
    pub ik_chains: Vec<IkChainSpec>,
    pub flex_controllers: Vec<FlexControllerSpec>,
    pub flex_controller_uis: Vec<FlexControllerUiSpec>,
    pub include_models: Vec<IncludeModelSpec>,
    pub node_names: Vec<String>,
    /// Row-major `node_names.len()` squared transition table.
    pub node_transitions: Vec<u8>,
    pub animation_block_name: Option<String>,
    /// `(data start, data end)` of each block.
    pub animation_blocks: Vec<(i32, i32)>,
    pub bone_transforms: Vec<BoneTransformSpec>,
    pub bone_flex_drivers: Vec<BoneFlexDriverSpec>,
    /// Emit the structure of arrays bone table in header 2.
    pub linear_bones: bool,
    pub vertices: Vec<VertexSpec>,
    pub with_vvd: bool,
    pub with_vvc: bool,
    pub with_vtx: bool,
    pub with_phy: bool,
    pub vvd_checksum: Option<i32>,
    pub vtx_checksum: Option<i32>,
    pub phy_checksum: Option<i32>,
}

/// The bytes of a built model file set.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub mdl: Vec<u8>,
    pub vvd: Option<Vec<u8>>,
    pub vvc: Option<Vec<u8>>,
    pub vtx: Option<Vec<u8>>,
    pub phy: Option<Vec<u8>>,
}

impl ModelFiles {
    /// Writes the files as `<name>.mdl`, `<name>.vvd`, `<name>.dx90.vtx` and so on.
    /// Returns the path of the mdl file.
    pub fn write_to(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let mdl_path = dir.join(format!("{name}.mdl"));
        fs::write(&mdl_path, &self.mdl)?;

        for (extension, bytes) in [
            ("vvd", &self.vvd),
            ("vvc", &self.vvc),
            ("dx90.vtx", &self.vtx),
            ("phy", &self.phy),
        ] {
            if let Some(bytes) = bytes {
                fs::write(mdl_path.with_extension(extension), bytes)?;
            }
        }

        Ok(mdl_path)
    }
}

#[derive(Default)]
struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn reserve(&mut self, len: usize) -> usize {
        let at = self.bytes.len();
        self.bytes.resize(at + len, 0);
        at
    }

    fn records<T: Record>(&mut self, count: usize) -> usize {
        self.reserve(count * T::SIZE)
    }

    fn string(&mut self, value: &str) -> usize {
        let at = self.bytes.len();
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        at
    }

    fn put(&mut self, at: usize, bytes: &[u8]) {
        self.bytes[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn record<T: Record>(&mut self, at: usize, record: &T) {
        self.put(at, record.write());
    }
}

fn abs(at: usize) -> i32 {
    i32::try_from(at).unwrap()
}

fn rel(target: usize, base: usize) -> i32 {
    i32::try_from(i64::try_from(target).unwrap() - i64::try_from(base).unwrap()).unwrap()
}

fn count(len: usize) -> i32 {
    i32::try_from(len).unwrap()
}

fn name_bytes<const N: usize>(name: &str) -> [u8; N] {
    let mut bytes = [0; N];
    let len = name.len().min(N - 1);
    bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    bytes
}

fn translation_matrix(translation: Vec3) -> [F32; 12] {
    let mut matrix = [F32::new(0.0); 12];
    matrix[0] = F32::new(1.0);
    matrix[5] = F32::new(1.0);
    matrix[10] = F32::new(1.0);
    matrix[3] = F32::new(translation.x);
    matrix[7] = F32::new(translation.y);
    matrix[11] = F32::new(translation.z);
    matrix
}

impl ModelBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            long_name: None,
            version: 48,
            checksum: 0x1234_5678,
            flags: 0,
            mass: 1.0,
            surface_prop: None,
            key_values: None,
            bones: Vec::new(),
            textures: Vec::new(),
            texture_paths: Vec::new(),
            skin_families: Vec::new(),
            body_parts: Vec::new(),
            animations: Vec::new(),
            sequences: Vec::new(),
            attachments: Vec::new(),
            pose_parameters: Vec::new(),
            ik_chains: Vec::new(),
            flex_controllers: Vec::new(),
            flex_controller_uis: Vec::new(),
            include_models: Vec::new(),
            node_names: Vec::new(),
            node_transitions: Vec::new(),
            animation_block_name: None,
            animation_blocks: Vec::new(),
            bone_transforms: Vec::new(),
            bone_flex_drivers: Vec::new(),
            linear_bones: false,
            vertices: Vec::new(),
            with_vvd: true,
            with_vvc: false,
            with_vtx: true,
            with_phy: false,
            vvd_checksum: None,
            vtx_checksum: None,
            phy_checksum: None,
        }
    }

    #[must_use]
    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn long_name(mut self, name: &str) -> Self {
        self.long_name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn bone(mut self, name: &str, parent: i32, position: Vec3) -> Self {
        self.bones.push(BoneSpec {
            name: name.to_owned(),
            parent,
            position,
            surface_prop: None,
        });
        self
    }

    #[must_use]
    pub fn texture(mut self, name: &str) -> Self {
        self.textures.push(name.to_owned());
        self
    }

    #[must_use]
    pub fn texture_path(mut self, path: &str) -> Self {
        self.texture_paths.push(path.to_owned());
        self
    }

    /// Adds a body part holding one model with one mesh per material.
    #[must_use]
    pub fn body_part(mut self, name: &str, mesh_vertex_counts: &[(i32, usize)]) -> Self {
        self.body_parts.push(BodyPartSpec {
            name: name.to_owned(),
            models: vec![ModelSpec {
                name: name.to_owned(),
                meshes: mesh_vertex_counts
                    .iter()
                    .map(|&(material, vertex_count)| MeshSpec {
                        material,
                        vertex_count,
                    })
                    .collect(),
            }],
        });
        self
    }

    #[must_use]
    pub fn animation(mut self, name: &str, fps: f32, frame_count: i32) -> Self {
        self.animations.push(AnimationSpec {
            name: name.to_owned(),
            fps,
            flags: 0,
            frame_count,
            section_frame_count: 0,
        });
        self
    }

    #[must_use]
    pub fn sequence(mut self, label: &str, animation: i16) -> Self {
        self.sequences.push(SequenceSpec {
            label: label.to_owned(),
            activity: None,
            group_size: (1, 1),
            animations: vec![animation],
            events: Vec::new(),
            bone_weights: None,
        });
        self
    }

    #[must_use]
    pub fn attachment(mut self, name: &str, bone: i32, translation: Vec3) -> Self {
        self.attachments.push(AttachmentSpec {
            name: name.to_owned(),
            bone,
            translation,
        });
        self
    }

    #[must_use]
    pub fn pose_parameter(mut self, name: &str, start: f32, end: f32) -> Self {
        self.pose_parameters.push(PoseParameterSpec {
            name: name.to_owned(),
            start,
            end,
        });
        self
    }

    #[must_use]
    pub fn ik_chain(mut self, name: &str, links: &[(i32, Vec3)]) -> Self {
        self.ik_chains.push(IkChainSpec {
            name: name.to_owned(),
            links: links.to_vec(),
        });
        self
    }

    #[must_use]
    pub fn flex_controller(mut self, type_name: &str, name: &str, min: f32, max: f32) -> Self {
        self.flex_controllers.push(FlexControllerSpec {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
            min,
            max,
        });
        self
    }

    #[must_use]
    pub fn include_model(mut self, label: Option<&str>, file_name: &str) -> Self {
        self.include_models.push(IncludeModelSpec {
            label: label.map(str::to_owned),
            file_name: file_name.to_owned(),
        });
        self
    }

    #[must_use]
    pub fn bone_transform(mut self, name: &str, pre_translation: Vec3, post_translation: Vec3) -> Self {
        self.bone_transforms.push(BoneTransformSpec {
            name: name.to_owned(),
            pre_translation,
            post_translation,
        });
        self
    }

    fn needs_header_2(&self) -> bool {
        self.long_name.is_some()
            || !self.bone_transforms.is_empty()
            || !self.bone_flex_drivers.is_empty()
            || self.linear_bones
    }

    fn vertex_count(&self) -> usize {
        self.body_parts
            .iter()
            .flat_map(|b| &b.models)
            .flat_map(|m| &m.meshes)
            .map(|m| m.vertex_count)
            .sum::<usize>()
            .max(self.vertices.len())
    }

    #[must_use]
    pub fn build(&self) -> ModelFiles {
        ModelFiles {
            mdl: self.build_mdl(),
            vvd: self.with_vvd.then(|| self.build_vertex_file(*b"IDSV")),
            vvc: self.with_vvc.then(|| self.build_vertex_file(*b"IDCV")),
            vtx: self.with_vtx.then(|| self.build_vtx()),
            phy: self.with_phy.then(|| self.build_phy()),
        }
    }

    #[allow(clippy::too_many_lines)]
    #[must_use]
    pub fn build_mdl(&self) -> Vec<u8> {
        let mut w = Writer::default();

        let header_at = w.records::<StudioHeader>(1);
        let header_2_at = self.needs_header_2().then(|| w.records::<StudioHeader2>(1));

        let bones_at = w.records::<Bone>(self.bones.len());
        let textures_at = w.records::<Texture>(self.textures.len());
        let texture_paths_at = w.reserve(self.texture_paths.len() * 4);

        let skin_references = self.skin_families.first().map_or(0, Vec::len);
        let skin_table_at = w.reserve(self.skin_families.len() * skin_references * 2);

        let body_parts_at = w.records::<BodyPart>(self.body_parts.len());
        let mut models_at = Vec::new();
        let mut meshes_at = Vec::new();
        for body_part in &self.body_parts {
            models_at.push(w.records::<Model>(body_part.models.len()));
            for model in &body_part.models {
                meshes_at.push(w.records::<Mesh>(model.meshes.len()));
            }
        }

        let animations_at = w.records::<Animation>(self.animations.len());
        let sequences_at = w.records::<Sequence>(self.sequences.len());
        let mut sequence_data_at = Vec::new();
        for sequence in &self.sequences {
            let events_at = w.records::<Event>(sequence.events.len());
            let blend_at = w.reserve(sequence.animations.len() * 2);
            let weights_at = w.reserve(self.bones.len() * 4);
            sequence_data_at.push((events_at, blend_at, weights_at));
        }

        let attachments_at = w.records::<Attachment>(self.attachments.len());
        let pose_parameters_at = w.records::<PoseParameter>(self.pose_parameters.len());

        let ik_chains_at = w.records::<IkChain>(self.ik_chains.len());
        let ik_links_at = self
            .ik_chains
            .iter()
            .map(|chain| w.records::<IkLink>(chain.links.len()))
            .collect::<Vec<_>>();
        let flex_controllers_at = w.records::<FlexController>(self.flex_controllers.len());
        let flex_controller_uis_at = w.records::<FlexControllerUi>(self.flex_controller_uis.len());
        let node_names_at = w.reserve(self.node_names.len() * 4);
        let node_transitions_at = w.reserve(self.node_transitions.len());
        let include_models_at = w.records::<ModelGroup>(self.include_models.len());
        let animation_blocks_at = w.records::<AnimationBlock>(self.animation_blocks.len());

        let bone_transforms_at = w.records::<BoneTransform>(self.bone_transforms.len());
        let bone_flex_drivers_at = w.records::<BoneFlexDriver>(self.bone_flex_drivers.len());
        let bone_flex_controls_at = self
            .bone_flex_drivers
            .iter()
            .map(|driver| w.records::<BoneFlexDriverControl>(driver.controls.len()))
            .collect::<Vec<_>>();
        let linear_bone_at = self.linear_bones.then(|| {
            let at = w.records::<LinearBone>(1);
            let flags_at = w.reserve(self.bones.len() * 4);
            let parents_at = w.reserve(self.bones.len() * 4);
            let positions_at = w.reserve(self.bones.len() * 12);
            (at, flags_at, parents_at, positions_at)
        });

        let key_values_at = self.key_values.as_ref().map(|kv| {
            let at = w.reserve(kv.len() + 1);
            w.put(at, kv.as_bytes());
            at
        });

        // strings
        let surface_prop_at = self.surface_prop.as_ref().map(|s| w.string(s));
        let long_name_at = self.long_name.as_ref().map(|s| w.string(s));

        let mut mesh_index = 0;
        let mut first_vertex = 0;

        for (i, spec) in self.bones.iter().enumerate() {
            let at = bones_at + i * Bone::SIZE;
            let name_at = w.string(&spec.name);
            let surface_prop_at = spec.surface_prop.as_ref().map(|s| w.string(s));

            let mut bone = Bone::zeroed();
            bone.name_offset.set(rel(name_at, at));
            bone.parent_bone_index.set(spec.parent);
            for controller in &mut bone.bone_controller_indexes {
                controller.set(-1);
            }
            bone.position = F32::vec3(spec.position);
            bone.quat = [0.0, 0.0, 0.0, 1.0].map(F32::new);
            bone.position_scale = F32::vec3(Vec3::ONE);
            bone.rotation_scale = F32::vec3(Vec3::ONE);
            bone.pose_to_bone = translation_matrix(-spec.position);
            bone.q_alignment = [0.0, 0.0, 0.0, 1.0].map(F32::new);
            bone.physics_bone_index.set(-1);
            if let Some(surface_prop_at) = surface_prop_at {
                bone.surface_prop_name_offset.set(rel(surface_prop_at, at));
            }
            w.record(at, &bone);
        }

        for (i, name) in self.textures.iter().enumerate() {
            let at = textures_at + i * Texture::SIZE;
            let name_at = w.string(name);

            let mut texture = Texture::zeroed();
            texture.name_offset.set(rel(name_at, at));
            w.record(at, &texture);
        }

        for (i, path) in self.texture_paths.iter().enumerate() {
            let path_at = w.string(path);
            w.put(texture_paths_at + i * 4, &abs(path_at).to_le_bytes());
        }

        for (i, entry) in self.skin_families.iter().flatten().enumerate() {
            w.put(skin_table_at + i * 2, &entry.to_le_bytes());
        }

        let mut model_index = 0;
        for (i, spec) in self.body_parts.iter().enumerate() {
            let at = body_parts_at + i * BodyPart::SIZE;
            let name_at = w.string(&spec.name);

            let mut body_part = BodyPart::zeroed();
            body_part.name_offset.set(rel(name_at, at));
            body_part.model_count.set(count(spec.models.len()));
            body_part.base.set(1);
            body_part.model_offset.set(rel(models_at[i], at));
            w.record(at, &body_part);

            for (j, model_spec) in spec.models.iter().enumerate() {
                let model_at = models_at[i] + j * Model::SIZE;
                let model_vertex_count: usize =
                    model_spec.meshes.iter().map(|m| m.vertex_count).sum();

                let mut model = Model::zeroed();
                model.name = name_bytes(&model_spec.name);
                model.mesh_count.set(count(model_spec.meshes.len()));
                model.mesh_offset.set(rel(meshes_at[model_index], model_at));
                model.vertex_count.set(count(model_vertex_count));
                model.vertex_offset.set(count(first_vertex * Vertex::SIZE));
                w.record(model_at, &model);

                let mut mesh_vertex_start = 0;
                for (k, mesh_spec) in model_spec.meshes.iter().enumerate() {
                    let mesh_at = meshes_at[model_index] + k * Mesh::SIZE;

                    let mut mesh = Mesh::zeroed();
                    mesh.material_index.set(mesh_spec.material);
                    mesh.model_offset.set(rel(model_at, mesh_at));
                    mesh.vertex_count.set(count(mesh_spec.vertex_count));
                    mesh.vertex_index_start.set(count(mesh_vertex_start));
                    mesh.id.set(count(mesh_index));
                    mesh.lod_vertex_counts[0].set(count(mesh_spec.vertex_count));
                    w.record(mesh_at, &mesh);

                    mesh_vertex_start += mesh_spec.vertex_count;
                    mesh_index += 1;
                }

                first_vertex += model_vertex_count;
                model_index += 1;
            }
        }

        for (i, spec) in self.animations.iter().enumerate() {
            let at = animations_at + i * Animation::SIZE;
            let name_at = w.string(&spec.name);

            let mut animation = Animation::zeroed();
            animation.base_header_offset.set(rel(header_at, at));
            animation.name_offset.set(rel(name_at, at));
            animation.fps = F32::new(spec.fps);
            animation.flags.set(spec.flags);
            animation.frame_count.set(spec.frame_count);
            animation.section_frame_count.set(spec.section_frame_count);
            w.record(at, &animation);
        }

        for (i, spec) in self.sequences.iter().enumerate() {
            let at = sequences_at + i * Sequence::SIZE;
            let (events_at, blend_at, weights_at) = sequence_data_at[i];
            let label_at = w.string(&spec.label);
            let activity_at = spec.activity.as_ref().map(|s| w.string(s));

            for (j, event_spec) in spec.events.iter().enumerate() {
                let event_at = events_at + j * Event::SIZE;
                let mut event = Event::zeroed();
                event.cycle = F32::new(event_spec.cycle);
                event.event.set(event_spec.event);
                event.options = name_bytes(&event_spec.options);
                w.record(event_at, &event);
            }

            for (j, animation) in spec.animations.iter().enumerate() {
                w.put(blend_at + j * 2, &animation.to_le_bytes());
            }

            for j in 0..self.bones.len() {
                let weight = spec
                    .bone_weights
                    .as_ref()
                    .and_then(|weights| weights.get(j).copied())
                    .unwrap_or(1.0);
                w.put(weights_at + j * 4, &weight.to_le_bytes());
            }

            let mut sequence = Sequence::zeroed();
            sequence.base_header_offset.set(rel(header_at, at));
            sequence.label_offset.set(rel(label_at, at));
            if let Some(activity_at) = activity_at {
                sequence.activity_name_offset.set(rel(activity_at, at));
            }
            sequence.activity.set(-1);
            sequence.event_count.set(count(spec.events.len()));
            sequence.event_offset.set(rel(events_at, at));
            sequence.blend_count.set(count(spec.animations.len()));
            sequence.anim_index_offset.set(rel(blend_at, at));
            sequence.group_size[0].set(count(spec.group_size.0));
            sequence.group_size[1].set(count(spec.group_size.1));
            sequence.param_index[0].set(-1);
            sequence.param_index[1].set(-1);
            sequence.fade_in_time = F32::new(0.2);
            sequence.fade_out_time = F32::new(0.2);
            sequence.weight_list_offset.set(rel(weights_at, at));
            w.record(at, &sequence);
        }

        for (i, spec) in self.attachments.iter().enumerate() {
            let at = attachments_at + i * Attachment::SIZE;
            let name_at = w.string(&spec.name);

            let mut attachment = Attachment::zeroed();
            attachment.name_offset.set(rel(name_at, at));
            attachment.local_bone_index.set(spec.bone);
            attachment.matrix = translation_matrix(spec.translation);
            w.record(at, &attachment);
        }

        for (i, spec) in self.pose_parameters.iter().enumerate() {
            let at = pose_parameters_at + i * PoseParameter::SIZE;
            let name_at = w.string(&spec.name);

            let mut pose_parameter = PoseParameter::zeroed();
            pose_parameter.name_offset.set(rel(name_at, at));
            pose_parameter.start = F32::new(spec.start);
            pose_parameter.end = F32::new(spec.end);
            w.record(at, &pose_parameter);
        }

        for (i, spec) in self.ik_chains.iter().enumerate() {
            let at = ik_chains_at + i * IkChain::SIZE;
            let name_at = w.string(&spec.name);

            for (j, &(bone, direction)) in spec.links.iter().enumerate() {
                let mut link = IkLink::zeroed();
                link.bone.set(bone);
                link.ideal_bending_direction = F32::vec3(direction);
                w.record(ik_links_at[i] + j * IkLink::SIZE, &link);
            }

            let mut chain = IkChain::zeroed();
            chain.name_offset.set(rel(name_at, at));
            chain.link_count.set(count(spec.links.len()));
            chain.link_offset.set(rel(ik_links_at[i], at));
            w.record(at, &chain);
        }

        for (i, spec) in self.flex_controllers.iter().enumerate() {
            let at = flex_controllers_at + i * FlexController::SIZE;
            let type_name_at = w.string(&spec.type_name);
            let name_at = w.string(&spec.name);

            let mut controller = FlexController::zeroed();
            controller.type_name_offset.set(rel(type_name_at, at));
            controller.name_offset.set(rel(name_at, at));
            controller.local_to_global.set(-1);
            controller.min = F32::new(spec.min);
            controller.max = F32::new(spec.max);
            w.record(at, &controller);
        }

        for (i, spec) in self.flex_controller_uis.iter().enumerate() {
            let at = flex_controller_uis_at + i * FlexControllerUi::SIZE;
            let name_at = w.string(&spec.name);

            let mut ui = FlexControllerUi::zeroed();
            ui.name_offset.set(rel(name_at, at));
            for (slot, &controller) in ui.controller_offsets.iter_mut().zip(&spec.controllers) {
                slot.set(rel(flex_controllers_at + controller * FlexController::SIZE, at));
            }
            ui.remap_type = spec.remap_type;
            w.record(at, &ui);
        }

        for (i, name) in self.node_names.iter().enumerate() {
            let name_at = w.string(name);
            w.put(node_names_at + i * 4, &abs(name_at).to_le_bytes());
        }
        w.put(node_transitions_at, &self.node_transitions);

        for (i, spec) in self.include_models.iter().enumerate() {
            let at = include_models_at + i * ModelGroup::SIZE;
            let label_at = spec.label.as_ref().map(|s| w.string(s));
            let file_name_at = w.string(&spec.file_name);

            let mut group = ModelGroup::zeroed();
            if let Some(label_at) = label_at {
                group.label_offset.set(rel(label_at, at));
            }
            group.file_name_offset.set(rel(file_name_at, at));
            w.record(at, &group);
        }

        for (i, &(start, end)) in self.animation_blocks.iter().enumerate() {
            let mut block = AnimationBlock::zeroed();
            block.data_start.set(start);
            block.data_end.set(end);
            w.record(animation_blocks_at + i * AnimationBlock::SIZE, &block);
        }
        let animation_block_name_at = self.animation_block_name.as_ref().map(|s| w.string(s));

        let mut header = StudioHeader::zeroed();
        header.id = *b"IDST";
        header.version.set(self.version);
        header.checksum.set(self.checksum);
        header.name = name_bytes(&self.name);
        header.flags.set(self.flags);
        header.mass = F32::new(self.mass);

        header.bone_count.set(count(self.bones.len()));
        header.bone_offset.set(abs(bones_at));
        header.texture_count.set(count(self.textures.len()));
        header.texture_offset.set(abs(textures_at));
        header.texture_dir_count.set(count(self.texture_paths.len()));
        header.texture_dir_offset.set(abs(texture_paths_at));
        header.skin_reference_count.set(count(skin_references));
        header.skin_family_count.set(count(self.skin_families.len()));
        header.skin_family_offset.set(abs(skin_table_at));
        header.body_part_count.set(count(self.body_parts.len()));
        header.body_part_offset.set(abs(body_parts_at));
        header.local_anim_count.set(count(self.animations.len()));
        header.local_anim_offset.set(abs(animations_at));
        header.local_seq_count.set(count(self.sequences.len()));
        header.local_seq_offset.set(abs(sequences_at));
        header.attachment_count.set(count(self.attachments.len()));
        header.attachment_offset.set(abs(attachments_at));
        header.local_pose_param_count.set(count(self.pose_parameters.len()));
        header.local_pose_param_offset.set(abs(pose_parameters_at));

        if let Some(surface_prop_at) = surface_prop_at {
            header.surface_prop_offset.set(abs(surface_prop_at));
        }
        if let (Some(key_values_at), Some(key_values)) = (key_values_at, &self.key_values) {
            header.key_value_offset.set(abs(key_values_at));
            header.key_value_size.set(count(key_values.len() + 1));
        }

        header.ik_chain_count.set(count(self.ik_chains.len()));
        header.ik_chain_offset.set(abs(ik_chains_at));
        header.flex_controller_count.set(count(self.flex_controllers.len()));
        header.flex_controller_offset.set(abs(flex_controllers_at));
        header.flex_controller_ui_count.set(count(self.flex_controller_uis.len()));
        header.flex_controller_ui_offset.set(abs(flex_controller_uis_at));
        header.local_node_count.set(count(self.node_names.len()));
        header.local_node_name_offset.set(abs(node_names_at));
        header.local_node_offset.set(abs(node_transitions_at));
        header.include_model_count.set(count(self.include_models.len()));
        header.include_model_offset.set(abs(include_models_at));
        header.anim_block_count.set(count(self.animation_blocks.len()));
        header.anim_block_offset.set(abs(animation_blocks_at));
        if let Some(animation_block_name_at) = animation_block_name_at {
            header.anim_block_name_offset.set(abs(animation_block_name_at));
        }

        if let Some(header_2_at) = header_2_at {
            let header_2 = self.build_header_2(
                &mut w,
                header_2_at,
                long_name_at,
                bone_transforms_at,
                (bone_flex_drivers_at, bone_flex_controls_at.as_slice()),
                linear_bone_at,
            );
            w.record(header_2_at, &header_2);
            header.header_2_offset.set(abs(header_2_at));
        }

        header.data_length.set(count(w.bytes.len()));
        w.record(header_at, &header);

        w.bytes
    }

    /// Writes the arrays hanging off header 2. Their offsets are relative to `header_2_at`.
    fn build_header_2(
        &self,
        w: &mut Writer,
        header_2_at: usize,
        long_name_at: Option<usize>,
        bone_transforms_at: usize,
        (bone_flex_drivers_at, bone_flex_controls_at): (usize, &[usize]),
        linear_bone_at: Option<(usize, usize, usize, usize)>,
    ) -> StudioHeader2 {
        let mut header_2 = StudioHeader2::zeroed();
        if let Some(long_name_at) = long_name_at {
            header_2.name_offset.set(rel(long_name_at, header_2_at));
        }

        for (i, spec) in self.bone_transforms.iter().enumerate() {
            let at = bone_transforms_at + i * BoneTransform::SIZE;
            let name_at = w.string(&spec.name);

            let mut transform = BoneTransform::zeroed();
            transform.name_offset.set(rel(name_at, at));
            transform.pre_transform = translation_matrix(spec.pre_translation);
            transform.post_transform = translation_matrix(spec.post_translation);
            w.record(at, &transform);
        }
        header_2
            .src_bone_transform_count
            .set(count(self.bone_transforms.len()));
        header_2
            .src_bone_transform_offset
            .set(rel(bone_transforms_at, header_2_at));

        for (i, spec) in self.bone_flex_drivers.iter().enumerate() {
            let at = bone_flex_drivers_at + i * BoneFlexDriver::SIZE;

            for (j, control_spec) in spec.controls.iter().enumerate() {
                let mut control = BoneFlexDriverControl::zeroed();
                control.bone_component.set(control_spec.bone_component);
                control.flex_controller_index.set(control_spec.flex_controller);
                control.min = F32::new(control_spec.min);
                control.max = F32::new(control_spec.max);
                w.record(bone_flex_controls_at[i] + j * BoneFlexDriverControl::SIZE, &control);
            }

            let mut driver = BoneFlexDriver::zeroed();
            driver.bone_index.set(spec.bone);
            driver.control_count.set(count(spec.controls.len()));
            driver.control_offset.set(rel(bone_flex_controls_at[i], at));
            w.record(at, &driver);
        }
        header_2
            .bone_flex_driver_count
            .set(count(self.bone_flex_drivers.len()));
        header_2
            .bone_flex_driver_offset
            .set(rel(bone_flex_drivers_at, header_2_at));

        if let Some((at, flags_at, parents_at, positions_at)) = linear_bone_at {
            for (i, spec) in self.bones.iter().enumerate() {
                w.put(parents_at + i * 4, &spec.parent.to_le_bytes());
                for (k, component) in spec.position.to_array().into_iter().enumerate() {
                    w.put(positions_at + i * 12 + k * 4, &component.to_le_bytes());
                }
            }

            let mut linear_bone = LinearBone::zeroed();
            linear_bone.bone_count.set(count(self.bones.len()));
            linear_bone.flags_offset.set(rel(flags_at, at));
            linear_bone.parent_offset.set(rel(parents_at, at));
            linear_bone.pos_offset.set(rel(positions_at, at));
            w.record(at, &linear_bone);
            header_2.linear_bone_offset.set(rel(at, header_2_at));
        }

        header_2
    }

    fn vertex(spec: &VertexSpec) -> Vertex {
        let mut weights = [F32::new(0.0); 3];
        let mut bones = [0; 3];
        for (i, &(bone, weight)) in spec.bones.iter().take(3).enumerate() {
            bones[i] = bone;
            weights[i] = F32::new(weight);
        }

        Vertex {
            bone_weight: BoneWeight {
                weights,
                bones,
                bone_count: u8::try_from(spec.bones.len().min(3)).unwrap(),
            },
            position: F32::vec3(spec.position),
            normal: F32::vec3(spec.normal),
            tex_coord: [F32::new(spec.tex_coord.x), F32::new(spec.tex_coord.y)],
        }
    }

    fn build_vertex_file(&self, id: [u8; 4]) -> Vec<u8> {
        let vertex_count = self.vertex_count();
        let mut w = Writer::default();

        let header_at = w.records::<VertexFileHeader>(1);
        let vertices_at = w.records::<Vertex>(vertex_count);
        let tangents_at = w.reserve(vertex_count * 16);

        for i in 0..vertex_count {
            let spec = self.vertices.get(i).cloned().unwrap_or_default();
            w.record(vertices_at + i * Vertex::SIZE, &Self::vertex(&spec));

            for (j, component) in [1.0f32, 0.0, 0.0, 1.0].iter().enumerate() {
                w.put(tangents_at + i * 16 + j * 4, &component.to_le_bytes());
            }
        }

        let mut header = VertexFileHeader::zeroed();
        header.id = id;
        header.version.set(VVD_VERSION);
        header.checksum.set(self.vvd_checksum.unwrap_or(self.checksum));
        header.lod_count.set(1);
        for lod in 0..MAX_LODS {
            header.lod_vertex_counts[lod].set(count(vertex_count));
        }
        header.fixup_table_offset.set(abs(vertices_at));
        header.vertex_data_offset.set(abs(vertices_at));
        header.tangent_data_offset.set(abs(tangents_at));
        w.record(header_at, &header);

        w.bytes
    }

    fn build_vtx(&self) -> Vec<u8> {
        let mut header = VtxHeader::zeroed();
        header.version.set(VTX_VERSION);
        header.vertex_cache_size.set(24);
        header.max_bones_per_strip.set(53);
        header.max_bones_per_tri.set(9);
        header.max_bones_per_vertex.set(3);
        header.checksum.set(self.vtx_checksum.unwrap_or(self.checksum));
        header.lod_count.set(1);
        header.body_part_count.set(0);
        header.body_part_offset.set(count(VtxHeader::SIZE));
        header.write().to_vec()
    }

    fn build_phy(&self) -> Vec<u8> {
        let mut header = PhyHeader::zeroed();
        header.size.set(count(PhyHeader::SIZE));
        header.solid_count.set(1);
        header.checksum.set(self.phy_checksum.unwrap_or(self.checksum));
        header.write().to_vec()
    }
}
