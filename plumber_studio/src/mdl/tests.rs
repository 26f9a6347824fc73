use approx::assert_relative_eq;
use glam::Vec3;

use plumber_test_utils::{
    BoneFlexControlSpec, BoneFlexDriverSpec, EventSpec, FlexControllerUiSpec, ModelBuilder,
    SequenceSpec,
};

use super::*;
use crate::binary_utils::F32;

fn patch_header(bytes: &mut [u8], patch: impl FnOnce(&mut StudioHeader)) {
    let mut header = StudioHeader::read(bytes, 0).unwrap();
    patch(&mut header);
    bytes[..StudioHeader::SIZE].copy_from_slice(header.write());
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

fn assert_round_trip<T: Record + std::fmt::Debug + PartialEq>() {
    for bytes in [patterned(T::SIZE), vec![0; T::SIZE]] {
        let record = T::read(&bytes, 0).unwrap();
        assert_eq!(record.write(), &bytes[..], "{} round trip", T::NAME);

        let mut out = Vec::new();
        record.write_into(&mut out);
        assert_eq!(out, bytes);
    }
}

#[test]
fn record_sizes() {
    assert_eq!(StudioHeader::SIZE, 408);
    assert_eq!(StudioHeader2::SIZE, 256);
    assert_eq!(Bone::SIZE, 216);
    assert_eq!(BoneController::SIZE, 56);
    assert_eq!(HitboxSet::SIZE, 12);
    assert_eq!(Hitbox::SIZE, 68);
    assert_eq!(BoneTransform::SIZE, 100);
    assert_eq!(LinearBone::SIZE, 64);
    assert_eq!(BodyPart::SIZE, 16);
    assert_eq!(Model::SIZE, 148);
    assert_eq!(Mesh::SIZE, 116);
    assert_eq!(ModelGroup::SIZE, 8);
    assert_eq!(Texture::SIZE, 64);
    assert_eq!(Attachment::SIZE, 92);
    assert_eq!(Animation::SIZE, 100);
    assert_eq!(Movement::SIZE, 44);
    assert_eq!(AnimationSection::SIZE, 8);
    assert_eq!(AnimationBlock::SIZE, 8);
    assert_eq!(IkRule::SIZE, 152);
    assert_eq!(LocalHierarchy::SIZE, 48);
    assert_eq!(Sequence::SIZE, 212);
    assert_eq!(Event::SIZE, 80);
    assert_eq!(AutoLayer::SIZE, 24);
    assert_eq!(ActivityModifier::SIZE, 4);
    assert_eq!(PoseParameter::SIZE, 20);
    assert_eq!(FlexDesc::SIZE, 4);
    assert_eq!(FlexController::SIZE, 20);
    assert_eq!(FlexRule::SIZE, 12);
    assert_eq!(FlexOp::SIZE, 8);
    assert_eq!(FlexControllerUi::SIZE, 20);
    assert_eq!(Mouth::SIZE, 20);
    assert_eq!(BoneFlexDriver::SIZE, 24);
    assert_eq!(BoneFlexDriverControl::SIZE, 16);
    assert_eq!(IkChain::SIZE, 16);
    assert_eq!(IkLink::SIZE, 28);
    assert_eq!(IkLock::SIZE, 32);
}

#[test]
fn records_round_trip_losslessly() {
    assert_round_trip::<StudioHeader>();
    assert_round_trip::<StudioHeader2>();
    assert_round_trip::<Bone>();
    assert_round_trip::<Model>();
    assert_round_trip::<Mesh>();
    assert_round_trip::<Texture>();
    assert_round_trip::<Animation>();
    assert_round_trip::<Sequence>();
    assert_round_trip::<FlexControllerUi>();
    assert_round_trip::<IkLock>();
}

#[test]
fn load_clears_runtime_fields() {
    let mut header = StudioHeader::zeroed();
    header.virtual_model.set(0x1111);
    header.anim_block_model.set(0x2222);
    header.vertex_base.set(0x3333);
    header.index_base.set(0x4444);
    header.surface_prop_lookup.set(0x5555);
    header.bone_count.set(3);
    let bytes = header.write().to_vec();

    let read = StudioHeader::read(&bytes, 0).unwrap();
    assert_eq!(read.virtual_model.get(), 0x1111);

    let loaded = StudioHeader::load(&bytes, 0).unwrap();
    assert_eq!(loaded.virtual_model.get(), 0);
    assert_eq!(loaded.anim_block_model.get(), 0);
    assert_eq!(loaded.vertex_base.get(), 0);
    assert_eq!(loaded.index_base.get(), 0);
    assert_eq!(loaded.surface_prop_lookup.get(), 0);
    assert_eq!(loaded.bone_count.get(), 3);

    let mut mesh = Mesh::zeroed();
    mesh.vertex_data_pointer.set(77);
    mesh.vertex_count.set(12);
    let loaded = Mesh::load(mesh.write(), 0).unwrap();
    assert_eq!(loaded.vertex_data_pointer.get(), 0);
    assert_eq!(loaded.vertex_count.get(), 12);
}

#[test]
fn texture_material_pointers_follow_unused_slot() {
    let mut bytes: Vec<u8> = (1..=64).collect();
    bytes[0..4].copy_from_slice(&8_i32.to_le_bytes());

    let loaded = Texture::load(&bytes, 0).unwrap();
    let written = loaded.write();
    assert_eq!(loaded.name_offset.get(), 8);
    assert_eq!(&written[..16], &bytes[..16]);
    assert_eq!(&written[16..24], &[0; 8]);
    assert_eq!(&written[24..], &bytes[24..]);
}

#[test]
fn truncated_records_are_rejected() {
    let bytes = vec![0; StudioHeader::SIZE - 1];
    assert!(StudioHeader::read(&bytes, 0).is_none());
    assert!(Bone::read(&[0; 300], 100).is_none());
    assert!(Bone::read(&[0; 316], 100).is_some());
}

#[test]
fn header_flag_bits() {
    assert_eq!(HeaderFlags::AUTO_GENERATED_HITBOX.bits(), 1 << 0);
    assert_eq!(HeaderFlags::STATIC_PROP.bits(), 1 << 4);
    assert_eq!(HeaderFlags::CONSTANT_DIRECTIONAL_LIGHT_DOT.bits(), 1 << 13);
    assert_eq!(HeaderFlags::CAST_TEXTURE_SHADOWS.bits(), 1 << 18);
    assert_eq!(HeaderFlags::VERT_ANIM_FIXED_POINT_SCALE.bits(), 1 << 21);

    let mut header = StudioHeader::zeroed();
    header.flags.set(1 << 13 | 1 << 30);
    let flags = header.flags();
    assert!(flags.contains(HeaderFlags::CONSTANT_DIRECTIONAL_LIGHT_DOT));
    assert_eq!(flags.bits(), 1 << 13 | 1 << 30);
}

#[test]
fn header_defaults_depend_on_flags() {
    let mut header = StudioHeader::zeroed();
    header.directional_light_dot = 255;
    header.vert_anim_fixed_point_scale = F32::new(0.5);

    assert_eq!(header.constant_directional_light_dot(), None);
    assert_relative_eq!(header.vert_anim_fixed_point_scale(), 1.0 / 4096.0);

    header.flags.set(
        (HeaderFlags::CONSTANT_DIRECTIONAL_LIGHT_DOT | HeaderFlags::VERT_ANIM_FIXED_POINT_SCALE)
            .bits(),
    );
    assert_relative_eq!(header.constant_directional_light_dot().unwrap(), 1.0);
    assert_relative_eq!(header.vert_anim_fixed_point_scale(), 0.5);
}

#[test]
fn two_bone_skeleton() {
    let bytes = ModelBuilder::new("two_bones")
        .bone("root", -1, Vec3::ZERO)
        .bone("child", 0, Vec3::new(0.0, 0.0, 10.0))
        .build_mdl();
    let mdl = Mdl::from_bytes(bytes);
    mdl.check_signature().unwrap();

    let header = mdl.header().unwrap();
    header.validate().unwrap();

    let bones: Vec<_> = header.bones().unwrap().collect();
    assert_eq!(bones.len(), 2);
    assert_eq!(bones[0].name().unwrap(), "root");
    assert_eq!(bones[1].name().unwrap(), "child");
    assert_eq!(bones[0].parent(), None);
    assert_eq!(bones[1].parent(), Some(0));
    assert_relative_eq!(bones[1].position(), Vec3::new(0.0, 0.0, 10.0));
    assert_relative_eq!(bones[1].quat(), glam::Quat::IDENTITY);

    let skeleton = header.skeleton().unwrap();
    assert_eq!(skeleton.len(), 2);
    assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0]);
    assert_eq!(skeleton.parent(1), Some(0));
    assert_eq!(skeleton.children(0), &[1]);
    assert_eq!(skeleton.depth(1), Some(1));
    assert_eq!(skeleton.depth_first(), vec![0, 1]);
}

#[test]
fn bone_cycles_are_detected() {
    assert_eq!(
        Skeleton::from_parents(&[1, 0]),
        Err(Error::BoneCycle { bone: 0 })
    );
    assert_eq!(
        Skeleton::from_parents(&[-1, 2, 3, 1]),
        Err(Error::BoneCycle { bone: 1 })
    );
}

#[test]
fn invalid_bone_parents_are_detected() {
    assert_eq!(
        Skeleton::from_parents(&[-1, 0, 5]),
        Err(Error::InvalidBoneParent { bone: 2, parent: 5 })
    );
    assert_eq!(
        Skeleton::from_parents(&[-1, 1]),
        Err(Error::InvalidBoneParent { bone: 1, parent: 1 })
    );
    assert_eq!(
        Skeleton::from_parents(&[-2]),
        Err(Error::InvalidBoneParent { bone: 0, parent: -2 })
    );
}

#[test]
fn skeleton_orders_bones_depth_first() {
    let skeleton = Skeleton::from_parents(&[-1, 0, -1, 1, 0]).unwrap();
    assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(skeleton.children(0), &[1, 4]);
    assert_eq!(skeleton.depth(3), Some(2));
    assert_eq!(skeleton.depth(9), None);
    assert_eq!(skeleton.depth_first(), vec![0, 1, 3, 4, 2]);
}

#[test]
fn record_array_byte_ranges() {
    assert_eq!(RecordArray::new(2, 10).byte_range(0, 4, 18), Some(10..18));
    assert_eq!(RecordArray::new(2, 10).byte_range(0, 4, 17), None);
    assert_eq!(RecordArray::new(2, -10).byte_range(20, 4, 18), Some(10..18));
    assert_eq!(RecordArray::new(1, -30).byte_range(20, 4, 100), None);
    assert_eq!(RecordArray::new(-1, 0).byte_range(0, 4, 100), None);
    assert_eq!(RecordArray::new(i32::MAX, 0).byte_range(0, 216, 100), None);

    // empty arrays are valid wherever they point
    assert_eq!(RecordArray::new(0, 1000).byte_range(0, 4, 100), Some(100..100));
    assert_eq!(RecordArray::new(0, 8).byte_range(0, 4, 100), Some(8..8));
}

#[test]
fn out_of_bounds_arrays_are_rejected() {
    let mut bytes = ModelBuilder::new("bounds")
        .bone("root", -1, Vec3::ZERO)
        .build_mdl();
    let len = bytes.len();
    patch_header(&mut bytes, |header| header.bone_count.set(1000));

    let mdl = Mdl::from_bytes(bytes);
    let header = mdl.header().unwrap();

    assert_eq!(
        header.check_bounds(),
        Err(Error::OutOfBounds {
            ty: FileType::Mdl,
            what: "bones",
            offset: i64::try_from(StudioHeader::SIZE).unwrap(),
            count: 1000,
            len,
        })
    );
    assert!(header.bones().is_err());
    assert!(header.skeleton().is_err());
}

#[test]
fn negative_offsets_are_rejected() {
    let mut bytes = ModelBuilder::new("negative")
        .texture("metal")
        .build_mdl();
    patch_header(&mut bytes, |header| header.texture_offset.set(-64));

    let mdl = Mdl::from_bytes(bytes);
    let header = mdl.header().unwrap();
    assert!(matches!(
        header.check_bounds(),
        Err(Error::OutOfBounds {
            what: "textures",
            ..
        })
    ));
}

#[test]
fn unsupported_versions_are_rejected() {
    for version in [47, 53, -1] {
        let mdl = Mdl::from_bytes(ModelBuilder::new("old").version(version).build_mdl());
        assert_eq!(
            mdl.header().unwrap_err(),
            Error::UnsupportedVersion {
                ty: FileType::Mdl,
                version
            }
        );
    }

    for version in [48, 49, 52] {
        let mdl = Mdl::from_bytes(ModelBuilder::new("ok").version(version).build_mdl());
        assert_eq!(mdl.header().unwrap().version(), version);
    }
}

#[test]
fn invalid_signature() {
    let mut bytes = ModelBuilder::new("sig").build_mdl();
    bytes[0..4].copy_from_slice(b"IDSQ");
    let mdl = Mdl::from_bytes(bytes);
    assert_eq!(
        mdl.check_signature(),
        Err(Error::InvalidSignature {
            ty: FileType::Mdl,
            signature: "IDSQ".to_owned()
        })
    );

    assert!(matches!(
        Mdl::from_bytes(vec![b'I', b'D']).check_signature(),
        Err(Error::Corrupted { .. })
    ));
}

fn header_with_header_2(header_2_len: usize) -> Vec<u8> {
    let mut header = StudioHeader::zeroed();
    header.id = *b"IDST";
    header.version.set(49);
    header.header_2_offset.set(i32::try_from(StudioHeader::SIZE).unwrap());

    let mut header_2 = StudioHeader2::zeroed();
    header_2.max_eye_deflection = F32::new(0.5);
    header_2.reserved[0].set(99);

    let mut bytes = header.write().to_vec();
    bytes.extend_from_slice(&header_2.write()[..header_2_len]);
    bytes
}

#[test]
fn truncated_header_2_is_tolerated() {
    let bytes = header_with_header_2(HEADER_2_KNOWN_SIZE);
    let mdl = Mdl::from_bytes(bytes);
    let header = mdl.header().unwrap();

    let header_2 = header.header_2().unwrap();
    assert_relative_eq!(header_2.max_eye_deflection(), 0.5);
    assert_eq!(header_2.reserved[0].get(), 0);
    header.check_bounds().unwrap();
    assert!(header.linear_bones().unwrap().is_none());
    assert_eq!(header.bone_transforms().unwrap().len(), 0);
}

#[test]
fn full_header_2_keeps_reserved_data() {
    let mdl = Mdl::from_bytes(header_with_header_2(StudioHeader2::SIZE));
    let header = mdl.header().unwrap();
    assert_eq!(header.header_2().unwrap().reserved[0].get(), 99);
}

#[test]
fn header_2_without_known_fields_is_corrupted() {
    let mdl = Mdl::from_bytes(header_with_header_2(HEADER_2_KNOWN_SIZE - 4));
    assert_eq!(
        mdl.header().unwrap_err(),
        Error::Corrupted {
            ty: FileType::Mdl,
            error: "header 2 out of bounds"
        }
    );
}

#[test]
fn header_2_arrays_resolve_from_header_2() {
    let mut builder = ModelBuilder::new("face")
        .bone("root", -1, Vec3::ZERO)
        .bone("jaw", 0, Vec3::new(0.0, 1.0, 2.0))
        .bone_transform("jaw_fix", Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
    builder.bone_flex_drivers = vec![BoneFlexDriverSpec {
        bone: 1,
        controls: vec![
            BoneFlexControlSpec {
                bone_component: 2,
                flex_controller: 0,
                min: -1.0,
                max: 1.0,
            },
            BoneFlexControlSpec {
                bone_component: 0,
                flex_controller: 1,
                min: 0.0,
                max: 0.5,
            },
        ],
    }];
    builder.linear_bones = true;

    let mdl = Mdl::from_bytes(builder.build_mdl());
    let header = mdl.header().unwrap();
    header.validate().unwrap();
    assert_eq!(header.name().unwrap(), "face");

    let header_2_at = usize::try_from(header.header().header_2_offset.get()).unwrap();
    assert_eq!(header_2_at, StudioHeader::SIZE);
    let header_2 = header.header_2().unwrap();
    let relative = |offset: i32| header_2_at + usize::try_from(offset).unwrap();

    let transforms: Vec<_> = header.bone_transforms().unwrap().collect();
    assert_eq!(transforms.len(), 1);
    assert_eq!(
        transforms[0].offset(),
        relative(header_2.src_bone_transform_offset.get())
    );
    assert_eq!(transforms[0].name().unwrap(), "jaw_fix");
    assert_relative_eq!(transforms[0].pre_transform()[0][3], 1.0);
    assert_relative_eq!(transforms[0].post_transform()[2][3], -1.0);

    let drivers: Vec<_> = header.bone_flex_drivers().unwrap().collect();
    assert_eq!(drivers.len(), 1);
    assert_eq!(
        drivers[0].offset(),
        relative(header_2.bone_flex_driver_offset.get())
    );
    assert_eq!(drivers[0].bone_index.get(), 1);

    let controls: Vec<_> = drivers[0]
        .controls()
        .unwrap()
        .map(RecordRef::into_record)
        .collect();
    assert_eq!(controls.len(), 2);
    assert_eq!(controls[0].bone_component.get(), 2);
    assert_relative_eq!(controls[0].min.get(), -1.0);
    assert_eq!(controls[1].flex_controller_index.get(), 1);
    assert_relative_eq!(controls[1].max.get(), 0.5);

    let linear = header.linear_bones().unwrap().unwrap();
    assert_eq!(linear.offset(), relative(header_2.linear_bone_offset.get()));
    assert_eq!(linear.bone_count.get(), 2);
    assert_eq!(linear.parents().unwrap(), vec![-1, 0]);
    assert_eq!(
        linear.positions().unwrap(),
        vec![Vec3::ZERO, Vec3::new(0.0, 1.0, 2.0)]
    );
    assert!(linear.flags().unwrap().iter().all(|flags| flags.is_empty()));
}

#[test]
fn header_2_arrays_out_of_bounds() {
    let builder = ModelBuilder::new("face")
        .bone("root", -1, Vec3::ZERO)
        .bone_transform("root_fix", Vec3::ZERO, Vec3::ZERO);
    let mut bytes = builder.build_mdl();

    // count field of the bone transforms, at the start of header 2
    let count_at = StudioHeader::SIZE;
    bytes[count_at..count_at + 4].copy_from_slice(&1000_i32.to_le_bytes());

    let mdl = Mdl::from_bytes(bytes);
    let header = mdl.header().unwrap();
    assert!(matches!(
        header.bone_transforms(),
        Err(Error::OutOfBounds { .. })
    ));
    assert!(matches!(
        header.check_bounds(),
        Err(Error::OutOfBounds { .. })
    ));
}

#[test]
fn secondary_arrays_resolve_relative_to_their_records() {
    let mut builder = ModelBuilder::new("face")
        .bone("thigh", -1, Vec3::ZERO)
        .bone("knee", 0, Vec3::new(0.0, 0.0, -18.0))
        .ik_chain("lleg", &[(0, Vec3::X), (1, Vec3::new(0.0, 0.0, 1.0))])
        .flex_controller("eyes", "eyes_updown", -45.0, 45.0)
        .flex_controller("phoneme", "jaw_drop", 0.0, 1.0)
        .include_model(Some("gestures"), "models/humans/male_gestures.mdl")
        .include_model(None, "models/humans/male_shared.mdl");
    builder.flex_controller_uis = vec![FlexControllerUiSpec {
        name: "jaw".to_owned(),
        controllers: vec![1, 0],
        remap_type: 1,
    }];
    builder.node_names = vec!["standing".to_owned(), "crouching".to_owned()];
    builder.node_transitions = vec![0, 2, 1, 0];
    builder.animation_block_name = Some("models/face.ani".to_owned());
    builder.animation_blocks = vec![(0, 0), (64, 192)];

    let mdl = Mdl::from_bytes(builder.build_mdl());
    let header = mdl.header().unwrap();
    header.validate().unwrap();

    let chains: Vec<_> = header.ik_chains().unwrap().collect();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].name().unwrap(), "lleg");
    let links: Vec<_> = chains[0]
        .links()
        .unwrap()
        .map(RecordRef::into_record)
        .collect();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].bone(), Some(0));
    assert_eq!(links[0].ideal_bending_direction(), Vec3::X);
    assert_eq!(links[1].bone(), Some(1));

    let controllers: Vec<_> = header.flex_controllers().unwrap().collect();
    assert_eq!(controllers.len(), 2);
    assert_eq!(controllers[0].type_name().unwrap(), "eyes");
    assert_eq!(controllers[1].name().unwrap(), "jaw_drop");
    assert_eq!(controllers[0].range(), (-45.0, 45.0));
    assert_eq!(controllers[0].local_to_global.get(), 0);

    let uis: Vec<_> = header.flex_controller_uis().unwrap().collect();
    assert_eq!(uis.len(), 1);
    assert_eq!(uis[0].name().unwrap(), "jaw");
    assert_eq!(uis[0].remap_type(), FlexRemapType::TwoWay);
    let driven: Vec<_> = uis[0]
        .controllers()
        .unwrap()
        .iter()
        .map(|controller| controller.name().unwrap())
        .collect();
    assert_eq!(driven, vec!["jaw_drop", "eyes_updown"]);

    assert_eq!(
        header.local_node_names().unwrap(),
        vec!["standing", "crouching"]
    );
    assert_eq!(header.node_transitions().unwrap(), &[0_u8, 2, 1, 0][..]);

    let includes: Vec<_> = header.include_models().unwrap().collect();
    assert_eq!(includes.len(), 2);
    assert_eq!(includes[0].label().unwrap(), Some("gestures"));
    assert_eq!(
        includes[0].file_name().unwrap(),
        "models/humans/male_gestures.mdl"
    );
    assert_eq!(includes[1].label().unwrap(), None);
    assert_eq!(
        includes[1].file_name().unwrap(),
        "models/humans/male_shared.mdl"
    );

    assert_eq!(
        header.animation_block_name().unwrap(),
        Some("models/face.ani")
    );
    let blocks: Vec<_> = header
        .animation_blocks()
        .unwrap()
        .map(RecordRef::into_record)
        .collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].is_empty());
    assert_eq!(blocks[1].len(), 128);
}

#[test]
fn long_name_is_preferred() {
    let long_name = "props/a_really/long/path/that/does/not/fit/into/the/sixty/four/byte/name.mdl";
    let mdl = Mdl::from_bytes(ModelBuilder::new("short").long_name(long_name).build_mdl());
    let header = mdl.header().unwrap();
    assert_eq!(header.name().unwrap(), long_name);

    let mdl = Mdl::from_bytes(ModelBuilder::new("short").build_mdl());
    assert_eq!(mdl.header().unwrap().name().unwrap(), "short");
}

#[test]
fn header_name_follows_checksum() {
    for checksum in [0x1234_5678, 0x1234_5600, 0] {
        let mut builder = ModelBuilder::new("props/barrel.mdl");
        builder.checksum = checksum;
        let mdl = Mdl::from_bytes(builder.build_mdl());
        let header = mdl.header().unwrap();

        assert_eq!(header.checksum(), checksum);
        assert_eq!(header.name().unwrap(), "props/barrel.mdl");
        assert_eq!(header.name().unwrap().as_bytes(), header.header().name_bytes());
    }

    let header = StudioHeader::zeroed();
    let base = header.write().as_ptr() as usize;
    let name = header.name.as_ptr() as usize - base;
    assert_eq!(name..name + header.name.len(), HEADER_NAME_RANGE);
}

#[test]
fn strings_and_tables() {
    let mut builder = ModelBuilder::new("strings")
        .texture("metal01")
        .texture("glass")
        .texture_path("models/props/")
        .texture_path("")
        .attachment("muzzle", 0, Vec3::new(1.0, 2.0, 3.0))
        .pose_parameter("aim_yaw", -45.0, 45.0)
        .bone("root", -1, Vec3::ZERO);
    builder.surface_prop = Some("metal".to_owned());
    builder.key_values = Some("prop_data { \"base\" \"Metal.Small\" }".to_owned());
    builder.skin_families = vec![vec![0, 1], vec![1, 0]];

    let mdl = Mdl::from_bytes(builder.build_mdl());
    let header = mdl.header().unwrap();
    header.validate().unwrap();

    let textures: Vec<_> = header
        .textures()
        .unwrap()
        .map(|t| t.name().unwrap().to_owned())
        .collect();
    assert_eq!(textures, vec!["metal01", "glass"]);
    assert_eq!(header.texture_paths().unwrap(), vec!["models/props/", ""]);
    assert_eq!(header.skin_table().unwrap(), vec![vec![0, 1], vec![1, 0]]);
    assert_eq!(header.surface_prop().unwrap(), Some("metal"));
    assert_eq!(
        header.key_values().unwrap(),
        Some("prop_data { \"base\" \"Metal.Small\" }")
    );
    assert_eq!(header.animation_block_name().unwrap(), None);

    let attachment = header.attachments().unwrap().next().unwrap();
    assert_eq!(attachment.name().unwrap(), "muzzle");
    assert_eq!(attachment.bone(), Some(0));
    assert_relative_eq!(attachment.translation(), Vec3::new(1.0, 2.0, 3.0));

    let pose_parameter = header.pose_parameters().unwrap().next().unwrap();
    assert_eq!(pose_parameter.name().unwrap(), "aim_yaw");
    assert_eq!(pose_parameter.range(), (-45.0, 45.0));
}

#[test]
fn body_parts_models_and_meshes() {
    let mdl = Mdl::from_bytes(
        ModelBuilder::new("meshes")
            .texture("a")
            .texture("b")
            .body_part("body", &[(0, 3), (1, 5)])
            .body_part("head", &[(1, 4)])
            .build_mdl(),
    );
    let header = mdl.header().unwrap();

    let body_parts: Vec<_> = header.body_parts().unwrap().collect();
    assert_eq!(body_parts.len(), 2);
    assert_eq!(body_parts[1].name().unwrap(), "head");

    let model = body_parts[0].models().unwrap().next().unwrap();
    assert_eq!(model.name().unwrap(), "body");
    assert_eq!(model.first_vertex().unwrap(), 0);

    let meshes: Vec<_> = model.meshes().unwrap().collect();
    assert_eq!(meshes.len(), 2);
    assert_eq!(meshes[0].material_index.get(), 0);
    assert_eq!(meshes[1].vertex_range().unwrap(), 3..8);

    let head = body_parts[1].models().unwrap().next().unwrap();
    assert_eq!(head.first_vertex().unwrap(), 8);
    let mesh = head.meshes().unwrap().next().unwrap();
    assert_eq!(mesh.id.get(), 2);
    assert_eq!(mesh.vertex_range().unwrap(), 0..4);
}

#[test]
fn sequences_events_and_blend_grid() {
    let mut builder = ModelBuilder::new("sequences")
        .bone("root", -1, Vec3::ZERO)
        .bone("arm", 0, Vec3::X)
        .animation("idle", 30.0, 10)
        .animation("walk_n", 30.0, 20)
        .animation("walk_s", 30.0, 20)
        .animation("walk_e", 30.0, 20);
    builder.sequences.push(SequenceSpec {
        label: "move".to_owned(),
        activity: Some("ACT_WALK".to_owned()),
        group_size: (2, 2),
        animations: vec![0, 1, 2, 3],
        events: vec![EventSpec {
            cycle: 0.5,
            event: 5004,
            options: "Foot.Step".to_owned(),
        }],
        bone_weights: Some(vec![1.0, 0.25]),
    });

    let mdl = Mdl::from_bytes(builder.build_mdl());
    let header = mdl.header().unwrap();
    header.validate().unwrap();

    let animations: Vec<_> = header.animations().unwrap().collect();
    assert_eq!(animations[1].name().unwrap(), "walk_n");
    assert_relative_eq!(animations[1].fps(), 30.0);
    assert_eq!(animations[1].frame_count(), 20);

    let sequence = header.sequences().unwrap().next().unwrap();
    assert_eq!(sequence.label().unwrap(), "move");
    assert_eq!(sequence.activity_name().unwrap(), Some("ACT_WALK"));
    assert_eq!(sequence.group_size(), (2, 2));
    assert_eq!(sequence.blend_axes(), [None, None]);

    let grid = sequence.blend_grid().unwrap();
    assert_eq!(grid.indexes, vec![0, 1, 2, 3]);
    assert_eq!(grid.get(1, 1), Some(3));
    assert_eq!(grid.get(5, 0), Some(1));
    assert_eq!(grid.get(0, 9), Some(2));
    assert_eq!(sequence.animation_index(1, 0).unwrap(), Some(1));

    let event = sequence.events().unwrap().next().unwrap();
    assert_relative_eq!(event.cycle.get(), 0.5);
    assert_eq!(event.event.get(), 5004);
    assert_eq!(event.options(), b"Foot.Step");
    assert_eq!(event.name().unwrap(), None);

    assert_eq!(sequence.bone_weights(2).unwrap(), vec![1.0, 0.25]);
    assert!(sequence.pose_keys().unwrap().is_empty());
    assert_eq!(sequence.auto_layers().unwrap().len(), 0);
}

#[test]
fn empty_blend_grid() {
    let grid = BlendGrid {
        width: 0,
        height: 0,
        indexes: Vec::new(),
    };
    assert_eq!(grid.get(0, 0), None);
}

#[test]
fn sectioned_animation_frames() {
    let mut animation = Animation::zeroed();
    animation.frame_count.set(10);
    assert_eq!(animation.section_frame(3), None);
    assert_eq!(animation.section_count(), 0);

    animation.section_frame_count.set(4);
    assert_eq!(
        animation.storage(),
        AnimationStorage::Sections {
            frames_per_section: 4
        }
    );
    assert_eq!(animation.section_count(), 4);
    assert_eq!(animation.section_frame(0), Some((0, 0)));
    assert_eq!(animation.section_frame(5), Some((1, 1)));
    assert_eq!(animation.section_frame(8), Some((2, 0)));
    assert_eq!(animation.section_frame(9), Some((3, 0)));
    assert_eq!(animation.section_frame(10), None);
}

#[test]
fn animation_storage() {
    let mut animation = Animation::zeroed();
    animation.anim_offset.set(64);
    assert_eq!(animation.storage(), AnimationStorage::Inline { offset: 64 });

    animation.anim_block.set(2);
    assert_eq!(
        animation.storage(),
        AnimationStorage::Block {
            block: 2,
            offset: 64
        }
    );
}

#[test]
fn bone_limits_depend_on_version() {
    let mut builder = ModelBuilder::new("many_bones");
    for i in 0..129 {
        builder = builder.bone(&format!("bone{i}"), -1, Vec3::ZERO);
    }

    let v48 = Mdl::from_bytes(builder.clone().version(48).build_mdl());
    assert_eq!(
        v48.header().unwrap().check_limits(),
        Err(Error::LimitExceeded {
            what: "bones",
            count: 129,
            max: 128
        })
    );

    let v52 = Mdl::from_bytes(builder.version(52).build_mdl());
    v52.header().unwrap().validate().unwrap();
}

#[test]
fn skin_family_limit() {
    let mut builder = ModelBuilder::new("skins").texture("a");
    builder.skin_families = vec![vec![0]; 33];
    let mdl = Mdl::from_bytes(builder.build_mdl());
    let header = mdl.header().unwrap();
    header.check_bounds().unwrap();
    assert!(matches!(
        header.check_limits(),
        Err(Error::LimitExceeded {
            what: "skin families",
            count: 33,
            ..
        })
    ));
}

#[test]
fn flex_op_data() {
    let mut op = FlexOp::zeroed();
    op.op.set(1);
    op.data.set(i32::from_ne_bytes(1.5f32.to_bits().to_ne_bytes()));
    assert_eq!(op.kind(), FlexOpKind::Const);
    assert_relative_eq!(op.value(), 1.5);

    op.op.set(2);
    op.data.set(7);
    assert_eq!(op.kind(), FlexOpKind::Fetch1);
    assert_eq!(op.index(), 7);

    op.op.set(99);
    assert_eq!(op.kind(), FlexOpKind::Unknown(99));
}
