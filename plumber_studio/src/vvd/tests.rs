use approx::assert_relative_eq;
use glam::{Vec2, Vec3};

use super::*;

fn vertex(position: Vec3, influences: &[(u8, f32)]) -> Vertex {
    let mut bone_weight = BoneWeight {
        weights: [F32::new(0.0); 3],
        bones: [0; 3],
        bone_count: u8::try_from(influences.len()).unwrap(),
    };
    for (i, &(bone, weight)) in influences.iter().enumerate() {
        bone_weight.bones[i] = bone;
        bone_weight.weights[i] = F32::new(weight);
    }

    Vertex {
        bone_weight,
        position: F32::vec3(position),
        normal: F32::vec3(Vec3::Z),
        tex_coord: [F32::new(0.25), F32::new(0.75)],
    }
}

/// Header, then fixups, then vertices.
fn vertex_file(id: [u8; 4], lod_vertex_counts: &[i32], fixups: &[(i32, i32, i32)], vertices: &[Vertex]) -> Vec<u8> {
    let fixup_offset = VertexFileHeader::SIZE;
    let vertex_offset = fixup_offset + fixups.len() * Fixup::SIZE;

    let mut header = VertexFileHeader::zeroed();
    header.id = id;
    header.version.set(VVD_VERSION);
    header.checksum.set(42);
    header.lod_count.set(i32::try_from(lod_vertex_counts.len()).unwrap());
    for (i, &count) in lod_vertex_counts.iter().enumerate() {
        header.lod_vertex_counts[i].set(count);
    }
    header.fixup_count.set(i32::try_from(fixups.len()).unwrap());
    header.fixup_table_offset.set(i32::try_from(fixup_offset).unwrap());
    header.vertex_data_offset.set(i32::try_from(vertex_offset).unwrap());

    let mut bytes = Vec::new();
    header.write_into(&mut bytes);
    for &(lod, source_vertex_id, vertex_count) in fixups {
        let mut fixup = Fixup::zeroed();
        fixup.lod.set(lod);
        fixup.source_vertex_id.set(source_vertex_id);
        fixup.vertex_count.set(vertex_count);
        fixup.write_into(&mut bytes);
    }
    for vertex in vertices {
        vertex.write_into(&mut bytes);
    }
    bytes
}

fn four_vertices() -> Vec<Vertex> {
    (0..4)
        .map(|i| vertex(Vec3::new(i as f32, 0.0, 0.0), &[(0, 1.0)]))
        .collect()
}

#[test]
fn record_sizes() {
    assert_eq!(VertexFileHeader::SIZE, 64);
    assert_eq!(Vertex::SIZE, 48);
    assert_eq!(std::mem::size_of::<BoneWeight>(), 16);
    assert_eq!(Fixup::SIZE, 12);
}

#[test]
fn vvc_magic_byte_order() {
    assert_eq!(detect_vvc_byte_order(*b"IDCV"), Some(Endian::Big));
    assert_eq!(detect_vvc_byte_order(*b"VCDI"), Some(Endian::Little));
    assert_eq!(detect_vvc_byte_order(*b"IDSV"), None);
    assert_eq!(VVC_MAGIC_BE, u32::from_be_bytes(*b"IDCV"));
    assert_eq!(VVC_MAGIC_LE, VVC_MAGIC_BE.swap_bytes());
}

#[test]
fn signatures() {
    let vvd = VertexFile::from_bytes(VertexFileKind::Vvd, vertex_file(*b"IDSV", &[0], &[], &[]));
    vvd.check_signature().unwrap();
    assert_eq!(vvd.check_version().unwrap(), VVD_VERSION);

    let vvc = VertexFile::from_bytes(VertexFileKind::Vvc, vertex_file(*b"IDCV", &[0], &[], &[]));
    vvc.check_signature().unwrap();

    let swapped = VertexFile::from_bytes(VertexFileKind::Vvc, vertex_file(*b"VCDI", &[0], &[], &[]));
    assert_eq!(
        swapped.check_signature(),
        Err(Error::Unsupported {
            ty: FileType::Vvc,
            feature: "byte swapped files"
        })
    );

    let wrong = VertexFile::from_bytes(VertexFileKind::Vvd, vertex_file(*b"IDCV", &[0], &[], &[]));
    assert_eq!(
        wrong.check_signature(),
        Err(Error::InvalidSignature {
            ty: FileType::Vvd,
            signature: "IDCV".to_owned()
        })
    );
}

#[test]
fn unsupported_version() {
    let mut bytes = vertex_file(*b"IDSV", &[0], &[], &[]);
    bytes[4..8].copy_from_slice(&5i32.to_le_bytes());
    let vvd = VertexFile::from_bytes(VertexFileKind::Vvd, bytes);
    assert_eq!(
        vvd.check_version(),
        Err(Error::UnsupportedVersion {
            ty: FileType::Vvd,
            version: 5
        })
    );
}

#[test]
fn vertices_without_fixups() {
    let vertices = four_vertices();
    let vvd = VertexFile::from_bytes(
        VertexFileKind::Vvd,
        vertex_file(*b"IDSV", &[4], &[], &vertices),
    );
    let header = vvd.header().unwrap();

    assert_eq!(header.checksum(), 42);
    assert_eq!(header.lod_count().unwrap(), 1);
    assert_eq!(header.vertices().unwrap(), &vertices[..]);
    assert_eq!(header.lod_vertices(0).unwrap(), Some(vertices));
    assert_eq!(header.lod_vertices(1).unwrap(), None);
    assert!(header.tangents().unwrap().is_empty());

    let vertex = header.vertices().unwrap()[2];
    assert_relative_eq!(vertex.position(), Vec3::new(2.0, 0.0, 0.0));
    assert_relative_eq!(vertex.tex_coord(), Vec2::new(0.25, 0.75));
    assert_eq!(vertex.bone_weight.influences().collect::<Vec<_>>(), vec![(0, 1.0)]);
}

#[test]
fn lod_vertices_follow_fixups() {
    let vertices = four_vertices();
    let vvd = VertexFile::from_bytes(
        VertexFileKind::Vvd,
        vertex_file(
            *b"IDSV",
            &[4, 3],
            &[(1, 0, 2), (0, 2, 1), (1, 3, 1)],
            &vertices,
        ),
    );
    let header = vvd.header().unwrap();

    assert_eq!(header.fixups().unwrap().len(), 3);
    assert_eq!(header.lod_vertex_count(1).unwrap(), Some(3));

    let lod_0 = header.lod_vertices(0).unwrap().unwrap();
    assert_eq!(lod_0, vertices);

    let lod_1 = header.lod_vertices(1).unwrap().unwrap();
    let xs: Vec<f32> = lod_1.iter().map(|v| v.position().x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 3.0]);

    assert_eq!(header.lod_vertices(2).unwrap(), None);
}

#[test]
fn fixups_out_of_range_are_corrupted() {
    let vvd = VertexFile::from_bytes(
        VertexFileKind::Vvd,
        vertex_file(*b"IDSV", &[4], &[(0, 3, 5)], &four_vertices()),
    );
    assert!(matches!(
        vvd.header().unwrap().lod_vertices(0),
        Err(Error::Corrupted {
            ty: FileType::Vvd,
            ..
        })
    ));
}

#[test]
fn truncated_vertices_are_corrupted() {
    let mut bytes = vertex_file(*b"IDSV", &[4], &[], &four_vertices());
    bytes.truncate(bytes.len() - 1);
    let vvd = VertexFile::from_bytes(VertexFileKind::Vvd, bytes);
    assert_eq!(
        vvd.header().unwrap().vertices(),
        Err(Error::Corrupted {
            ty: FileType::Vvd,
            error: "vertices out of bounds"
        })
    );
}

#[test]
fn vvc_vertex_data_is_not_decoded() {
    let vvc = VertexFile::from_bytes(
        VertexFileKind::Vvc,
        vertex_file(*b"IDCV", &[4], &[], &four_vertices()),
    );
    let header = vvc.header().unwrap();
    assert_eq!(header.file_type(), FileType::Vvc);
    assert_eq!(
        header.vertices(),
        Err(Error::Unsupported {
            ty: FileType::Vvc,
            feature: "compressed vertex data"
        })
    );
}

#[test]
fn thin_vertices_from_full_vertices() {
    let vertices = vec![
        vertex(Vec3::new(1.0, 2.0, 3.0), &[(4, 0.75), (7, 0.25)]),
        vertex(Vec3::new(-1.0, 0.0, 0.5), &[(2, 1.0)]),
    ];
    let vvd = VertexFile::from_bytes(
        VertexFileKind::Vvd,
        vertex_file(*b"IDSV", &[2], &[], &vertices),
    );
    let thin = vvd.header().unwrap().thin_vertices().unwrap();

    assert_eq!(thin.num_bone_influences(), 2);
    assert_eq!(thin.len(), 2);
    assert_eq!(thin.bone_weights(), &[0.75, 1.0]);
    assert_eq!(thin.bone_indices(), &[4, 7, 2, 0]);
    assert_eq!(thin.position(0), Some(Vec3::new(1.0, 2.0, 3.0)));
    assert_relative_eq!(thin.normal(1).unwrap(), Vec3::Z, epsilon = 0.01);

    let influences = thin.influences(0).unwrap();
    assert_eq!(influences[0], (4, 0.75));
    assert_eq!(influences[1].0, 7);
    assert_relative_eq!(influences[1].1, 0.25);

    assert_eq!(thin.influences(2), None);
}

#[test]
fn thin_vertices_validate_lengths() {
    assert_eq!(
        ThinVertices::new(4),
        Err(Error::InvalidThinVertices("too many bone influences"))
    );

    assert!(ThinVertices::from_parts(2, vec![0.5], vec![0, 1], vec![Vec3::ZERO], vec![0]).is_ok());
    assert!(ThinVertices::from_parts(2, vec![0.5, 0.5], vec![0, 1], vec![Vec3::ZERO], vec![0]).is_err());
    assert!(ThinVertices::from_parts(2, vec![0.5], vec![0], vec![Vec3::ZERO], vec![0]).is_err());
    assert!(ThinVertices::from_parts(2, vec![0.5], vec![0, 1], vec![Vec3::ZERO], vec![]).is_err());

    // no stored weights at all with zero or one influence
    assert!(ThinVertices::from_parts(1, vec![], vec![3], vec![Vec3::ZERO], vec![0]).is_ok());
    assert!(ThinVertices::from_parts(0, vec![], vec![], vec![Vec3::ZERO], vec![0]).is_ok());

    let mut thin = ThinVertices::new(3).unwrap();
    assert!(thin.push(&[0.5], &[0, 1, 2], Vec3::ZERO, 0).is_err());
    thin.push(&[0.5, 0.25], &[0, 1, 2], Vec3::ONE, 0).unwrap();
    assert_eq!(thin.vertex_weights(0), Some(&[0.5, 0.25][..]));
    assert_eq!(thin.vertex_weights(usize::MAX), None);
    assert_eq!(thin.vertex_bone_indices(0), Some(&[0, 1, 2][..]));
}

#[test]
fn thin_vertices_serialization() {
    let mut thin = ThinVertices::new(2).unwrap();
    thin.push(&[0.5], &[1, 2], Vec3::new(1.0, 2.0, 3.0), 0x1234)
        .unwrap();
    thin.push(&[1.0], &[3, -1], Vec3::new(4.0, 5.0, 6.0), 0xabcd)
        .unwrap();

    let bytes = thin.to_bytes();
    assert_eq!(bytes.len(), thin.serialized_len());
    assert_eq!(bytes.len(), 4 + 2 * 4 + 4 + 2 * 12 + 2 * 2);
    assert_eq!(&bytes[0..4], &2i32.to_le_bytes());
    assert_eq!(&bytes[4..8], &0.5f32.to_le_bytes());
    assert_eq!(&bytes[12..16], &[1, 2, 3, 0xff]);
    assert_eq!(&bytes[bytes.len() - 2..], &0xabcdu16.to_le_bytes());

    assert_eq!(ThinVertices::from_bytes(&bytes, 2).unwrap(), thin);
    assert_eq!(
        ThinVertices::from_bytes(&bytes[..bytes.len() - 1], 2),
        Err(Error::InvalidThinVertices("thin vertex block is truncated"))
    );
}

#[test]
fn packed_normal_layout() {
    assert_eq!(pack_normal(Vec3::Z), 0x8080);
    assert_eq!(pack_normal(Vec3::X), 0x80ff);
    assert_eq!(pack_normal(-Vec3::Y), 0x0080);
}

#[test]
fn normal_packing() {
    for normal in [
        Vec3::Z,
        -Vec3::Z,
        Vec3::X,
        -Vec3::Y,
        Vec3::new(1.0, 1.0, 1.0).normalize(),
        Vec3::new(0.3, -0.5, -0.8).normalize(),
        Vec3::new(-0.9, 0.1, -0.2).normalize(),
    ] {
        let unpacked = unpack_normal(pack_normal(normal));
        assert_relative_eq!(unpacked, normal, epsilon = 0.03);
        assert_relative_eq!(unpacked.length(), 1.0, epsilon = 1e-5);
    }

    assert_relative_eq!(unpack_normal(pack_normal(Vec3::ZERO)), Vec3::Z, epsilon = 0.01);
}
