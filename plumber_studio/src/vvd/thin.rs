use byteorder::{ReadBytesExt, LE};
use glam::{Vec2, Vec3};

use crate::consts::MAX_BONES_PER_VERTEX;
use crate::{Error, Result};

use super::Vertex;

/// `thinModelVertices_t`, a reduced structure of arrays vertex layout.
///
/// With `N` bone influences and `V` vertices the arrays hold `V * (N - 1)` weights (none
/// if `N` is zero, the last weight of each vertex is implied), `V * N` bone indices, `V`
/// positions and `V` packed normals.
///
/// Normals use this crate's own octahedral packing, see [`pack_normal`]. It is not the
/// engine's `PackNormal_UBYTE4` encoding, so packed normals taken from a game `.vvc` do not
/// decode with [`unpack_normal`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThinVertices {
    num_bone_influences: usize,
    bone_weights: Vec<f32>,
    bone_indices: Vec<i8>,
    positions: Vec<Vec3>,
    normals: Vec<u16>,
}

fn weight_stride(num_bone_influences: usize) -> usize {
    num_bone_influences.saturating_sub(1)
}

impl ThinVertices {
    /// An empty block with the given number of influences per vertex.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `num_bone_influences` is above [`MAX_BONES_PER_VERTEX`].
    pub fn new(num_bone_influences: usize) -> Result<Self> {
        Self::from_parts(num_bone_influences, Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    /// # Errors
    ///
    /// Returns `Err` if the array lengths are inconsistent with each other.
    pub fn from_parts(
        num_bone_influences: usize,
        bone_weights: Vec<f32>,
        bone_indices: Vec<i8>,
        positions: Vec<Vec3>,
        normals: Vec<u16>,
    ) -> Result<Self> {
        if num_bone_influences > MAX_BONES_PER_VERTEX {
            return Err(Error::InvalidThinVertices("too many bone influences"));
        }

        let vertex_count = positions.len();

        if normals.len() != vertex_count {
            return Err(Error::InvalidThinVertices(
                "normal count does not match position count",
            ));
        }
        if Some(bone_weights.len()) != vertex_count.checked_mul(weight_stride(num_bone_influences)) {
            return Err(Error::InvalidThinVertices(
                "bone weight count does not match vertex count",
            ));
        }
        if Some(bone_indices.len()) != vertex_count.checked_mul(num_bone_influences) {
            return Err(Error::InvalidThinVertices(
                "bone index count does not match vertex count",
            ));
        }

        Ok(Self {
            num_bone_influences,
            bone_weights,
            bone_indices,
            positions,
            normals,
        })
    }

    /// Thins full vertices, using as many influences as the most influenced vertex.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a vertex has more than [`MAX_BONES_PER_VERTEX`] influences.
    pub fn from_vertices(vertices: &[Vertex]) -> Result<Self> {
        let num_bone_influences = vertices
            .iter()
            .map(|v| usize::from(v.bone_weight.bone_count))
            .max()
            .unwrap_or_default();

        let mut thin = Self::new(num_bone_influences)?;

        for vertex in vertices {
            let weight = &vertex.bone_weight;
            let used = usize::from(weight.bone_count);

            let weights: Vec<f32> = (0..weight_stride(num_bone_influences))
                .map(|i| if i < used { weight.weights[i].get() } else { 0.0 })
                .collect();
            let indices: Vec<i8> = (0..num_bone_influences)
                .map(|i| {
                    if i < used {
                        i8::from_ne_bytes([weight.bones[i]])
                    } else {
                        0
                    }
                })
                .collect();

            thin.push(
                &weights,
                &indices,
                vertex.position(),
                pack_normal(vertex.normal()),
            )?;
        }

        Ok(thin)
    }

    /// Appends one vertex.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the weight or index count does not match the block's stride.
    pub fn push(
        &mut self,
        bone_weights: &[f32],
        bone_indices: &[i8],
        position: Vec3,
        normal: u16,
    ) -> Result<()> {
        if bone_weights.len() != weight_stride(self.num_bone_influences) {
            return Err(Error::InvalidThinVertices(
                "bone weight count does not match influence count",
            ));
        }
        if bone_indices.len() != self.num_bone_influences {
            return Err(Error::InvalidThinVertices(
                "bone index count does not match influence count",
            ));
        }

        self.bone_weights.extend_from_slice(bone_weights);
        self.bone_indices.extend_from_slice(bone_indices);
        self.positions.push(position);
        self.normals.push(normal);
        Ok(())
    }

    #[must_use]
    pub fn num_bone_influences(&self) -> usize {
        self.num_bone_influences
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn bone_weights(&self) -> &[f32] {
        &self.bone_weights
    }

    #[must_use]
    pub fn bone_indices(&self) -> &[i8] {
        &self.bone_indices
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Normals packed with [`pack_normal`].
    #[must_use]
    pub fn normals(&self) -> &[u16] {
        &self.normals
    }

    /// The stored weights of one vertex, without the implied last weight.
    #[must_use]
    pub fn vertex_weights(&self, vertex: usize) -> Option<&[f32]> {
        if vertex >= self.len() {
            return None;
        }
        let stride = weight_stride(self.num_bone_influences);
        self.bone_weights.get(vertex * stride..(vertex + 1) * stride)
    }

    #[must_use]
    pub fn vertex_bone_indices(&self, vertex: usize) -> Option<&[i8]> {
        if vertex >= self.len() {
            return None;
        }
        let stride = self.num_bone_influences;
        self.bone_indices.get(vertex * stride..(vertex + 1) * stride)
    }

    /// `(bone, weight)` pairs of a vertex, including the implied last weight.
    #[must_use]
    pub fn influences(&self, vertex: usize) -> Option<Vec<(i8, f32)>> {
        let weights = self.vertex_weights(vertex)?;
        let indices = self.vertex_bone_indices(vertex)?;
        let implied = 1.0 - weights.iter().sum::<f32>();

        Some(
            indices
                .iter()
                .zip(weights.iter().copied().chain(std::iter::once(implied)))
                .map(|(&bone, weight)| (bone, weight))
                .collect(),
        )
    }

    #[must_use]
    pub fn position(&self, vertex: usize) -> Option<Vec3> {
        self.positions.get(vertex).copied()
    }

    #[must_use]
    pub fn normal(&self, vertex: usize) -> Option<Vec3> {
        self.normals.get(vertex).map(|&n| unpack_normal(n))
    }

    #[must_use]
    pub fn into_parts(self) -> (usize, Vec<f32>, Vec<i8>, Vec<Vec3>, Vec<u16>) {
        (
            self.num_bone_influences,
            self.bone_weights,
            self.bone_indices,
            self.positions,
            self.normals,
        )
    }

    /// Size of the serialized block in bytes.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        4 + self.bone_weights.len() * 4
            + self.bone_indices.len()
            + self.positions.len() * 12
            + self.normals.len() * 2
    }

    /// Serializes the block: the influence count as `i32`, then weights, bone indices,
    /// positions and normals back to back, all little-endian.
    pub fn write_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.serialized_len());

        let influences = i32::try_from(self.num_bone_influences).unwrap_or_default();
        out.extend_from_slice(&influences.to_le_bytes());

        for weight in &self.bone_weights {
            out.extend_from_slice(&weight.to_le_bytes());
        }
        out.extend(self.bone_indices.iter().flat_map(|i| i.to_le_bytes()));
        for position in &self.positions {
            for component in position.to_array() {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        for normal in &self.normals {
            out.extend_from_slice(&normal.to_le_bytes());
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    /// Reads a serialized block holding `vertex_count` vertices from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the block is truncated or its influence count is invalid.
    pub fn from_bytes(bytes: &[u8], vertex_count: usize) -> Result<Self> {
        const TRUNCATED: Error = Error::InvalidThinVertices("thin vertex block is truncated");

        let mut reader = bytes;

        let num_bone_influences = reader.read_i32::<LE>().map_err(|_| TRUNCATED)?;
        let num_bone_influences = usize::try_from(num_bone_influences)
            .map_err(|_| Error::InvalidThinVertices("negative bone influence count"))?;
        if num_bone_influences > MAX_BONES_PER_VERTEX {
            return Err(Error::InvalidThinVertices("too many bone influences"));
        }

        let weight_count = vertex_count
            .checked_mul(weight_stride(num_bone_influences))
            .ok_or(TRUNCATED)?;
        let index_count = vertex_count
            .checked_mul(num_bone_influences)
            .ok_or(TRUNCATED)?;
        let needed = weight_count
            .checked_mul(4)
            .and_then(|n| n.checked_add(index_count))
            .and_then(|n| n.checked_add(vertex_count.checked_mul(14)?))
            .ok_or(TRUNCATED)?;
        if reader.len() < needed {
            return Err(TRUNCATED);
        }

        let mut bone_weights = vec![0.0; weight_count];
        reader
            .read_f32_into::<LE>(&mut bone_weights)
            .map_err(|_| TRUNCATED)?;

        let mut bone_indices = vec![0; index_count];
        reader.read_i8_into(&mut bone_indices).map_err(|_| TRUNCATED)?;

        let mut components = vec![0.0; vertex_count * 3];
        reader
            .read_f32_into::<LE>(&mut components)
            .map_err(|_| TRUNCATED)?;
        let positions = components
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .collect();

        let mut normals = vec![0; vertex_count];
        reader
            .read_u16_into::<LE>(&mut normals)
            .map_err(|_| TRUNCATED)?;

        Self::from_parts(
            num_bone_influences,
            bone_weights,
            bone_indices,
            positions,
            normals,
        )
    }
}

/// Packs a unit normal into 16 bits with an octahedral mapping, `x` in the low byte.
///
/// This is a crate-local encoding and does not reproduce the engine's `PackNormal_UBYTE4`.
/// Only values produced here round trip through [`unpack_normal`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pack_normal(normal: Vec3) -> u16 {
    let l1 = normal.x.abs() + normal.y.abs() + normal.z.abs();
    if l1 == 0.0 {
        return pack_normal(Vec3::Z);
    }

    let n = normal / l1;
    let mut folded = Vec2::new(n.x, n.y);
    if n.z < 0.0 {
        folded = Vec2::new(
            (1.0 - n.y.abs()) * n.x.signum(),
            (1.0 - n.x.abs()) * n.y.signum(),
        );
    }

    let quantize = |v: f32| ((v.clamp(-1.0, 1.0) * 0.5 + 0.5) * 255.0).round() as u8;
    u16::from_le_bytes([quantize(folded.x), quantize(folded.y)])
}

/// Inverse of [`pack_normal`].
#[must_use]
pub fn unpack_normal(packed: u16) -> Vec3 {
    let [x, y] = packed.to_le_bytes();
    let x = f32::from(x) / 255.0 * 2.0 - 1.0;
    let y = f32::from(y) / 255.0 * 2.0 - 1.0;
    let z = 1.0 - x.abs() - y.abs();

    let n = if z < 0.0 {
        Vec3::new((1.0 - y.abs()) * x.signum(), (1.0 - x.abs()) * y.signum(), z)
    } else {
        Vec3::new(x, y, z)
    };

    n.normalize_or_zero()
}
