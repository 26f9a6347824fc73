use std::fmt;
use std::io::{self, Read};

use byteorder::LE;
use glam::{Quat, Vec3};
use zerocopy::{byteorder::U32, AsBytes, FromBytes, LayoutVerified, Unaligned};

/// Little-endian `f32` with an alignment of 1, for use in packed records.
#[derive(Clone, Copy, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(transparent)]
pub struct F32(U32<LE>);

impl F32 {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(U32::new(value.to_bits()))
    }

    #[must_use]
    pub fn get(self) -> f32 {
        f32::from_bits(self.0.get())
    }

    #[must_use]
    pub fn vec3(value: Vec3) -> [Self; 3] {
        [Self::new(value.x), Self::new(value.y), Self::new(value.z)]
    }
}

impl fmt::Debug for F32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

impl From<f32> for F32 {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

pub(crate) fn vec3(value: [F32; 3]) -> Vec3 {
    Vec3::new(value[0].get(), value[1].get(), value[2].get())
}

pub(crate) fn quat(value: [F32; 4]) -> Quat {
    Quat::from_xyzw(
        value[0].get(),
        value[1].get(),
        value[2].get(),
        value[3].get(),
    )
}

/// Row-major 3x4 matrix, as stored on disk.
pub(crate) fn matrix_3x4(value: [F32; 12]) -> [[f32; 4]; 3] {
    let mut rows = [[0.0; 4]; 3];
    for (i, v) in value.iter().enumerate() {
        rows[i / 4][i % 4] = v.get();
    }
    rows
}

pub fn null_terminated_prefix(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.is_empty() {
        return None;
    }
    bytes.splitn(2, |&b| b == 0).next()
}

pub fn read_file(mut reader: impl Read) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Applies a signed relative offset to an absolute base offset.
pub fn offset_from(base: usize, relative: i32) -> Option<usize> {
    let absolute = i64::try_from(base).ok()?.checked_add(i64::from(relative))?;
    usize::try_from(absolute).ok()
}

pub fn parse<T: FromBytes + Unaligned>(bytes: &[u8], offset: usize) -> Option<&T> {
    bytes
        .get(offset..)
        .and_then(LayoutVerified::<_, T>::new_unaligned_from_prefix)
        .map(|(res, _)| res.into_ref())
}

pub fn parse_slice<T: FromBytes + Unaligned>(
    bytes: &[u8],
    offset: usize,
    count: usize,
) -> Option<&[T]> {
    if count == 0 {
        return Some(&[]);
    }

    bytes
        .get(offset..)
        .and_then(|bytes| LayoutVerified::new_slice_unaligned_from_prefix(bytes, count))
        .map(|(res, _)| res.into_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_is_little_endian() {
        let value = F32::new(1.0);
        assert_eq!(value.as_bytes(), &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(value.get(), 1.0);
    }

    #[test]
    fn relative_offsets() {
        assert_eq!(offset_from(100, -20), Some(80));
        assert_eq!(offset_from(100, 20), Some(120));
        assert_eq!(offset_from(10, -11), None);
    }

    #[test]
    fn slices_are_bounds_checked() {
        let bytes = [1u8, 0, 2, 0, 3, 0];
        let values: &[zerocopy::byteorder::U16<LE>] = parse_slice(&bytes, 2, 2).unwrap();
        assert_eq!(values[0].get(), 2);
        assert_eq!(values[1].get(), 3);
        assert!(parse_slice::<zerocopy::byteorder::U16<LE>>(&bytes, 2, 3).is_none());
        assert!(parse_slice::<zerocopy::byteorder::U16<LE>>(&bytes, 20, 0).is_some());
    }
}
