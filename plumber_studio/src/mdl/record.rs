use std::{iter::FusedIterator, marker::PhantomData, mem::size_of, ops::Deref, ops::Range, str};

use zerocopy::{AsBytes, FromBytes, Unaligned};

use crate::binary_utils::{null_terminated_prefix, offset_from, parse, parse_slice};
use crate::{Error, FileType, Result};

/// A fixed-size, packed on-disk record.
///
/// Implementors are `#[repr(C)]` structs built only from unaligned fields, so the
/// in-memory layout is the file layout byte for byte.
pub trait Record: FromBytes + AsBytes + Unaligned + Clone {
    /// Name used in error messages.
    const NAME: &'static str;
    const SIZE: usize = size_of::<Self>();

    /// Decodes a record without touching any field.
    fn read(bytes: &[u8], offset: usize) -> Option<Self> {
        parse::<Self>(bytes, offset).cloned()
    }

    /// Decodes a record and zeroes the fields that only have meaning inside a running engine.
    fn load(bytes: &[u8], offset: usize) -> Option<Self> {
        let mut record = Self::read(bytes, offset)?;
        record.clear_runtime_fields();
        Some(record)
    }

    fn clear_runtime_fields(&mut self) {}

    /// The exact on-disk bytes of the record.
    fn write(&self) -> &[u8] {
        self.as_bytes()
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    #[must_use]
    fn zeroed() -> Self {
        Self::new_zeroed()
    }
}

/// A `(count, offset)` pair locating a contiguous array of records.
///
/// The offset is relative to the structure the pair was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordArray {
    pub count: i32,
    pub offset: i32,
}

impl RecordArray {
    #[must_use]
    pub fn new(count: i32, offset: i32) -> Self {
        Self { count, offset }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.count == 0
    }

    /// Absolute byte range `[base + offset, base + offset + count * record_size)`.
    ///
    /// Returns `None` if the count is negative, the start lands before the buffer
    /// or the end lands past `len`. Empty arrays are always valid.
    #[must_use]
    pub fn byte_range(self, base: usize, record_size: usize, len: usize) -> Option<Range<usize>> {
        let count = usize::try_from(self.count).ok()?;

        if count == 0 {
            let start = offset_from(base, self.offset)
                .filter(|&start| start <= len)
                .unwrap_or(len);
            return Some(start..start);
        }

        let start = offset_from(base, self.offset)?;
        let end = start.checked_add(count.checked_mul(record_size)?)?;

        (end <= len).then(|| start..end)
    }

    pub(crate) fn out_of_bounds(self, ty: FileType, what: &'static str, base: usize, len: usize) -> Error {
        Error::OutOfBounds {
            ty,
            what,
            offset: i64::try_from(base)
                .unwrap_or(i64::MAX)
                .saturating_add(i64::from(self.offset)),
            count: i64::from(self.count),
            len,
        }
    }
}

pub(crate) fn read_string<'a>(
    bytes: &'a [u8],
    offset: Option<usize>,
    what: &'static str,
) -> Result<&'a str> {
    let bytes = offset
        .and_then(|offset| bytes.get(offset..))
        .and_then(null_terminated_prefix)
        .ok_or(Error::Corrupted {
            ty: FileType::Mdl,
            error: what,
        })?;

    str::from_utf8(bytes).map_err(|_| Error::Corrupted {
        ty: FileType::Mdl,
        error: what,
    })
}

/// Resolves `array` relative to `base` into an iterator of loaded records.
pub(crate) fn resolve<T: Record>(bytes: &[u8], base: usize, array: RecordArray) -> Result<Records<T>> {
    let range = array
        .byte_range(base, T::SIZE, bytes.len())
        .ok_or_else(|| array.out_of_bounds(FileType::Mdl, T::NAME, base, bytes.len()))?;

    tracing::trace!(
        "resolved {} {} records at {}..{}",
        array.count,
        T::NAME,
        range.start,
        range.end
    );

    Ok(Records {
        bytes,
        start: range.start,
        count: range.len() / T::SIZE,
        next: 0,
        marker: PhantomData,
    })
}

/// Resolves `array` relative to `base` into a slice of plain values.
pub(crate) fn resolve_values<'a, T: FromBytes + Unaligned>(
    bytes: &'a [u8],
    base: usize,
    array: RecordArray,
    what: &'static str,
) -> Result<&'a [T]> {
    let range = array
        .byte_range(base, size_of::<T>(), bytes.len())
        .ok_or_else(|| array.out_of_bounds(FileType::Mdl, what, base, bytes.len()))?;

    parse_slice(bytes, range.start, range.len() / size_of::<T>().max(1))
        .ok_or_else(|| array.out_of_bounds(FileType::Mdl, what, base, bytes.len()))
}

/// Iterator over the records of a resolved array.
#[derive(Debug, Clone)]
pub struct Records<'a, T> {
    bytes: &'a [u8],
    start: usize,
    count: usize,
    next: usize,
    marker: PhantomData<T>,
}

impl<'a, T: Record> Iterator for Records<'a, T> {
    type Item = RecordRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }

        let index = self.next;
        let offset = self.start + index * T::SIZE;
        self.next += 1;

        Some(RecordRef {
            record: T::load(self.bytes, offset)?,
            offset,
            index,
            bytes: self.bytes,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl<'a, T: Record> ExactSizeIterator for Records<'a, T> {}

impl<'a, T: Record> FusedIterator for Records<'a, T> {}

/// A loaded record together with its location in the file.
///
/// Offsets stored inside the record are resolved relative to [`RecordRef::offset`].
#[derive(Debug, Clone)]
pub struct RecordRef<'a, T> {
    record: T,
    offset: usize,
    index: usize,
    bytes: &'a [u8],
}

impl<'a, T: Record> RecordRef<'a, T> {
    /// Absolute offset of the record in the file.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Position of the record in the array it was resolved from.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn record(&self) -> &T {
        &self.record
    }

    #[must_use]
    pub fn into_record(self) -> T {
        self.record
    }

    pub(crate) fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Reads a null terminated string at an offset relative to this record.
    pub(crate) fn string(&self, relative: i32, what: &'static str) -> Result<&'a str> {
        read_string(self.bytes, offset_from(self.offset, relative), what)
    }

    /// Like [`Self::string`], but a zero offset means no string.
    pub(crate) fn optional_string(&self, relative: i32, what: &'static str) -> Result<Option<&'a str>> {
        if relative == 0 {
            return Ok(None);
        }
        self.string(relative, what).map(Some)
    }

    pub(crate) fn children<U: Record>(&self, array: RecordArray) -> Result<Records<'a, U>> {
        resolve(self.bytes, self.offset, array)
    }

    pub(crate) fn values<U: FromBytes + Unaligned>(
        &self,
        array: RecordArray,
        what: &'static str,
    ) -> Result<&'a [U]> {
        resolve_values(self.bytes, self.offset, array, what)
    }
}

impl<'a, T> Deref for RecordRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}
