use std::{fmt, io::Read};

use byteorder::LE;
use zerocopy::{byteorder::I32, AsBytes, FromBytes, Unaligned};

use crate::binary_utils::read_file;
use crate::mdl::Record;
use crate::{Error, FileType, Result};

/// `phyheader_t`, the start of a collision model file.
#[derive(Debug, Clone, PartialEq, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
pub struct PhyHeader {
    /// Size of this header, always 16.
    pub size: I32<LE>,
    pub id: I32<LE>,
    pub solid_count: I32<LE>,
    /// Must match the mdl checksum.
    pub checksum: I32<LE>,
}

impl Record for PhyHeader {
    const NAME: &'static str = "phy header";
}

/// A phy file held in memory. Only the header is decoded.
#[derive(Clone)]
pub struct Phy {
    bytes: Vec<u8>,
}

impl Phy {
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

    /// # Errors
    ///
    /// Returns `Err` if the header is truncated or declares an unexpected size.
    pub fn header(&self) -> Result<PhyHeader> {
        let header = PhyHeader::load(&self.bytes, 0).ok_or(Error::Corrupted {
            ty: FileType::Phy,
            error: "eof reading header",
        })?;

        if usize::try_from(header.size.get()).ok() != Some(PhyHeader::SIZE) {
            return Err(Error::Corrupted {
                ty: FileType::Phy,
                error: "unexpected header size",
            });
        }

        Ok(header)
    }

    /// # Errors
    ///
    /// Returns `Err` if the header is invalid.
    pub fn checksum(&self) -> Result<i32> {
        self.header().map(|header| header.checksum.get())
    }
}

impl fmt::Debug for Phy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phy").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_checked() {
        let mut header = PhyHeader::zeroed();
        header.size.set(16);
        header.solid_count.set(2);
        header.checksum.set(-7);

        let phy = Phy::from_bytes(header.write().to_vec());
        assert_eq!(PhyHeader::SIZE, 16);
        assert_eq!(phy.checksum(), Ok(-7));

        header.size.set(20);
        let phy = Phy::from_bytes(header.write().to_vec());
        assert_eq!(
            phy.header(),
            Err(Error::Corrupted {
                ty: FileType::Phy,
                error: "unexpected header size"
            })
        );

        assert!(Phy::from_bytes(vec![16, 0, 0]).header().is_err());
    }
}
