use crate::Integrity;
use crate::crc::CHECKSUM_SIZE;
use crate::error::Error;
use crate::raw::WORD_SIZE;
use core::ops::Range;

/// Round `size` up to the next multiple of `page_size`, which has to be a power of two.
#[inline(always)]
pub const fn align_up(size: usize, page_size: usize) -> usize {
    debug_assert!(page_size.is_power_of_two());
    size.saturating_add(page_size - 1) & !(page_size - 1)
}

/// Start of a region of `aligned_size` bytes that ends at `flash_end`.
#[inline(always)]
pub const fn region_address(flash_end: u32, aligned_size: usize) -> u32 {
    flash_end - aligned_size as u32
}

/// Where a record of a given length lives in flash. Computed once when the store is created
/// and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    length: usize,
    aligned_size: usize,
    page_size: usize,
    address: u32,
    integrity: Integrity,
}

impl Layout {
    /// Places a record of `length` bytes in the last pages before `flash_end`.
    ///
    /// `integrity` is the requested mode; records too short to host a checksum silently fall
    /// back to [`Integrity::None`].
    pub fn new(
        length: usize,
        page_size: usize,
        flash_start: u32,
        flash_end: u32,
        integrity: Integrity,
    ) -> Result<Layout, Error> {
        if length == 0 {
            return Err(Error::EmptyRecord);
        }

        if !page_size.is_power_of_two() || !page_size.is_multiple_of(WORD_SIZE) {
            return Err(Error::InvalidPageSize);
        }

        if !(flash_end as usize).is_multiple_of(page_size) {
            return Err(Error::InvalidFlashEnd);
        }

        let aligned_size = align_up(length, page_size);
        let available = flash_end.saturating_sub(flash_start) as usize;
        if aligned_size > available {
            return Err(Error::RecordTooLarge);
        }

        Ok(Self {
            length,
            aligned_size,
            page_size,
            address: region_address(flash_end, aligned_size),
            integrity: integrity.effective(length),
        })
    }

    /// First address of the region.
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// Size of the region, a non-zero multiple of the page size.
    pub const fn aligned_size(&self) -> usize {
        self.aligned_size
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub const fn pages(&self) -> usize {
        self.aligned_size / self.page_size
    }

    pub const fn page_address(&self, page: usize) -> u32 {
        self.address + (page * self.page_size) as u32
    }

    /// Length of the record in bytes, including the checksum field.
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Bytes covered by change detection and the checksum.
    pub const fn payload_len(&self) -> usize {
        match self.integrity {
            Integrity::Crc16 => self.length - CHECKSUM_SIZE,
            Integrity::None => self.length,
        }
    }

    /// The integrity mode in effect, after the short record fallback.
    pub const fn integrity(&self) -> Integrity {
        self.integrity
    }

    pub fn range(&self) -> Range<u32> {
        self.address..self.address + self.aligned_size as u32
    }
}
