/// The flash controller as seen by the settings store. Implementations only translate each call
/// into register accesses (or into calls of an underlying driver); sequencing, padding and
/// busy-waiting are done by the store.
///
/// See README.md for an example implementation.
pub trait Platform {
    /// Smallest erasable and programmable unit in bytes. Must be a power of two and a multiple
    /// of the word size (4).
    const PAGE_SIZE: usize;

    /// First address past the end of usable flash. The settings region ends here.
    const FLASH_END: u32;

    /// First address of flash. The settings region must not grow below it.
    const FLASH_START: u32 = 0;

    type Error;

    /// Make the controller accept erase and program commands.
    fn unlock(&mut self) -> Result<(), Self::Error>;

    /// Write protect the controller again.
    fn lock(&mut self) -> Result<(), Self::Error>;

    /// Start erasing the page at `address`.
    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Reset the page buffer before programming the page at `address`.
    fn begin_page(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Load one little-endian word destined for `address` into the page buffer.
    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error>;

    /// Start programming the page buffer into the page at `address`.
    fn commit_page(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Whether the last started operation is still running.
    fn is_busy(&mut self) -> bool;

    fn read_byte(&mut self, address: u32) -> Result<u8, Self::Error>;

    /// Read `bytes.len()` bytes starting at `address`.
    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        for (offset, byte) in bytes.iter_mut().enumerate() {
            *byte = self.read_byte(address + offset as u32)?;
        }
        Ok(())
    }
}

impl<T: Platform> Platform for &mut T {
    const PAGE_SIZE: usize = T::PAGE_SIZE;
    const FLASH_END: u32 = T::FLASH_END;
    const FLASH_START: u32 = T::FLASH_START;

    type Error = T::Error;

    fn unlock(&mut self) -> Result<(), Self::Error> {
        (**self).unlock()
    }

    fn lock(&mut self) -> Result<(), Self::Error> {
        (**self).lock()
    }

    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error> {
        (**self).erase_page(address)
    }

    fn begin_page(&mut self, address: u32) -> Result<(), Self::Error> {
        (**self).begin_page(address)
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        (**self).program_word(address, value)
    }

    fn commit_page(&mut self, address: u32) -> Result<(), Self::Error> {
        (**self).commit_page(address)
    }

    fn is_busy(&mut self) -> bool {
        (**self).is_busy()
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, Self::Error> {
        (**self).read_byte(address)
    }

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(address, bytes)
    }
}

#[inline(always)]
pub(crate) const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
pub(crate) const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use crate::nor::NorFlashPlatform;
    use esp_storage::FlashStorage;

    /// Settings region ending at `FLASH_END` of the SPI flash, e.g. the end of a data partition
    /// reserved for it. Pages are 4 KiB sectors.
    pub type EspFlash<'d, const FLASH_END: u32> = NorFlashPlatform<FlashStorage<'d>, FLASH_END>;
}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
pub use chip::*;
