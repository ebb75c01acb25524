//! [`Platform`] on top of any `embedded-storage` NOR flash driver.
//!
//! Drivers of that kind block until an operation has finished and take whole buffers instead of
//! single words, so the page buffer lives in RAM and is written with a single call once the page
//! is committed.

use crate::platform::{Platform, align_ceil, align_floor};
use crate::raw::WORD_SIZE;
use alloc::vec;
use alloc::vec::Vec;
use embedded_storage::nor_flash::NorFlash;

/// Uses the erase size of `F` as page size and places the settings region right below
/// `END`, an offset in the address space of `F`.
pub struct NorFlashPlatform<F, const END: u32> {
    flash: F,
    page: Vec<u8>,
    page_address: u32,
}

impl<F: NorFlash, const END: u32> NorFlashPlatform<F, END> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            page: Vec::new(),
            page_address: 0,
        }
    }

    pub fn inner(&self) -> &F {
        &self.flash
    }

    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: NorFlash, const END: u32> Platform for NorFlashPlatform<F, END> {
    const PAGE_SIZE: usize = F::ERASE_SIZE;
    const FLASH_END: u32 = END;

    type Error = F::Error;

    // embedded-storage drivers handle write protection internally
    fn unlock(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn lock(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error> {
        self.flash.erase(address, address + F::ERASE_SIZE as u32)
    }

    fn begin_page(&mut self, address: u32) -> Result<(), Self::Error> {
        self.page.clear();
        self.page.resize(F::ERASE_SIZE, 0xFF);
        self.page_address = address;
        Ok(())
    }

    /// # Panics
    /// Panics if `address` is outside of the page opened with `begin_page`.
    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        let offset = (address - self.page_address) as usize;
        self.page[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn commit_page(&mut self, address: u32) -> Result<(), Self::Error> {
        // the page was erased, so a trailer of all ones does not need to be written
        let used = match self.page.iter().rposition(|&byte| byte != 0xFF) {
            Some(last) => align_ceil(last + 1, F::WRITE_SIZE),
            None => return Ok(()),
        };
        self.flash.write(address, &self.page[..used])
    }

    fn is_busy(&mut self) -> bool {
        false
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, Self::Error> {
        let start = align_floor(address as usize, F::READ_SIZE);
        let mut buf = vec![0u8; F::READ_SIZE];
        self.flash.read(start as u32, &mut buf)?;
        Ok(buf[address as usize - start])
    }

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = align_floor(address as usize, F::READ_SIZE);
        let end = align_ceil(address as usize + bytes.len(), F::READ_SIZE);
        if start == address as usize && end == start + bytes.len() {
            return self.flash.read(address, bytes);
        }

        let mut buf = vec![0u8; end - start];
        self.flash.read(start as u32, &mut buf)?;
        let offset = address as usize - start;
        bytes.copy_from_slice(&buf[offset..offset + bytes.len()]);
        Ok(())
    }
}
