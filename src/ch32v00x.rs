//! Register level [`Platform`] for the WCH CH32V00x family using the fast page mode.
//!
//! The controller is used through its memory mapped registers. Creating more than one
//! [`Ch32v00xFlash`] or touching the flash controller from an interrupt while a store is saving
//! leaves the controller in an undefined state.

use crate::platform::Platform;
use core::convert::Infallible;
use core::ptr::{read_volatile, write_volatile};

const FLASH_BASE: usize = 0x4002_2000;
const KEYR: *mut u32 = (FLASH_BASE + 0x04) as *mut u32;
const STATR: *mut u32 = (FLASH_BASE + 0x0C) as *mut u32;
const CTLR: *mut u32 = (FLASH_BASE + 0x10) as *mut u32;
const ADDR: *mut u32 = (FLASH_BASE + 0x14) as *mut u32;
const MODEKEYR: *mut u32 = (FLASH_BASE + 0x24) as *mut u32;

// Unlocking takes both keys in this order, a single write to LOCK locks again.
const KEY1: u32 = 0x4567_0123;
const KEY2: u32 = 0xCDEF_89AB;

const CR_STRT: u32 = 0x0000_0040;
const CR_LOCK: u32 = 0x0000_0080;
const CR_FLOCK: u32 = 0x0000_8000;
const CR_PAGE_PG: u32 = 0x0001_0000;
const CR_PAGE_ER: u32 = 0x0002_0000;
const CR_BUF_LOAD: u32 = 0x0004_0000;
const CR_BUF_RST: u32 = 0x0008_0000;

const SR_BSY: u32 = 0x0000_0001;

/// 16 KiB of code flash at `0x0800_0000` with 64 byte fast mode pages.
pub struct Ch32v00xFlash {
    _private: (),
}

impl Ch32v00xFlash {
    /// # Safety
    /// The caller must guarantee exclusive access to the flash controller for the lifetime of
    /// the returned value.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }

    #[inline(always)]
    fn modify_ctlr(&mut self, f: impl FnOnce(u32) -> u32) {
        unsafe { write_volatile(CTLR, f(read_volatile(CTLR))) }
    }
}

impl Platform for Ch32v00xFlash {
    const PAGE_SIZE: usize = 64;
    const FLASH_END: u32 = 0x0800_4000;
    const FLASH_START: u32 = 0x0800_0000;

    type Error = Infallible;

    fn unlock(&mut self) -> Result<(), Self::Error> {
        unsafe {
            write_volatile(KEYR, KEY1);
            write_volatile(KEYR, KEY2);
            write_volatile(MODEKEYR, KEY1);
            write_volatile(MODEKEYR, KEY2);
        }
        Ok(())
    }

    fn lock(&mut self) -> Result<(), Self::Error> {
        self.modify_ctlr(|ctlr| ctlr & !(CR_PAGE_ER | CR_PAGE_PG));
        self.modify_ctlr(|ctlr| ctlr | CR_FLOCK);
        self.modify_ctlr(|ctlr| ctlr | CR_LOCK);
        Ok(())
    }

    // Mode bits of the previous operation are cleared when the next one starts, at that point
    // the store has already waited for completion.
    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error> {
        self.modify_ctlr(|ctlr| ctlr & !CR_PAGE_PG);
        self.modify_ctlr(|ctlr| ctlr | CR_PAGE_ER);
        unsafe { write_volatile(ADDR, address) };
        self.modify_ctlr(|ctlr| ctlr | CR_STRT);
        Ok(())
    }

    fn begin_page(&mut self, _address: u32) -> Result<(), Self::Error> {
        self.modify_ctlr(|ctlr| ctlr & !(CR_PAGE_ER | CR_PAGE_PG));
        self.modify_ctlr(|ctlr| ctlr | CR_PAGE_PG);
        self.modify_ctlr(|ctlr| ctlr | CR_BUF_RST);
        Ok(())
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        unsafe { write_volatile(address as *mut u32, value) };
        self.modify_ctlr(|ctlr| ctlr | CR_BUF_LOAD);
        Ok(())
    }

    fn commit_page(&mut self, address: u32) -> Result<(), Self::Error> {
        self.modify_ctlr(|ctlr| ctlr | CR_PAGE_PG);
        unsafe { write_volatile(ADDR, address) };
        self.modify_ctlr(|ctlr| ctlr | CR_STRT);
        Ok(())
    }

    fn is_busy(&mut self) -> bool {
        unsafe { read_volatile(STATR) & SR_BSY != 0 }
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, Self::Error> {
        Ok(unsafe { read_volatile(address as *const u8) })
    }
}
