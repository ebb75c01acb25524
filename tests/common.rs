#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use flash_settings::platform::Platform;

// Geometry of a CH32V003: 16 KiB of flash with 64 byte fast mode pages
pub const PAGE_SIZE: usize = 64;
pub const WORD_SIZE: usize = 4;
pub const FLASH_START: u32 = 0x0800_0000;
pub const FLASH_END: u32 = 0x0800_4000;
pub const FLASH_SIZE: usize = (FLASH_END - FLASH_START) as usize;

/// Number of `is_busy` polls that report busy after each started operation
pub const BUSY_POLLS: usize = 3;

/// Simulated flash controller with a page buffer. Programming can only flip bits from 1 to 0.
pub struct Flash {
    pub buf: Vec<u8>,
    pub locked: bool,
    pub page: Vec<u8>,
    pub page_address: Option<u32>,
    pub busy: usize,
    pub stuck_busy: bool,
    pub polls: usize,
    pub reads: usize,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Unlock,
    Lock,
    Erase { address: u32 },
    BeginPage { address: u32 },
    Program { address: u32, value: u32 },
    Commit { address: u32 },
}

impl Flash {
    pub fn new() -> Self {
        Self {
            buf: vec![0xffu8; FLASH_SIZE],
            locked: true,
            page: vec![0xffu8; PAGE_SIZE],
            page_address: None,
            busy: 0,
            stuck_busy: false,
            polls: 0,
            reads: 0,
            fail_after_operation: usize::MAX,
            operations: Vec::new(),
        }
    }

    pub fn new_with_fault(fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new()
        }
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn offset(address: u32) -> usize {
        assert!(address >= FLASH_START && address < FLASH_END);
        (address - FLASH_START) as usize
    }

    pub fn region(&self, address: u32, len: usize) -> &[u8] {
        let offset = Self::offset(address);
        &self.buf[offset..offset + len]
    }

    /// Flip bits behind the back of the store
    pub fn corrupt(&mut self, address: u32, mask: u8) {
        self.buf[Self::offset(address)] ^= mask;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn commits(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Commit { .. }))
            .count()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn start(&mut self, op: Operation) -> Result<(), FlashError> {
        println!("    flash: {:?} #{:>2}", op, self.operations.len());

        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            return Err(FlashError);
        }
        assert!(self.stuck_busy || self.busy == 0, "operation started while busy");

        self.operations.push(op);
        self.busy = BUSY_POLLS;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FlashError;

impl Platform for Flash {
    const PAGE_SIZE: usize = PAGE_SIZE;
    const FLASH_END: u32 = FLASH_END;
    const FLASH_START: u32 = FLASH_START;

    type Error = FlashError;

    fn unlock(&mut self) -> Result<(), Self::Error> {
        self.start(Operation::Unlock)?;
        self.busy = 0;
        self.locked = false;
        Ok(())
    }

    fn lock(&mut self) -> Result<(), Self::Error> {
        self.start(Operation::Lock)?;
        self.busy = 0;
        self.locked = true;
        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error> {
        assert!(!self.locked, "erase while locked");
        assert!(address.is_multiple_of(PAGE_SIZE as u32));

        self.start(Operation::Erase { address })?;

        let offset = Self::offset(address);
        self.buf[offset..offset + PAGE_SIZE].fill(0xff);
        Ok(())
    }

    fn begin_page(&mut self, address: u32) -> Result<(), Self::Error> {
        assert!(!self.locked, "page buffer reset while locked");
        assert!(address.is_multiple_of(PAGE_SIZE as u32));

        self.start(Operation::BeginPage { address })?;

        self.page.fill(0xff);
        self.page_address = Some(address);
        Ok(())
    }

    fn program_word(&mut self, address: u32, value: u32) -> Result<(), Self::Error> {
        assert!(!self.locked, "program while locked");
        assert!(address.is_multiple_of(WORD_SIZE as u32));
        let page_address = self.page_address.expect("page buffer not reset");
        assert!(address >= page_address && address < page_address + PAGE_SIZE as u32);

        self.start(Operation::Program { address, value })?;

        let offset = (address - page_address) as usize;
        self.page[offset..offset + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn commit_page(&mut self, address: u32) -> Result<(), Self::Error> {
        assert!(!self.locked, "commit while locked");
        assert_eq!(self.page_address, Some(address));

        self.start(Operation::Commit { address })?;

        let offset = Self::offset(address);
        for (i, &val) in self.page.iter().enumerate() {
            self.buf[offset + i] &= val;
        }
        self.page_address = None;
        Ok(())
    }

    fn is_busy(&mut self) -> bool {
        self.polls += 1;
        if self.stuck_busy {
            return true;
        }
        if self.busy > 0 {
            self.busy -= 1;
            return true;
        }
        false
    }

    fn read_byte(&mut self, address: u32) -> Result<u8, Self::Error> {
        self.reads += 1;
        Ok(self.buf[Self::offset(address)])
    }
}

pub const SECTOR_SIZE: usize = 4096;

/// NOR flash as seen through `embedded-storage`, e.g. the SPI flash of an ESP32.
#[derive(Default)]
pub struct NorSim {
    pub buf: Vec<u8>,
    pub operations: Vec<NorOperation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum NorOperation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl NorSim {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; SECTOR_SIZE * sectors],
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn erases_at(&self, offset: u32) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, NorOperation::Erase { offset: o, .. } if *o == offset))
            .count()
    }

    pub fn writes(&self) -> Vec<NorOperation> {
        self.operations
            .iter()
            .filter(|op| matches!(op, NorOperation::Write { .. }))
            .cloned()
            .collect()
    }
}

#[derive(Debug)]
pub struct NorError;

impl NorFlashError for NorError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for NorSim {
    type Error = NorError;
}

impl ReadNorFlash for NorSim {
    const READ_SIZE: usize = WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        self.operations.push(NorOperation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for NorSim {
    const WRITE_SIZE: usize = WORD_SIZE;

    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        self.operations.push(NorOperation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        self.buf[from as usize..to as usize].fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        self.operations.push(NorOperation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // NOR flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}
