#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

#[cfg(feature = "ch32v00x")]
pub mod ch32v00x;
pub mod crc;
pub mod error;
pub mod layout;
pub mod nor;
pub mod platform;
mod raw;

extern crate alloc;

use crate::crc::CHECKSUM_SIZE;
use crate::error::Error;
use crate::layout::Layout;
use crate::platform::Platform;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Whether the last two bytes of the record hold a CRC-16/CCITT over the rest of it.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Integrity {
    /// All bytes are payload, `load` always succeeds.
    None,
    /// The checksum is written on `save` and verified on `load`.
    Crc16,
}

impl Integrity {
    /// A record shorter than the checksum field can't host one and runs without.
    pub const fn effective(self, length: usize) -> Integrity {
        match self {
            Integrity::Crc16 if length >= CHECKSUM_SIZE => Integrity::Crc16,
            _ => Integrity::None,
        }
    }
}

#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WritePolicy {
    /// Compare the payload against flash first and skip the erase/program cycle if nothing
    /// changed.
    SkipUnchanged,
    /// Erase and program on every `save`.
    Always,
}

#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveOutcome {
    /// The stored payload already matched, flash was not touched.
    Unchanged,
    /// The region was erased and programmed.
    Written,
}

/// A single settings record stored in the last pages of flash.
///
/// The record is bound on creation, either borrowed (`&mut [u8]`) or owned (`[u8; N]`, `Vec`),
/// and keeps its length for the lifetime of the store. Nothing but the flash contents survives
/// between calls.
///
/// There is no internal locking. If an interrupt handler or another context may access the
/// flash controller, `load` and `save` have to run inside a critical section.
pub struct SettingsStore<T: Platform, B> {
    pub(crate) hal: T,
    pub(crate) record: B,
    pub(crate) layout: Layout,
    pub(crate) policy: WritePolicy,
    pub(crate) busy_wait_limit: Option<u32>,
}

impl<T: Platform, B: AsRef<[u8]> + AsMut<[u8]>> SettingsStore<T, B> {
    /// Binds `record` to the region at the top of the flash of `hal`.
    ///
    /// If `integrity` is `Crc16`, the last two bytes of the record are reserved for the checksum
    /// and must not be used as payload. Records shorter than two bytes silently run without.
    pub fn new(
        hal: T,
        record: B,
        integrity: Integrity,
        policy: WritePolicy,
    ) -> Result<SettingsStore<T, B>, Error> {
        let layout = Layout::new(
            record.as_ref().len(),
            T::PAGE_SIZE,
            T::FLASH_START,
            T::FLASH_END,
            integrity,
        )?;

        #[cfg(feature = "defmt")]
        trace!(
            "new: @{:#08x}[{}] pages: {}",
            layout.address(),
            layout.length(),
            layout.pages()
        );

        #[cfg(feature = "debug-logs")]
        println!(
            "SettingsStore: region {:#010x}..{:#010x}, integrity {}, policy {}",
            layout.range().start,
            layout.range().end,
            layout.integrity(),
            policy
        );

        Ok(Self {
            hal,
            record,
            layout,
            policy,
            busy_wait_limit: None,
        })
    }

    /// Give up with [`Error::Timeout`] once the controller reported busy `polls` times in a row
    /// instead of spinning forever.
    pub fn with_busy_wait_limit(mut self, polls: u32) -> Self {
        self.busy_wait_limit = Some(polls);
        self
    }

    /// Copies the stored bytes into the record.
    ///
    /// With integrity checking enabled, an [`Error::IntegrityFailure`] means the region was never
    /// written, got corrupted or a previous `save` was interrupted. The record then holds whatever
    /// was read and the caller should fall back to defaults.
    pub fn load(&mut self) -> Result<(), Error> {
        let record = self.record.as_mut();
        raw::read_region(&mut self.hal, self.layout.address(), record)?;

        match self.layout.integrity() {
            Integrity::None => Ok(()),
            Integrity::Crc16 => {
                let result = crc::verify(record);

                #[cfg(feature = "defmt")]
                {
                    if let Err(Error::IntegrityFailure { stored, computed }) = result {
                        warn!(
                            "load: checksum mismatch, stored {:#06x}, computed {:#06x}",
                            stored, computed
                        );
                    }
                }

                #[cfg(feature = "debug-logs")]
                {
                    if let Err(ref e) = result {
                        println!("SettingsStore: load failed: {e}");
                    }
                }

                result
            }
        }
    }

    /// Loads the record and calls `defaults` on it if the stored data can't be trusted.
    ///
    /// Returns whether the stored data was used. Errors other than an integrity failure are
    /// passed on without calling `defaults`.
    pub fn load_or_else<F>(&mut self, defaults: F) -> Result<bool, Error>
    where
        F: FnOnce(&mut [u8]),
    {
        match self.load() {
            Ok(()) => Ok(true),
            Err(Error::IntegrityFailure { .. }) => {
                defaults(self.record.as_mut());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the record to flash.
    ///
    /// With [`WritePolicy::SkipUnchanged`] the payload is compared with flash first and nothing
    /// is erased if it matches. With integrity checking enabled the checksum is written into the
    /// trailing two bytes of the record before programming.
    ///
    /// The erase/program sequence is not atomic. A power loss in between leaves a region that
    /// fails the checksum on the next `load`.
    pub fn save(&mut self) -> Result<SaveOutcome, Error> {
        if self.policy == WritePolicy::SkipUnchanged {
            let payload = &self.record.as_ref()[..self.layout.payload_len()];
            if !raw::has_changed(&mut self.hal, self.layout.address(), payload)? {
                #[cfg(feature = "defmt")]
                trace!("save: unchanged @{:#08x}", self.layout.address());

                #[cfg(feature = "debug-logs")]
                println!("SettingsStore: save skipped, payload unchanged");

                return Ok(SaveOutcome::Unchanged);
            }
        }

        if self.layout.integrity() == Integrity::Crc16 {
            crc::seal(self.record.as_mut());
        }

        self.commit()?;

        #[cfg(feature = "debug-logs")]
        println!(
            "SettingsStore: saved {} bytes in {} pages",
            self.layout.length(),
            self.layout.pages()
        );

        Ok(SaveOutcome::Written)
    }

    /// Erase and program the whole region between unlock and lock. Lock is attempted even if
    /// erasing or programming failed.
    fn commit(&mut self) -> Result<(), Error> {
        let limit = self.busy_wait_limit;

        self.hal.unlock().map_err(|_| Error::FlashError)?;

        let result = raw::erase_region(&mut self.hal, &self.layout, limit).and_then(|()| {
            raw::program_region(&mut self.hal, &self.layout, self.record.as_ref(), limit)
        });

        let locked = self.hal.lock().map_err(|_| Error::FlashError);

        result.and(locked)
    }

    pub fn record(&self) -> &[u8] {
        self.record.as_ref()
    }

    /// Mutable access to the bound record, e.g. to change settings before the next `save`.
    pub fn record_mut(&mut self) -> &mut [u8] {
        self.record.as_mut()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The integrity mode in effect.
    pub fn integrity(&self) -> Integrity {
        self.layout.integrity()
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Unbinds the platform and the record.
    pub fn release(self) -> (T, B) {
        (self.hal, self.record)
    }
}
