use crate::error::Error;
use crate::layout::Layout;
use crate::platform::Platform;
#[cfg(feature = "defmt")]
use defmt::trace;

/// Programming granule of the page buffer.
pub(crate) const WORD_SIZE: usize = 4;

/// Content of an erased flash word, all bits set.
pub(crate) const ERASED_WORD: u32 = u32::MAX;

/// Spin until the controller reports completion. `limit` bounds the number of busy polls,
/// `None` waits forever just like the bare metal loop would.
#[inline(always)]
pub(crate) fn wait_ready<T: Platform>(hal: &mut T, limit: Option<u32>) -> Result<(), Error> {
    let mut polls = 0u32;
    while hal.is_busy() {
        if let Some(limit) = limit
            && polls >= limit
        {
            return Err(Error::Timeout);
        }
        polls = polls.saturating_add(1);
        core::hint::spin_loop();
    }
    Ok(())
}

/// Compares the payload against flash byte by byte, stopping at the first difference.
pub(crate) fn has_changed<T: Platform>(
    hal: &mut T,
    address: u32,
    payload: &[u8],
) -> Result<bool, Error> {
    #[cfg(feature = "defmt")]
    trace!("has_changed: @{:#08x}[{}]", address, payload.len());

    for (offset, &expected) in payload.iter().enumerate() {
        let stored = hal
            .read_byte(address + offset as u32)
            .map_err(|_| Error::FlashError)?;
        if stored != expected {
            #[cfg(feature = "debug-logs")]
            println!("  raw: first difference at offset {offset}");
            return Ok(true);
        }
    }

    Ok(false)
}

pub(crate) fn read_region<T: Platform>(
    hal: &mut T,
    address: u32,
    bytes: &mut [u8],
) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("read_region: @{:#08x}[{}]", address, bytes.len());

    hal.read(address, bytes).map_err(|_| Error::FlashError)
}

/// Erases all pages of the region in ascending order.
pub(crate) fn erase_region<T: Platform>(
    hal: &mut T,
    layout: &Layout,
    limit: Option<u32>,
) -> Result<(), Error> {
    for page in 0..layout.pages() {
        let address = layout.page_address(page);

        #[cfg(feature = "defmt")]
        trace!("erase_page: @{:#08x}", address);

        #[cfg(feature = "debug-logs")]
        println!("  raw: erase page {address:#010x}");

        hal.erase_page(address).map_err(|_| Error::FlashError)?;
        wait_ready(hal, limit)?;
    }

    Ok(())
}

/// Programs the record into the freshly erased region, one page at a time. Once the record is
/// exhausted the remaining words of the last page are filled with the erased value.
pub(crate) fn program_region<T: Platform>(
    hal: &mut T,
    layout: &Layout,
    record: &[u8],
    limit: Option<u32>,
) -> Result<(), Error> {
    let words_per_page = layout.page_size() / WORD_SIZE;
    let mut words = record.chunks(WORD_SIZE).map(word_from_chunk);

    for page in 0..layout.pages() {
        let page_address = layout.page_address(page);

        #[cfg(feature = "defmt")]
        trace!("program_page: @{:#08x}", page_address);

        #[cfg(feature = "debug-logs")]
        println!("  raw: program page {page_address:#010x}");

        hal.begin_page(page_address)
            .map_err(|_| Error::FlashError)?;
        wait_ready(hal, limit)?;

        for index in 0..words_per_page {
            let address = page_address + (index * WORD_SIZE) as u32;
            let value = words.next().unwrap_or(ERASED_WORD);
            hal.program_word(address, value)
                .map_err(|_| Error::FlashError)?;
            wait_ready(hal, limit)?;
        }

        hal.commit_page(page_address)
            .map_err(|_| Error::FlashError)?;
        wait_ready(hal, limit)?;
    }

    Ok(())
}

/// Little-endian word from up to four bytes, a short tail is padded with the erased value.
#[inline(always)]
fn word_from_chunk(chunk: &[u8]) -> u32 {
    let mut word = ERASED_WORD.to_le_bytes();
    word[..chunk.len()].copy_from_slice(chunk);
    u32::from_le_bytes(word)
}
