//! Per-directory identifiers.
//!
//! Every row ingested from a directory carries the CRC32 of that directory's
//! image CSV in its `TableNumber` column. Identical bytes always produce the
//! same number, which lets downstream consumers spot repeated ingestion of
//! the same content.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use pi_common::{Error, Result, TableNumber};

const READ_CHUNK: usize = 64 * 1024;

/// CRC32 of the raw bytes of `image_csv`.
pub fn table_number(image_csv: &Path) -> Result<TableNumber> {
    let file = File::open(image_csv).map_err(|e| Error::io_at(image_csv, e))?;
    let mut reader = BufReader::with_capacity(READ_CHUNK, file);
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| Error::io_at(image_csv, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(TableNumber(hasher.finalize()))
}

/// CRC32 of an in-memory buffer.
#[inline]
pub fn table_number_of_bytes(bytes: &[u8]) -> TableNumber {
    TableNumber(crc32fast::hash(bytes))
}
