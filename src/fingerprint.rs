//! Streaming xxh64 fingerprints.
//!
//! A value is serialized as JSON directly into the hasher, with no
//! intermediate buffer. Struct fields serialize in declaration order and
//! vectors in index order, so equal values always produce equal digests.
//! Floats should be quantized before hashing (see `ChunkingPolicy::params_hash`).

use std::io;

use serde::Serialize;
use xxhash_rust::xxh64::Xxh64;

/// Seed shared by every fingerprint in the crate.
const FINGERPRINT_SEED: u64 = 0;

/// `io::Write` sink feeding an xxh64 state.
struct DigestWriter(Xxh64);

impl io::Write for DigestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Deterministic digest of any serializable value.
pub trait Fingerprint: Serialize {
    /// xxh64 of the value's JSON form.
    fn digest(&self) -> u64 {
        let mut writer = DigestWriter(Xxh64::new(FINGERPRINT_SEED));
        // The sink never fails; crate types have no non-string map keys
        serde_json::to_writer(&mut writer, self).expect("fingerprinted value must serialize");
        writer.0.digest()
    }

    /// [`Fingerprint::digest`] as 16 lowercase hex characters.
    fn digest_hex(&self) -> String {
        format!("{:016x}", self.digest())
    }
}

impl<T: Serialize + ?Sized> Fingerprint for T {}
