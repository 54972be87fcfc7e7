//! In-memory fake of the target address space for tests.
//!
//! The image is byte-granular: reads touching any unmapped byte fail the
//! same way `ReadProcessMemory` fails on an unmapped page, and the whole
//! image can be switched offline to simulate the target process going away
//! mid-session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::memory::ReadMemory;

#[derive(Default)]
struct Image {
    bytes: HashMap<u64, u8>,
    offline: bool,
}

/// Thread-safe mock address space implementing [`ReadMemory`].
#[derive(Default)]
pub struct MockMemoryReader {
    image: Mutex<Image>,
    reads: AtomicUsize,
}

impl MockMemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bytes(&self, address: u64, bytes: &[u8]) {
        let mut image = self.image.lock().unwrap();
        for (i, b) in bytes.iter().enumerate() {
            image.bytes.insert(address + i as u64, *b);
        }
    }

    pub fn write_i32(&self, address: u64, value: i32) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u64(&self, address: u64, value: u64) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    /// Remove a region from the image so reads of it fail.
    pub fn unmap(&self, address: u64, len: usize) {
        let mut image = self.image.lock().unwrap();
        for i in 0..len as u64 {
            image.bytes.remove(&(address + i));
        }
    }

    /// When offline, every read fails regardless of address.
    pub fn set_offline(&self, offline: bool) {
        self.image.lock().unwrap().offline = offline;
    }

    /// Number of `read_bytes` calls performed so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let image = self.image.lock().unwrap();
        if image.offline {
            return Err(Error::MemoryReadFailed {
                address,
                message: "process unavailable".to_string(),
            });
        }
        (0..len as u64)
            .map(|i| {
                image
                    .bytes
                    .get(&(address + i))
                    .copied()
                    .ok_or_else(|| Error::MemoryReadFailed {
                        address,
                        message: "unmapped".to_string(),
                    })
            })
            .collect()
    }
}

/// Builder for seeding a [`MockMemoryReader`] image.
#[derive(Default)]
pub struct MockMemoryBuilder {
    reader: MockMemoryReader,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i32(self, address: u64, value: i32) -> Self {
        self.reader.write_i32(address, value);
        self
    }

    pub fn u64(self, address: u64, value: u64) -> Self {
        self.reader.write_u64(address, value);
        self
    }

    pub fn bytes(self, address: u64, bytes: &[u8]) -> Self {
        self.reader.write_bytes(address, bytes);
        self
    }

    pub fn build(self) -> MockMemoryReader {
        self.reader
    }
}
