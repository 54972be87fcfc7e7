//! Typed reads and writes against a remote process.

use std::sync::Arc;

use crate::error::Result;
use crate::memory::ProcessHandle;

#[cfg(target_os = "windows")]
use crate::error::Error;

/// Fixed-size reads from a target address space.
///
/// The monitors and the pointer chain resolver are generic over this trait,
/// so everything above the raw `ReadProcessMemory` call runs against
/// [`MockMemoryReader`](crate::memory::MockMemoryReader) in tests.
pub trait ReadMemory {
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    fn read_i32(&self, address: u64) -> Result<i32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Pointer-width read. The target is a 64-bit process.
    fn read_ptr(&self, address: u64) -> Result<u64> {
        self.read_u64(address)
    }
}

/// Reader over an open [`ProcessHandle`].
pub struct MemoryReader {
    process: Arc<ProcessHandle>,
}

impl MemoryReader {
    pub fn new(process: Arc<ProcessHandle>) -> Self {
        Self { process }
    }

    pub fn pid(&self) -> u32 {
        self.process.pid
    }

    pub fn base_address(&self) -> u64 {
        self.process.base_address
    }

    /// Write raw bytes into the target. Requires the handle to have been
    /// opened with [`AccessMode::ReadWrite`](crate::memory::AccessMode).
    #[cfg(target_os = "windows")]
    pub fn write_bytes(&self, address: u64, buffer: &[u8]) -> Result<()> {
        use std::ffi::c_void;
        use windows::Win32::System::Diagnostics::Debug::WriteProcessMemory;

        unsafe {
            WriteProcessMemory(
                self.process.raw(),
                address as *const c_void,
                buffer.as_ptr() as *const c_void,
                buffer.len(),
                None,
            )
        }
        .map_err(|e| Error::MemoryWriteFailed {
            address,
            message: e.to_string(),
        })
    }

    #[cfg(not(target_os = "windows"))]
    pub fn write_bytes(&self, _address: u64, _buffer: &[u8]) -> Result<()> {
        Err(crate::error::Error::Unsupported)
    }

    pub fn write_i32(&self, address: u64, value: i32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}

impl ReadMemory for MemoryReader {
    #[cfg(target_os = "windows")]
    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        use std::ffi::c_void;
        use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;

        let mut buffer = vec![0u8; len];
        let mut bytes_read = 0usize;
        unsafe {
            ReadProcessMemory(
                self.process.raw(),
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                len,
                Some(&mut bytes_read),
            )
        }
        .map_err(|e| Error::MemoryReadFailed {
            address,
            message: e.to_string(),
        })?;
        if bytes_read != len {
            return Err(Error::MemoryReadFailed {
                address,
                message: format!("short read: {} of {} bytes", bytes_read, len),
            });
        }
        Ok(buffer)
    }

    #[cfg(not(target_os = "windows"))]
    fn read_bytes(&self, _address: u64, _len: usize) -> Result<Vec<u8>> {
        Err(crate::error::Error::Unsupported)
    }
}
