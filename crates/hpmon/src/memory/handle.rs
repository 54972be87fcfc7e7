//! Target process discovery and handle ownership.
//!
//! A [`ProcessHandle`] is obtained once per monitoring session, carries the
//! base address of the game module, and closes the kernel handle exactly
//! once when dropped.

use crate::error::{Error, Result};

#[cfg(target_os = "windows")]
use std::mem::size_of;

#[cfg(target_os = "windows")]
use windows::Win32::{
    Foundation::{CloseHandle, FALSE, HANDLE},
    System::{
        Diagnostics::ToolHelp::{
            CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW,
            PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPMODULE,
            TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
        },
        Threading::{OpenProcess, PROCESS_VM_READ, PROCESS_VM_WRITE},
    },
};

/// Requested access to the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-only access, sufficient for monitoring.
    #[default]
    Read,
    /// Read and write access.
    ReadWrite,
}

/// An open handle to the target process plus the resolved module base.
pub struct ProcessHandle {
    pub pid: u32,
    /// Load address of the configured game module inside the target.
    pub base_address: u64,
    #[cfg(target_os = "windows")]
    handle: HANDLE,
}

// The raw handle is only used for ReadProcessMemory/WriteProcessMemory,
// which the kernel allows from concurrent callers.
unsafe impl Send for ProcessHandle {}
unsafe impl Sync for ProcessHandle {}

impl ProcessHandle {
    /// Locate the target process by executable name and attach to it.
    #[cfg(target_os = "windows")]
    pub fn find_and_open(
        process_name: &str,
        module_name: &str,
        access: AccessMode,
    ) -> Result<Self> {
        let pid = find_process_id(process_name)?;
        Self::open(pid, module_name, access)
    }

    #[cfg(not(target_os = "windows"))]
    pub fn find_and_open(
        _process_name: &str,
        _module_name: &str,
        _access: AccessMode,
    ) -> Result<Self> {
        Err(Error::Unsupported)
    }

    /// Attach to a known PID and resolve the module base address.
    #[cfg(target_os = "windows")]
    pub fn open(pid: u32, module_name: &str, access: AccessMode) -> Result<Self> {
        let rights = match access {
            AccessMode::Read => PROCESS_VM_READ,
            AccessMode::ReadWrite => PROCESS_VM_READ | PROCESS_VM_WRITE,
        };
        let handle =
            unsafe { OpenProcess(rights, FALSE, pid) }.map_err(|e| Error::ProcessOpenFailed {
                pid,
                message: e.to_string(),
            })?;
        let base_address = match module_base_address(pid, module_name) {
            Ok(base) => base,
            Err(e) => {
                let _ = unsafe { CloseHandle(handle) };
                return Err(e);
            }
        };

        Ok(Self {
            pid,
            base_address,
            handle,
        })
    }

    #[cfg(not(target_os = "windows"))]
    pub fn open(_pid: u32, _module_name: &str, _access: AccessMode) -> Result<Self> {
        Err(Error::Unsupported)
    }

    #[cfg(target_os = "windows")]
    pub(crate) fn raw(&self) -> HANDLE {
        self.handle
    }
}

#[cfg(target_os = "windows")]
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.handle) };
    }
}

/// Find a PID by executable name (case-insensitive).
#[cfg(target_os = "windows")]
pub fn find_process_id(process_name: &str) -> Result<u32> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
        .map_err(|_| Error::ProcessNotFound(process_name.to_string()))?;
    let _guard = SnapshotGuard(snapshot);

    let mut entry = PROCESSENTRY32W {
        dwSize: size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let wanted = process_name.to_lowercase();
    let mut has_entry = unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok();
    while has_entry {
        if wide_to_string(&entry.szExeFile).to_lowercase() == wanted {
            return Ok(entry.th32ProcessID);
        }
        has_entry = unsafe { Process32NextW(snapshot, &mut entry) }.is_ok();
    }

    Err(Error::ProcessNotFound(process_name.to_string()))
}

#[cfg(not(target_os = "windows"))]
pub fn find_process_id(_process_name: &str) -> Result<u32> {
    Err(Error::Unsupported)
}

/// Find the load address of a named module inside the target process.
#[cfg(target_os = "windows")]
pub fn module_base_address(pid: u32, module_name: &str) -> Result<u64> {
    let snapshot =
        unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) }
            .map_err(|_| Error::ModuleNotFound(module_name.to_string()))?;
    let _guard = SnapshotGuard(snapshot);

    let mut entry = MODULEENTRY32W {
        dwSize: size_of::<MODULEENTRY32W>() as u32,
        ..Default::default()
    };

    let wanted = module_name.to_lowercase();
    let mut has_entry = unsafe { Module32FirstW(snapshot, &mut entry) }.is_ok();
    while has_entry {
        if wide_to_string(&entry.szModule).to_lowercase() == wanted {
            return Ok(entry.modBaseAddr as u64);
        }
        has_entry = unsafe { Module32NextW(snapshot, &mut entry) }.is_ok();
    }

    Err(Error::ModuleNotFound(module_name.to_string()))
}

#[cfg(not(target_os = "windows"))]
pub fn module_base_address(_pid: u32, _module_name: &str) -> Result<u64> {
    Err(Error::Unsupported)
}

/// Closes a Toolhelp32 snapshot handle when dropped.
#[cfg(target_os = "windows")]
struct SnapshotGuard(HANDLE);

#[cfg(target_os = "windows")]
impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// Decode a null-terminated UTF-16 buffer from a Toolhelp32 entry.
#[cfg(target_os = "windows")]
fn wide_to_string(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}
