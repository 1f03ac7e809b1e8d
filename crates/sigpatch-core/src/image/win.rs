//! Live-module image access for the current Windows process.

use std::ffi::CString;

use tracing::debug;
use windows::Win32::System::LibraryLoader::GetModuleHandleA;
use windows::Win32::System::Memory::{
    PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS, VirtualProtect,
};
use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::core::PCSTR;

use super::provider::ImageProvider;
use super::view::ImageView;
use crate::error::{Error, Result};
use crate::patch::ImageWriter;

/// Images backed by the modules loaded in the current process.
///
/// `None` resolves the main executable image, a name resolves that module
/// by its loader name. The mapping stays valid for the life of the
/// process; the caller serializes scans against writes.
pub struct LoadedModules;

impl LoadedModules {
    fn module_bounds(module: Option<&str>) -> Option<(u64, usize)> {
        let handle = match module {
            None | Some("") => unsafe { GetModuleHandleA(PCSTR::null()).ok()? },
            Some(name) => {
                let name = CString::new(name).ok()?;
                unsafe { GetModuleHandleA(PCSTR(name.as_ptr() as *const u8)).ok()? }
            }
        };

        let mut info = MODULEINFO::default();
        unsafe {
            GetModuleInformation(
                GetCurrentProcess(),
                handle,
                &mut info,
                std::mem::size_of::<MODULEINFO>() as u32,
            )
            .ok()?;
        }

        debug!(
            "module {:?}: base {:#x}, size {:#x}",
            module, info.lpBaseOfDll as usize, info.SizeOfImage
        );
        Some((info.lpBaseOfDll as u64, info.SizeOfImage as usize))
    }
}

impl ImageProvider for LoadedModules {
    fn resolve(&self, module: Option<&str>) -> Option<ImageView<'_>> {
        let (base, size) = Self::module_bounds(module)?;
        let bytes = unsafe { std::slice::from_raw_parts(base as *const u8, size) };
        Some(ImageView::new(base, bytes))
    }
}

/// Protection-toggling writer over a loaded module.
///
/// Flips the target pages to read/write/execute for the duration of the
/// write and restores the previous protection afterwards.
pub struct ModuleWriter {
    base: u64,
    len: u64,
}

impl ModuleWriter {
    pub fn new(base: u64, len: u64) -> Self {
        Self { base, len }
    }

    /// Writer for a module already resolved by [`LoadedModules`].
    pub fn for_module(module: Option<&str>) -> Option<Self> {
        let (base, size) = LoadedModules::module_bounds(module)?;
        Some(Self::new(base, size as u64))
    }
}

impl ImageWriter for ModuleWriter {
    fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or(Error::OutOfBounds { offset })?;
        if end > self.len {
            return Err(Error::OutOfBounds { offset });
        }

        let address = (self.base + offset) as *mut u8;
        let mut old = PAGE_PROTECTION_FLAGS::default();
        unsafe {
            VirtualProtect(
                address as *const _,
                bytes.len(),
                PAGE_EXECUTE_READWRITE,
                &mut old,
            )
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

            std::ptr::copy_nonoverlapping(bytes.as_ptr(), address, bytes.len());

            let mut restored = PAGE_PROTECTION_FLAGS::default();
            let _ = VirtualProtect(address as *const _, bytes.len(), old, &mut restored);
        }
        Ok(())
    }
}
