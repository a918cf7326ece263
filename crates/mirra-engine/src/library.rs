//! Dynamic library loading for mirra modules.
//!
//! Cross-platform support for opening shared libraries (`.so`, `.dylib`,
//! `.dll`) and pulling a [`ModuleDef`] out of them through the
//! `mirra_module_init` entry point.

use std::ffi::{CStr, CString};
use std::path::Path;

use mirra_sdk::ModuleDef;
use thiserror::Error;

/// Symbol every mirra module library must export.
pub const MODULE_INIT_SYMBOL: &str = "mirra_module_init";

/// Errors that can occur while opening a library or extracting its module.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or not loadable
    #[error("library not found: {path}")]
    NotFound {
        /// Path that was attempted, with the loader's diagnostic appended
        path: String,
    },

    /// Symbol missing from the library
    #[error("symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// The init entry point misbehaved
    #[error("invalid module initialization: {0}")]
    BadInit(String),

    /// Platform-specific failure
    #[error("platform error: {0}")]
    Platform(String),
}

/// An open dynamic library.
///
/// Closing happens on drop. The handle must outlive every function pointer
/// obtained from it — [`crate::Scope`] owns its libraries for exactly this
/// reason.
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl Library {
    /// Open a dynamic library.
    ///
    /// On unix this is `dlopen` with `RTLD_NOW | RTLD_LOCAL`; on windows,
    /// `LoadLibraryW`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::Platform(format!("non-UTF-8 path: {:?}", path_ref)))?;

        Ok(Library {
            handle: LibraryHandle::load(path_str)?,
            path: path_str.to_string(),
        })
    }

    /// Resolve a symbol to a typed function pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure the symbol's actual signature matches `T` and
    /// that the library stays open while the pointer is used.
    pub unsafe fn get<T>(&self, symbol: &str) -> Result<T, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    /// Call the library's `mirra_module_init` and take ownership of the
    /// module definition it returns.
    pub fn load_module(&self) -> Result<ModuleDef, LoadError> {
        unsafe {
            type InitFn = extern "C" fn() -> *mut ModuleDef;
            let init: InitFn = self.get(MODULE_INIT_SYMBOL)?;

            let module_ptr = init();
            if module_ptr.is_null() {
                return Err(LoadError::BadInit(format!(
                    "{} returned null in {}",
                    MODULE_INIT_SYMBOL, self.path
                )));
            }

            Ok(*Box::from_raw(module_ptr))
        }
    }

    /// Path this library was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

// Platform-specific implementations

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::Platform(format!("invalid path: {}", e)))?;

        // RTLD_NOW: resolve all symbols immediately
        // RTLD_LOCAL: symbols not visible to subsequently loaded libraries
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            let detail = unsafe {
                let err = libc::dlerror();
                if err.is_null() {
                    "unknown error".to_string()
                } else {
                    CStr::from_ptr(err).to_string_lossy().into_owned()
                }
            };
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, detail),
            });
        }

        Ok(UnixLibrary { handle })
    }

    unsafe fn symbol<T>(&self, name: &str, lib_path: &str) -> Result<T, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::Platform(format!("invalid symbol name: {}", e)))?;

        // Clear any stale error before the lookup
        libc::dlerror();
        let symbol = libc::dlsym(self.handle, c_name.as_ptr());

        let err = libc::dlerror();
        if !err.is_null() {
            let detail = CStr::from_ptr(err).to_string_lossy().into_owned();
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, detail),
            });
        }
        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: lib_path.to_string(),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(unix)]
impl Drop for UnixLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        if handle.is_null() {
            let code = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, code),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    unsafe fn symbol<T>(&self, name: &str, lib_path: &str) -> Result<T, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::Platform(format!("invalid symbol name: {}", e)))?;

        let symbol = GetProcAddress(self.handle, c_name.as_ptr());
        if symbol.is_null() {
            let code = GetLastError();
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, code),
            });
        }

        Ok(std::mem::transmute_copy(&symbol))
    }
}

#[cfg(windows)]
impl Drop for WindowsLibrary {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.handle);
        }
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(
        module: *mut std::ffi::c_void,
        procname: *const i8,
    ) -> *mut std::ffi::c_void;
    fn FreeLibrary(module: *mut std::ffi::c_void) -> i32;
    fn GetLastError() -> u32;
}
