//! Installed system printers
//!
//! Only used to show the operator which printer names can be passed to the
//! dispatcher. Printing itself never goes through this module.

use crate::error::PrintResult;
#[cfg(windows)]
use crate::error::PrintError;

/// List installed printers (virtual printers filtered out)
///
/// Always empty on non-Windows builds.
pub fn list_printers() -> PrintResult<Vec<String>> {
    platform::list_printers()
}

/// Name of the system default printer, if one is configured
pub fn default_printer() -> PrintResult<Option<String>> {
    platform::default_printer()
}

/// Check if a port belongs to a virtual printer (PDF, XPS, OneNote, ...)
pub fn is_virtual_port(port: &str) -> bool {
    let p = port.to_lowercase();
    p == "file:"
        || p == "portprompt:"
        || p == "xpsport:"
        || p.starts_with("onenote")
        || p == "nul:"
        || p.starts_with("wfsport:")
}

#[cfg(windows)]
mod platform {
    use super::{PrintError, PrintResult, is_virtual_port};
    use tracing::debug;

    pub fn list_printers() -> PrintResult<Vec<String>> {
        use windows::Win32::Graphics::Printing::{
            EnumPrintersW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL, PRINTER_INFO_5W,
        };
        use windows::core::PWSTR;

        unsafe {
            let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
            let mut needed: u32 = 0;
            let mut returned: u32 = 0;

            let _ = EnumPrintersW(flags, None, 5, None, &mut needed, &mut returned);

            if needed == 0 {
                return Ok(Vec::new());
            }

            let mut buf: Vec<u8> = vec![0; needed as usize];
            EnumPrintersW(
                flags,
                None,
                5,
                Some(buf.as_mut_slice()),
                &mut needed,
                &mut returned,
            )
            .map_err(|_| PrintError::WindowsPrinter("EnumPrintersW failed".to_string()))?;

            let ptr = buf.as_ptr() as *const PRINTER_INFO_5W;
            let slice = std::slice::from_raw_parts(ptr, returned as usize);

            let mut result: Vec<String> = Vec::new();
            for info in slice.iter() {
                if info.pPrinterName.is_null() {
                    continue;
                }
                let name = PWSTR(info.pPrinterName.0).to_string().unwrap_or_default();
                let port = if info.pPortName.is_null() {
                    String::new()
                } else {
                    PWSTR(info.pPortName.0).to_string().unwrap_or_default()
                };

                if is_virtual_port(&port) {
                    debug!(printer = %name, port = %port, "skipping virtual printer");
                } else {
                    result.push(name);
                }
            }

            Ok(result)
        }
    }

    pub fn default_printer() -> PrintResult<Option<String>> {
        use windows::Win32::Graphics::Printing::GetDefaultPrinterW;
        use windows::core::PWSTR;

        unsafe {
            let mut needed: u32 = 0;
            let _ = GetDefaultPrinterW(None, &mut needed);

            if needed == 0 {
                return Ok(None);
            }

            let mut buf: Vec<u16> = vec![0; needed as usize];
            let ok = GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed);

            if !ok.as_bool() {
                return Ok(None);
            }

            let name = PWSTR(buf.as_mut_ptr())
                .to_string()
                .map_err(|e| PrintError::WindowsPrinter(format!("UTF-16 decode failed: {}", e)))?;

            Ok(Some(name))
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use super::PrintResult;

    pub fn list_printers() -> PrintResult<Vec<String>> {
        Ok(Vec::new())
    }

    pub fn default_printer() -> PrintResult<Option<String>> {
        Ok(None)
    }
}
