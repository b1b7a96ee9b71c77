//! Host name lookup for the default job location.

/// Returns the name of the machine the process runs on.
///
/// Falls back to `"localhost"` when the operating system refuses to
/// report a name.
pub(crate) fn machine_name() -> String {
    platform_machine_name().unwrap_or_else(|| String::from("localhost"))
}

#[cfg(unix)]
fn platform_machine_name() -> Option<String> {
    let mut buf = [0u8; 256];

    // Safety: the buffer is valid for `buf.len()` bytes and gethostname
    // writes at most that many.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).into_owned();

    (!name.is_empty()).then_some(name)
}

#[cfg(windows)]
fn platform_machine_name() -> Option<String> {
    use windows_sys::Win32::System::SystemInformation::{
        ComputerNamePhysicalDnsHostname, GetComputerNameExW,
    };

    let mut buf = [0u16; 256];
    let mut len = buf.len() as u32;

    // Safety: `len` holds the buffer capacity in UTF-16 units and is
    // updated with the number of units written.
    let ok = unsafe { GetComputerNameExW(ComputerNamePhysicalDnsHostname, buf.as_mut_ptr(), &mut len) };
    if ok == 0 {
        return None;
    }

    let name = String::from_utf16_lossy(&buf[..len as usize]);
    (!name.is_empty()).then_some(name)
}

#[cfg(not(any(unix, windows)))]
fn platform_machine_name() -> Option<String> {
    None
}
