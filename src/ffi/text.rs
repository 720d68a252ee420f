use std::ffi::{c_char, CStr};

/// Copies `src` into `out[..out_len]` without a terminator.
///
/// Fails without writing anything if `out` is null or too small. An empty
/// `src` always succeeds.
pub fn copy_utf8_out(src: &[u8], out: *mut u8, out_len: u64) -> bool {
    if src.is_empty() {
        return true;
    }
    if out.is_null() || out_len < src.len() as u64 {
        return false;
    }
    // SAFETY: the caller guarantees `out` is writable for `out_len` bytes.
    unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), out, src.len()) };
    true
}

/// Borrows a caller-supplied `(ptr, len)` byte range; null reads as empty.
///
/// # Safety
///
/// `ptr` must be null or readable for `len` bytes.
pub unsafe fn borrow_bytes<'a>(ptr: *const u8, len: u64) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return Some(&[]);
    }
    let len = usize::try_from(len).ok()?;
    Some(std::slice::from_raw_parts(ptr, len))
}

/// Borrows a NUL-terminated symbol name; `None` for null or non-UTF-8.
///
/// # Safety
///
/// `name` must be null or point to a NUL-terminated string.
pub unsafe fn borrow_cstr<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_checks_buffer() {
        let mut buf = [0u8; 4];
        assert!(!copy_utf8_out(b"hello", buf.as_mut_ptr(), buf.len() as u64));
        assert_eq!(buf, [0; 4]);
        assert!(copy_utf8_out(b"hey", buf.as_mut_ptr(), buf.len() as u64));
        assert_eq!(&buf[..3], b"hey");
        assert!(!copy_utf8_out(b"x", std::ptr::null_mut(), 8));
        assert!(copy_utf8_out(b"", std::ptr::null_mut(), 0));
    }

    #[test]
    fn borrowing() {
        let bytes = b"wgpuCreateInstance";
        unsafe {
            assert_eq!(
                borrow_bytes(bytes.as_ptr(), bytes.len() as u64),
                Some(&bytes[..])
            );
            assert_eq!(borrow_bytes(std::ptr::null(), 10), Some(&[][..]));
            assert_eq!(borrow_cstr(b"abc\0".as_ptr().cast()), Some("abc"));
            assert_eq!(borrow_cstr(std::ptr::null()), None);
        }
    }
}
