/*!
Owned, FFI-safe C string.
*/

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_char;

/// An owned nul-terminated string whose ownership is transferred by value across the boundary.
///
/// The receiver releases it by dropping it, exactly once.
#[repr(transparent)]
pub struct ReprCString(*mut c_char);

unsafe impl Send for ReprCString {}
unsafe impl Sync for ReprCString {}

impl ReprCString {
    /// Returns the raw pointer to the nul-terminated string.
    pub fn as_ptr(&self) -> *const c_char {
        self.0
    }
}

impl From<&str> for ReprCString {
    fn from(from: &str) -> Self {
        // interior nul bytes terminate the string
        let bytes = from.bytes().take_while(|&b| b != 0).collect::<Vec<_>>();
        let cstr = CString::new(bytes).unwrap_or_default();
        Self(cstr.into_raw())
    }
}

impl From<String> for ReprCString {
    fn from(from: String) -> Self {
        from.as_str().into()
    }
}

impl AsRef<str> for ReprCString {
    fn as_ref(&self) -> &str {
        if self.0.is_null() {
            return "";
        }
        unsafe { CStr::from_ptr(self.0) }.to_str().unwrap_or("")
    }
}

impl std::ops::Deref for ReprCString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

impl Drop for ReprCString {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let _ = unsafe { CString::from_raw(self.0) };
        }
    }
}

impl Clone for ReprCString {
    fn clone(&self) -> Self {
        self.as_ref().into()
    }
}

impl PartialEq for ReprCString {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Eq for ReprCString {}

impl PartialEq<str> for ReprCString {
    fn eq(&self, other: &str) -> bool {
        self.as_ref() == other
    }
}

impl PartialEq<&str> for ReprCString {
    fn eq(&self, other: &&str) -> bool {
        self.as_ref() == *other
    }
}

impl Default for ReprCString {
    fn default() -> Self {
        "".into()
    }
}

impl fmt::Display for ReprCString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_ref())
    }
}

impl fmt::Debug for ReprCString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_ref(), f)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ReprCString {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_ref())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ReprCString {
    fn deserialize<D>(deserializer: D) -> std::result::Result<ReprCString, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ReprCStringVisitor;

        impl<'de> ::serde::de::Visitor<'de> for ReprCStringVisitor {
            type Value = ReprCString;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: ::serde::de::Error,
            {
                Ok(v.into())
            }
        }

        deserializer.deserialize_str(ReprCStringVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::ReprCString;

    #[test]
    fn string_roundtrip() {
        let s = ReprCString::from("kernel32.dll");
        assert_eq!(&*s, "kernel32.dll");
        assert_eq!(s.clone(), s);
    }

    #[test]
    fn interior_nul_truncates() {
        let s = ReprCString::from("abc\0def");
        assert_eq!(s.as_ref(), "abc");
    }
}
