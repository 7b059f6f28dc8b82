//! Path and filter utilities

use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::ffi::OsString;

use crate::error::CatfindError;

/// Join a directory path and a file name with a single `/`, bounded by `max` bytes.
pub fn compose_path(dir: &[u8], name: &[u8], max: usize) -> Result<Vec<u8>, CatfindError> {
    let sep = usize::from(!dir.ends_with(b"/"));
    let len = dir.len() + sep + name.len();
    let mut path = Vec::with_capacity(len);
    path.extend_from_slice(dir);
    if sep == 1 {
        path.push(b'/');
    }
    path.extend_from_slice(name);
    check_path_length(&path, max)?;
    Ok(path)
}

/// `PathTooLong` when `path` is over `max` bytes.
pub fn check_path_length(path: &[u8], max: usize) -> Result<(), CatfindError> {
    if path.len() > max {
        return Err(CatfindError::PathTooLong {
            path: String::from_utf8_lossy(path).into_owned(),
            len: path.len(),
            max,
        });
    }
    Ok(())
}

/// Leaf text for filters, listings and logs. Invalid UTF-8 is replaced, never rejected.
pub fn decode_name(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Command text handed to the shell. On unix the bytes pass through untouched.
#[cfg(unix)]
pub fn bytes_to_os_string(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

#[cfg(not(unix))]
pub fn bytes_to_os_string(bytes: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Which leaves are listed and dispatched: regex match (with optional substitution
/// in the listing) or a minimum path length.
#[derive(Clone, Debug, Default)]
pub struct PathFilter {
    regex: Option<Regex>,
    substitute: Option<String>,
    check_length: Option<usize>,
}

impl PathFilter {
    pub fn new(
        regex: Option<&str>,
        substitute: Option<&str>,
        check_length: Option<usize>,
    ) -> Result<Self, CatfindError> {
        let regex = match regex {
            Some(pattern) => {
                let re = Regex::new(pattern).map_err(|e| {
                    CatfindError::Config(format!("Bad regular expression '{pattern}': {e}"))
                })?;
                if re.captures_len() > 1 {
                    return Err(CatfindError::Config(format!(
                        "Regular expression '{pattern}' may not contain capture groups"
                    )));
                }
                Some(re)
            }
            None => None,
        };
        Ok(Self {
            regex,
            substitute: substitute.map(str::to_string),
            check_length,
        })
    }

    pub fn has_check_length(&self) -> bool {
        self.check_length.is_some()
    }

    /// Dispatch filter: with a regex only matching leaves pass.
    pub fn accepts(&self, path: &str) -> bool {
        self.regex.as_ref().is_none_or(|re| re.is_match(path))
    }

    /// Listing filter: what to print for `path`, or None to skip it.
    pub fn listing<'a>(&self, path: &'a str) -> Option<Cow<'a, str>> {
        if let Some(re) = &self.regex {
            if !re.is_match(path) {
                return None;
            }
            return Some(match &self.substitute {
                Some(sub) => re.replacen(path, 1, NoExpand(sub.as_str())),
                None => Cow::Borrowed(path),
            });
        }
        if let Some(min) = self.check_length
            && path.len() <= min
        {
            return None;
        }
        Some(Cow::Borrowed(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_adds_one_separator() {
        assert_eq!(compose_path(b"/zone/a", b"f", 100).unwrap(), b"/zone/a/f");
        assert_eq!(compose_path(b"/", b"f", 100).unwrap(), b"/f");
    }

    #[test]
    fn compose_enforces_max() {
        assert!(compose_path(b"/zone", b"file", 10).is_ok());
        let err = compose_path(b"/zone", b"file", 9).unwrap_err();
        assert!(matches!(err, CatfindError::PathTooLong { len: 10, max: 9, .. }));
    }

    #[test]
    fn capture_groups_are_refused() {
        assert!(PathFilter::new(Some("(a)"), None, None).is_err());
        assert!(PathFilter::new(Some("(?:a)b"), None, None).is_ok());
    }

    #[test]
    fn substitute_replaces_first_match_only() {
        let f = PathFilter::new(Some("a"), Some("$X"), None).unwrap();
        assert_eq!(f.listing("/zone/aa").as_deref(), Some("/zone/$Xa"));
        assert_eq!(f.listing("/zone/b"), None);
        assert!(!f.accepts("/zone/b"));
    }

    #[test]
    fn check_length_lists_long_paths() {
        let f = PathFilter::new(None, None, Some(6)).unwrap();
        assert_eq!(f.listing("/zone"), None);
        assert_eq!(f.listing("/zone/x").as_deref(), Some("/zone/x"));
        assert!(f.accepts("/zone"));
    }
}
