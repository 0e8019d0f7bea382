//! The canonical path value stored in the backup database.
//!
//! Unlike [`camino::Utf8PathBuf`] (which we still use at the OS boundary),
//! a [`NativePath`] is a plain byte-exact string with some hard rules:
//! directories always carry a trailing separator, separators are the
//! platform-preferred one, and on Windows the extended `\\?\` prefix is
//! always present so paths can outgrow the short-path limit.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

#[cfg(windows)]
pub const SEPARATOR: char = '\\';
#[cfg(not(windows))]
pub const SEPARATOR: char = '/';

#[cfg(windows)]
const EXTENDED_PREFIX: &str = r"\\?\";
#[cfg(not(windows))]
const EXTENDED_PREFIX: &str = "";

/// A platform-native absolute path in canonical stored form.
///
/// Equality, hashing, and ordering are byte-exact; case matters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePath {
    path: String,
}

impl NativePath {
    pub fn new<S: Into<String>>(path: S) -> Self {
        let mut path = path.into();
        if !path.starts_with(EXTENDED_PREFIX) {
            path.insert_str(0, EXTENDED_PREFIX);
        }
        Self { path }
    }

    /// Converts forward slashes to the preferred separator.
    /// A no-op everywhere but Windows.
    pub fn make_preferred(&mut self) {
        #[cfg(windows)]
        {
            self.path = self.path.replace('/', "\\");
        }
    }

    pub fn ends_with_separator(&self) -> bool {
        self.path.ends_with(SEPARATOR)
    }

    /// Ensures the path has a trailing separator (directory form).
    pub fn ensure_trailing_separator(&mut self) {
        if !self.ends_with_separator() {
            self.path.push(SEPARATOR);
        }
    }

    pub fn with_trailing_separator(&self) -> Self {
        let mut copy = self.clone();
        copy.ensure_trailing_separator();
        copy
    }

    /// The file form of the path: trailing separators trimmed, but never
    /// below a bare root.
    pub fn without_trailing_separator(&self) -> Self {
        let trimmed = self.path.trim_end_matches(SEPARATOR);
        if trimmed.len() <= EXTENDED_PREFIX.len() {
            return self.clone();
        }
        Self {
            path: trimmed.to_owned(),
        }
    }

    /// The filename portion, or `""` for a directory-form path.
    pub fn file_name(&self) -> &str {
        match self.path.rfind(SEPARATOR) {
            Some(i) if i + 1 != self.path.len() => &self.path[i + 1..],
            _ => "",
        }
    }

    /// The parent directory (with its trailing separator), or `None` at a root.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.path.trim_end_matches(SEPARATOR);
        if trimmed.len() <= EXTENDED_PREFIX.len() {
            return None;
        }
        let cut = trimmed.rfind(SEPARATOR)?;
        Some(Self {
            path: self.path[..=cut].to_owned(),
        })
    }

    /// Every ancestor of the path, root first, each in directory form,
    /// ending with the path itself. A bare root yields just itself.
    pub fn intermediate_paths(&self) -> Vec<Self> {
        if self.path.len() <= EXTENDED_PREFIX.len() {
            return vec![self.clone()];
        }
        let mut result = Vec::new();
        let end = self.path.len() - 1;
        let mut i = EXTENDED_PREFIX.len();
        loop {
            match self.path[i..].find(SEPARATOR).map(|off| i + off) {
                None => {
                    result.push(self.clone());
                    break;
                }
                Some(at) if at == end => {
                    result.push(self.clone());
                    break;
                }
                Some(at) => {
                    i = at + 1;
                    result.push(Self {
                        path: self.path[..i].to_owned(),
                    });
                }
            }
        }
        result
    }

    /// Appends one segment, inserting a separator if neither side has one.
    /// Appending an empty segment does nothing.
    pub fn append_segment(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }
        if !self.ends_with_separator() && !segment.starts_with(SEPARATOR) {
            self.path.push(SEPARATOR);
        }
        self.path.push_str(segment);
    }

    /// Re-roots a full path under this one: `/out` + `/tmp/a.txt` becomes
    /// `/out/tmp/a.txt`. Drive/volume separators are stripped so `C:\x`
    /// lands under `<self>\C\x`.
    pub fn append_full(&self, other: &Self) -> Self {
        let sanitized = other.to_normal_string().replace(':', "");
        let mut copy = self.clone();
        copy.append_segment(&sanitized);
        copy
    }

    /// How many components sit below the root:
    /// `/` is 0, `/foo` is 1, `/foo/bar/` is 2.
    pub fn depth(&self) -> usize {
        let normal = self.to_normal_string();
        normal
            .char_indices()
            .filter(|(i, c)| *c == SEPARATOR && i + 1 != normal.len())
            .count()
    }

    /// The stored (extended on Windows) form.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The form without the extended prefix.
    pub fn to_normal_string(&self) -> String {
        self.path
            .strip_prefix(EXTENDED_PREFIX)
            .unwrap_or(&self.path)
            .to_owned()
    }

    /// A view suitable for handing to `std::fs`.
    pub fn as_std_path(&self) -> &std::path::Path {
        std::path::Path::new(&self.path)
    }

    pub fn to_utf8_path_buf(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(&self.path)
    }
}

impl From<&Utf8Path> for NativePath {
    fn from(p: &Utf8Path) -> Self {
        let mut path = Self::new(p.as_str());
        path.make_preferred();
        path
    }
}

impl From<&str> for NativePath {
    fn from(p: &str) -> Self {
        Self::new(p)
    }
}

impl fmt::Display for NativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl fmt::Debug for NativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.path)
    }
}

#[cfg(all(test, not(windows)))]
mod test {
    use super::*;

    #[test]
    fn trailing_separator() {
        let mut p = NativePath::new("/tmp/stuff");
        assert!(!p.ends_with_separator());
        p.ensure_trailing_separator();
        assert_eq!(p.as_str(), "/tmp/stuff/");
        // Idempotent
        p.ensure_trailing_separator();
        assert_eq!(p.as_str(), "/tmp/stuff/");
    }

    #[test]
    fn file_name() {
        assert_eq!(NativePath::new("/tmp/a.txt").file_name(), "a.txt");
        assert_eq!(NativePath::new("/tmp/").file_name(), "");
    }

    #[test]
    fn parents_are_directory_form() {
        let p = NativePath::new("/tmp/a.txt");
        assert_eq!(p.parent().unwrap().as_str(), "/tmp/");
        assert_eq!(p.parent().unwrap().parent().unwrap().as_str(), "/");
        assert!(NativePath::new("/").parent().is_none());
    }

    #[test]
    fn intermediate_paths() {
        let got: Vec<String> = NativePath::new("/tmp/foo/a.txt")
            .intermediate_paths()
            .iter()
            .map(|p| p.as_str().to_owned())
            .collect();
        assert_eq!(got, ["/", "/tmp/", "/tmp/foo/", "/tmp/foo/a.txt"]);
    }

    #[test]
    fn intermediate_paths_of_directory_form() {
        let got: Vec<String> = NativePath::new("/tmp/foo/")
            .intermediate_paths()
            .iter()
            .map(|p| p.as_str().to_owned())
            .collect();
        assert_eq!(got, ["/", "/tmp/", "/tmp/foo/"]);
    }

    #[test]
    fn root_is_its_own_intermediate() {
        let got = NativePath::new("/").intermediate_paths();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].as_str(), "/");
    }

    #[test]
    fn append_segment() {
        let mut p = NativePath::new("/tmp");
        p.append_segment("a.txt");
        assert_eq!(p.as_str(), "/tmp/a.txt");
        let mut q = NativePath::new("/tmp/");
        q.append_segment("a.txt");
        assert_eq!(q.as_str(), "/tmp/a.txt");
        let mut r = NativePath::new("/tmp");
        r.append_segment("");
        assert_eq!(r.as_str(), "/tmp");
    }

    #[test]
    fn append_full_re_roots() {
        let target = NativePath::new("/out");
        let got = target.append_full(&NativePath::new("/tmp/a.txt"));
        assert_eq!(got.as_str(), "/out/tmp/a.txt");
    }

    #[test]
    fn append_full_strips_volume_separators() {
        let target = NativePath::new("/out");
        let got = target.append_full(&NativePath::new("/weird:name/x"));
        assert_eq!(got.as_str(), "/out/weirdname/x");
    }

    #[test]
    fn depth() {
        assert_eq!(NativePath::new("/").depth(), 0);
        assert_eq!(NativePath::new("/foo").depth(), 1);
        assert_eq!(NativePath::new("/foo/bar/").depth(), 2);
    }

    #[test]
    fn trimming_never_eats_the_root() {
        assert_eq!(
            NativePath::new("/tmp/").without_trailing_separator().as_str(),
            "/tmp"
        );
        assert_eq!(NativePath::new("/").without_trailing_separator().as_str(), "/");
    }

    #[test]
    fn case_matters() {
        assert_ne!(NativePath::new("/tmp/A.txt"), NativePath::new("/tmp/a.txt"));
    }
}
