//! Root directories: the set of filesystem locations the library indexes.
//!
//! A root is either a concrete path or the [`RootDirectory::Home`] sentinel,
//! which stands for the operator's whole home directory and is only resolved
//! to a real path where the catalog or watcher needs one.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LibraryError, Result};

/// Wire and storage spelling of [`RootDirectory::Home`].
pub const HOME_SENTINEL: &str = "$home";

/// A single configured root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RootDirectory {
    /// The operator's entire home directory.
    Home,

    /// A concrete directory.
    Path(PathBuf),
}

impl RootDirectory {
    /// Parse a raw, user-supplied entry.
    ///
    /// Surrounding whitespace is trimmed and trailing separators dropped,
    /// so `"$home/"` is the sentinel too. Returns `None` for entries that are
    /// empty after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.trim_end_matches(std::path::is_separator) == HOME_SENTINEL {
            return Some(Self::Home);
        }

        let normalized: PathBuf = Path::new(trimmed).components().collect();
        Some(Self::Path(normalized))
    }

    /// Parse an operator-supplied entry, rejecting relative paths.
    ///
    /// Blank entries are `Ok(None)`.
    pub fn parse_absolute(raw: &str) -> Result<Option<Self>> {
        match Self::parse(raw) {
            Some(Self::Path(path)) if !path.is_absolute() => Err(LibraryError::InvalidRequest(
                format!("root directory must be an absolute path: {}", raw.trim()),
            )),
            parsed => Ok(parsed),
        }
    }

    /// Build a concrete root from a path.
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().components().collect())
    }

    /// Whether this is the home sentinel.
    pub fn is_home(&self) -> bool {
        matches!(self, Self::Home)
    }

    /// Resolve to a concrete directory, substituting `home` for the sentinel.
    pub fn resolve(&self, home: &Path) -> PathBuf {
        match self {
            Self::Home => home.to_path_buf(),
            Self::Path(path) => path.clone(),
        }
    }

    /// Whether `other` lies strictly beneath this root.
    ///
    /// Comparison is by path components, so `/music2` is not inside `/music`.
    /// The sentinel is never compared structurally.
    pub fn is_strict_ancestor_of(&self, other: &RootDirectory) -> bool {
        match (self, other) {
            (Self::Path(parent), Self::Path(child)) => {
                child != parent && child.starts_with(parent)
            }
            _ => false,
        }
    }
}

impl fmt::Display for RootDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str(HOME_SENTINEL),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<RootDirectory> for String {
    fn from(dir: RootDirectory) -> Self {
        dir.to_string()
    }
}

impl TryFrom<String> for RootDirectory {
    type Error = LibraryError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
            .ok_or_else(|| LibraryError::InvalidRequest("empty root directory".to_string()))
    }
}

/// The ordered collection of roots the library indexes.
///
/// Always well formed: no duplicates, no element beneath another element,
/// and the home sentinel only ever appears alone. An empty set is valid and
/// means "index nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RootDirectory>", into = "Vec<RootDirectory>")]
pub struct RootDirectorySet {
    dirs: Vec<RootDirectory>,
}

impl RootDirectorySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The set holding only the home sentinel.
    pub fn home() -> Self {
        Self {
            dirs: vec![RootDirectory::Home],
        }
    }

    /// Build a set from arbitrary entries, restoring the invariants.
    ///
    /// The sentinel is dropped when concrete paths are present, later
    /// duplicates are dropped, and any entry beneath another entry is dropped.
    /// Survivors keep their relative order.
    pub fn from_dirs(dirs: impl IntoIterator<Item = RootDirectory>) -> Self {
        let mut dirs: Vec<RootDirectory> = dirs.into_iter().collect();

        if dirs.iter().any(|d| !d.is_home()) {
            dirs.retain(|d| !d.is_home());
        }

        let mut unique: Vec<RootDirectory> = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }

        let covered: Vec<bool> = unique
            .iter()
            .map(|dir| unique.iter().any(|other| other.is_strict_ancestor_of(dir)))
            .collect();

        let dirs = unique
            .into_iter()
            .zip(covered)
            .filter_map(|(dir, covered)| (!covered).then_some(dir))
            .collect();

        Self { dirs }
    }

    /// Whether the set is exactly `{HOME}`.
    pub fn is_home(&self) -> bool {
        matches!(self.dirs.as_slice(), [RootDirectory::Home])
    }

    /// Whether `dir` is an element of the set.
    pub fn contains(&self, dir: &RootDirectory) -> bool {
        self.dirs.contains(dir)
    }

    /// Iterate the roots in order.
    pub fn iter(&self) -> std::slice::Iter<'_, RootDirectory> {
        self.dirs.iter()
    }

    /// The roots as a slice.
    pub fn as_slice(&self) -> &[RootDirectory] {
        &self.dirs
    }

    /// Number of roots.
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Resolve every root to a concrete directory.
    pub fn resolve(&self, home: &Path) -> Vec<PathBuf> {
        self.dirs.iter().map(|d| d.resolve(home)).collect()
    }

    /// The roots in their wire spelling.
    pub fn to_strings(&self) -> Vec<String> {
        self.dirs.iter().map(ToString::to_string).collect()
    }

    /// Whether the invariants hold. Always true for values built through
    /// this type; useful when checking externally assembled lists.
    pub fn is_well_formed(dirs: &[RootDirectory]) -> bool {
        let home_mixed = dirs.len() > 1 && dirs.iter().any(RootDirectory::is_home);
        let duplicated = dirs
            .iter()
            .enumerate()
            .any(|(i, d)| dirs[i + 1..].contains(d));
        let nested = dirs
            .iter()
            .any(|d| dirs.iter().any(|other| other.is_strict_ancestor_of(d)));

        !home_mixed && !duplicated && !nested
    }
}

impl From<Vec<RootDirectory>> for RootDirectorySet {
    fn from(dirs: Vec<RootDirectory>) -> Self {
        Self::from_dirs(dirs)
    }
}

impl From<RootDirectorySet> for Vec<RootDirectory> {
    fn from(set: RootDirectorySet) -> Self {
        set.dirs
    }
}

impl<'a> IntoIterator for &'a RootDirectorySet {
    type Item = &'a RootDirectory;
    type IntoIter = std::slice::Iter<'a, RootDirectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.dirs.iter()
    }
}

/// An operator-submitted delta against the current roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRequest {
    /// Roots to add, in request order.
    pub additions: Vec<RootDirectory>,

    /// Roots to remove. Entries not currently configured are ignored.
    pub removals: Vec<RootDirectory>,
}

/// Wire shape of a change request.
#[derive(Debug, Deserialize)]
struct ChangeRequestPayload {
    new_dirs: Vec<String>,
    removed: Vec<String>,
}

impl ChangeRequest {
    /// Create a request from already parsed roots.
    pub fn new(additions: Vec<RootDirectory>, removals: Vec<RootDirectory>) -> Self {
        Self {
            additions,
            removals,
        }
    }

    /// Create a request from raw strings, dropping blank entries.
    pub fn from_raw<A, R>(additions: A, removals: R) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            additions: additions
                .into_iter()
                .filter_map(|raw| RootDirectory::parse(raw.as_ref()))
                .collect(),
            removals: removals
                .into_iter()
                .filter_map(|raw| RootDirectory::parse(raw.as_ref()))
                .collect(),
        }
    }

    /// Parse a `{ "new_dirs": [..], "removed": [..] }` body.
    ///
    /// Both fields are required and must be arrays of strings. Every
    /// non-blank entry must be the home sentinel or an absolute path.
    pub fn from_json_slice(body: &[u8]) -> Result<Self> {
        let payload: ChangeRequestPayload = serde_json::from_slice(body)
            .map_err(|e| LibraryError::InvalidRequest(e.to_string()))?;

        let parse_all = |raw: &[String]| -> Result<Vec<RootDirectory>> {
            raw.iter()
                .filter_map(|entry| RootDirectory::parse_absolute(entry).transpose())
                .collect()
        };
        Ok(Self {
            additions: parse_all(&payload.new_dirs)?,
            removals: parse_all(&payload.removed)?,
        })
    }

    /// Whether the additions are exactly the home sentinel.
    pub fn selects_only_home(&self) -> bool {
        !self.additions.is_empty() && self.additions.iter().all(RootDirectory::is_home)
    }
}
