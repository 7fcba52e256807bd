//! Version identities reported by the loader's version query.

use std::fmt;

/// Longest component name the C ABI can carry, including the terminator.
pub const COMPONENT_NAME_CAPACITY: usize = 64;

/// API version packed as `(major << 16) | minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(u32);

impl ApiVersion {
    pub const V1_0: ApiVersion = ApiVersion::new(1, 0);
    /// Latest API version this loader understands.
    pub const CURRENT: ApiVersion = ApiVersion::new(1, 13);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self(((major as u32) << 16) | minor as u32)
    }

    pub const fn from_packed(packed: u32) -> Self {
        Self(packed)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn minor(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// `major.minor.patch` of a component library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl LibraryVersion {
    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse `"1.24.0"`-style strings. Missing or non-numeric parts read as 0,
    /// and anything after a `-` or `+` is ignored.
    pub fn parse(s: &str) -> Self {
        let core = s.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.').map(|p| p.trim().parse::<i32>().unwrap_or(0));
        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    /// Version of the crates in this workspace.
    pub fn of_loader() -> Self {
        Self::parse(env!("CARGO_PKG_VERSION"))
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// One row of the version query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentVersion {
    name: String,
    pub spec_version: ApiVersion,
    pub library_version: LibraryVersion,
}

impl ComponentVersion {
    /// Names longer than the ABI buffer are cut on a char boundary.
    pub fn new(name: &str, spec_version: ApiVersion, library_version: LibraryVersion) -> Self {
        Self {
            name: bounded_name(name).to_string(),
            spec_version,
            library_version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Longest prefix of `name` that fits the C buffer with its NUL terminator.
pub fn bounded_name(name: &str) -> &str {
    let max = COMPONENT_NAME_CAPACITY - 1;
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
