//! Per-compilation configuration.
//!
//! One `CompilerConfig` value is constructed per compilation and threaded
//! by reference into every component that needs it. The target version is
//! held in a `SetOnce` cell: a second write is refused, never silently
//! overwritten.

use std::fmt;

/// A write-once cell. The first `set` wins; any later `set` is an error.
#[derive(Clone, Debug, Default)]
pub struct SetOnce<T> {
    value: Option<T>,
}

/// Returned when a `SetOnce` value is written a second time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlreadySet;

impl fmt::Display for AlreadySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value has already been set")
    }
}

impl std::error::Error for AlreadySet {}

impl<T> SetOnce<T> {
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn set(&mut self, value: T) -> Result<(), AlreadySet> {
        if self.value.is_some() {
            return Err(AlreadySet);
        }
        self.value = Some(value);
        Ok(())
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Target VM version, gating version-specific validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetVersion {
    pub major: u32,
    pub minor: u32,
}

impl TargetVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Latest supported target version.
    pub const fn latest() -> Self {
        Self::new(4, 0)
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Default for TargetVersion {
    fn default() -> Self {
        Self::latest()
    }
}

/// Target machine parameters for one compilation.
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    version: SetOnce<TargetVersion>,
    /// Maximum number of bits one storage cell holds contiguously.
    pub cell_bits: u32,
    /// Exception code thrown when the constructor runs a second time.
    pub constructor_guard_exception: u16,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            version: SetOnce::new(),
            cell_bits: 1023,
            constructor_guard_exception: 51,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the target version. Refuses a second write.
    pub fn set_version(&mut self, version: TargetVersion) -> Result<(), AlreadySet> {
        self.version.set(version)
    }

    /// The pinned target version, or the latest if none was pinned.
    pub fn version(&self) -> TargetVersion {
        self.version.get().copied().unwrap_or_default()
    }
}
