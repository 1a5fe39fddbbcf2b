//! Output and rule identifiers
//!
//! Both are small `Copy` indices assigned in registration order while the
//! routing table is compiled. The engine uses them to index its per-output
//! and per-rule vectors directly.

use std::fmt;

/// Identifier of a registered output destination
///
/// # Example
///
/// ```
/// use tributary_routing::OutputId;
///
/// let out = OutputId::new(0);
/// let copy = out;  // Copy, not move
/// assert_eq!(out, copy);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(u16);

impl OutputId {
    /// Maximum number of outputs supported
    pub const MAX: u16 = u16::MAX;

    #[inline]
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Get the index as usize (for array indexing)
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output:{}", self.0)
    }
}

impl From<u16> for OutputId {
    #[inline]
    fn from(index: u16) -> Self {
        Self::new(index)
    }
}

/// Identifier of a route rule
///
/// Each rule owns exactly one filter chain, so the rule id doubles as the
/// chain id when the engine looks up which filters to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u16);

impl RuleId {
    #[inline]
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_id_new() {
        let id = OutputId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.as_usize(), 42);
    }

    #[test]
    fn test_output_id_ordering() {
        assert!(OutputId::new(1) < OutputId::new(2));
    }

    #[test]
    fn test_output_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(OutputId::new(1));
        set.insert(OutputId::new(2));
        set.insert(OutputId::new(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(OutputId::new(123).to_string(), "output:123");
        assert_eq!(RuleId::new(7).to_string(), "rule:7");
    }

    #[test]
    fn test_from_u16() {
        let id: OutputId = 99u16.into();
        assert_eq!(id.index(), 99);
    }

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<OutputId>(), 2);
        assert_eq!(std::mem::size_of::<RuleId>(), 2);
    }

    #[test]
    fn test_array_indexing() {
        let outputs = ["stdout", "lib", "es"];
        assert_eq!(outputs[OutputId::new(1).as_usize()], "lib");
        assert_eq!(outputs[RuleId::new(2).as_usize()], "es");
    }
}
