//! Namespace identities of running processes

use std::fmt;
use std::fs;
use std::path::PathBuf;
use burrow_core::Result;

/// Namespace ids of one process, as read from `/proc/<pid>/ns`
///
/// Each id looks like `uts:[4026531838]`. Two processes share a namespace
/// exactly when their ids are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// UTS namespace ID
    pub uts: Option<String>,
    /// PID namespace ID
    pub pid: Option<String>,
    /// Mount namespace ID
    pub mnt: Option<String>,
}

impl NamespaceInfo {
    /// Namespaces of the calling process
    ///
    /// # Errors
    /// Returns error if `/proc/self/ns` cannot be read
    pub fn current() -> Result<Self> {
        Self::for_pid(std::process::id())
    }

    /// Namespaces of `pid`
    ///
    /// # Errors
    /// Returns error if the process has no `/proc/<pid>/ns` directory
    pub fn for_pid(pid: u32) -> Result<Self> {
        let base = PathBuf::from(format!("/proc/{pid}/ns"));
        fs::metadata(&base)?;

        let read_ns = |name: &str| {
            fs::read_link(base.join(name))
                .map(|p| p.to_string_lossy().into_owned())
                .ok()
        };

        Ok(Self {
            uts: read_ns("uts"),
            pid: read_ns("pid"),
            mnt: read_ns("mnt"),
        })
    }

    /// True when every namespace differs from `other`'s
    #[must_use]
    pub fn is_disjoint_from(&self, other: &Self) -> bool {
        fn differs(a: Option<&String>, b: Option<&String>) -> bool {
            matches!((a, b), (Some(a), Some(b)) if a != b)
        }

        differs(self.uts.as_ref(), other.uts.as_ref())
            && differs(self.pid.as_ref(), other.pid.as_ref())
            && differs(self.mnt.as_ref(), other.mnt.as_ref())
    }
}

impl fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Namespace Info:")?;
        if let Some(ref uts) = self.uts {
            writeln!(f, "  UTS: {uts}")?;
        }
        if let Some(ref pid) = self.pid {
            writeln!(f, "  PID: {pid}")?;
        }
        if let Some(ref mnt) = self.mnt {
            writeln!(f, "  MNT: {mnt}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_namespaces() {
        let info = NamespaceInfo::current().unwrap();
        assert!(info.pid.is_some());
        assert!(info.mnt.as_deref().is_some_and(|m| m.starts_with("mnt:")));
    }

    #[test]
    fn test_process_is_not_disjoint_from_itself() {
        let info = NamespaceInfo::current().unwrap();
        assert!(!info.is_disjoint_from(&info));
    }

    #[test]
    fn test_missing_process() {
        assert!(NamespaceInfo::for_pid(u32::MAX).is_err());
    }

    #[test]
    fn test_disjoint_requires_all_three() {
        let a = NamespaceInfo {
            uts: Some("uts:[1]".to_string()),
            pid: Some("pid:[1]".to_string()),
            mnt: Some("mnt:[1]".to_string()),
        };
        let mut b = NamespaceInfo {
            uts: Some("uts:[2]".to_string()),
            pid: Some("pid:[2]".to_string()),
            mnt: Some("mnt:[2]".to_string()),
        };
        assert!(a.is_disjoint_from(&b));

        b.mnt.clone_from(&a.mnt);
        assert!(!a.is_disjoint_from(&b));
    }

    #[test]
    fn test_namespace_info_display() {
        let info = NamespaceInfo {
            pid: Some("pid:[4026531836]".to_string()),
            ..Default::default()
        };

        let display = format!("{info}");
        assert!(display.contains("PID:"));
        assert!(!display.contains("UTS:"));
    }
}
