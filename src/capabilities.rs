//! Platform capability descriptor, resolved once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// First platform level exposing relative storage paths and scoped storage.
pub const RELATIVE_PATH_LEVEL: u32 = 29;
/// First platform level with granular media and notification permissions.
pub const MEDIA_PERMISSION_LEVEL: u32 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Permission {
    ReadExternalStorage,
    WriteExternalStorage,
    ReadMediaImages,
    PostNotifications,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadExternalStorage => "READ_EXTERNAL_STORAGE",
            Self::WriteExternalStorage => "WRITE_EXTERNAL_STORAGE",
            Self::ReadMediaImages => "READ_MEDIA_IMAGES",
            Self::PostNotifications => "POST_NOTIFICATIONS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub platform_level: u32,
    /// Records expose a relative path and updates may move files between folders.
    pub relative_paths: bool,
    /// Updating media this process did not create needs user consent.
    pub scoped_storage: bool,
}

impl Capabilities {
    pub fn for_platform_level(platform_level: u32) -> Self {
        Self {
            platform_level,
            relative_paths: platform_level >= RELATIVE_PATH_LEVEL,
            scoped_storage: platform_level >= RELATIVE_PATH_LEVEL,
        }
    }

    /// Permissions the service needs before it may start observing.
    pub fn required_permissions(&self) -> Vec<Permission> {
        let mut permissions = Vec::new();
        if self.platform_level < MEDIA_PERMISSION_LEVEL {
            permissions.push(Permission::ReadExternalStorage);
        }
        if self.platform_level < RELATIVE_PATH_LEVEL {
            permissions.push(Permission::WriteExternalStorage);
        }
        if self.platform_level >= MEDIA_PERMISSION_LEVEL {
            permissions.push(Permission::ReadMediaImages);
            permissions.push(Permission::PostNotifications);
        }
        permissions
    }

    /// Required permissions the given check reports as not granted.
    pub fn missing_permissions(&self, check: &dyn EntitlementCheck) -> Vec<Permission> {
        self.required_permissions()
            .into_iter()
            .filter(|permission| !check.is_granted(*permission))
            .collect()
    }
}

pub trait EntitlementCheck: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// A fixed set of granted permissions.
#[derive(Debug, Clone, Default)]
pub struct StaticEntitlements {
    granted: HashSet<Permission>,
}

impl StaticEntitlements {
    pub fn all() -> Self {
        Self::from_iter([
            Permission::ReadExternalStorage,
            Permission::WriteExternalStorage,
            Permission::ReadMediaImages,
            Permission::PostNotifications,
        ])
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl FromIterator<Permission> for StaticEntitlements {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}

impl EntitlementCheck for StaticEntitlements {
    fn is_granted(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}

/// Maps storage permissions onto what the process may do with a library directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntitlements {
    root: PathBuf,
}

impl DirectoryEntitlements {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EntitlementCheck for DirectoryEntitlements {
    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::ReadExternalStorage | Permission::ReadMediaImages => {
                std::fs::read_dir(&self.root).is_ok()
            }
            Permission::WriteExternalStorage => std::fs::metadata(&self.root)
                .map(|meta| meta.is_dir() && !meta.permissions().readonly())
                .unwrap_or(false),
            // Notifications go to the log sink, which is always available.
            Permission::PostNotifications => true,
        }
    }
}
