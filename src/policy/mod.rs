//! Decides which media is a camera photo and what it should be called.
mod apply;
mod camera;
mod rename;

pub use apply::apply_rename;
pub use camera::{CAMERA_FOLDERS, CameraEvidence, classify, is_camera_photo};
pub use rename::{build_target, compute_rename, extension_of};

use crate::capabilities::Capabilities;
use crate::time::NamingZone;
use bon::Builder;
use std::time::Duration;

/// Window around "now" in which an unlabelled record counts as freshly captured.
pub const DEFAULT_CAMERA_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Builder)]
pub struct PolicySettings {
    pub capabilities: Capabilities,
    #[builder(default = DEFAULT_CAMERA_WINDOW)]
    pub camera_window: Duration,
    #[builder(default)]
    pub zone: NamingZone,
}
