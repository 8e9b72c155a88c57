//! # Photo Renamer
//!
//! Watch a photo library for new camera shots and rename them by capture time and place.
//!
//! A new camera photo called `IMG_0042.jpg`, taken in Paris on 5 March 2024 at 14:30,
//! becomes `20240305_143000_Paris_France.jpg` and moves to `DCIM/Camera/2024/03/05`
//! on platforms that expose relative storage paths.
//!
//! ## Key Features
//!
//! - **Camera detection**: A folder and path cascade with a "just taken" time fallback.
//! - **Place names**: GPS coordinates from EXIF, reverse geocoded offline or through Nominatim.
//! - **Consent relay**: Renames blocked by storage protection are tracked per record and
//!   prompted for. The user's decision is relayed back and the rename retried.
//! - **Bounded processing**: Change events go through a bounded queue, and runs on the same
//!   record never overlap.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use photo_renamer::capabilities::{Capabilities, DirectoryEntitlements};
//! use photo_renamer::controller::ForegroundController;
//! use photo_renamer::index::FsMediaIndex;
//! use photo_renamer::metadata::ExifReader;
//! use photo_renamer::pipeline::RenamePipeline;
//! use photo_renamer::place::OfflineResolver;
//! use photo_renamer::policy::PolicySettings;
//! use photo_renamer::relay::{LogNotifier, PendingRequests, PermissionRelay};
//! use photo_renamer::watcher::PollingWatcher;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> color_eyre::Result<()> {
//!     let capabilities = Capabilities::for_platform_level(34);
//!     let index = Arc::new(
//!         FsMediaIndex::builder()
//!             .root("/sdcard")
//!             .capabilities(capabilities)
//!             .build(),
//!     );
//!     let relay = Arc::new(PermissionRelay::new(
//!         Arc::new(PendingRequests::new()),
//!         Arc::new(LogNotifier),
//!         index.clone(),
//!     ));
//!     let pipeline = RenamePipeline::builder()
//!         .index(index.clone())
//!         .reader(Arc::new(ExifReader::new()))
//!         .resolver(Arc::new(OfflineResolver::new()))
//!         .relay(relay)
//!         .settings(PolicySettings::builder().capabilities(capabilities).build())
//!         .build();
//!
//!     let controller = ForegroundController::builder()
//!         .capabilities(capabilities)
//!         .entitlements(Arc::new(DirectoryEntitlements::new("/sdcard")))
//!         .source(Arc::new(PollingWatcher::new(index, Duration::from_secs(5))))
//!         .pipeline(Arc::new(pipeline))
//!         .build();
//!
//!     controller.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     controller.stop().await;
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod controller;
pub mod error;
pub mod index;
pub mod metadata;
pub mod pipeline;
pub mod place;
pub mod policy;
pub mod queue;
pub mod relay;
pub mod structs;
pub mod time;
pub mod watcher;

pub use config::Config;
pub use controller::{ControllerState, ForegroundController};
pub use error::PhotoRenamerError;
pub use pipeline::{PipelineOutcome, RenamePipeline};
