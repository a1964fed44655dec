//! Output artifacts for a submerge run.
//!
//! - Base64 subscriptions (full set, top set, optional per protocol)
//! - `STATUS.md` ranking table
//! - `manifest.json` with run metadata and artifact checksums
//!
//! Generators are pure; [`write_artifacts`] and [`write_manifest`] do the I/O.

pub mod status;
pub mod subscription;
pub mod writer;

pub use status::{StatusReport, render_status};
pub use subscription::{encode_subscription, per_protocol_subscriptions};
pub use writer::{Artifact, ArtifactMeta, RunManifest, write_artifacts, write_manifest};
