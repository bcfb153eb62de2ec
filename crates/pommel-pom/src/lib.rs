//! # pommel-pom
//!
//! The project descriptor model.
//!
//! This crate provides:
//! - `raw`: tolerant XML reading into a string-only [`RawDescriptor`],
//!   including normalisation of the legacy `project.xml` dialect
//! - `descriptor`: the validated semantic [`Descriptor`]
//! - `interpolate`: `${...}` placeholder resolution with cycle detection
//! - `inherit`: parent/child merging
//! - `profile`: profile activation and injection
//!
//! Nothing in here performs I/O beyond reading a descriptor file; locating
//! parents and fetching remote descriptors is the resolver's job.

pub mod descriptor;
pub mod inherit;
pub mod interpolate;
pub mod profile;
pub mod raw;

pub use descriptor::{Activation, Descriptor, Parent, Plugin, Profile, Relocation};
pub use inherit::merge_parent;
pub use interpolate::{implicit_properties, Interpolator, PropertyIssue, PropertyScope};
pub use profile::{inject_profiles, ActivationContext, DefaultActivator, ProfileActivator};
pub use raw::RawDescriptor;
