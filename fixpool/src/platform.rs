//! Abstraction over OS differences.

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::OsPlatform;

#[cfg(not(target_os = "linux"))]
mod portable;

#[cfg(not(target_os = "linux"))]
pub use portable::OsPlatform;
