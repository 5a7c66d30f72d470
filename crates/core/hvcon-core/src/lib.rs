//! Core support for the hvcon console driver stack.
//!
//! Provides the leveled diagnostic log used by every driver crate (see
//! [`log`]) and typed x86 port I/O (see [`arch`]).

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod log;

pub use log::LogLevel;
