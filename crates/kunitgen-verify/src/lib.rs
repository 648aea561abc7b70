//! kunitgen-verify: external build runner
//!
//! Wraps the kernel's KUnit wrapper (or any other command) behind the
//! [`kunitgen_core::Verifier`] trait. The verdict comes from the log the
//! command leaves behind, never from its exit status.

pub mod runner;

pub use runner::{CommandVerifier, VerifyRun};
