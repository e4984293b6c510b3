//! Operational checks run before deploying the bot.
//!
//! Each check is a one-shot analysis of a project directory that produces a
//! plain text report and a process exit code:
//!
//! - [`deploy`]: required files, and files and variables per hosting platform
//! - [`security`]: regex scan of the sources, `.env` review, dependency
//!   audit, security headers and session handling

pub mod deploy;
mod env_file;
pub mod security;

pub use crate::checks::{deploy::check_deployment, security::check_security};
