//! Cross-platform utilities for path strings, child processes and terminal
//! output.
//!
//! - [`path`]: syntactic path manipulation that understands both `/` and `\`
//!   as separators, plus symbolic link resolution;
//! - [`os`]: working directory, location of the running executable and
//!   directory management;
//! - [`subprocess`]: launching a child with redirected standard streams,
//!   exchanging data with it and controlling its lifetime;
//! - [`term`]: terminal size and wrapped text output.
//!
//! A small shell built on top of these lives in [`Interpreter`]; the public
//! modules [`command`] and [`env`] expose its extension points.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod external;
mod interpreter;
pub mod os;
pub mod path;
pub mod subprocess;
pub mod term;

pub use error::{Error, Result};
pub use subprocess::{Redirect, Redirects, Status, Subprocess};

/// The interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
