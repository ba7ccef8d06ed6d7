//! Batch front-end for the `psd_ockham` command-line tool.
//!
//! [`core`] owns the engine: permission repair of the tool, one invocation per
//! input file, live draining of stdout/stderr into a shared output log, and
//! cancellation. The binary wraps it in a plain streaming mode and a terminal
//! UI.

pub mod core;
pub mod logging;
