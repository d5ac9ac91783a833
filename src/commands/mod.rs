//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod batch;
pub mod get;
pub mod init_session;

pub use batch::{run as batch_run, BatchOptions, BatchReport};
pub use get::{run as get_run, GetOptions};
