mod env;
mod error;

pub mod subprocess;

pub use env::build_runner_env;
pub use error::ExecError;
