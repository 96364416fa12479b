pub mod constants;

mod env;
mod kv;

pub use env::Env;
pub use kv::KeyValue;
