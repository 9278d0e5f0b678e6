#[macro_use(debug, trace)]
extern crate tracing;

pub mod canonicalize;
pub mod captures;
pub mod compiler;
pub mod config;
pub mod debug;
pub mod dfa;
pub mod error;
pub mod executable;
pub mod interval_tree;
pub mod literal;
pub mod nfa;
pub mod reduce;
pub mod regex;
pub mod schema;
pub mod state_set;

#[cfg(test)]
mod test_utils;

pub use compiler::CompiledRegex;
pub use compiler::compile;
pub use config::CompilerConfig;
pub use error::CompileError;
