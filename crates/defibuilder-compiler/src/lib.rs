mod http;

pub use http::{CompileError, DEFAULT_COMPILER_URL, HttpCompiler};
