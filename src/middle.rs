//! The middle of the compiler: the stack-machine intermediate
//! representation that sits between the source AST and the x86 backend.

pub mod sm;

pub use sm::eval as sm_eval;
