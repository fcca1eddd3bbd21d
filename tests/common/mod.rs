#![allow(dead_code)]

pub use pipedag_test_utils::builders;
pub use pipedag_test_utils::journal::Journal;
pub use pipedag_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
