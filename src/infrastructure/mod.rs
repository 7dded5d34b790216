//! 基础设施层
//!
//! 持有稀缺资源（子进程），只暴露执行能力

pub mod process_executor;

pub use process_executor::{ExecutionEnv, StageExecutor};
