//! # Notebook Stages
//!
//! 把研究流水线各阶段的笔记本合成为独立的 Python 脚本，
//! 并发执行并汇总每个阶段的结果
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有子进程，只暴露能力
//! - `StageExecutor` - 唯一启动子进程的地方，提供 run() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，都是纯文本或单文件操作
//! - `partition` - 把单元格划分为定义段和过程段
//! - `ScriptSynthesizer` - 组装可独立运行的程序
//! - `ArtifactStore` / `ResultsLoader` - 资料存储与结果读取
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个笔记本"的完整转换流程
//! - `StageCtx` - 上下文封装（阶段名 + 序号）
//! - `StageFlow` - 流程编排（load → partition → synthesize → write）
//! - `StageGraph` - 阶段依赖图
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/workflow_runner` - 管理一次运行的状态机和并发
//! - `orchestrator/app` - 命令入口
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ConversionError, ExecutionError, WorkflowError};
pub use infrastructure::{ExecutionEnv, StageExecutor};
pub use models::{ExecutionResult, StageKind, StageTarget, WorkflowReport};
pub use orchestrator::{App, RunState, WorkflowRunner};
pub use services::{ScriptSynthesizer, SynthesizedProgram};
pub use workflow::{StageCtx, StageFlow, StageGraph};
