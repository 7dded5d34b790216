//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的调度和统计，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 把子命令翻译为对下层的调用
//! - 加载清单、解析阶段列表、运行前检查笔记本
//! - 保存报告、输出全局统计信息
//!
//! ### `workflow_runner` - 工作流运行器
//! - 维护运行状态机（Idle → Converting → Executing → Reported / Failed）
//! - 顺序转换所有笔记本
//! - 每个阶段一个 tokio 任务并发执行（或按依赖图启动）
//! - 按阶段名合并结果
//!
//! ## 层次关系
//!
//! ```text
//! app (处理一条命令)
//!     ↓
//! workflow_runner (处理 Vec<StageTarget>)
//!     ↓
//! workflow::StageFlow (处理单个笔记本)
//!     ↓
//! services (能力层：partition / synthesize / store)
//!     ↓
//! infrastructure (基础设施：StageExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管命令，workflow_runner 管一次运行
//! 2. **资源隔离**：只有编排层持有 StageExecutor
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod app;
pub mod workflow_runner;

// 重新导出主要类型
pub use app::{run_succeeded, App, REPORT_FILE};
pub use workflow_runner::{RunState, WorkflowRunner};
