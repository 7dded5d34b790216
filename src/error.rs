use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
///
/// 三类错误的传播边界不同：
/// - `Conversion` / `Execution` 只会被降级为单个阶段的失败记录
/// - `Workflow` 是唯一允许替换整份报告的错误
#[derive(Debug, Error)]
pub enum AppError {
    /// 笔记本转换错误
    #[error("转换错误: {0}")]
    Conversion(#[from] ConversionError),
    /// 阶段执行错误
    #[error("执行错误: {0}")]
    Execution(#[from] ExecutionError),
    /// 工作流级错误（不属于任何单个阶段）
    #[error("工作流错误: {0}")]
    Workflow(#[from] WorkflowError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

/// 笔记本转换错误
///
/// 每个变体都带有阶段名，便于写入报告中对应的键
#[derive(Debug, Error)]
pub enum ConversionError {
    /// 读取笔记本文件失败
    #[error("无法读取笔记本 (阶段: {stage}, 路径: {}): {source}", path.display())]
    Unreadable {
        stage: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 笔记本不是合法的 JSON 结构
    #[error("笔记本解析失败 (阶段: {stage}): {source}")]
    Malformed {
        stage: String,
        #[source]
        source: serde_json::Error,
    },
    /// 写入合成脚本失败
    #[error("写入脚本失败 (阶段: {stage}, 路径: {}): {source}", path.display())]
    WriteFailed {
        stage: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    /// 出错的阶段名
    pub fn stage(&self) -> &str {
        match self {
            ConversionError::Unreadable { stage, .. }
            | ConversionError::Malformed { stage, .. }
            | ConversionError::WriteFailed { stage, .. } => stage,
        }
    }
}

/// 阶段执行错误
///
/// 执行层从不向上抛出这些错误，而是把它们转换为失败的 `ExecutionResult`
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 无法启动子进程（解释器缺失、权限不足等）
    #[error("无法启动阶段 {stage} 的进程 ({interpreter}): {source}")]
    SpawnFailed {
        stage: String,
        interpreter: String,
        #[source]
        source: std::io::Error,
    },
    /// 进程以非零状态退出
    #[error("阶段 {stage} 以状态 {code:?} 退出")]
    NonZeroExit { stage: String, code: Option<i32> },
    /// 超过单进程时间上限
    #[error("阶段 {stage} 执行超时 (上限 {timeout_secs} 秒)")]
    TimedOut { stage: String, timeout_secs: u64 },
    /// 执行任务本身异常终止
    #[error("阶段 {stage} 的执行任务异常终止: {message}")]
    TaskAborted { stage: String, message: String },
}

/// 工作流级错误
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// 无法创建共享输出目录
    #[error("无法创建输出目录 {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 无法复制共享支持文件
    #[error("无法复制支持文件 {}: {source}", path.display())]
    SupportFiles {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 阶段依赖图中存在环
    #[error("阶段依赖图存在环: {stages:?}")]
    CyclicGraph { stages: Vec<String> },
    /// 同一次运行中出现重复的阶段名
    #[error("阶段名重复: {stage}")]
    DuplicateStage { stage: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        AppError::Config(msg.into())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
