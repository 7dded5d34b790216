use std::path::PathBuf;

/// 默认的五个流水线阶段（按逻辑顺序）
pub const DEFAULT_STAGES: [&str; 5] = [
    "orchestrator",
    "literature_review",
    "hypothesis_generator",
    "data_analyzer",
    "visualizer",
];

/// 程序配置
///
/// API 密钥、模型标识等阶段自身需要的配置不在这里解析，
/// 它们通过继承的环境变量原样传给子进程
#[derive(Clone, Debug)]
pub struct Config {
    /// 项目根目录
    pub base_dir: PathBuf,
    /// 笔记本所在目录
    pub agents_dir: PathBuf,
    /// 输出根目录（脚本目录、报告、支持文件都在其下）
    pub output_dir: PathBuf,
    /// 上传的论文存放目录
    pub research_papers_dir: PathBuf,
    /// 上传的实验数据存放目录
    pub experimental_data_dir: PathBuf,
    /// 执行脚本的解释器
    pub python_interpreter: String,
    /// 共享配置模块所在目录，会追加到子进程的 PYTHONPATH
    pub shared_module_dir: PathBuf,
    /// 转换阶段复制到输出根目录的支持文件目录
    pub support_dir: Option<PathBuf>,
    /// 单个阶段的执行时间上限（秒）
    pub stage_timeout_secs: Option<u64>,
    /// 工作流清单（TOML）
    pub workflow_manifest: Option<PathBuf>,
    /// 是否按逻辑顺序（依赖图）启动阶段
    pub pipeline_ordered: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base_dir = PathBuf::from(".");
        let data_dir = base_dir.join("data");
        let output_dir = data_dir.join("outputs");
        Self {
            agents_dir: base_dir.join("agents"),
            research_papers_dir: data_dir.join("research_papers"),
            experimental_data_dir: data_dir.join("experimental_data"),
            output_log_file: output_dir.join("workflow.log"),
            output_dir,
            python_interpreter: "python3".to_string(),
            shared_module_dir: base_dir.clone(),
            support_dir: None,
            stage_timeout_secs: None,
            workflow_manifest: None,
            pipeline_ordered: false,
            verbose_logging: false,
            base_dir,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let base_dir = env_path("BASE_DIR").unwrap_or(default.base_dir);
        let data_dir = base_dir.join("data");
        let output_dir = env_path("OUTPUT_DIR").unwrap_or_else(|| data_dir.join("outputs"));
        Self {
            agents_dir: env_path("AGENTS_DIR").unwrap_or_else(|| base_dir.join("agents")),
            research_papers_dir: env_path("RESEARCH_PAPERS_DIR").unwrap_or_else(|| data_dir.join("research_papers")),
            experimental_data_dir: env_path("EXPERIMENTAL_DATA_DIR").unwrap_or_else(|| data_dir.join("experimental_data")),
            output_log_file: env_path("OUTPUT_LOG_FILE").unwrap_or_else(|| output_dir.join("workflow.log")),
            python_interpreter: std::env::var("PYTHON_INTERPRETER").unwrap_or(default.python_interpreter),
            shared_module_dir: env_path("SHARED_MODULE_DIR").unwrap_or_else(|| base_dir.clone()),
            support_dir: env_path("SUPPORT_DIR"),
            stage_timeout_secs: std::env::var("STAGE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()),
            workflow_manifest: env_path("WORKFLOW_MANIFEST"),
            pipeline_ordered: std::env::var("PIPELINE_ORDERED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.pipeline_ordered),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_dir,
            base_dir,
        }
    }

    /// 合成脚本存放目录
    pub fn scripts_dir(&self) -> PathBuf {
        self.output_dir.join("scripts")
    }

    /// 默认阶段对应的笔记本路径
    pub fn default_notebooks(&self) -> Vec<PathBuf> {
        DEFAULT_STAGES
            .iter()
            .map(|stage| self.agents_dir.join(format!("{}.ipynb", stage)))
            .collect()
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}
