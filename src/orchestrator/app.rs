//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 把命令行子命令翻译为对下层的调用：
//!
//! 1. **run**：加载清单、解析阶段、检查笔记本、运行工作流、保存报告
//! 2. **convert**：只转换不执行
//! 3. **upload / clear**：管理上传的研究资料，clear 同时清空输出
//! 4. **results**：读取各阶段写出的结果
//!
//! 本模块只做调度和统计，不做具体业务判断

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

use crate::cli::UploadKind;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::stage::StageTarget;
use crate::models::{load_manifest, WorkflowManifest, WorkflowReport};
use crate::orchestrator::workflow_runner::WorkflowRunner;
use crate::services::{clear_data_dirs, ArtifactStore, ResultsLoader, ScriptSynthesizer};
use crate::utils::logging::{log_phase, log_stage_outcome, log_startup, print_final_stats};
use crate::workflow::{StageCtx, StageFlow, StageGraph};

/// 报告文件名（位于输出根目录）
pub const REPORT_FILE: &str = "workflow_report.json";

/// 决定命令退出状态的阶段
const GATE_STAGE: &str = "orchestrator";

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        if config.python_interpreter.trim().is_empty() {
            return Err(AppError::config("PYTHON_INTERPRETER 不能为空"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行工作流
    ///
    /// # 返回
    /// 命令是否成功：报告不是整体失败形态，并且 orchestrator 阶段成功
    /// （本次运行没有 orchestrator 阶段时要求所有阶段成功）
    pub async fn run(&self, notebooks: Vec<PathBuf>, ordered: bool) -> Result<bool> {
        log_startup(&self.config);

        let manifest = self.load_manifest().await?;
        let targets = self.resolve_targets(notebooks, manifest.as_ref());
        check_notebooks(&targets)?;

        let ordered = ordered
            || self.config.pipeline_ordered
            || manifest.as_ref().is_some_and(|m| m.ordered);
        let graph = ordered.then(|| match &manifest {
            Some(m) if StageGraph::from_manifest(m).has_edges() => StageGraph::from_manifest(m),
            _ => StageGraph::research_pipeline(),
        });
        if ordered {
            info!("🔗 顺序模式：按阶段依赖图启动");
        }

        let imports = manifest.map(|m| m.preamble_imports).unwrap_or_default();
        let mut runner = WorkflowRunner::new(&self.config)
            .with_preamble_imports(imports)
            .with_graph(graph);

        log_phase("转换并执行", targets.len());
        let report = runner.run_workflow(&targets).await;

        let report_path = self.save_report(&report).await?;
        info!("📝 报告已保存: {}", report_path.display());

        match &report {
            WorkflowReport::Failed { error, .. } => {
                error!("❌ 工作流整体失败: {}", error);
            }
            WorkflowReport::Stages(results) => {
                for result in results.values() {
                    log_stage_outcome(result);
                }
            }
        }

        let (success, failed) = report.tally();
        print_final_stats(success, failed, targets.len(), &self.config.output_log_file);

        Ok(run_succeeded(&report))
    }

    /// 只转换，不执行
    ///
    /// # 返回
    /// 是否全部转换成功
    pub async fn convert(&self, notebooks: &[PathBuf]) -> Result<bool> {
        let manifest = self.load_manifest().await?;
        let imports = manifest.map(|m| m.preamble_imports).unwrap_or_default();

        let scripts_dir = self.config.scripts_dir();
        fs::create_dir_all(&scripts_dir)
            .await
            .with_context(|| format!("无法创建脚本目录: {}", scripts_dir.display()))?;

        let flow = StageFlow::new(ScriptSynthesizer::with_imports(imports), scripts_dir);
        let total = notebooks.len();
        let mut converted = 0;

        for (index, notebook) in notebooks.iter().enumerate() {
            let target = StageTarget::from_notebook(notebook);
            let ctx = StageCtx::new(&target.name, index + 1, total);
            match flow.convert(&target, &ctx).await {
                Ok(program) => {
                    println!("{}", program.path.display());
                    converted += 1;
                }
                Err(e) => error!("{} ❌ 转换失败: {:?}", ctx, anyhow::Error::new(e)),
            }
        }

        info!("✓ 转换完成: {}/{}", converted, total);
        Ok(converted == total)
    }

    /// 上传资料（逐个保存，按内容去重）
    pub async fn upload(&self, kind: UploadKind, files: &[PathBuf]) -> Result<()> {
        let store = ArtifactStore::new(self.upload_dir(kind));

        for file in files {
            let content = fs::read(file)
                .await
                .with_context(|| format!("无法读取上传文件: {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .with_context(|| format!("无效的文件名: {}", file.display()))?;

            let (path, is_new) = store.save(&file_name, &content).await?;
            if is_new {
                info!("📥 已上传: {}", path.display());
            } else {
                warn!("⚠️ 已存在相同内容的文件，跳过: {}", path.display());
            }
        }

        let stored = store.list().await?;
        info!("📁 {} 中共有 {} 个文件", store.dir().display(), stored.len());
        for file in &stored {
            info!("  {} ({} 字节, {})", file.name, file.size, file.modified);
        }

        Ok(())
    }

    /// 打印各阶段写出的结果
    pub async fn show_results(&self) -> Result<()> {
        let results = ResultsLoader::new(&self.config.output_dir).load().await;
        if results.is_empty() {
            warn!("⚠️ 暂无结果，请先运行工作流");
            return Ok(());
        }

        let rendered = serde_json::to_string_pretty(&results).context("无法序列化结果")?;
        println!("{}", rendered);
        Ok(())
    }

    /// 清空上传的资料和所有输出（脚本、报告、结果文件）
    pub async fn clear(&self) -> Result<()> {
        clear_data_dirs(&[
            self.config.research_papers_dir.clone(),
            self.config.experimental_data_dir.clone(),
            self.config.output_dir.clone(),
        ])
        .await?;
        info!("🧹 已清空上传的论文、实验数据和输出目录");
        Ok(())
    }

    async fn load_manifest(&self) -> Result<Option<WorkflowManifest>> {
        match &self.config.workflow_manifest {
            Some(path) => Ok(Some(load_manifest(path).await?)),
            None => Ok(None),
        }
    }

    /// 命令行参数 > 清单 > 默认五个阶段
    fn resolve_targets(&self, notebooks: Vec<PathBuf>, manifest: Option<&WorkflowManifest>) -> Vec<StageTarget> {
        if !notebooks.is_empty() {
            return notebooks.into_iter().map(StageTarget::from_notebook).collect();
        }
        match manifest {
            Some(m) if !m.stages.is_empty() => m.targets(),
            _ => self
                .config
                .default_notebooks()
                .into_iter()
                .map(StageTarget::from_notebook)
                .collect(),
        }
    }

    async fn save_report(&self, report: &WorkflowReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", self.config.output_dir.display()))?;

        let path = self.config.output_dir.join(REPORT_FILE);
        let content = serde_json::to_string_pretty(report).context("无法序列化工作流报告")?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入报告: {}", path.display()))?;
        Ok(path)
    }

    fn upload_dir(&self, kind: UploadKind) -> &Path {
        match kind {
            UploadKind::Papers => &self.config.research_papers_dir,
            UploadKind::Data => &self.config.experimental_data_dir,
        }
    }
}

/// 运行前检查所有笔记本是否存在，一次报告全部缺失项
fn check_notebooks(targets: &[StageTarget]) -> AppResult<()> {
    let missing: Vec<String> = targets
        .iter()
        .filter(|target| !target.notebook.is_file())
        .map(|target| target.notebook.display().to_string())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    for path in &missing {
        error!("❌ 找不到笔记本: {}", path);
    }
    Err(AppError::config(format!("缺少 {} 个笔记本: {}", missing.len(), missing.join(", "))))
}

/// 命令的退出判定
pub fn run_succeeded(report: &WorkflowReport) -> bool {
    match report {
        WorkflowReport::Failed { .. } => false,
        WorkflowReport::Stages(results) => match results.get(GATE_STAGE) {
            Some(gate) => gate.success,
            None => results.values().all(|r| r.success),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::models::ExecutionResult;
    use std::collections::BTreeMap;

    fn app_in(dir: &Path) -> App {
        let config = Config {
            agents_dir: dir.join("agents"),
            output_dir: dir.join("outputs"),
            research_papers_dir: dir.join("papers"),
            experimental_data_dir: dir.join("data"),
            ..Config::default()
        };
        App::initialize(config).unwrap()
    }

    #[test]
    fn test_empty_interpreter_is_config_error() {
        let config = Config {
            python_interpreter: " ".to_string(),
            ..Config::default()
        };
        assert!(matches!(App::initialize(config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_exit_follows_orchestrator_stage() {
        let mut results = BTreeMap::new();
        results.insert(
            "orchestrator".to_string(),
            ExecutionResult::succeeded("orchestrator", "", PathBuf::from("o.py")),
        );
        results.insert("visualizer".to_string(), ExecutionResult::failed("visualizer", "x", None));
        assert!(run_succeeded(&WorkflowReport::Stages(results.clone())));

        results.remove("orchestrator");
        assert!(!run_succeeded(&WorkflowReport::Stages(results)));

        let failed = WorkflowReport::failure(WorkflowError::DuplicateStage {
            stage: "x".to_string(),
        });
        assert!(!run_succeeded(&failed));
    }

    #[tokio::test]
    async fn test_missing_default_notebooks_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());

        let error = app.run(Vec::new(), false).await.unwrap_err();

        assert!(error.to_string().contains("缺少 5 个笔记本"));
        assert!(!dir.path().join("outputs").join(REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn test_clear_empties_uploads_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let source = dir.path().join("paper.pdf");
        std::fs::write(&source, b"%PDF-1.4").unwrap();

        app.upload(UploadKind::Papers, &[source.clone(), source]).await.unwrap();
        assert!(dir.path().join("papers/paper.pdf").is_file());

        let outputs = dir.path().join("outputs");
        std::fs::create_dir_all(outputs.join("scripts")).unwrap();
        std::fs::write(outputs.join(".gitkeep"), "").unwrap();
        std::fs::write(outputs.join(REPORT_FILE), "{}").unwrap();
        std::fs::write(outputs.join("literature_analysis.json"), "[]").unwrap();
        std::fs::write(outputs.join("scripts/visualizer.py"), "pass\n").unwrap();

        app.clear().await.unwrap();

        assert!(!dir.path().join("papers/paper.pdf").exists());
        assert!(outputs.join(".gitkeep").is_file());
        assert!(!outputs.join(REPORT_FILE).exists());
        assert!(!outputs.join("literature_analysis.json").exists());
        assert!(!outputs.join("scripts").exists());
        assert!(app.show_results().await.is_ok());
    }

    #[tokio::test]
    async fn test_convert_only_writes_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let notebook = dir.path().join("literature_review.ipynb");
        std::fs::write(&notebook, r#"{"cells": [{"cell_type": "code", "source": "x = 1"}]}"#).unwrap();

        assert!(app.convert(&[notebook]).await.unwrap());
        assert!(dir.path().join("outputs/scripts/literature_review.py").is_file());
        assert!(!dir.path().join("outputs").join(REPORT_FILE).exists());
    }
}
