//! 工作流运行器 - 编排层
//!
//! ## 职责
//!
//! 把一组笔记本变成一份工作流报告：
//!
//! 1. **准备**：检查阶段名、校验依赖图、创建脚本目录、复制支持文件
//! 2. **转换**：逐个（顺序）转换笔记本，单个阶段的失败只记录不中断
//! 3. **执行**：每个阶段一个 tokio 任务、一个子进程，全部并发
//! 4. **汇总**：按阶段名合并转换失败与执行结果
//!
//! ## 状态机
//!
//! ```text
//! Idle → Converting → Executing → Reported
//!            ↓
//!          Failed（不属于任何单个阶段的错误）
//! ```

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ExecutionError, WorkflowError};
use crate::infrastructure::{ExecutionEnv, StageExecutor};
use crate::models::stage::{StageKind, StageTarget};
use crate::models::{ExecutionResult, WorkflowReport};
use crate::services::synthesizer::{ScriptSynthesizer, SynthesizedProgram};
use crate::workflow::{StageCtx, StageFlow, StageGraph};

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Converting,
    Executing,
    Reported,
    Failed,
}

/// 工作流运行器
///
/// 唯一持有执行器的模块；执行器通过 Arc 共享给各个执行任务
pub struct WorkflowRunner {
    output_dir: PathBuf,
    support_dir: Option<PathBuf>,
    flow: StageFlow,
    executor: Arc<StageExecutor>,
    /// 有依赖图时按拓扑顺序启动，否则全部并发
    graph: Option<StageGraph>,
    state: RunState,
}

impl WorkflowRunner {
    pub fn new(config: &Config) -> Self {
        let env = ExecutionEnv::new(config.python_interpreter.clone())
            .with_search_path(config.shared_module_dir.clone())
            .with_timeout(config.stage_timeout_secs.map(Duration::from_secs));

        Self {
            output_dir: config.output_dir.clone(),
            support_dir: config.support_dir.clone(),
            flow: StageFlow::new(ScriptSynthesizer::new(), config.scripts_dir()),
            executor: Arc::new(StageExecutor::new(env)),
            graph: None,
            state: RunState::Idle,
        }
    }

    /// 追加到每个脚本前导部分的导入语句
    pub fn with_preamble_imports(mut self, imports: Vec<String>) -> Self {
        let scripts_dir = self.flow.scripts_dir().to_path_buf();
        self.flow = StageFlow::new(ScriptSynthesizer::with_imports(imports), scripts_dir);
        self
    }

    pub fn with_graph(mut self, graph: Option<StageGraph>) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_executor(mut self, executor: StageExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn scripts_dir(&self) -> &Path {
        self.flow.scripts_dir()
    }

    /// 以笔记本文件名作为阶段名运行
    pub async fn run_notebooks(&mut self, notebooks: &[PathBuf]) -> WorkflowReport {
        let targets: Vec<StageTarget> = notebooks.iter().map(StageTarget::from_notebook).collect();
        self.run_workflow(&targets).await
    }

    /// 运行一次完整的工作流
    ///
    /// 单个阶段的转换或执行失败只体现在对应阶段的结果里；
    /// 只有工作流级错误才会返回整体失败形态的报告
    pub async fn run_workflow(&mut self, targets: &[StageTarget]) -> WorkflowReport {
        self.state = RunState::Converting;

        match self.drive(targets).await {
            Ok(results) => {
                self.state = RunState::Reported;
                WorkflowReport::Stages(results)
            }
            Err(e) => {
                error!("❌ 工作流失败: {}", e);
                self.state = RunState::Failed;
                WorkflowReport::failure(e)
            }
        }
    }

    async fn drive(&mut self, targets: &[StageTarget]) -> Result<BTreeMap<String, ExecutionResult>, WorkflowError> {
        let graph = self.prepare(targets).await?;

        let (programs, mut results) = self.convert_all(targets).await;

        self.state = RunState::Executing;
        info!("▶️ 开始执行 {} 个阶段 (转换失败 {} 个)", programs.len(), results.len());

        let executed = match &graph {
            Some(graph) => {
                let conversion_failed: BTreeSet<String> = results.keys().cloned().collect();
                self.execute_ordered(programs, &conversion_failed, graph).await
            }
            None => self.execute_all(programs).await,
        };

        results.extend(executed);
        Ok(results)
    }

    /// 准备阶段：任何一步失败都属于工作流级错误
    ///
    /// # 返回
    /// 限定到本次运行阶段的依赖图（未启用顺序模式时为 None）
    async fn prepare(&self, targets: &[StageTarget]) -> Result<Option<StageGraph>, WorkflowError> {
        let mut names = BTreeSet::new();
        for target in targets {
            if !names.insert(target.name.clone()) {
                return Err(WorkflowError::DuplicateStage {
                    stage: target.name.clone(),
                });
            }
        }

        let graph = match &self.graph {
            Some(graph) => {
                let restricted = graph.restricted_to(&names);
                restricted.validate()?;
                debug!("依赖图校验通过: {} 个阶段", names.len());
                Some(restricted)
            }
            None => None,
        };

        let scripts_dir = self.flow.scripts_dir();
        fs::create_dir_all(scripts_dir)
            .await
            .map_err(|source| WorkflowError::DirectoryCreation {
                path: scripts_dir.to_path_buf(),
                source,
            })?;

        if let Some(support_dir) = &self.support_dir {
            let copied = stage_support_files(support_dir, &self.output_dir)
                .await
                .map_err(|source| WorkflowError::SupportFiles {
                    path: support_dir.clone(),
                    source,
                })?;
            info!("📎 已复制 {} 个支持文件到 {}", copied, self.output_dir.display());
        }

        Ok(graph)
    }

    /// 顺序转换所有笔记本
    async fn convert_all(&self, targets: &[StageTarget]) -> (Vec<SynthesizedProgram>, BTreeMap<String, ExecutionResult>) {
        let total = targets.len();
        let mut programs = Vec::with_capacity(total);
        let mut failures = BTreeMap::new();

        for (index, target) in targets.iter().enumerate() {
            let ctx = StageCtx::new(&target.name, index + 1, total);
            if ctx.kind == StageKind::Unknown {
                warn!("{} ⚠️ 未识别的阶段类型，不生成收尾代码", ctx);
            }

            match self.flow.convert(target, &ctx).await {
                Ok(program) => programs.push(program),
                Err(e) => {
                    error!("{} ❌ 转换失败: {}", ctx, e);
                    failures.insert(target.name.clone(), ExecutionResult::conversion_failed(e));
                }
            }
        }

        (programs, failures)
    }

    /// 并发执行所有程序，结果按完成顺序合并
    pub async fn execute_all(&self, programs: Vec<SynthesizedProgram>) -> BTreeMap<String, ExecutionResult> {
        let mut running: FuturesUnordered<_> = programs
            .into_iter()
            .map(|program| self.launch(program))
            .collect();

        let mut results = BTreeMap::new();
        while let Some(result) = running.next().await {
            results.insert(result.stage.clone(), result);
        }
        results
    }

    /// 按依赖图执行：上游全部成功才启动，上游失败则级联跳过
    async fn execute_ordered(
        &self,
        programs: Vec<SynthesizedProgram>,
        conversion_failed: &BTreeSet<String>,
        graph: &StageGraph,
    ) -> BTreeMap<String, ExecutionResult> {
        let mut results = BTreeMap::new();
        let mut failed = conversion_failed.clone();
        let mut succeeded: BTreeSet<String> = BTreeSet::new();
        let mut pending = programs;
        let mut running = FuturesUnordered::new();

        loop {
            // 跳过会让更多下游变为可判定，所以反复扫描直到没有新的跳过
            loop {
                let mut skipped_any = false;
                let mut waiting = Vec::with_capacity(pending.len());

                for program in pending.drain(..) {
                    let upstream = graph.upstream_of(&program.stage_name);
                    if let Some(blocker) = upstream.iter().find(|dep| failed.contains(*dep)) {
                        warn!("[阶段 {}] ⏭️ 上游阶段 {} 失败，跳过", program.stage_name, blocker);
                        let result = ExecutionResult::skipped(&program.stage_name, blocker, Some(program.path.clone()));
                        failed.insert(program.stage_name.clone());
                        results.insert(program.stage_name.clone(), result);
                        skipped_any = true;
                    } else if upstream.iter().all(|dep| succeeded.contains(dep)) {
                        running.push(self.launch(program));
                    } else {
                        waiting.push(program);
                    }
                }

                pending = waiting;
                if !skipped_any {
                    break;
                }
            }

            match running.next().await {
                Some(result) => {
                    if result.success {
                        succeeded.insert(result.stage.clone());
                    } else {
                        failed.insert(result.stage.clone());
                    }
                    results.insert(result.stage.clone(), result);
                }
                None => break,
            }
        }

        for program in pending {
            let blocker = graph
                .upstream_of(&program.stage_name)
                .iter()
                .find(|dep| !succeeded.contains(*dep))
                .cloned()
                .unwrap_or_default();
            warn!("[阶段 {}] ⏭️ 上游阶段 {} 未完成，跳过", program.stage_name, blocker);
            results.insert(
                program.stage_name.clone(),
                ExecutionResult::skipped(&program.stage_name, &blocker, Some(program.path.clone())),
            );
        }

        results
    }

    /// 为一个程序启动独立的执行任务
    fn launch(&self, program: SynthesizedProgram) -> impl Future<Output = ExecutionResult> {
        let executor = Arc::clone(&self.executor);
        let stage = program.stage_name.clone();
        let script = program.path.clone();
        let handle = tokio::spawn(async move { executor.run(&program).await });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let error = ExecutionError::TaskAborted {
                        stage: stage.clone(),
                        message: e.to_string(),
                    };
                    error!("[阶段 {}] ❌ {}", stage, error);
                    ExecutionResult::failed(stage, format!("Execution failed: {}", error), Some(script))
                }
            }
        }
    }
}

/// 把支持文件目录的内容（递归）复制到输出根目录
async fn stage_support_files(source: &Path, dest: &Path) -> std::io::Result<usize> {
    let mut pending = vec![(source.to_path_buf(), dest.to_path_buf())];
    let mut copied = 0;

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                fs::copy(entry.path(), &target).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        Config {
            output_dir: dir.join("outputs"),
            ..Config::default()
        }
    }

    fn write_notebook(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_duplicate_stage_fails_whole_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = WorkflowRunner::new(&config_in(dir.path()));
        let targets = vec![
            StageTarget::new("visualizer", dir.path().join("a.ipynb")),
            StageTarget::new("visualizer", dir.path().join("b.ipynb")),
        ];

        let report = runner.run_workflow(&targets).await;

        assert!(report.is_failed());
        assert_eq!(runner.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_cyclic_graph_fails_whole_run() {
        let dir = tempfile::tempdir().unwrap();
        let graph = StageGraph::new().with_stage("a", &["b"]).with_stage("b", &["a"]);
        let mut runner = WorkflowRunner::new(&config_in(dir.path())).with_graph(Some(graph));
        let targets = vec![
            StageTarget::new("a", dir.path().join("a.ipynb")),
            StageTarget::new("b", dir.path().join("b.ipynb")),
        ];

        match runner.run_workflow(&targets).await {
            WorkflowReport::Failed { error, trace } => {
                assert!(error.contains("环"));
                assert!(!trace.is_empty());
            }
            other => panic!("expected failure shape, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conversion_failures_are_reported_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write_notebook(dir.path(), "data_analyzer.ipynb", "not json");
        let missing = dir.path().join("visualizer.ipynb");

        let mut runner = WorkflowRunner::new(&config_in(dir.path()));
        assert_eq!(runner.state(), RunState::Idle);

        let report = runner.run_notebooks(&[broken, missing]).await;

        assert_eq!(runner.state(), RunState::Reported);
        assert_eq!(report.tally(), (0, 2));
        let result = report.get("data_analyzer").unwrap();
        assert!(result.output.starts_with("Conversion failed"));
        assert!(result.script.is_none());
        assert!(dir.path().join("outputs/scripts").is_dir());
    }

    #[tokio::test]
    async fn test_support_files_are_copied_into_output_root() {
        let dir = tempfile::tempdir().unwrap();
        let support = dir.path().join("support");
        std::fs::create_dir_all(support.join("pkg")).unwrap();
        std::fs::write(support.join("settings.py"), "API_MODEL = 'x'\n").unwrap();
        std::fs::write(support.join("pkg/__init__.py"), "").unwrap();

        let config = Config {
            support_dir: Some(support),
            ..config_in(dir.path())
        };
        let mut runner = WorkflowRunner::new(&config);
        let report = runner.run_workflow(&[]).await;

        assert_eq!(report, WorkflowReport::Stages(BTreeMap::new()));
        assert!(dir.path().join("outputs/settings.py").is_file());
        assert!(dir.path().join("outputs/pkg/__init__.py").is_file());
    }

    #[tokio::test]
    async fn test_missing_support_dir_fails_whole_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            support_dir: Some(dir.path().join("absent")),
            ..config_in(dir.path())
        };
        let mut runner = WorkflowRunner::new(&config);

        assert!(runner.run_workflow(&[]).await.is_failed());
    }
}
