//! 阶段执行器 - 基础设施层
//!
//! 唯一启动子进程的地方，只暴露"运行一个脚本"的能力。
//! 所有执行层面的失败（启动失败、非零退出、超时）都以失败的
//! `ExecutionResult` 返回，从不向上抛出

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;
use crate::models::report::ExecutionResult;
use crate::services::synthesizer::SynthesizedProgram;

/// 子进程的运行环境描述
#[derive(Debug, Clone)]
pub struct ExecutionEnv {
    /// 解释器
    pub interpreter: String,
    /// 追加到 PYTHONPATH 的目录（脚本所在输出根目录总是会被追加）
    pub search_paths: Vec<PathBuf>,
    /// 单进程时间上限
    pub timeout: Option<Duration>,
}

impl ExecutionEnv {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            search_paths: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 阶段执行器
///
/// 职责：
/// - 以脚本所在目录为工作目录启动解释器
/// - 完整捕获标准输出、标准错误和退出状态
/// - 不认识阶段之间的依赖关系
#[derive(Debug, Clone)]
pub struct StageExecutor {
    env: ExecutionEnv,
}

impl StageExecutor {
    pub fn new(env: ExecutionEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &ExecutionEnv {
        &self.env
    }

    /// 运行合成的程序
    pub async fn run(&self, program: &SynthesizedProgram) -> ExecutionResult {
        self.run_script(&program.stage_name, &program.path).await
    }

    /// 运行脚本文件
    ///
    /// 成功时 output 为标准输出，失败时为标准错误或错误描述
    pub async fn run_script(&self, stage: &str, script_path: &Path) -> ExecutionResult {
        let script = match tokio::fs::canonicalize(script_path).await {
            Ok(path) => path,
            Err(source) => {
                return self.spawn_failure(stage, script_path, source);
            }
        };
        let work_dir = script.parent().map(Path::to_path_buf).unwrap_or_default();

        let python_path = match self.python_path(&script) {
            Ok(value) => value,
            Err(e) => {
                let source = std::io::Error::new(std::io::ErrorKind::InvalidInput, e);
                return self.spawn_failure(stage, script_path, source);
            }
        };

        let mut command = Command::new(&self.env.interpreter);
        command
            .arg(&script)
            .current_dir(&work_dir)
            .env("PYTHONPATH", python_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("[阶段 {}] ▶️ 开始执行: {}", stage, script.display());
        let started = Instant::now();

        // 超时时 output() future 被丢弃，kill_on_drop 负责结束子进程
        let output = match self.env.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(output) => output,
                Err(_) => {
                    let error = ExecutionError::TimedOut {
                        stage: stage.to_string(),
                        timeout_secs: limit.as_secs(),
                    };
                    warn!("[阶段 {}] ⏱️ {}", stage, error);
                    return ExecutionResult::failed(stage, error.to_string(), Some(script_path.to_path_buf()));
                }
            },
            None => command.output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(source) => return self.spawn_failure(stage, script_path, source),
        };

        let elapsed = started.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            info!("[阶段 {}] ✓ 执行成功 ({:.1}s)", stage, elapsed.as_secs_f64());
            ExecutionResult::succeeded(stage, stdout, script_path.to_path_buf())
        } else {
            let error = ExecutionError::NonZeroExit {
                stage: stage.to_string(),
                code: output.status.code(),
            };
            warn!("[阶段 {}] ❌ {} ({:.1}s)", stage, error, elapsed.as_secs_f64());
            debug!("[阶段 {}] 标准错误:\n{}", stage, stderr);
            ExecutionResult::failed(stage, stderr, Some(script_path.to_path_buf()))
        }
    }

    // 继承的 PYTHONPATH + 输出根目录 + 配置的共享模块目录
    fn python_path(&self, script: &Path) -> Result<OsString, std::env::JoinPathsError> {
        let mut paths: Vec<PathBuf> = std::env::var_os("PYTHONPATH")
            .map(|existing| std::env::split_paths(&existing).collect())
            .unwrap_or_default();

        if let Some(output_root) = script.parent().and_then(Path::parent) {
            paths.push(output_root.to_path_buf());
        }

        for path in &self.env.search_paths {
            match std::path::absolute(path) {
                Ok(absolute) => paths.push(absolute),
                Err(e) => warn!("忽略无效的搜索路径 {}: {}", path.display(), e),
            }
        }

        std::env::join_paths(paths)
    }

    fn spawn_failure(&self, stage: &str, script_path: &Path, source: std::io::Error) -> ExecutionResult {
        let error = ExecutionError::SpawnFailed {
            stage: stage.to_string(),
            interpreter: self.env.interpreter.clone(),
            source,
        };
        warn!("[阶段 {}] ❌ {}", stage, error);
        ExecutionResult::failed(stage, error.to_string(), Some(script_path.to_path_buf()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_exit_status_two_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "fail.sh", "echo partial\necho 'bad input' >&2\nexit 2\n");

        let executor = StageExecutor::new(ExecutionEnv::new("sh"));
        let result = executor.run_script("fail", &script).await;

        assert!(!result.success);
        assert_eq!(result.output, "bad input\n");
        assert_eq!(result.script, Some(script));
    }

    #[tokio::test]
    async fn test_success_reports_stdout_and_runs_in_script_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let script = write_script(&scripts, "ok.sh", "pwd -P\necho \"$PYTHONPATH\"\n");

        let executor = StageExecutor::new(ExecutionEnv::new("sh").with_search_path("/shared/config"));
        let result = executor.run_script("ok", &script).await;

        assert!(result.success);
        let lines: Vec<&str> = result.output.lines().collect();
        let canonical_scripts = std::fs::canonicalize(&scripts).unwrap();
        assert_eq!(lines[0], canonical_scripts.to_string_lossy());
        assert!(lines[1].contains(&*canonical_scripts.parent().unwrap().to_string_lossy()));
        assert!(lines[1].ends_with("/shared/config"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "x.py", "print(1)\n");

        let executor = StageExecutor::new(ExecutionEnv::new("definitely-not-an-interpreter-xyz"));
        let result = executor.run_script("x", &script).await;

        assert!(!result.success);
        assert!(result.output.contains("definitely-not-an-interpreter-xyz"));
    }

    #[tokio::test]
    async fn test_missing_script_is_a_failed_result() {
        let executor = StageExecutor::new(ExecutionEnv::new("sh"));
        let result = executor.run_script("ghost", Path::new("/no/such/ghost.py")).await;
        assert!(!result.success);
        assert_eq!(result.stage, "ghost");
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slow.sh", "sleep 5\n");

        let executor = StageExecutor::new(
            ExecutionEnv::new("sh").with_timeout(Some(Duration::from_millis(200))),
        );
        let started = Instant::now();
        let result = executor.run_script("slow", &script).await;

        assert!(!result.success);
        assert!(result.output.contains("超时"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
