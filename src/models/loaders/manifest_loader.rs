use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::stage::{stage_name_from_path, StageTarget};

/// 工作流清单
///
/// ```toml
/// preamble_imports = ["import pandas as pd"]
/// ordered = true
///
/// [[stages]]
/// notebook = "agents/literature_review.ipynb"
///
/// [[stages]]
/// notebook = "agents/hypothesis_generator.ipynb"
/// upstream = ["literature_review"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowManifest {
    /// 追加到每个脚本前导部分的导入语句
    #[serde(default)]
    pub preamble_imports: Vec<String>,
    /// 是否按声明的依赖顺序启动
    #[serde(default)]
    pub ordered: bool,
    #[serde(default)]
    pub stages: Vec<StageEntry>,
}

/// 清单中的单个阶段
#[derive(Debug, Clone, Deserialize)]
pub struct StageEntry {
    /// 阶段名，省略时取笔记本文件名
    pub name: Option<String>,
    /// 笔记本路径，相对路径以清单所在目录为基准
    pub notebook: PathBuf,
    /// 上游阶段名
    #[serde(default)]
    pub upstream: Vec<String>,
}

impl StageEntry {
    pub fn stage_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| stage_name_from_path(&self.notebook))
    }

    pub fn target(&self) -> StageTarget {
        StageTarget::new(self.stage_name(), self.notebook.clone())
    }
}

impl WorkflowManifest {
    pub fn targets(&self) -> Vec<StageTarget> {
        self.stages.iter().map(StageEntry::target).collect()
    }
}

/// 解析清单文本；`base_dir` 用于补全相对的笔记本路径
pub fn parse_manifest(content: &str, base_dir: &Path) -> Result<WorkflowManifest> {
    let mut manifest: WorkflowManifest = toml::from_str(content).context("无法解析工作流清单")?;

    for entry in &mut manifest.stages {
        if entry.notebook.is_relative() {
            entry.notebook = base_dir.join(&entry.notebook);
        }
    }

    Ok(manifest)
}

/// 从文件加载工作流清单
pub async fn load_manifest(manifest_path: &Path) -> Result<WorkflowManifest> {
    let content = fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("无法读取工作流清单: {}", manifest_path.display()))?;

    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let manifest = parse_manifest(&content, base_dir)
        .with_context(|| format!("清单文件: {}", manifest_path.display()))?;

    tracing::info!(
        "已加载工作流清单 {}: {} 个阶段",
        manifest_path.display(),
        manifest.stages.len()
    );

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest_resolves_paths() {
        let content = r#"
            preamble_imports = ["import numpy as np"]
            ordered = true

            [[stages]]
            notebook = "agents/literature_review.ipynb"

            [[stages]]
            name = "hypotheses"
            notebook = "/abs/hypothesis_generator.ipynb"
            upstream = ["literature_review"]
        "#;

        let manifest = parse_manifest(content, Path::new("/project")).unwrap();
        assert!(manifest.ordered);
        assert_eq!(manifest.preamble_imports, vec!["import numpy as np"]);
        assert_eq!(
            manifest.stages[0].notebook,
            PathBuf::from("/project/agents/literature_review.ipynb")
        );
        assert_eq!(manifest.stages[0].stage_name(), "literature_review");
        assert_eq!(manifest.stages[1].stage_name(), "hypotheses");
        assert_eq!(manifest.stages[1].upstream, vec!["literature_review"]);
        assert_eq!(manifest.targets()[1].name, "hypotheses");
    }

    #[test]
    fn test_empty_manifest_is_valid() {
        let manifest = parse_manifest("", Path::new(".")).unwrap();
        assert!(manifest.stages.is_empty());
        assert!(!manifest.ordered);
    }

    #[test]
    fn test_rejects_stage_without_notebook() {
        assert!(parse_manifest("[[stages]]\nname = \"x\"\n", Path::new(".")).is_err());
    }
}
