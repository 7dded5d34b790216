use std::path::{Path, PathBuf};

/// 已知的阶段类型
///
/// 每个已知阶段对应一个主类和一个主操作，合成脚本的收尾代码由此生成。
/// 无法唯一识别的阶段名归为 `Unknown`，不生成收尾代码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Orchestrator,
    LiteratureReview,
    HypothesisGenerator,
    DataAnalyzer,
    Visualizer,
    Unknown,
}

impl StageKind {
    /// 所有已知阶段（不含 Unknown）
    pub const KNOWN: [StageKind; 5] = [
        StageKind::Orchestrator,
        StageKind::LiteratureReview,
        StageKind::HypothesisGenerator,
        StageKind::DataAnalyzer,
        StageKind::Visualizer,
    ];

    /// 阶段标识
    pub fn identifier(self) -> &'static str {
        match self {
            StageKind::Orchestrator => "orchestrator",
            StageKind::LiteratureReview => "literature_review",
            StageKind::HypothesisGenerator => "hypothesis_generator",
            StageKind::DataAnalyzer => "data_analyzer",
            StageKind::Visualizer => "visualizer",
            StageKind::Unknown => "unknown",
        }
    }

    /// 主类名
    pub fn primary_class(self) -> Option<&'static str> {
        match self {
            StageKind::Orchestrator => Some("ResearchOrchestrator"),
            StageKind::LiteratureReview => Some("LiteratureReviewAgent"),
            StageKind::HypothesisGenerator => Some("HypothesisGenerator"),
            StageKind::DataAnalyzer => Some("DataAnalyzer"),
            StageKind::Visualizer => Some("Visualizer"),
            StageKind::Unknown => None,
        }
    }

    /// 主操作（主类上的方法名）
    pub fn primary_operation(self) -> Option<&'static str> {
        match self {
            StageKind::Orchestrator => Some("run_workflow"),
            StageKind::LiteratureReview => Some("analyze_papers"),
            StageKind::HypothesisGenerator => Some("generate_hypotheses"),
            StageKind::DataAnalyzer => Some("analyze_data"),
            StageKind::Visualizer => Some("create_visualizations"),
            StageKind::Unknown => None,
        }
    }

    /// 从阶段名识别阶段类型
    ///
    /// 阶段名必须恰好包含一个已知标识，否则视为 Unknown
    pub fn from_stage_name(name: &str) -> Self {
        let mut matches = Self::KNOWN
            .iter()
            .copied()
            .filter(|kind| name.contains(kind.identifier()));

        match (matches.next(), matches.next()) {
            (Some(kind), None) => kind,
            _ => StageKind::Unknown,
        }
    }
}

/// 一次运行中要转换并执行的阶段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTarget {
    pub name: String,
    pub notebook: PathBuf,
}

impl StageTarget {
    pub fn new(name: impl Into<String>, notebook: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            notebook: notebook.into(),
        }
    }

    /// 阶段名取笔记本文件名
    pub fn from_notebook(notebook: impl Into<PathBuf>) -> Self {
        let notebook = notebook.into();
        Self {
            name: stage_name_from_path(&notebook),
            notebook,
        }
    }

    pub fn kind(&self) -> StageKind {
        StageKind::from_stage_name(&self.name)
    }
}

/// 从笔记本路径推导阶段名（文件名去掉扩展名）
pub fn stage_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_embedded_names() {
        assert_eq!(StageKind::from_stage_name("data_analyzer"), StageKind::DataAnalyzer);
        assert_eq!(StageKind::from_stage_name("02_literature_review_v2"), StageKind::LiteratureReview);
        assert_eq!(StageKind::from_stage_name("orchestrator"), StageKind::Orchestrator);
    }

    #[test]
    fn test_unknown_and_ambiguous_names() {
        assert_eq!(StageKind::from_stage_name("scratchpad"), StageKind::Unknown);
        assert_eq!(
            StageKind::from_stage_name("visualizer_for_data_analyzer"),
            StageKind::Unknown
        );
        assert!(StageKind::Unknown.primary_class().is_none());
    }

    #[test]
    fn test_every_known_stage_has_epilogue_targets() {
        for kind in StageKind::KNOWN {
            assert!(kind.primary_class().is_some());
            assert!(kind.primary_operation().is_some());
            assert_eq!(StageKind::from_stage_name(kind.identifier()), kind);
        }
    }

    #[test]
    fn test_target_from_notebook() {
        let target = StageTarget::from_notebook("agents/hypothesis_generator.ipynb");
        assert_eq!(target.name, "hypothesis_generator");
        assert_eq!(target.kind(), StageKind::HypothesisGenerator);
    }

    #[test]
    fn test_stage_name_from_path() {
        assert_eq!(stage_name_from_path(Path::new("agents/visualizer.ipynb")), "visualizer");
        assert_eq!(stage_name_from_path(Path::new("notes")), "notes");
    }
}
