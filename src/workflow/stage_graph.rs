//! 阶段依赖图
//!
//! 每个阶段声明自己的上游阶段。编排层据此按拓扑顺序启动：
//! 只有所有上游都成功后才启动某个阶段，上游失败时下游全部跳过。
//! 没有声明任何边时所有阶段互相独立，全部并发启动

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::WorkflowError;
use crate::models::loaders::WorkflowManifest;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageGraph {
    upstream: BTreeMap<String, Vec<String>>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 研究流水线的逻辑顺序：
    /// 文献综述 → 假设生成；数据分析 → 可视化；编排器独立
    pub fn research_pipeline() -> Self {
        Self::new()
            .with_stage("orchestrator", &[])
            .with_stage("literature_review", &[])
            .with_stage("hypothesis_generator", &["literature_review"])
            .with_stage("data_analyzer", &[])
            .with_stage("visualizer", &["data_analyzer"])
    }

    /// 从清单构建依赖图
    pub fn from_manifest(manifest: &WorkflowManifest) -> Self {
        manifest.stages.iter().fold(Self::new(), |graph, entry| {
            let upstream: Vec<&str> = entry.upstream.iter().map(String::as_str).collect();
            graph.with_stage(&entry.stage_name(), &upstream)
        })
    }

    pub fn with_stage(mut self, name: &str, upstream: &[&str]) -> Self {
        self.upstream.insert(
            name.to_string(),
            upstream.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.upstream.contains_key(name)
    }

    pub fn has_edges(&self) -> bool {
        self.upstream.values().any(|deps| !deps.is_empty())
    }

    /// 阶段声明的上游；未声明的阶段没有上游
    pub fn upstream_of(&self, name: &str) -> &[String] {
        self.upstream.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 限定到本次运行的阶段：指向运行之外阶段的边被忽略
    pub fn restricted_to(&self, stages: &BTreeSet<String>) -> Self {
        let upstream = stages
            .iter()
            .map(|name| {
                let deps = self
                    .upstream_of(name)
                    .iter()
                    .filter(|dep| {
                        let present = stages.contains(*dep);
                        if !present {
                            tracing::warn!("阶段 {} 的上游 {} 不在本次运行中，忽略该依赖", name, dep);
                        }
                        present
                    })
                    .cloned()
                    .collect();
                (name.clone(), deps)
            })
            .collect();
        Self { upstream }
    }

    /// 拓扑排序（Kahn 算法，同层按名称排序）；存在环时返回错误
    pub fn topological_order(&self) -> Result<Vec<String>, WorkflowError> {
        let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (name, deps) in &self.upstream {
            indegree.entry(name.as_str()).or_insert(0);
            for dep in deps.iter().filter(|dep| self.contains(dep)) {
                *indegree.entry(name.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut ready: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(indegree.len());

        while let Some(name) = ready.pop_front() {
            order.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(degree) = indegree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() < indegree.len() {
            let stages = indegree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(WorkflowError::CyclicGraph { stages });
        }

        Ok(order)
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.topological_order().map(|_| ())
    }
}
