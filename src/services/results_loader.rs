//! 结果加载 - 业务能力层
//!
//! 读取各阶段写出的固定 JSON 结果文件；文件不存在不是错误，只是缺少对应的键

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// 逻辑分区名 → 相对输出目录的结果文件
pub const RESULT_FILES: [(&str, &str); 4] = [
    ("literature", "literature_analysis.json"),
    ("hypotheses", "generated_hypotheses.json"),
    ("experiments", "experimental_analysis.json"),
    ("visualizations", "visualizations/visualization_metadata.json"),
];

pub struct ResultsLoader {
    outputs_dir: PathBuf,
}

impl ResultsLoader {
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
        }
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// 加载所有存在且可解析的结果文件
    pub async fn load(&self) -> BTreeMap<String, JsonValue> {
        let mut results = BTreeMap::new();

        for (section, relative) in RESULT_FILES {
            let path = self.outputs_dir.join(relative);
            let content = match fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    debug!("结果文件不可用 {}: {}", path.display(), e);
                    continue;
                }
            };

            match serde_json::from_str::<JsonValue>(&content) {
                Ok(value) => {
                    results.insert(section.to_string(), value);
                }
                Err(e) => {
                    warn!("结果文件解析失败 {}: {}", path.display(), e);
                }
            }
        }

        results
    }
}
