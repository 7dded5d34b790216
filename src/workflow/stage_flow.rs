//! 阶段转换流程 - 流程层
//!
//! 定义"一个笔记本"的完整转换流程：
//! 1. 读取并解析笔记本
//! 2. 划分并合成程序
//! 3. 写入脚本目录

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::ConversionError;
use crate::models::load_notebook;
use crate::models::stage::StageTarget;
use crate::services::synthesizer::{ScriptSynthesizer, SynthesizedProgram};
use crate::workflow::stage_ctx::StageCtx;

/// 阶段转换流程
///
/// - 不持有子进程等资源
/// - 只依赖业务能力（services）
/// - 每次调用只处理一个笔记本
pub struct StageFlow {
    synthesizer: ScriptSynthesizer,
    scripts_dir: PathBuf,
}

impl StageFlow {
    pub fn new(synthesizer: ScriptSynthesizer, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            synthesizer,
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// 转换单个笔记本并写出脚本；同名阶段的旧脚本会被覆盖
    pub async fn convert(&self, target: &StageTarget, ctx: &StageCtx) -> Result<SynthesizedProgram, ConversionError> {
        info!("{} 📓 正在转换: {}", ctx, target.notebook.display());

        let document = load_notebook(&target.notebook, &target.name).await?;

        debug!("{} 共 {} 个 code 单元格", ctx, document.code_sources().len());

        let program = self
            .synthesizer
            .program_for(&target.name, &document, &self.scripts_dir);

        fs::write(&program.path, &program.text)
            .await
            .map_err(|source| ConversionError::WriteFailed {
                stage: target.name.clone(),
                path: program.path.clone(),
                source,
            })?;

        info!("{} ✓ 脚本已生成: {}", ctx, program.path.display());
        Ok(program)
    }
}
