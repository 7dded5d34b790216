use crate::error::ConversionError;
use crate::models::notebook::NotebookDocument;
use std::path::Path;
use tokio::fs;

/// 读取并解析笔记本文件
///
/// 读取或解析失败都会返回带阶段名的 `ConversionError`
pub async fn load_notebook(notebook_path: &Path, stage: &str) -> Result<NotebookDocument, ConversionError> {
    let content = fs::read_to_string(notebook_path)
        .await
        .map_err(|source| ConversionError::Unreadable {
            stage: stage.to_string(),
            path: notebook_path.to_path_buf(),
            source,
        })?;

    let document = NotebookDocument::from_json(&content, notebook_path)
        .map_err(|source| ConversionError::Malformed {
            stage: stage.to_string(),
            source,
        })?;

    tracing::debug!(
        "已读取笔记本 {}: {} 个单元格",
        notebook_path.display(),
        document.cells.len()
    );

    Ok(document)
}
