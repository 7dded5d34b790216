//! 研究资料存储 - 业务能力层
//!
//! 上传文件按内容哈希去重，而不是按文件名

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// 目录占位文件，不参与去重和清理
const PLACEHOLDER: &str = ".gitkeep";

/// 已存储文件信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    /// 修改时间（本地时间）
    pub modified: String,
}

/// 资料存储
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 保存文件
    ///
    /// # 返回
    /// `(存储路径, 是否为新文件)`；内容与已有文件相同时返回已有文件路径和 false
    pub async fn save(&self, file_name: &str, content: &[u8]) -> Result<(PathBuf, bool)> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("无法创建目录: {}", self.dir.display()))?;

        let digest = content_hash(content);

        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("无法读取目录: {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() || is_placeholder(&path) {
                continue;
            }
            let existing = fs::read(&path)
                .await
                .with_context(|| format!("无法读取文件: {}", path.display()))?;
            if content_hash(&existing) == digest {
                warn!("检测到重复文件: {} (与 {} 内容相同)", file_name, path.display());
                return Ok((path, false));
            }
        }

        let name = Path::new(file_name)
            .file_name()
            .with_context(|| format!("无效的文件名: {}", file_name))?;
        let save_path = self.dir.join(name);

        fs::write(&save_path, content)
            .await
            .with_context(|| format!("无法写入文件: {}", save_path.display()))?;
        info!("✓ 文件已保存: {}", save_path.display());

        Ok((save_path, true))
    }

    /// 列出已存储的文件（按文件名排序）
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(files);
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("无法读取目录: {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || is_placeholder(&path) {
                continue;
            }
            let modified = metadata
                .modified()
                .map(|time| {
                    chrono::DateTime::<chrono::Local>::from(time)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_default();
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
                modified,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

/// 内容哈希（SHA-256，十六进制）
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// 清空数据目录：删除所有文件和子目录，保留占位文件
pub async fn clear_data_dirs(dirs: &[PathBuf]) -> Result<()> {
    for dir in dirs {
        if !fs::try_exists(dir).await.unwrap_or(false) {
            continue;
        }

        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("无法读取目录: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path)
                    .await
                    .with_context(|| format!("无法删除目录: {}", path.display()))?;
            } else if !is_placeholder(&path) {
                fs::remove_file(&path)
                    .await
                    .with_context(|| format!("无法删除文件: {}", path.display()))?;
            }
        }
    }

    info!("✓ 所有数据已清空");
    Ok(())
}

fn is_placeholder(path: &Path) -> bool {
    path.file_name().and_then(|name| name.to_str()) == Some(PLACEHOLDER)
}
