//! 命令行接口
//!
//! 使用 clap 的 derive API 定义子命令和全局参数

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// 笔记本阶段工作流
///
/// 把各阶段的笔记本合成为独立脚本，并发执行并汇总每个阶段的结果
#[derive(Parser, Debug)]
#[command(name = "notebook-stages")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 显示详细日志（等同于 VERBOSE_LOGGING=true）
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 工作流清单（TOML），覆盖 WORKFLOW_MANIFEST
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// 可用的子命令
#[derive(Subcommand, Debug)]
pub enum Command {
    /// 转换并执行所有阶段，输出工作流报告
    Run {
        /// 按逻辑顺序启动：上游阶段成功后才启动下游
        #[arg(long)]
        ordered: bool,

        /// 要运行的笔记本；省略时使用清单或默认的五个阶段
        notebooks: Vec<PathBuf>,
    },

    /// 只转换笔记本，不执行
    Convert {
        /// 要转换的笔记本
        #[arg(required = true)]
        notebooks: Vec<PathBuf>,
    },

    /// 上传研究资料
    Upload {
        /// 资料类型
        #[arg(long, value_enum)]
        kind: UploadKind,

        /// 要上传的文件
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// 显示各阶段写出的结果
    Results,

    /// 清空上传的论文和实验数据
    Clear,
}

/// 上传资料的类型
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    /// 研究论文
    Papers,
    /// 实验数据
    Data,
}
