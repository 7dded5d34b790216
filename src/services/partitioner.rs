//! 源码划分 - 业务能力层
//!
//! 把一个阶段的 code 单元格分成两段：
//! - 定义段：类声明以及紧随其后的成员方法单元格
//! - 过程段：其余顶层语句
//!
//! 只含导入语句的单元格不进入任何一段，其中的导入语句单独收集，
//! 由合成器放入前导部分
//!
//! 这是基于文本特征的尽力而为的启发式规则，不是语法分析。
//! 无法判断的单元格一律归入过程段

use regex::Regex;
use std::sync::LazyLock;

use crate::services::indentation::{indent_block, is_blank, normalize, INDENT};

static CLASS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^class\s+[A-Za-z_]\w*\s*[(:]").expect("class regex"));

static INDENTED_MEMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]+(?:async\s+)?def\s+\w+\s*\(|^[ \t]*@[A-Za-z_]").expect("member regex")
});

static METHOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:async\s+)?def\s+\w+\s*\(\s*(?:self|cls)\b").expect("method regex")
});

static IMPORT_STMT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:import\s+[\w.]|from\s+[\w.]+\s+import\s)").expect("import regex")
});

/// 划分结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// 定义段，顶层缩进
    pub definitions: String,
    /// 过程段，顶层缩进（由合成器再缩进到入口函数中）
    pub procedure: String,
    /// 从只含导入语句的单元格中收集的导入语句，按出现顺序
    pub imports: Vec<String>,
}

impl Partition {
    pub fn has_definitions(&self) -> bool {
        !self.definitions.trim().is_empty()
    }
}

/// 按顺序划分 code 单元格
pub fn partition<S: AsRef<str>>(cells: &[S]) -> Partition {
    let mut definitions: Vec<String> = Vec::new();
    let mut procedure: Vec<String> = Vec::new();
    let mut imports: Vec<String> = Vec::new();
    let mut in_definition = false;

    for raw in cells.iter().map(AsRef::as_ref) {
        let normalized = normalize(raw);
        // 单行单元格没有可对齐的上下文，去掉残留的前导空白
        let normalized = if normalized.trim_end().contains('\n') {
            normalized
        } else {
            normalized.trim_start().to_string()
        };

        if normalized.trim().is_empty() {
            continue;
        }

        if is_import_only(&normalized) {
            for statement in import_statements(&normalized) {
                if !imports.contains(&statement) {
                    imports.push(statement);
                }
            }
            continue;
        }

        if declares_class(&normalized) {
            in_definition = true;
            definitions.push(trim_trailing(&normalized).to_string());
            continue;
        }

        if in_definition && is_member_cell(raw, &normalized) {
            definitions.push(indent_block(trim_trailing(&normalized), INDENT));
            continue;
        }

        in_definition = false;
        procedure.push(trim_trailing(&normalized).to_string());
    }

    Partition {
        definitions: definitions.join("\n\n"),
        procedure: procedure.join("\n\n"),
        imports,
    }
}

/// 是否包含顶层类声明
pub fn declares_class(text: &str) -> bool {
    CLASS_DECL.is_match(text)
}

/// 是否看起来像类成员：原文是缩进的函数声明或装饰器，
/// 或规整后是以 self / cls 为首参的函数声明
pub fn is_member_cell(raw: &str, normalized: &str) -> bool {
    let raw_head = first_significant_line(raw);
    let normalized_head = first_significant_line(normalized);

    match (raw_head, normalized_head) {
        (Some(raw_line), Some(line)) => {
            INDENTED_MEMBER.is_match(raw_line)
                || METHOD_DECL.is_match(line)
                || line.starts_with('@')
        }
        _ => false,
    }
}

/// 单元格是否只包含导入语句（允许注释、空行、括号续行和反斜杠续行）
pub fn is_import_only(text: &str) -> bool {
    let mut saw_import = false;
    let mut open_parens = 0usize;
    let mut continued = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if open_parens > 0 || continued {
            open_parens = update_parens(open_parens, trimmed);
            continued = trimmed.ends_with('\\');
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if !IMPORT_STMT.is_match(trimmed) {
            return false;
        }

        saw_import = true;
        open_parens = update_parens(0, trimmed);
        continued = trimmed.ends_with('\\');
    }

    saw_import
}

/// 把只含导入语句的文本拆成单条语句（续行保留在同一条语句里，注释和空行丢弃）
pub fn import_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut open_parens = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();
        let continuing = !current.is_empty();

        if !continuing && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }

        current.push(line.trim_end());
        open_parens = update_parens(if continuing { open_parens } else { 0 }, trimmed);

        if open_parens == 0 && !trimmed.ends_with('\\') {
            statements.push(current.join("\n"));
            current.clear();
        }
    }

    if !current.is_empty() {
        statements.push(current.join("\n"));
    }

    statements
}

fn update_parens(depth: usize, line: &str) -> usize {
    let opened = line.matches('(').count();
    let closed = line.matches(')').count();
    (depth + opened).saturating_sub(closed)
}

fn first_significant_line(text: &str) -> Option<&str> {
    text.lines()
        .find(|line| !is_blank(line) && !line.trim_start().starts_with('#'))
}

fn trim_trailing(text: &str) -> &str {
    text.trim_end()
}
