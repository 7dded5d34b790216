//! 脚本合成 - 业务能力层
//!
//! 把定义段与过程段组装成一个可独立运行的 Python 程序：
//!
//! ```text
//! 前导部分（固定导入 + 额外导入 + 笔记本导入 + 日志初始化 + 搜索路径）
//! 定义段（顶层，原样）
//! def main():
//!     过程段（缩进一层）
//!     阶段收尾代码（实例化主类并调用主操作）
//! 尾部（调用 main，未捕获异常记录堆栈并以非零状态退出）
//! ```
//!
//! 合成是确定性的：相同输入产生逐字节相同的输出

use std::path::{Path, PathBuf};

use crate::models::notebook::NotebookDocument;
use crate::models::stage::StageKind;
use crate::services::indentation::{indent_block, INDENT};
use crate::services::partitioner::{partition, Partition};

const FIXED_IMPORTS: [&str; 6] = [
    "import sys",
    "import os",
    "import json",
    "import logging",
    "import traceback",
    "from pathlib import Path",
];

/// 合成的程序，写盘后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgram {
    pub stage_name: String,
    pub text: String,
    pub path: PathBuf,
}

/// 脚本合成器
///
/// 除固定导入外，可以追加一组额外的导入语句（来自工作流清单），
/// 因为只含导入语句的单元格会在划分时被丢弃
#[derive(Debug, Clone, Default)]
pub struct ScriptSynthesizer {
    extra_imports: Vec<String>,
}

impl ScriptSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_imports(extra_imports: Vec<String>) -> Self {
        Self { extra_imports }
    }

    /// 由笔记本合成程序，脚本路径为 `<scripts_dir>/<stage>.py`
    pub fn program_for(
        &self,
        stage_name: &str,
        document: &NotebookDocument,
        scripts_dir: &Path,
    ) -> SynthesizedProgram {
        SynthesizedProgram {
            stage_name: stage_name.to_string(),
            text: self.synthesize_notebook(stage_name, document),
            path: scripts_dir.join(format!("{}.py", stage_name)),
        }
    }

    /// 划分笔记本的 code 单元格并合成程序文本
    pub fn synthesize_notebook(&self, stage_name: &str, document: &NotebookDocument) -> String {
        let segments = partition(&document.code_sources());
        tracing::debug!(
            "[阶段 {}] 定义段 {} 行, 过程段 {} 行, 导入 {} 条",
            stage_name,
            segments.definitions.lines().count(),
            segments.procedure.lines().count(),
            segments.imports.len()
        );
        self.synthesize(stage_name, &segments)
    }

    /// 组装完整程序文本
    pub fn synthesize(&self, stage_name: &str, segments: &Partition) -> String {
        let mut sections = vec![self.preamble(stage_name, &segments.imports)];

        if segments.has_definitions() {
            sections.push(segments.definitions.trim_end().to_string());
        }

        sections.push(entry_point(stage_name, &segments.procedure));
        sections.push(footer(stage_name));

        let mut program = sections.join("\n\n\n");
        program.push('\n');
        program
    }

    fn preamble(&self, stage_name: &str, notebook_imports: &[String]) -> String {
        let mut imports: Vec<&str> = FIXED_IMPORTS.to_vec();
        for extra in self.extra_imports.iter().chain(notebook_imports) {
            let extra = extra.trim();
            if !extra.is_empty() && !imports.contains(&extra) {
                imports.push(extra);
            }
        }

        format!(
            "{imports}\n\n\
             sys.path.append(str(Path(__file__).resolve().parent.parent))\n\n\
             logging.basicConfig(\n\
             {INDENT}level=logging.INFO,\n\
             {INDENT}format=\"%(asctime)s - %(name)s - %(levelname)s - %(message)s\",\n\
             )\n\
             logger = logging.getLogger({name})",
            imports = imports.join("\n"),
            name = py_string(stage_name),
        )
    }
}

/// 生成入口函数：过程段缩进一层，随后是阶段收尾代码；
/// 两者都为空时函数体为 `pass`
fn entry_point(stage_name: &str, procedure: &str) -> String {
    let mut body: Vec<String> = Vec::new();

    if !procedure.trim().is_empty() {
        body.push(indent_block(procedure.trim_end(), INDENT));
    }
    if let Some(epilogue) = epilogue(stage_name) {
        body.push(epilogue);
    }
    if body.is_empty() {
        body.push(format!("{INDENT}pass"));
    }

    format!("def main():\n{}", body.join("\n\n"))
}

/// 阶段收尾代码；未知阶段返回 None
pub fn epilogue(stage_name: &str) -> Option<String> {
    let kind = StageKind::from_stage_name(stage_name);
    let class = kind.primary_class()?;
    let operation = kind.primary_operation()?;

    Some(format!(
        "{INDENT}stage_instance = {class}()\n\
         {INDENT}stage_outcome = stage_instance.{operation}()\n\
         {INDENT}logger.info(\"%s finished: %r\", {name}, stage_outcome)",
        name = py_string(stage_name),
    ))
}

fn footer(stage_name: &str) -> String {
    format!(
        "if __name__ == \"__main__\":\n\
         {INDENT}try:\n\
         {INDENT}{INDENT}main()\n\
         {INDENT}except Exception:\n\
         {INDENT}{INDENT}logger.error(\"Stage %s failed:\\n%s\", {name}, traceback.format_exc())\n\
         {INDENT}{INDENT}sys.exit(1)\n\
         {INDENT}sys.exit(0)",
        name = py_string(stage_name),
    )
}

// Python 双引号字符串字面量
fn py_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notebook::Cell;

    fn segments(definitions: &str, procedure: &str) -> Partition {
        Partition {
            definitions: definitions.to_string(),
            procedure: procedure.to_string(),
            imports: Vec::new(),
        }
    }

    fn notebook(cells: Vec<Cell>) -> NotebookDocument {
        NotebookDocument {
            cells,
            path: PathBuf::from("nb.ipynb"),
        }
    }

    #[test]
    fn test_layout_order() {
        let synthesizer = ScriptSynthesizer::new();
        let program = synthesizer.synthesize("scratch", &segments("class A:\n    pass", "a = A()\nprint(a)"));

        let preamble = program.find("import sys").unwrap();
        let class = program.find("class A:").unwrap();
        let main = program.find("def main():\n    a = A()\n    print(a)").unwrap();
        let footer = program.find("if __name__ == \"__main__\":").unwrap();

        assert_eq!(preamble, 0);
        assert!(preamble < class && class < main && main < footer);
        assert!(program.contains("sys.path.append(str(Path(__file__).resolve().parent.parent))"));
        assert!(program.contains("        sys.exit(1)\n    sys.exit(0)\n"));
    }

    #[test]
    fn test_no_class_cells_emit_no_class_block() {
        let synthesizer = ScriptSynthesizer::new();
        let document = notebook(vec![
            Cell::code("import os"),
            Cell::markdown("# Notes"),
            Cell::code("total = 1 + 1\n\nprint(total)"),
        ]);

        let program = synthesizer.synthesize_notebook("scratch", &document);

        assert!(!program.contains("\nclass "));
        assert!(program.contains("def main():\n    total = 1 + 1\n\n    print(total)\n"));
    }

    #[test]
    fn test_empty_notebook_gets_pass_body() {
        let synthesizer = ScriptSynthesizer::new();
        let program = synthesizer.synthesize_notebook("scratch", &notebook(vec![]));
        assert!(program.contains("def main():\n    pass\n"));
    }

    #[test]
    fn test_data_analyzer_epilogue_runs_once() {
        let synthesizer = ScriptSynthesizer::new();
        let document = notebook(vec![
            Cell::code("class DataAnalyzer:\n    def analyze_data(self):\n        return 42"),
            Cell::code("print('loading')"),
        ]);

        let program = synthesizer.synthesize_notebook("data_analyzer", &document);

        let main_start = program.find("def main():").unwrap();
        let entry = &program[main_start..];
        assert_eq!(entry.matches("DataAnalyzer()").count(), 1);
        assert_eq!(entry.matches(".analyze_data()").count(), 1);
        assert!(entry.contains("    print('loading')\n\n    stage_instance = DataAnalyzer()"));
    }

    #[test]
    fn test_unknown_stage_has_no_epilogue() {
        assert!(epilogue("scratchpad").is_none());
        let program = ScriptSynthesizer::new().synthesize("scratchpad", &segments("", "x = 1"));
        assert!(!program.contains("stage_instance"));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let synthesizer = ScriptSynthesizer::with_imports(vec!["import numpy as np".to_string()]);
        let document = notebook(vec![
            Cell::code("class Visualizer:\n    def create_visualizations(self):\n        pass"),
            Cell::code("    def extra(self):\n        pass"),
            Cell::code("print('go')"),
        ]);

        let first = synthesizer.synthesize_notebook("visualizer", &document);
        let second = synthesizer.synthesize_notebook("visualizer", &document);
        assert_eq!(first, second);
        assert!(first.contains("from pathlib import Path\nimport numpy as np\n"));
    }

    #[test]
    fn test_extra_imports_are_not_duplicated() {
        let synthesizer = ScriptSynthesizer::with_imports(vec!["import json".to_string(), " ".to_string()]);
        let program = synthesizer.synthesize("s", &segments("", ""));
        assert_eq!(program.matches("import json\n").count(), 1);
    }

    #[test]
    fn test_notebook_imports_move_into_preamble() {
        let synthesizer = ScriptSynthesizer::with_imports(vec!["import math".to_string()]);
        let document = notebook(vec![
            Cell::code("import math\nimport statistics"),
            Cell::code("from pathlib import Path"),
            Cell::code("print(math.sqrt(statistics.mean([4, 4])))"),
        ]);

        let program = synthesizer.synthesize_notebook("scratch", &document);

        assert!(program.starts_with(
            "import sys\nimport os\nimport json\nimport logging\nimport traceback\n\
             from pathlib import Path\nimport math\nimport statistics\n\n"
        ));
        assert_eq!(program.matches("import math\n").count(), 1);
        assert!(program.contains("def main():\n    print(math.sqrt(statistics.mean([4, 4])))\n"));
    }

    #[test]
    fn test_program_path_uses_stage_name() {
        let program = ScriptSynthesizer::new().program_for(
            "visualizer",
            &notebook(vec![]),
            Path::new("/out/scripts"),
        );
        assert_eq!(program.path, PathBuf::from("/out/scripts/visualizer.py"));
        assert_eq!(program.stage_name, "visualizer");
    }

    #[test]
    fn test_stage_name_is_escaped() {
        assert_eq!(py_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
