use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 单元格类型：只有 code 单元格参与转换
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CellKind {
    Code,
    Other(String),
}

impl From<String> for CellKind {
    fn from(value: String) -> Self {
        if value == "code" {
            CellKind::Code
        } else {
            CellKind::Other(value)
        }
    }
}

impl From<CellKind> for String {
    fn from(kind: CellKind) -> Self {
        match kind {
            CellKind::Code => "code".to_string(),
            CellKind::Other(name) => name,
        }
    }
}

/// 笔记本单元格
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    #[serde(rename = "cell_type")]
    pub kind: CellKind,
    #[serde(deserialize_with = "deserialize_source")]
    pub source: String,
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            source: source.into(),
        }
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Other("markdown".to_string()),
            source: source.into(),
        }
    }

    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }
}

/// 笔记本文档，读取后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookDocument {
    pub cells: Vec<Cell>,
    #[serde(skip_serializing, skip_deserializing)]
    pub path: PathBuf,
}

impl NotebookDocument {
    /// 从 JSON 文本解析笔记本
    pub fn from_json(text: &str, path: impl Into<PathBuf>) -> serde_json::Result<Self> {
        let mut document: NotebookDocument = serde_json::from_str(text)?;
        document.path = path.into();
        Ok(document)
    }

    /// 按顺序返回所有 code 单元格的文本
    pub fn code_sources(&self) -> Vec<&str> {
        self.cells
            .iter()
            .filter(|cell| cell.is_code())
            .map(|cell| cell.source.as_str())
            .collect()
    }
}

// source 字段既可以是单个字符串，也可以是字符串列表（每行自带换行符）
fn deserialize_source<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};
    use std::fmt;

    struct SourceVisitor;

    impl<'de> Visitor<'de> for SourceVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut text = String::new();
            while let Some(line) = seq.next_element::<String>()? {
                text.push_str(&line);
            }
            Ok(text)
        }
    }

    deserializer.deserialize_any(SourceVisitor)
}
