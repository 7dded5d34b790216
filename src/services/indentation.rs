//! 缩进规整 - 业务能力层
//!
//! 去掉单元格所有非空行共同的前导空白，保留行间的相对缩进。
//! 空白行原样保留；单行文本或没有公共前导空白的文本原样返回

/// 一级缩进
pub const INDENT: &str = "    ";

/// 去掉公共前导空白
pub fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= 1 {
        return text.to_string();
    }

    let prefix = common_indent(&lines);
    if prefix.is_empty() {
        return text.to_string();
    }

    let mut normalized = lines
        .iter()
        .map(|line| {
            if is_blank(line) {
                *line
            } else {
                &line[prefix.len()..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

/// 给每个非空行加上一层前缀，空白行原样透传
pub fn indent_block(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if is_blank(line) {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

// 所有非空行前导空白的最长公共前缀（空格与制表符按字符比较）
fn common_indent<'a>(lines: &[&'a str]) -> &'a str {
    let mut prefix: Option<&'a str> = None;

    for &line in lines.iter().filter(|line| !is_blank(line)) {
        let leading = &line[..line.len() - line.trim_start_matches([' ', '\t']).len()];
        prefix = Some(match prefix {
            None => leading,
            Some(current) => {
                let shared = current
                    .bytes()
                    .zip(leading.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                &current[..shared]
            }
        });
        if prefix == Some("") {
            break;
        }
    }

    prefix.unwrap_or("")
}
