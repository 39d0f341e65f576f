//! Script transformation
//!
//! Downlevels JS sources toward the profile's browser matrix and provides
//! the whitespace/comment minifier used for the `.min.js` bundle variants.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

/// Errors surfaced per input file; the script task reports these and skips
/// the offending file instead of aborting the run.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{file}:{line}: syntax error: {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },
}

/// Script transformer
#[derive(Debug, Clone)]
pub struct Transformer {
    /// Whether the browser matrix includes targets without block scoping
    legacy_targets: bool,
}

impl Transformer {
    /// Create a transformer for the given browserslist queries
    pub fn new(browsers: &[String]) -> Self {
        let legacy_targets = browsers.iter().any(|query| {
            let q = query.to_lowercase();
            q.starts_with("ie ") || q.starts_with("ie>") || q.contains(" ie ")
        });

        Self { legacy_targets }
    }

    /// Transpile one source file. Checks syntax first so a broken file is
    /// rejected before it can corrupt a concatenated bundle.
    pub fn transpile(&self, source: &str, path: &Path) -> Result<String, TransformError> {
        self.check_syntax(source, path)?;

        if !self.legacy_targets {
            return Ok(source.to_string());
        }

        debug!("Downleveling {}", path.display());
        Ok(self.downlevel(source))
    }

    /// Balanced-delimiter and string-termination check. Not a parser; it
    /// catches the truncation and quoting mistakes that would otherwise
    /// break every other file in the same bundle.
    fn check_syntax(&self, source: &str, path: &Path) -> Result<(), TransformError> {
        let file = path.display().to_string();
        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut line = 1usize;
        let mut in_string = false;
        let mut string_char = '"';
        let mut string_line = 0usize;
        let mut in_single_comment = false;
        let mut in_multi_comment = false;
        let mut prev = ' ';
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\n' {
                line += 1;
                if in_single_comment {
                    in_single_comment = false;
                }
                // Template literals span lines; quoted strings do not.
                if in_string && string_char != '`' {
                    return Err(TransformError::Syntax {
                        file,
                        line: string_line,
                        message: "unterminated string literal".to_string(),
                    });
                }
                prev = c;
                continue;
            }

            if in_single_comment {
                continue;
            }
            if in_multi_comment {
                if prev == '*' && c == '/' {
                    in_multi_comment = false;
                    prev = ' ';
                } else {
                    prev = c;
                }
                continue;
            }
            if in_string {
                if c == string_char && prev != '\\' {
                    in_string = false;
                }
                prev = if prev == '\\' && c == '\\' { ' ' } else { c };
                continue;
            }

            match c {
                '"' | '\'' | '`' => {
                    in_string = true;
                    string_char = c;
                    string_line = line;
                }
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        in_single_comment = true;
                    }
                    Some('*') => {
                        chars.next();
                        in_multi_comment = true;
                        prev = ' ';
                        continue;
                    }
                    _ => {}
                },
                '(' | '[' | '{' => stack.push((c, line)),
                ')' | ']' | '}' => {
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, open_line)) => {
                            return Err(TransformError::Syntax {
                                file,
                                line,
                                message: format!(
                                    "mismatched '{c}'; '{open}' opened on line {open_line}"
                                ),
                            });
                        }
                        None => {
                            return Err(TransformError::Syntax {
                                file,
                                line,
                                message: format!("unexpected '{c}'"),
                            });
                        }
                    }
                }
                _ => {}
            }
            prev = c;
        }

        if in_string && string_char != '`' {
            return Err(TransformError::Syntax {
                file,
                line: string_line,
                message: "unterminated string literal".to_string(),
            });
        }
        if let Some((open, open_line)) = stack.pop() {
            return Err(TransformError::Syntax {
                file,
                line: open_line,
                message: format!("unclosed '{open}'"),
            });
        }

        Ok(())
    }

    /// Rewrite block-scoped declarations to `var` for targets without
    /// block scoping. Strings and comments are left untouched; other
    /// ES2015+ constructs pass through unchanged.
    fn downlevel(&self, source: &str) -> String {
        let mut result = String::with_capacity(source.len());
        let mut in_string = false;
        let mut string_char = '"';
        let mut in_single_comment = false;
        let mut in_multi_comment = false;
        let mut prev = ' ';
        let mut word = String::new();

        let flush = |word: &mut String, result: &mut String| {
            if !word.is_empty() {
                match word.as_str() {
                    "const" | "let" => result.push_str("var"),
                    other => result.push_str(other),
                }
                word.clear();
            }
        };

        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            if in_single_comment {
                result.push(c);
                if c == '\n' {
                    in_single_comment = false;
                }
                continue;
            }
            if in_multi_comment {
                result.push(c);
                if prev == '*' && c == '/' {
                    in_multi_comment = false;
                }
                prev = c;
                continue;
            }
            if in_string {
                result.push(c);
                if c == string_char && prev != '\\' {
                    in_string = false;
                }
                prev = if prev == '\\' && c == '\\' { ' ' } else { c };
                continue;
            }

            if c.is_alphanumeric() || c == '_' || c == '$' {
                word.push(c);
                prev = c;
                continue;
            }
            flush(&mut word, &mut result);

            match c {
                '"' | '\'' | '`' => {
                    in_string = true;
                    string_char = c;
                }
                '/' => {
                    if let Some(&next) = chars.peek() {
                        if next == '/' {
                            in_single_comment = true;
                        } else if next == '*' {
                            in_multi_comment = true;
                        }
                    }
                }
                _ => {}
            }
            result.push(c);
            prev = c;
        }
        flush(&mut word, &mut result);

        result
    }
}

/// Minify JavaScript by stripping comments and collapsing whitespace.
/// String and template literals are preserved byte-for-byte.
pub fn minify_js(code: &str) -> String {
    let mut result = String::with_capacity(code.len());
    let mut in_string = false;
    let mut string_char = ' ';
    let mut in_single_comment = false;
    let mut in_multi_comment = false;
    let mut prev_char = ' ';
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        if in_single_comment {
            if c == '\n' {
                in_single_comment = false;
                result.push('\n');
            }
            continue;
        }

        if in_multi_comment {
            if prev_char == '*' && c == '/' {
                in_multi_comment = false;
            }
            prev_char = c;
            continue;
        }

        if in_string {
            result.push(c);
            if c == string_char && prev_char != '\\' {
                in_string = false;
            }
            prev_char = if prev_char == '\\' && c == '\\' { ' ' } else { c };
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            in_string = true;
            string_char = c;
            result.push(c);
            prev_char = c;
            continue;
        }

        if c == '/' {
            if let Some(&next) = chars.peek() {
                if next == '/' {
                    in_single_comment = true;
                    chars.next();
                    continue;
                } else if next == '*' {
                    in_multi_comment = true;
                    chars.next();
                    prev_char = ' ';
                    continue;
                }
            }
        }

        // Collapse whitespace
        if c.is_whitespace() {
            if !result.ends_with(' ') && !result.ends_with('\n') && !result.is_empty() {
                result.push(' ');
            }
        } else {
            result.push(c);
        }

        prev_char = c;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legacy() -> Transformer {
        Transformer::new(&["ie >= 11".to_string(), "last 2 versions".to_string()])
    }

    fn modern() -> Transformer {
        Transformer::new(&["last 2 Chrome versions".to_string()])
    }

    #[test]
    fn downlevels_block_scope_for_legacy_targets() {
        let out = legacy()
            .transpile("const a = 1;\nlet b = a + 1;", Path::new("t.js"))
            .unwrap();
        assert_eq!(out, "var a = 1;\nvar b = a + 1;");
    }

    #[test]
    fn modern_targets_pass_through() {
        let src = "const a = 1;";
        let out = modern().transpile(src, Path::new("t.js")).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn identifiers_containing_keywords_survive() {
        let out = legacy()
            .transpile("const constant = letter;", Path::new("t.js"))
            .unwrap();
        assert_eq!(out, "var constant = letter;");
    }

    #[test]
    fn strings_and_comments_untouched() {
        let src = "// let it be\nvar s = \"const x\";";
        let out = legacy().transpile(src, Path::new("t.js")).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn unbalanced_brace_is_syntax_error() {
        let err = legacy()
            .transpile("function f() { if (x) {\n", Path::new("bad.js"))
            .unwrap_err();
        let TransformError::Syntax { file, message, .. } = err;
        assert_eq!(file, "bad.js");
        assert!(message.contains("unclosed"));
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = legacy()
            .transpile("var s = \"oops;\nvar t = 1;", Path::new("bad.js"))
            .unwrap_err();
        let TransformError::Syntax { line, .. } = err;
        assert_eq!(line, 1);
    }

    #[test]
    fn minify_strips_comments_and_collapses_whitespace() {
        let src = "// header\nfunction  add (a, b)   {\n    /* sum */\n    return a + b;\n}\n";
        let out = minify_js(src);
        assert!(!out.contains("header"));
        assert!(!out.contains("sum"));
        assert!(out.contains("function add (a, b)"));
    }

    #[test]
    fn minify_preserves_string_contents() {
        let src = "var s = \"a  //  b\";";
        let out = minify_js(src);
        assert!(out.contains("\"a  //  b\""));
    }
}
