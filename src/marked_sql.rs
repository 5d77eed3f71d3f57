//! MarkedSQL：带标记的 SQL 文本及其编译。
//!
//! 标记语法：
//! - `@@Name`：业务 Name 对应的表，执行时按表条件替换为真实表名（影子表）；
//! - `@prop`：所属映射中属性 prop 的列名（已转义）；
//! - `:name`：绑定参数（`::` 原样保留，作为类型转换）；
//! - `#if(expr) ... #end`、`#notEmpty(var) ... #end`：绑定时按参数值决定是否保留片段，可嵌套。
//!
//! 引号内的字符串原样复制，不识别标记。

use crate::compiled_sql::CompiledSQL;
use crate::error::{CompileError, DaoError};
use crate::mapping::{ObjectMapping, ObjectMappingManager};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MarkedSQL {
    mapping: Arc<ObjectMapping>,
    sql: String,
}

/// 编译后的语法树节点。
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Table(Arc<ObjectMapping>),
    Param(String),
    If {
        var: String,
        negate: bool,
        body: Vec<Node>,
    },
    NotEmpty {
        var: String,
        body: Vec<Node>,
    },
}

enum Directive {
    If { var: String, negate: bool },
    NotEmpty { var: String },
}

struct Frame {
    directive: Option<Directive>,
    nodes: Vec<Node>,
}

impl MarkedSQL {
    pub fn new(mapping: Arc<ObjectMapping>, sql: impl Into<String>) -> Self {
        Self {
            mapping,
            sql: sql.into(),
        }
    }

    pub fn mapping(&self) -> &Arc<ObjectMapping> {
        &self.mapping
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// 编译为可复用的 `CompiledSQL`。
    pub fn compile(&self, mappings: &ObjectMappingManager) -> Result<CompiledSQL, DaoError> {
        let nodes = Parser::new(&self.sql, &self.mapping, mappings).parse()?;
        Ok(CompiledSQL::new(Arc::clone(&self.mapping), self.sql.clone(), nodes))
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `${v}`、`$v`、`v`、`!v` 统一成 (v, 是否取反)。
fn directive_var(expr: &str) -> Result<(String, bool), CompileError> {
    let mut s = expr.trim();
    let negate = s.starts_with('!');
    if negate {
        s = s[1..].trim_start();
    }
    if let Some(inner) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
        s = inner.trim();
    } else if let Some(inner) = s.strip_prefix('$') {
        s = inner;
    }
    if s.is_empty() || !s.bytes().all(is_ident_part) {
        return Err(CompileError::UnbalancedDirective(format!(
            "invalid directive variable [{expr}]"
        )));
    }
    Ok((s.to_string(), negate))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    owner: &'a ObjectMapping,
    mappings: &'a ObjectMappingManager,
    stack: Vec<Frame>,
    text: String,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, owner: &'a ObjectMapping, mappings: &'a ObjectMappingManager) -> Self {
        Self {
            src,
            pos: 0,
            owner,
            mappings,
            stack: vec![Frame {
                directive: None,
                nodes: Vec::new(),
            }],
            text: String::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'a str {
        let src = self.src;
        &src[self.pos..]
    }

    fn read_ident(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek(0).is_some_and(is_ident_part) {
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    fn push_node(&mut self, node: Node) {
        self.flush_text();
        self.current().nodes.push(node);
    }

    fn current(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.current().nodes.push(Node::Text(text));
        }
    }

    fn copy_quoted(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            self.pos += 1;
            if b == quote {
                break;
            }
        }
        self.text.push_str(&self.src[start..self.pos]);
    }

    fn copy_char(&mut self) {
        if let Some(ch) = self.rest().chars().next() {
            self.text.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    /// 读取 `(` 之后到配对 `)` 的内容。
    fn read_paren(&mut self) -> Result<&'a str, CompileError> {
        let src = self.src;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(b) = self.peek(0) {
            self.pos += 1;
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&src[start..self.pos - 1]);
                    }
                }
                _ => {}
            }
        }
        Err(CompileError::UnbalancedDirective(self.src.to_string()))
    }

    fn parse(mut self) -> Result<Vec<Node>, DaoError> {
        while let Some(b) = self.peek(0) {
            match b {
                b'\'' | b'"' => self.copy_quoted(b),
                b':' if self.peek(1) == Some(b':') => {
                    self.text.push_str("::");
                    self.pos += 2;
                }
                b':' if self.peek(1).is_some_and(is_ident_start) => {
                    self.pos += 1;
                    let name = self.read_ident();
                    self.push_node(Node::Param(name.to_string()));
                }
                b'@' if self.peek(1) == Some(b'@') && self.peek(2).is_some_and(is_ident_start) => {
                    self.pos += 2;
                    let business = self.read_ident();
                    let mapping = self.mappings.get(business)?;
                    self.push_node(Node::Table(mapping));
                }
                b'@' if self.peek(1).is_some_and(is_ident_start) => {
                    self.pos += 1;
                    let prop = self.read_ident();
                    let owner = self.owner;
                    let col = owner.col_name_by_prop(prop).ok_or_else(|| {
                        CompileError::UnknownProperty {
                            business: owner.business().to_string(),
                            prop: prop.to_string(),
                        }
                    })?;
                    self.text.push_str(col);
                }
                b'#' if self.rest().starts_with("#if(") => {
                    self.pos += "#if(".len();
                    let (var, negate) = directive_var(self.read_paren()?)?;
                    self.open(Directive::If { var, negate });
                }
                b'#' if self.rest().starts_with("#notEmpty(") => {
                    self.pos += "#notEmpty(".len();
                    let (var, negate) = directive_var(self.read_paren()?)?;
                    if negate {
                        return Err(CompileError::UnbalancedDirective(format!(
                            "#notEmpty does not accept negation: {}",
                            self.src
                        ))
                        .into());
                    }
                    self.open(Directive::NotEmpty { var });
                }
                // `#endif`、`#ending` 之类不是结束标记
                b'#' if self.rest().starts_with("#end") && !self.peek(4).is_some_and(is_ident_part) => {
                    self.pos += "#end".len();
                    self.close()?;
                }
                _ => self.copy_char(),
            }
        }

        self.flush_text();
        if self.stack.len() != 1 {
            return Err(CompileError::UnbalancedDirective(self.src.to_string()).into());
        }
        Ok(self.stack.pop().map(|f| f.nodes).unwrap_or_default())
    }

    fn open(&mut self, directive: Directive) {
        self.flush_text();
        self.stack.push(Frame {
            directive: Some(directive),
            nodes: Vec::new(),
        });
    }

    fn close(&mut self) -> Result<(), CompileError> {
        self.flush_text();
        if self.stack.len() < 2 {
            return Err(CompileError::UnbalancedDirective(self.src.to_string()));
        }
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| CompileError::UnbalancedDirective(self.src.to_string()))?;
        let node = match frame.directive {
            Some(Directive::If { var, negate }) => Node::If {
                var,
                negate,
                body: frame.nodes,
            },
            Some(Directive::NotEmpty { var }) => Node::NotEmpty {
                var,
                body: frame.nodes,
            },
            None => return Err(CompileError::UnbalancedDirective(self.src.to_string())),
        };
        self.current().nodes.push(node);
        Ok(())
    }
}
