//! Import/export analysis over the token stream.
//!
//! Static `import` and `export` statements are only recognized at the top
//! level. `require("..")`, `import("..")` and `import.meta` are found at any
//! depth.

use super::lexer::{string_value, Token, TokenKind};
use tracing::warn;

/// Byte range in the analyzed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn of(token: &Token) -> Self {
        Self {
            start: token.start,
            end: token.end,
        }
    }

    fn between(first: &Token, last: &Token) -> Self {
        Self {
            start: first.start,
            end: last.end,
        }
    }
}

/// A module specifier and the span of its string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierRef {
    pub specifier: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBinding {
    Default(String),
    Namespace(String),
    Named { imported: String, local: String },
}

/// `import ... from "x"` or `import "x"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub span: Span,
    pub source: SpecifierRef,
    pub bindings: Vec<ImportBinding>,
}

/// One `local as exported` pair of an export list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportName {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDecl {
    /// `export default <expression>`; `keyword` covers `export default`.
    DefaultExpr { keyword: Span },
    /// `export const`, `export function`, `export default function name`, ...
    /// `keyword` covers the tokens to drop, the declaration itself stays.
    Declaration { keyword: Span, names: Vec<ExportName> },
    /// `export { a, b as c }`.
    Local { span: Span, names: Vec<ExportName> },
    /// `export { a as b } from "x"`.
    ReExport {
        span: Span,
        source: SpecifierRef,
        names: Vec<ExportName>,
    },
    /// `export * from "x"` and `export * as ns from "x"`.
    Star {
        span: Span,
        source: SpecifierRef,
        alias: Option<String>,
    },
}

/// `import(...)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicImport {
    /// From `import` through the closing parenthesis.
    pub span: Span,
    /// Present when the argument is a single static string.
    pub source: Option<SpecifierRef>,
}

/// Everything the bundler needs to know about one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleAnalysis {
    pub imports: Vec<ImportDecl>,
    pub exports: Vec<ExportDecl>,
    pub requires: Vec<SpecifierRef>,
    pub dynamic_imports: Vec<DynamicImport>,
    pub import_meta: Vec<Span>,
    /// The module uses `import`/`export` statements or `import.meta`.
    pub has_module_syntax: bool,
    /// The module declares its own `require`; its calls are left alone.
    pub declares_require: bool,
    /// `await` outside any function. The token scanner reports every `await`.
    pub top_level_await: bool,
}

impl ModuleAnalysis {
    /// Every specifier the module depends on, in source order, deduplicated.
    #[must_use]
    pub fn specifiers(&self) -> Vec<&SpecifierRef> {
        let mut all: Vec<&SpecifierRef> = Vec::new();
        all.extend(self.imports.iter().map(|i| &i.source));
        all.extend(self.exports.iter().filter_map(|e| match e {
            ExportDecl::ReExport { source, .. } | ExportDecl::Star { source, .. } => Some(source),
            _ => None,
        }));
        all.extend(self.requires.iter());
        all.extend(self.dynamic_imports.iter().filter_map(|d| d.source.as_ref()));
        all.sort_by_key(|s| s.span.start);

        let mut seen = std::collections::HashSet::new();
        all.retain(|s| seen.insert(s.specifier.clone()));
        all
    }
}

/// Malformed import or export statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeError {
    pub message: String,
    pub offset: usize,
}

type Result<T> = std::result::Result<T, AnalyzeError>;

/// Analyze a tokenized module.
pub fn analyze(source: &str, tokens: &[Token]) -> Result<ModuleAnalysis> {
    Analyzer {
        src: source,
        tokens,
        out: ModuleAnalysis::default(),
    }
    .run()
}

struct Analyzer<'a> {
    src: &'a str,
    tokens: &'a [Token],
    out: ModuleAnalysis,
}

impl<'a> Analyzer<'a> {
    fn run(mut self) -> Result<ModuleAnalysis> {
        let mut i = 0;
        while i < self.tokens.len() {
            let tok = self.tokens[i];
            if tok.kind != TokenKind::Ident || self.is_member(i) {
                i += 1;
                continue;
            }

            i = match tok.text(self.src) {
                "import" => self.import(i)?,
                "export" if tok.depth == 0 => self.export(i)?,
                "require" => self.require(i),
                "await" => {
                    self.out.top_level_await = true;
                    i + 1
                }
                _ => i + 1,
            };
        }
        if self.out.declares_require {
            self.out.requires.clear();
        }
        Ok(self.out)
    }

    fn text(&self, i: usize) -> &'a str {
        self.tokens.get(i).map_or("", |t| t.text(self.src))
    }

    fn is_punct(&self, i: usize, p: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_punct(self.src, p))
    }

    fn is_ident(&self, i: usize, name: &str) -> bool {
        self.tokens.get(i).is_some_and(|t| t.is_ident(self.src, name))
    }

    fn is_member(&self, i: usize) -> bool {
        i > 0 && self.is_punct(i - 1, ".")
    }

    fn error(&self, i: usize, message: impl Into<String>) -> AnalyzeError {
        let offset = self
            .tokens
            .get(i)
            .or(self.tokens.last())
            .map_or(0, |t| t.start);
        AnalyzeError {
            message: message.into(),
            offset,
        }
    }

    fn unexpected(&self, i: usize, context: &str) -> AnalyzeError {
        match self.tokens.get(i) {
            Some(t) => self.error(i, format!("Unexpected '{}' in {context}", t.text(self.src))),
            None => self.error(i, format!("Unexpected end of file in {context}")),
        }
    }

    fn specifier(&self, i: usize, context: &str) -> Result<SpecifierRef> {
        match self.tokens.get(i) {
            Some(t) if t.is_static_string(self.src) => Ok(SpecifierRef {
                specifier: string_value(t.text(self.src)),
                span: Span::of(t),
            }),
            _ => Err(self.unexpected(i, context)),
        }
    }

    /// Identifier or string literal used as a module export name.
    fn export_name(&self, i: usize, context: &str) -> Result<String> {
        match self.tokens.get(i) {
            Some(t) if t.kind == TokenKind::Ident => Ok(t.text(self.src).to_string()),
            Some(t) if t.kind == TokenKind::Str => Ok(string_value(t.text(self.src))),
            _ => Err(self.unexpected(i, context)),
        }
    }

    fn binding_ident(&self, i: usize, context: &str) -> Result<String> {
        match self.tokens.get(i) {
            Some(t) if t.kind == TokenKind::Ident => Ok(t.text(self.src).to_string()),
            _ => Err(self.unexpected(i, context)),
        }
    }

    /// Index of the token closing the bracket opened at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let depth = self.tokens[open].depth;
        let closer = match self.text(open) {
            "(" => ")",
            "[" => "]",
            _ => "}",
        };
        (open + 1..self.tokens.len())
            .find(|&j| self.tokens[j].depth == depth && self.is_punct(j, closer))
    }

    /// Skip `with { type: "json" }` / `assert { ... }` and a trailing `;`.
    fn statement_tail(&self, mut i: usize) -> usize {
        if (self.is_ident(i, "with") || self.is_ident(i, "assert")) && self.is_punct(i + 1, "{") {
            if let Some(close) = self.matching(i + 1) {
                i = close + 1;
            }
        }
        if self.is_punct(i, ";") {
            i += 1;
        }
        i
    }

    fn import(&mut self, i: usize) -> Result<usize> {
        if self.is_punct(i + 1, "(") {
            return Ok(self.dynamic_import(i));
        }
        if self.is_punct(i + 1, ".") && self.is_ident(i + 2, "meta") {
            self.out.import_meta.push(Span::between(&self.tokens[i], &self.tokens[i + 2]));
            self.out.has_module_syntax = true;
            return Ok(i + 3);
        }
        if self.tokens[i].depth > 0 {
            // Object key or method named `import`.
            return Ok(i + 1);
        }

        let context = "import statement";
        let mut j = i + 1;
        let mut bindings = Vec::new();

        if !self.tokens.get(j).is_some_and(|t| t.is_static_string(self.src)) {
            let starts_with_default = self.tokens.get(j).is_some_and(|t| t.kind == TokenKind::Ident)
                && !(self.is_ident(j, "from") && self.tokens.get(j + 1).is_some_and(|t| t.is_static_string(self.src)));
            if starts_with_default {
                bindings.push(ImportBinding::Default(self.binding_ident(j, context)?));
                j += 1;
                if self.is_punct(j, ",") {
                    j += 1;
                } else if !self.is_ident(j, "from") {
                    return Err(self.unexpected(j, context));
                }
            }

            if self.is_punct(j, "*") {
                if !self.is_ident(j + 1, "as") {
                    return Err(self.unexpected(j + 1, context));
                }
                bindings.push(ImportBinding::Namespace(self.binding_ident(j + 2, context)?));
                j += 3;
            } else if self.is_punct(j, "{") {
                let (names, next) = self.name_list(j, context)?;
                bindings.extend(names.into_iter().map(|n| ImportBinding::Named {
                    imported: n.local,
                    local: n.exported,
                }));
                j = next;
            }

            if !self.is_ident(j, "from") {
                return Err(self.unexpected(j, context));
            }
            j += 1;
        }

        let source = self.specifier(j, context)?;
        let end = self.statement_tail(j + 1);

        self.out.imports.push(ImportDecl {
            span: Span::between(&self.tokens[i], &self.tokens[end - 1]),
            source,
            bindings,
        });
        self.out.has_module_syntax = true;
        Ok(end)
    }

    /// Parse `{ a, b as c, "d" as e }` starting at the `{` token.
    ///
    /// Returns pairs with the name before `as` in `local` and the name after
    /// it in `exported`, plus the index after the closing brace.
    fn name_list(&self, open: usize, context: &str) -> Result<(Vec<ExportName>, usize)> {
        let mut names = Vec::new();
        let mut j = open + 1;
        loop {
            if self.is_punct(j, "}") {
                return Ok((names, j + 1));
            }
            let first = self.export_name(j, context)?;
            j += 1;
            let second = if self.is_ident(j, "as") {
                j += 1;
                let name = self.export_name(j, context)?;
                j += 1;
                name
            } else {
                first.clone()
            };
            names.push(ExportName {
                local: first,
                exported: second,
            });

            if self.is_punct(j, ",") {
                j += 1;
            } else if !self.is_punct(j, "}") {
                return Err(self.unexpected(j, context));
            }
        }
    }

    fn dynamic_import(&mut self, i: usize) -> usize {
        let open = i + 1;
        let Some(close) = self.matching(open) else {
            return i + 1;
        };

        let arg = open + 1;
        let literal = self.tokens.get(arg).is_some_and(|t| t.is_static_string(self.src))
            && (close == arg + 1 || (close == arg + 2 && self.is_punct(arg + 1, ",")));

        let source = if literal {
            let t = &self.tokens[arg];
            Some(SpecifierRef {
                specifier: string_value(t.text(self.src)),
                span: Span::of(t),
            })
        } else {
            if close > open + 1 {
                warn!(
                    offset = self.tokens[i].start,
                    "Dynamic import with a non-literal specifier is left to the host runtime"
                );
            }
            None
        };

        self.out.dynamic_imports.push(DynamicImport {
            span: Span::between(&self.tokens[i], &self.tokens[close]),
            source,
        });
        // Keep scanning inside the arguments.
        open + 1
    }

    fn require(&mut self, i: usize) -> usize {
        let declared = i > 0
            && matches!(self.text(i - 1), "function" | "const" | "let" | "var" | "class");
        let call = self.is_punct(i + 1, "(")
            && self.tokens.get(i + 2).is_some_and(|t| t.is_static_string(self.src))
            && self.is_punct(i + 3, ")");

        if declared {
            self.out.declares_require = true;
        }
        if declared || !call {
            return i + 1;
        }

        let t = &self.tokens[i + 2];
        self.out.requires.push(SpecifierRef {
            specifier: string_value(t.text(self.src)),
            span: Span::of(t),
        });
        i + 4
    }

    fn export(&mut self, i: usize) -> Result<usize> {
        let context = "export statement";
        self.out.has_module_syntax = true;
        let j = i + 1;

        match self.text(j) {
            "default" => Ok(self.export_default(i)),
            "*" => {
                let (alias, from) = if self.is_ident(j + 1, "as") {
                    (Some(self.export_name(j + 2, context)?), j + 3)
                } else {
                    (None, j + 1)
                };
                if !self.is_ident(from, "from") {
                    return Err(self.unexpected(from, context));
                }
                let source = self.specifier(from + 1, context)?;
                let end = self.statement_tail(from + 2);
                self.out.exports.push(ExportDecl::Star {
                    span: Span::between(&self.tokens[i], &self.tokens[end - 1]),
                    source,
                    alias,
                });
                Ok(end)
            }
            "{" if self.tokens[j].kind == TokenKind::Punct => {
                let (names, next) = self.name_list(j, context)?;
                if self.is_ident(next, "from") {
                    let source = self.specifier(next + 1, context)?;
                    let end = self.statement_tail(next + 2);
                    self.out.exports.push(ExportDecl::ReExport {
                        span: Span::between(&self.tokens[i], &self.tokens[end - 1]),
                        source,
                        names,
                    });
                    Ok(end)
                } else {
                    let end = self.statement_tail(next);
                    self.out.exports.push(ExportDecl::Local {
                        span: Span::between(&self.tokens[i], &self.tokens[end - 1]),
                        names,
                    });
                    Ok(end)
                }
            }
            "const" | "let" | "var" => {
                let names = self.declarators(j + 1)?;
                self.out.exports.push(ExportDecl::Declaration {
                    keyword: Span::of(&self.tokens[i]),
                    names: names
                        .into_iter()
                        .map(|n| ExportName {
                            local: n.clone(),
                            exported: n,
                        })
                        .collect(),
                });
                Ok(j + 1)
            }
            "function" | "async" | "class" => {
                let Some(name) = self.declaration_name(j) else {
                    return Err(self.error(j, "Exported declaration needs a name"));
                };
                self.out.exports.push(ExportDecl::Declaration {
                    keyword: Span::of(&self.tokens[i]),
                    names: vec![ExportName {
                        local: name.clone(),
                        exported: name,
                    }],
                });
                Ok(j)
            }
            _ => Err(self.unexpected(j, context)),
        }
    }

    fn export_default(&mut self, i: usize) -> usize {
        let default = i + 1;
        let keyword = Span::between(&self.tokens[i], &self.tokens[default]);

        let decl = default + 1;
        let name = if matches!(self.text(decl), "function" | "async" | "class") {
            self.declaration_name(decl)
        } else {
            None
        };

        match name {
            Some(name) => self.out.exports.push(ExportDecl::Declaration {
                keyword,
                names: vec![ExportName {
                    local: name,
                    exported: "default".to_string(),
                }],
            }),
            None => self.out.exports.push(ExportDecl::DefaultExpr { keyword }),
        }
        decl
    }

    /// Name of a `function`, `async function`, `function*` or `class` declaration at `j`.
    fn declaration_name(&self, mut j: usize) -> Option<String> {
        if self.is_ident(j, "async") {
            if !self.is_ident(j + 1, "function") || self.tokens[j + 1].newline_before {
                return None;
            }
            j += 1;
        }
        match self.text(j) {
            "function" => {
                j += 1;
                if self.is_punct(j, "*") {
                    j += 1;
                }
            }
            "class" => j += 1,
            _ => return None,
        }
        let t = self.tokens.get(j)?;
        (t.kind == TokenKind::Ident && t.text(self.src) != "extends")
            .then(|| t.text(self.src).to_string())
    }

    /// Binding names of `a = 1, { b, c: d } = obj, [e] = arr` starting at `j`.
    fn declarators(&self, mut j: usize) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            j = self.binding(j, &mut names)?;
            if !self.is_punct(j, "=") {
                if self.is_punct(j, ",") {
                    j += 1;
                    continue;
                }
                return Ok(names);
            }

            // Skip the initializer.
            let depth = self.tokens[j].depth;
            j += 1;
            loop {
                let Some(t) = self.tokens.get(j) else {
                    return Ok(names);
                };
                if t.depth == depth && t.kind == TokenKind::Punct {
                    match t.text(self.src) {
                        "," => break,
                        ";" => return Ok(names),
                        _ => {}
                    }
                }
                if t.depth == depth && t.newline_before && self.starts_statement(j) {
                    return Ok(names);
                }
                j += 1;
            }
            j += 1;
        }
    }

    /// Whether automatic semicolon insertion ends the statement before `j`.
    fn starts_statement(&self, j: usize) -> bool {
        let t = &self.tokens[j];
        if t.kind != TokenKind::Ident || matches!(t.text(self.src), "in" | "instanceof" | "of") {
            return false;
        }
        let prev = &self.tokens[j - 1];
        match prev.kind {
            TokenKind::Ident | TokenKind::Str | TokenKind::Number | TokenKind::Regex => true,
            TokenKind::Template => prev.text(self.src).ends_with('`'),
            TokenKind::Punct => matches!(prev.text(self.src), ")" | "]" | "}"),
        }
    }

    /// Collect identifiers bound by the pattern at `j`; returns the index after it.
    fn binding(&self, j: usize, names: &mut Vec<String>) -> Result<usize> {
        let context = "export declaration";
        let Some(t) = self.tokens.get(j) else {
            return Err(self.unexpected(j, context));
        };

        match (t.kind, t.text(self.src)) {
            (TokenKind::Ident, name) => {
                names.push(name.to_string());
                Ok(j + 1)
            }
            (TokenKind::Punct, "{") => {
                let close = self.matching(j).ok_or_else(|| self.unexpected(j, context))?;
                let mut k = j + 1;
                while k < close {
                    if self.is_punct(k, "...") {
                        k = self.binding(k + 1, names)?;
                    } else {
                        let key = k;
                        k = if self.is_punct(k, "[") {
                            self.matching(k).ok_or_else(|| self.unexpected(k, context))? + 1
                        } else {
                            k + 1
                        };
                        if self.is_punct(k, ":") {
                            k = self.binding(k + 1, names)?;
                        } else {
                            names.push(self.binding_ident(key, context)?);
                        }
                    }
                    k = self.skip_default(k, close);
                    if self.is_punct(k, ",") {
                        k += 1;
                    }
                }
                Ok(close + 1)
            }
            (TokenKind::Punct, "[") => {
                let close = self.matching(j).ok_or_else(|| self.unexpected(j, context))?;
                let mut k = j + 1;
                while k < close {
                    if self.is_punct(k, ",") {
                        k += 1;
                        continue;
                    }
                    k = if self.is_punct(k, "...") {
                        self.binding(k + 1, names)?
                    } else {
                        self.binding(k, names)?
                    };
                    k = self.skip_default(k, close);
                    if self.is_punct(k, ",") {
                        k += 1;
                    }
                }
                Ok(close + 1)
            }
            _ => Err(self.unexpected(j, context)),
        }
    }

    /// Skip `= default` inside a pattern whose closing token is at `close`.
    fn skip_default(&self, k: usize, close: usize) -> usize {
        if !self.is_punct(k, "=") {
            return k;
        }
        let depth = self.tokens[k].depth;
        (k + 1..close)
            .find(|&m| self.tokens[m].depth == depth && self.is_punct(m, ","))
            .unwrap_or(close)
    }
}
