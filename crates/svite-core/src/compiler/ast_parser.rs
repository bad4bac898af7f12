//! AST-based import/export extraction using SWC.
//!
//! Produces the same [`ModuleAnalysis`] as the token scanner in
//! `bundler::analyze`, with byte spans into the analyzed source so the
//! emitter can rewrite it in place.

use super::swc::parse_diagnostic;
use super::{CompilerError, Diagnostic};
use crate::bundler::analyze::{
    DynamicImport, ExportDecl, ExportName, ImportBinding, ImportDecl, ModuleAnalysis, Span,
    SpecifierRef,
};
use std::path::Path;
use swc_common::{sync::Lrc, BytePos, FileName, SourceMap};
use swc_ecma_ast as ast;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::warn;

/// Parse `source` as JavaScript and collect everything the bundler rewrites.
///
/// The module/script distinction is left to the parser, so CommonJS files
/// with sloppy-mode syntax still analyze.
pub fn analyze_module(path: &Path, source: &str) -> Result<ModuleAnalysis, CompilerError> {
    let cm: Lrc<SourceMap> = Lrc::default();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("svite.config.js");
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let jsx = matches!(path.extension().and_then(|e| e.to_str()), Some("jsx" | "tsx"));
    let syntax = Syntax::Es(EsSyntax {
        jsx,
        import_attributes: true,
        allow_return_outside_function: true,
        ..Default::default()
    });
    let lexer = Lexer::new(syntax, ast::EsVersion::EsNext, StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);

    let program = parser
        .parse_program()
        .map_err(|e| syntax_error(path, vec![parse_diagnostic(&cm, path, &e)]))?;
    let recovered: Vec<Diagnostic> = parser
        .take_errors()
        .iter()
        .map(|e| parse_diagnostic(&cm, path, e))
        .collect();
    if !recovered.is_empty() {
        return Err(syntax_error(path, recovered));
    }

    let mut collector = Collector {
        src: source,
        base: fm.start_pos,
        fn_depth: 0,
        out: ModuleAnalysis::default(),
    };

    if let ast::Program::Module(module) = &program {
        for item in &module.body {
            if let ast::ModuleItem::ModuleDecl(decl) = item {
                if let Err(message) = collector.module_decl(decl) {
                    let loc = cm.lookup_char_pos(swc_common::Spanned::span(decl).lo);
                    return Err(syntax_error(
                        path,
                        vec![Diagnostic::error(message).with_location(
                            path.to_path_buf(),
                            loc.line as u32,
                            loc.col_display as u32 + 1,
                        )],
                    ));
                }
            }
        }
    }
    program.visit_with(&mut collector);

    let mut out = collector.out;
    if out.declares_require {
        out.requires.clear();
    }
    Ok(out)
}

fn syntax_error(path: &Path, diagnostics: Vec<Diagnostic>) -> CompilerError {
    let message = diagnostics
        .first()
        .map_or_else(|| "Syntax error".to_string(), |d| d.message.clone());
    CompilerError::parse_error(format!("{message} in {}", path.display())).with_diagnostics(diagnostics)
}

struct Collector<'a> {
    src: &'a str,
    base: BytePos,
    /// Functions and arrows enclosing the visited node.
    fn_depth: usize,
    out: ModuleAnalysis,
}

impl Collector<'_> {
    fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.base.0) as usize
    }

    fn span(&self, span: swc_common::Span) -> Span {
        Span {
            start: self.offset(span.lo),
            end: self.offset(span.hi),
        }
    }

    fn specifier(&self, s: &ast::Str) -> SpecifierRef {
        SpecifierRef {
            specifier: s.value.to_string(),
            span: self.span(s.span),
        }
    }

    /// A string literal or a template without substitutions.
    fn static_string(&self, expr: &ast::Expr) -> Option<SpecifierRef> {
        match expr {
            ast::Expr::Lit(ast::Lit::Str(s)) => Some(self.specifier(s)),
            ast::Expr::Tpl(tpl) if tpl.exprs.is_empty() => {
                let cooked = tpl.quasis.first()?.cooked.as_ref()?;
                Some(SpecifierRef {
                    specifier: cooked.to_string(),
                    span: self.span(tpl.span),
                })
            }
            _ => None,
        }
    }

    /// `export default` at the start of `span`.
    fn default_keyword(&self, span: swc_common::Span) -> Span {
        let start = self.offset(span.lo);
        let end = self
            .src
            .get(start..)
            .and_then(|rest| rest.find("default"))
            .map_or(start + "export".len(), |i| start + i + "default".len());
        Span { start, end }
    }

    fn module_decl(&mut self, decl: &ast::ModuleDecl) -> Result<(), &'static str> {
        self.out.has_module_syntax = true;

        match decl {
            ast::ModuleDecl::Import(import) => {
                let bindings = import
                    .specifiers
                    .iter()
                    .map(|s| match s {
                        ast::ImportSpecifier::Default(d) => ImportBinding::Default(d.local.sym.to_string()),
                        ast::ImportSpecifier::Namespace(n) => {
                            ImportBinding::Namespace(n.local.sym.to_string())
                        }
                        ast::ImportSpecifier::Named(n) => ImportBinding::Named {
                            imported: n
                                .imported
                                .as_ref()
                                .map_or_else(|| n.local.sym.to_string(), export_name),
                            local: n.local.sym.to_string(),
                        },
                    })
                    .collect();
                self.out.imports.push(ImportDecl {
                    span: self.span(import.span),
                    source: self.specifier(&import.src),
                    bindings,
                });
            }
            ast::ModuleDecl::ExportDecl(export) => {
                let mut names = Vec::new();
                match &export.decl {
                    ast::Decl::Var(var) => {
                        for d in &var.decls {
                            pat_names(&d.name, &mut names);
                        }
                    }
                    ast::Decl::Fn(f) => names.push(f.ident.sym.to_string()),
                    ast::Decl::Class(c) => names.push(c.ident.sym.to_string()),
                    _ => return Err("Unsupported export declaration"),
                }
                let start = self.offset(export.span.lo);
                self.out.exports.push(ExportDecl::Declaration {
                    keyword: Span {
                        start,
                        end: start + "export".len(),
                    },
                    names: names
                        .into_iter()
                        .map(|n| ExportName {
                            local: n.clone(),
                            exported: n,
                        })
                        .collect(),
                });
            }
            ast::ModuleDecl::ExportDefaultDecl(export) => {
                let keyword = self.default_keyword(export.span);
                let ident = match &export.decl {
                    ast::DefaultDecl::Fn(f) => f.ident.as_ref(),
                    ast::DefaultDecl::Class(c) => c.ident.as_ref(),
                    _ => return Err("Unsupported default export"),
                };
                self.out.exports.push(match ident {
                    Some(ident) => ExportDecl::Declaration {
                        keyword,
                        names: vec![ExportName {
                            local: ident.sym.to_string(),
                            exported: "default".to_string(),
                        }],
                    },
                    None => ExportDecl::DefaultExpr { keyword },
                });
            }
            ast::ModuleDecl::ExportDefaultExpr(export) => {
                let keyword = self.default_keyword(export.span);
                self.out.exports.push(ExportDecl::DefaultExpr { keyword });
            }
            ast::ModuleDecl::ExportNamed(named) => {
                let span = self.span(named.span);
                let export = match &named.src {
                    Some(src) => match named.specifiers.as_slice() {
                        [ast::ExportSpecifier::Namespace(ns)] => ExportDecl::Star {
                            span,
                            source: self.specifier(src),
                            alias: Some(export_name(&ns.name)),
                        },
                        specifiers => ExportDecl::ReExport {
                            span,
                            source: self.specifier(src),
                            names: export_names(specifiers)?,
                        },
                    },
                    None => ExportDecl::Local {
                        span,
                        names: export_names(&named.specifiers)?,
                    },
                };
                self.out.exports.push(export);
            }
            ast::ModuleDecl::ExportAll(all) => {
                self.out.exports.push(ExportDecl::Star {
                    span: self.span(all.span),
                    source: self.specifier(&all.src),
                    alias: None,
                });
            }
            _ => return Err("TypeScript module syntax is not supported in config files"),
        }
        Ok(())
    }

    fn note_declared(&mut self, name: &str) {
        if name == "require" {
            self.out.declares_require = true;
        }
    }
}

impl Visit for Collector<'_> {
    fn visit_function(&mut self, n: &ast::Function) {
        self.fn_depth += 1;
        n.visit_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_arrow_expr(&mut self, n: &ast::ArrowExpr) {
        self.fn_depth += 1;
        n.visit_children_with(self);
        self.fn_depth -= 1;
    }

    fn visit_await_expr(&mut self, n: &ast::AwaitExpr) {
        if self.fn_depth == 0 {
            self.out.top_level_await = true;
        }
        n.visit_children_with(self);
    }

    fn visit_for_of_stmt(&mut self, n: &ast::ForOfStmt) {
        if n.is_await && self.fn_depth == 0 {
            self.out.top_level_await = true;
        }
        n.visit_children_with(self);
    }

    fn visit_meta_prop_expr(&mut self, n: &ast::MetaPropExpr) {
        if matches!(n.kind, ast::MetaPropKind::ImportMeta) {
            let span = self.span(n.span);
            self.out.import_meta.push(span);
            self.out.has_module_syntax = true;
        }
    }

    fn visit_var_declarator(&mut self, n: &ast::VarDeclarator) {
        if let ast::Pat::Ident(binding) = &n.name {
            self.note_declared(&binding.id.sym);
        }
        n.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, n: &ast::FnDecl) {
        self.note_declared(&n.ident.sym);
        n.visit_children_with(self);
    }

    fn visit_class_decl(&mut self, n: &ast::ClassDecl) {
        self.note_declared(&n.ident.sym);
        n.visit_children_with(self);
    }

    fn visit_call_expr(&mut self, n: &ast::CallExpr) {
        let literal = match n.args.as_slice() {
            [arg] if arg.spread.is_none() => self.static_string(&arg.expr),
            _ => None,
        };

        match &n.callee {
            ast::Callee::Import(_) => {
                if literal.is_none() && !n.args.is_empty() {
                    warn!(
                        offset = self.offset(n.span.lo),
                        "Dynamic import with a non-literal specifier is left to the host runtime"
                    );
                }
                let span = self.span(n.span);
                self.out.dynamic_imports.push(DynamicImport {
                    span,
                    source: literal,
                });
            }
            ast::Callee::Expr(callee) => {
                if let (ast::Expr::Ident(ident), Some(spec)) = (&**callee, literal) {
                    if &*ident.sym == "require" {
                        self.out.requires.push(spec);
                    }
                }
            }
            ast::Callee::Super(_) => {}
        }
        n.visit_children_with(self);
    }
}

fn export_name(name: &ast::ModuleExportName) -> String {
    match name {
        ast::ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ast::ModuleExportName::Str(s) => s.value.to_string(),
    }
}

fn export_names(specifiers: &[ast::ExportSpecifier]) -> Result<Vec<ExportName>, &'static str> {
    specifiers
        .iter()
        .map(|s| match s {
            ast::ExportSpecifier::Named(n) => {
                let local = export_name(&n.orig);
                Ok(ExportName {
                    exported: n.exported.as_ref().map_or_else(|| local.clone(), export_name),
                    local,
                })
            }
            _ => Err("Unsupported export specifier"),
        })
        .collect()
}

/// Identifiers bound by a declaration pattern.
fn pat_names(pat: &ast::Pat, names: &mut Vec<String>) {
    match pat {
        ast::Pat::Ident(binding) => names.push(binding.id.sym.to_string()),
        ast::Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pat_names(elem, names);
            }
        }
        ast::Pat::Rest(rest) => pat_names(&rest.arg, names),
        ast::Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ast::ObjectPatProp::KeyValue(kv) => pat_names(&kv.value, names),
                    ast::ObjectPatProp::Assign(assign) => names.push(assign.key.sym.to_string()),
                    ast::ObjectPatProp::Rest(rest) => pat_names(&rest.arg, names),
                }
            }
        }
        ast::Pat::Assign(assign) => pat_names(&assign.left, names),
        _ => {}
    }
}
