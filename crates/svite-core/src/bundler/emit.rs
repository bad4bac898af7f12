//! Bundle emission.
//!
//! Every module becomes a function in a registry indexed by [`ModuleId`] and
//! runs on first `__svite_require`. Static `import`/`export` statements are
//! lowered to a one-line prelude at the top of the module body; the original
//! statements are blanked out so line numbers in the body stay put.
//!
//! In ES module output, a module with top-level `await` (or a static import of
//! such a module) gets an `async function` wrapper. Its importers await
//! `__svite_import`, which settles once the wrapper's promise does.

use super::analyze::{ExportDecl, ExportName, ImportBinding, ModuleAnalysis, SpecifierRef};
use super::graph::{Dependency, Module, ModuleGraph, ModuleId, ModuleKind};
use crate::format::ModuleFormat;
use crate::version::bundle_banner;
use std::fmt::Write;
use std::path::Path;

const RUNTIME: &str = r#"const __svite_modules = [];
const __svite_cache = [];
function __svite_require(id) {
  if (typeof id === "string") return __svite_host_require(id);
  const cached = __svite_cache[id];
  if (cached) return cached.exports;
  const module = { exports: {} };
  __svite_cache[id] = module;
  module.ready = __svite_modules[id].call(module.exports, module, module.exports, __svite_require);
  return module.exports;
}
function __svite_import(id) {
  __svite_require(id);
  const module = __svite_cache[id];
  return Promise.resolve(module.ready).then(function () { return module.exports; });
}
function __svite_namespace(mod) {
  return mod && mod.__esModule ? mod : Object.assign({}, mod, { default: mod });
}
function __svite_export(target, getters) {
  Object.keys(getters).forEach(function (name) {
    Object.defineProperty(target, name, { get: getters[name], enumerable: true, configurable: true });
  });
}
function __svite_export_star(target, source) {
  Object.keys(source).forEach(function (name) {
    if (name === "default" || name === "__esModule" || Object.prototype.hasOwnProperty.call(target, name)) return;
    Object.defineProperty(target, name, { get: function () { return source[name]; }, enumerable: true, configurable: true });
  });
}
"#;

/// Render `graph` as a single module in `format`.
#[must_use]
pub fn emit_bundle(graph: &ModuleGraph, format: ModuleFormat) -> String {
    let mut out = bundle_banner();
    out.push('\n');

    match format {
        ModuleFormat::Declarative => {
            let externals = graph.static_externals();
            for (i, spec) in externals.iter().enumerate() {
                let _ = writeln!(out, "import * as __svite_ext_{i} from {};", js_string(spec));
            }
            out.push_str("import { createRequire as __svite_create_require } from \"node:module\";\n");
            out.push_str("const __svite_host_require = __svite_create_require(import.meta.url);\n");
            let entries: Vec<String> = externals
                .iter()
                .enumerate()
                .map(|(i, spec)| format!("{}: __svite_ext_{i}", js_string(spec)))
                .collect();
            let _ = writeln!(out, "const __svite_externals = {{ {} }};", entries.join(", "));
            out.push_str("function __svite_external(id) { return __svite_externals[id]; }\n");
        }
        ModuleFormat::Legacy => {
            out.push_str("const __svite_host_require = require;\n");
            out.push_str(
                "function __svite_external(id) { return __svite_namespace(__svite_host_require(id)); }\n",
            );
        }
    }
    out.push_str(RUNTIME);

    let async_flags = async_modules(graph, format);
    for (id, module) in graph.iter() {
        out.push('\n');
        match module.kind {
            ModuleKind::Json => emit_json(&mut out, id, module),
            ModuleKind::Script => emit_script(&mut out, id, module, &async_flags),
        }
    }

    out.push('\n');
    match format {
        ModuleFormat::Declarative if async_flags.first().copied().unwrap_or(false) => {
            out.push_str("export default __svite_namespace(await __svite_import(0)).default;\n");
        }
        ModuleFormat::Declarative => {
            out.push_str("export default __svite_namespace(__svite_require(0)).default;\n");
        }
        ModuleFormat::Legacy => out.push_str("module.exports = __svite_require(0);\n"),
    }
    out
}

/// Which modules need an `async function` wrapper.
///
/// Always none for CommonJS output. Otherwise a module is async when it has
/// top-level `await` or statically imports an async module.
fn async_modules(graph: &ModuleGraph, format: ModuleFormat) -> Vec<bool> {
    let mut flags = vec![false; graph.len()];
    if !matches!(format, ModuleFormat::Declarative) {
        return flags;
    }
    for (id, module) in graph.iter() {
        flags[id] = module.analysis.top_level_await;
    }

    loop {
        let mut changed = false;
        for (id, module) in graph.iter() {
            if flags[id] {
                continue;
            }
            let imports_async = module_sources(&module.analysis).iter().any(|(_, spec, _)| {
                matches!(module.dependency(&spec.specifier), Some(Dependency::Local(dep)) if flags[*dep])
            });
            if imports_async {
                flags[id] = true;
                changed = true;
            }
        }
        if !changed {
            return flags;
        }
    }
}

fn emit_json(out: &mut String, id: ModuleId, module: &Module) {
    let _ = writeln!(out, "// {}", module.path.display());
    let _ = writeln!(
        out,
        "__svite_modules[{id}] = function (module) {{\nmodule.exports = {};\n}};",
        module.source.trim()
    );
}

fn emit_script(out: &mut String, id: ModuleId, module: &Module, async_flags: &[bool]) {
    let analysis = &module.analysis;
    let filename = module.path.to_string_lossy();
    let dirname = module
        .path
        .parent()
        .map_or_else(|| filename.to_string(), |p| p.to_string_lossy().to_string());

    let _ = writeln!(out, "// {filename}");
    let keyword = if async_flags[id] { "async function" } else { "function" };
    let _ = writeln!(out, "__svite_modules[{id}] = {keyword} (module, exports, require) {{");
    if analysis.has_module_syntax {
        out.push_str("\"use strict\";\n");
    }
    let _ = writeln!(
        out,
        "var __dirname = {}, __filename = {};",
        js_string(&dirname),
        js_string(&filename)
    );
    let _ = writeln!(
        out,
        "const __svite_import_meta = {{ url: {}, dirname: __dirname, filename: __filename }};",
        js_string(&file_url(&module.path))
    );
    if analysis.has_module_syntax {
        out.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
    }

    let _ = writeln!(out, "{{ {}", prelude(module, async_flags));
    out.push_str(&apply_edits(&module.source, edits(module)));
    out.push_str("\n}\n};\n");
}

/// Import bindings and export getters for the top of a module body.
fn prelude(module: &Module, async_flags: &[bool]) -> String {
    let analysis = &module.analysis;
    let mut getters: Vec<(String, String)> = Vec::new();
    let mut statements: Vec<String> = Vec::new();
    let mut stars: Vec<String> = Vec::new();

    for decl in &analysis.exports {
        match decl {
            ExportDecl::Declaration { names, .. } | ExportDecl::Local { names, .. } => {
                getters.extend(names.iter().map(|n| (n.exported.clone(), n.local.clone())));
            }
            _ => {}
        }
    }

    for (k, (_, spec, source)) in module_sources(analysis).into_iter().enumerate() {
        let binding = format!("__svite_import_{k}");
        let value = match module.dependency(&spec.specifier) {
            Some(Dependency::Local(dep)) if async_flags[*dep] => {
                format!("__svite_namespace(await __svite_import({dep}))")
            }
            _ => dependency_expr(module, &spec.specifier),
        };

        match source {
            ModuleSource::Import(bindings) if bindings.is_empty() => {
                statements.push(format!("{value};"));
            }
            ModuleSource::Import(bindings) => {
                statements.push(format!("const {binding} = {value};"));
                let mut named = Vec::new();
                for b in bindings {
                    match b {
                        ImportBinding::Default(local) => {
                            statements.push(format!("const {local} = {binding}.default;"));
                        }
                        ImportBinding::Namespace(local) => {
                            statements.push(format!("const {local} = {binding};"));
                        }
                        ImportBinding::Named { imported, local } => {
                            named.push(format!("{}: {local}", js_string(imported)));
                        }
                    }
                }
                if !named.is_empty() {
                    statements.push(format!("const {{ {} }} = {binding};", named.join(", ")));
                }
            }
            ModuleSource::ReExport(names) => {
                statements.push(format!("const {binding} = {value};"));
                for n in names {
                    getters.push((n.exported.clone(), format!("{binding}[{}]", js_string(&n.local))));
                }
            }
            ModuleSource::Star(Some(alias)) => {
                statements.push(format!("const {binding} = {value};"));
                getters.push((alias.clone(), binding));
            }
            ModuleSource::Star(None) => {
                statements.push(format!("const {binding} = {value};"));
                stars.push(format!("__svite_export_star(exports, {binding});"));
            }
        }
    }

    let mut parts = Vec::new();
    if !getters.is_empty() {
        let list: Vec<String> = getters
            .iter()
            .map(|(name, expr)| format!("{}: () => {expr}", js_string(name)))
            .collect();
        parts.push(format!("__svite_export(exports, {{ {} }});", list.join(", ")));
    }
    parts.extend(statements);
    parts.extend(stars);
    parts.join(" ")
}

enum ModuleSource<'a> {
    Import(&'a [ImportBinding]),
    ReExport(&'a [ExportName]),
    Star(Option<&'a String>),
}

/// Static imports and re-exports in source order.
fn module_sources(analysis: &ModuleAnalysis) -> Vec<(usize, &SpecifierRef, ModuleSource<'_>)> {
    let mut sources: Vec<(usize, &SpecifierRef, ModuleSource<'_>)> = analysis
        .imports
        .iter()
        .map(|i| (i.span.start, &i.source, ModuleSource::Import(&i.bindings)))
        .collect();
    for decl in &analysis.exports {
        match decl {
            ExportDecl::ReExport { span, source, names } => {
                sources.push((span.start, source, ModuleSource::ReExport(names)));
            }
            ExportDecl::Star { span, source, alias } => {
                sources.push((span.start, source, ModuleSource::Star(alias.as_ref())));
            }
            _ => {}
        }
    }
    sources.sort_by_key(|(start, _, _)| *start);
    sources
}

fn dependency_expr(module: &Module, specifier: &str) -> String {
    match module.dependency(specifier) {
        Some(Dependency::Local(id)) => format!("__svite_namespace(__svite_require({id}))"),
        Some(Dependency::External(spec)) => format!("__svite_external({})", js_string(spec)),
        None => format!("__svite_external({})", js_string(specifier)),
    }
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

fn edits(module: &Module) -> Vec<Edit> {
    let analysis = &module.analysis;
    let src = &module.source;
    let blank = |start: usize, end: usize| Edit {
        start,
        end,
        text: src[start..end].chars().filter(|&c| c == '\n').collect(),
    };

    let mut edits: Vec<Edit> = Vec::new();
    if src.starts_with("#!") {
        edits.push(blank(0, src.find('\n').unwrap_or(src.len())));
    }
    for decl in &analysis.imports {
        edits.push(blank(decl.span.start, decl.span.end));
    }
    for decl in &analysis.exports {
        match decl {
            ExportDecl::DefaultExpr { keyword } => edits.push(Edit {
                start: keyword.start,
                end: keyword.end,
                text: "exports.default =".to_string(),
            }),
            ExportDecl::Declaration { keyword, .. } => edits.push(blank(keyword.start, keyword.end)),
            ExportDecl::Local { span, .. }
            | ExportDecl::ReExport { span, .. }
            | ExportDecl::Star { span, .. } => edits.push(blank(span.start, span.end)),
        }
    }
    for req in &analysis.requires {
        if let Some(Dependency::Local(id)) = module.dependency(&req.specifier) {
            edits.push(Edit {
                start: req.span.start,
                end: req.span.end,
                text: id.to_string(),
            });
        }
    }
    for dynamic in &analysis.dynamic_imports {
        let local = dynamic
            .source
            .as_ref()
            .and_then(|s| module.dependency(&s.specifier));
        if let Some(Dependency::Local(id)) = local {
            edits.push(Edit {
                start: dynamic.span.start,
                end: dynamic.span.end,
                text: format!("__svite_import({id}).then(__svite_namespace)"),
            });
        }
    }
    for span in &analysis.import_meta {
        edits.push(Edit {
            start: span.start,
            end: span.end,
            text: "__svite_import_meta".to_string(),
        });
    }
    edits
}

/// Apply non-overlapping edits; an edit starting inside an earlier one is dropped.
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| e.start);
    let mut out = String::with_capacity(source.len());
    let mut pos = 0;
    for edit in edits {
        if edit.start < pos {
            continue;
        }
        out.push_str(&source[pos..edit.start]);
        out.push_str(&edit.text);
        pos = edit.end;
    }
    out.push_str(&source[pos..]);
    out
}

/// A double-quoted JavaScript string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map_or_else(|()| format!("file://{}", path.display()), |u| u.to_string())
}
