//! SWC implementation of [`CompilerBackend`].
//!
//! With the `swc` feature (on by default) the source is parsed, stripped of
//! TypeScript syntax and re-emitted as ES module text. Without it a small set
//! of regex rewrites handles the common annotation forms found in config
//! files, and constructs that need real code generation are rejected.

#![allow(clippy::default_trait_access)]

use super::{is_typescript, CompilerBackend, CompilerError};
use std::path::Path;

/// SWC-based compiler backend.
#[derive(Debug, Clone, Default)]
pub struct SwcBackend {
    _private: (),
}

impl SwcBackend {
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl CompilerBackend for SwcBackend {
    fn name(&self) -> &'static str {
        "swc"
    }

    fn strip_types(&self, path: &Path, source: &str) -> Result<String, CompilerError> {
        if source.is_empty() || !is_typescript(path) {
            return Ok(source.to_string());
        }

        #[cfg(not(feature = "swc"))]
        {
            strip_simple_types(source)
        }

        #[cfg(feature = "swc")]
        {
            strip_with_swc(path, source)
        }
    }
}

/// Strip common TypeScript annotations with regular expressions.
///
/// Annotation types are limited to keywords and capitalized names so object
/// literal properties (`{ port: port }`) are left alone. Enums, namespaces,
/// `declare` and abstract classes emit or drop runtime code, so they fail
/// with `COMPILER_UNSUPPORTED_SYNTAX` instead of being passed through.
#[cfg(not(feature = "swc"))]
fn strip_simple_types(source: &str) -> Result<String, CompilerError> {
    const TYPE: &str = r"(?:string|number|boolean|any|unknown|void|never|object|[A-Z][\w.]*)(?:<[^<>()]*>)?(?:\s*\[\s*\])?";
    const UNSUPPORTED: [(&str, &str); 4] = [
        (r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+\w+", "enum"),
        (r"(?m)^[ \t]*(?:export\s+)?(?:declare\s+)?(?:namespace|module)\s+[\w.]+\s*\{", "namespace"),
        (r"(?m)^[ \t]*(?:export\s+)?declare\s+", "declare"),
        (r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?abstract\s+class\b", "abstract class"),
    ];
    for (pattern, what) in UNSUPPORTED {
        let Ok(re) = regex_lite::Regex::new(pattern) else {
            continue;
        };
        if let Some(m) = re.find(source) {
            let line = source[..m.start()].matches('\n').count() + 1;
            return Err(CompilerError::new(
                "COMPILER_UNSUPPORTED_SYNTAX",
                format!("TypeScript `{what}` on line {line} needs the `swc` feature"),
            ));
        }
    }

    let rewrites: [(String, &str); 11] = [
        // import type { A } from "x";
        (r"(?m)^[ \t]*import\s+type\s+[^;]+;[ \t]*\r?\n?".to_string(), ""),
        // import { type A, b } from "x";
        (r"([{,])\s*type\s+[\w$]+(?:\s+as\s+[\w$]+)?\s*,".to_string(), "$1"),
        // import { b, type A } from "x";
        (r",\s*type\s+[\w$]+(?:\s+as\s+[\w$]+)?\s*\}".to_string(), " }"),
        // export interface Foo { ... }
        (r"(?m)^(export\s+)?interface\s+\w+(\s+extends\s+[\w, ]+)?\s*\{[^}]*\}\s*".to_string(), ""),
        // export type Foo = ...;
        (r"(?m)^(export\s+)?type\s+\w+(<[^>]*>)?\s*=\s*[^;]+;\s*".to_string(), ""),
        // ): Type {  and  ): Type =>
        (format!(r"\)\s*:\s*{TYPE}\s*(\{{|=>)"), ") $1"),
        // const x: Type =
        (format!(r"\b(const|let|var)\s+(\w+)\s*:\s*{TYPE}\s*="), "$1 $2 ="),
        // (a: Type,  and  (a?: Type)
        (format!(r"([(,]\s*\w+)\??\s*:\s*{TYPE}\s*([,)])"), "$1$2"),
        // defineConfig<Foo>(
        (r"\b(\w+)<[\w\s,.\[\]|]+>\(".to_string(), "$1("),
        (r"\s+as\s+const\b".to_string(), ""),
        (r"\s+satisfies\s+[A-Z][\w.]*(<[^>;]*>)?".to_string(), ""),
    ];

    let mut result = source.to_string();
    for (pattern, replacement) in &rewrites {
        let Ok(re) = regex_lite::Regex::new(pattern) else {
            continue;
        };
        // Adjacent matches share a delimiter, so repeat until stable.
        loop {
            let next = re.replace_all(&result, *replacement);
            if next == result {
                break;
            }
            result = next.into_owned();
        }
    }
    Ok(result)
}

#[cfg(feature = "swc")]
fn strip_with_swc(path: &Path, source: &str) -> Result<String, CompilerError> {
    use super::Diagnostic;
    use swc_common::{
        comments::SingleThreadedComments, sync::Lrc, FileName, Globals, Mark, SourceMap, GLOBALS,
    };
    use swc_ecma_ast::{EsVersion, Program};
    use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
    use swc_ecma_parser::{lexer::Lexer, Parser, StringInput, Syntax, TsSyntax};
    use swc_ecma_transforms_base::{fixer::fixer, hygiene::hygiene, resolver};
    use swc_ecma_transforms_typescript::strip;
    use swc_ecma_visit::FoldWith;

    let cm: Lrc<SourceMap> = Default::default();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("svite.config.ts");
    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let is_tsx = path.extension().and_then(|e| e.to_str()) == Some("tsx");
    let syntax = Syntax::Typescript(TsSyntax {
        tsx: is_tsx,
        decorators: true,
        ..Default::default()
    });

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(syntax, EsVersion::EsNext, StringInput::from(&*fm), Some(&comments));
    let mut parser = Parser::new_from(lexer);

    let locate = |err: &swc_ecma_parser::error::Error| parse_diagnostic(&cm, path, err);

    let module = parser.parse_module().map_err(|e| {
        let diag = locate(&e);
        CompilerError::parse_error(format!("Failed to parse {}", path.display()))
            .with_diagnostics(vec![diag])
    })?;

    let recovered: Vec<Diagnostic> = parser.take_errors().iter().map(locate).collect();
    if !recovered.is_empty() {
        return Err(
            CompilerError::parse_error(format!("Failed to parse {}", path.display()))
                .with_diagnostics(recovered),
        );
    }

    let output = GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        let mut program = Program::Module(module);
        program = program.fold_with(&mut resolver(unresolved_mark, top_level_mark, true));
        program = program.fold_with(&mut strip(unresolved_mark, top_level_mark));
        program = program.fold_with(&mut hygiene());
        program.fold_with(&mut fixer(Some(&comments)))
    });
    let Program::Module(output) = output else {
        return Err(CompilerError::transform_error("Expected a module after stripping types"));
    };

    let mut buf = Vec::new();
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: swc_codegen_config(),
            cm: cm.clone(),
            comments: Some(&comments),
            wr: writer,
        };
        emitter
            .emit_module(&output)
            .map_err(|e| CompilerError::transform_error(format!("Failed to emit: {e}")))?;
    }

    String::from_utf8(buf)
        .map_err(|e| CompilerError::transform_error(format!("Invalid UTF-8 output: {e}")))
}

/// Locate a parser error in `cm` as a 1-indexed diagnostic.
#[cfg(feature = "swc")]
pub(super) fn parse_diagnostic(
    cm: &swc_common::SourceMap,
    path: &Path,
    err: &swc_ecma_parser::error::Error,
) -> super::Diagnostic {
    use swc_common::Spanned;

    let loc = cm.lookup_char_pos(err.span().lo);
    super::Diagnostic::error(format!("{:?}", err.kind())).with_location(
        path.to_path_buf(),
        loc.line as u32,
        loc.col_display as u32 + 1,
    )
}

#[cfg(feature = "swc")]
fn swc_codegen_config() -> swc_ecma_codegen::Config {
    swc_ecma_codegen::Config::default()
        .with_minify(false)
        .with_target(swc_ecma_ast::EsVersion::EsNext)
}
