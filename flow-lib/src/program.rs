use rustc_hash::FxHashMap;
use utils::DiagnosticEmitter;

use crate::{
    ast::{Ast, ModuleId, NodeId},
    lexer::Lexer,
    parser::Parser,
    scope::Scopes,
};

const EXTENSIONS: [&str; 6] = [".js", ".mjs", ".cjs", ".jsx", ".ts", ".tsx"];

/// Normalizes a module path: forward slashes, no `.` or `..` segments and no
/// source file extension. `src/./db.js` and `src/lib/../db` both become
/// `src/db`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            _ => segments.push(segment),
        }
    }
    let mut result = segments.join("/");
    if let Some(ext) = EXTENSIONS.iter().find(|ext| result.ends_with(*ext)) {
        result.truncate(result.len() - ext.len());
    }
    result
}

/// A set of parsed modules sharing one syntax tree arena, together with
/// their symbol tables. Immutable once built.
#[derive(Debug)]
pub struct Program {
    ast: Ast,
    scopes: Scopes,
    paths: FxHashMap<String, ModuleId>,
}

impl Program {
    /// Parses every `(path, source)` pair as a module. All the modules are
    /// parsed even if some of them fail so every error gets reported.
    pub fn build(sources: &[(&str, &str)], diag: &mut DiagnosticEmitter) -> Option<Self> {
        let mut ast = Ast::new();
        let mut paths = FxHashMap::default();
        let mut failed = false;
        for &(path, source) in sources {
            let identifiers = core::mem::take(&mut ast.identifiers);
            let lexed = Lexer::with_identifiers(source, identifiers, diag).lex_all();
            if lexed.tokens.is_empty() {
                ast.identifiers = lexed.identifiers;
                failed = true;
                continue;
            }
            let parser = Parser::new(lexed, &mut ast, diag);
            match parser.parse_module(path, source) {
                Some(module) => {
                    paths.insert(normalize_path(path), module);
                }
                None => failed = true,
            }
        }
        if failed {
            return None;
        }

        let scopes = Scopes::build(&ast, |from, specifier| {
            resolve_specifier(&ast, &paths, from, specifier)
        });
        Some(Self { ast, scopes, paths })
    }

    /// A program made of a single module.
    pub fn parse(source: &str, diag: &mut DiagnosticEmitter) -> Option<Self> {
        Self::build(&[("main.js", source)], diag)
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn module_by_path(&self, path: &str) -> Option<ModuleId> {
        self.paths.get(&normalize_path(path)).copied()
    }

    /// The loaded module an import specifier of `from` refers to. Package
    /// names never resolve.
    pub fn resolve_module(&self, from: ModuleId, specifier: &str) -> Option<ModuleId> {
        resolve_specifier(&self.ast, &self.paths, from, specifier)
    }

    pub fn root(&self, module: ModuleId) -> NodeId {
        self.ast.module(module).root
    }
}

fn resolve_specifier(
    ast: &Ast,
    paths: &FxHashMap<String, ModuleId>,
    from: ModuleId,
    specifier: &str,
) -> Option<ModuleId> {
    if !(specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/'))
    {
        return None;
    }
    let joined = if specifier.starts_with('/') {
        specifier.to_owned()
    } else {
        let importer = ast.module(from).path.replace('\\', "/");
        let dir = importer.rsplit_once('/').map_or("", |(dir, _)| dir);
        format!("{dir}/{specifier}")
    };
    let normalized = normalize_path(&joined);
    paths
        .get(&normalized)
        .or_else(|| paths.get(&format!("{normalized}/index")))
        .copied()
}
