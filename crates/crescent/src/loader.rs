//! Module loading: walks the import graph from the root file, parses every
//! file once, attaches the built-in modules, rejects cycles and duplicate
//! module names, and produces the topologically ordered [`Program`].

use std::path::{Path, PathBuf};

use crate::{
    ast::{Decls, ImportStmt, Module, Modifiers, Program, Stmt},
    error::{CompileError, CompileResult},
    modules::{BUILT_IN_MODULES, builtin_source},
    parse, scanner,
};

/// Where module source text comes from. The compiler reads the real file
/// system; tests substitute an in-memory map.
pub trait SourceReader {
    /// Resolves `path` (relative to the directory of `importer`, when given)
    /// into the identity used to detect that two imports name the same file.
    fn resolve(&self, path: &str, importer: Option<&str>) -> Result<String, String>;

    /// Reads the source text of a resolved path.
    fn read(&self, resolved: &str) -> Result<String, String>;
}

/// Reads modules from the file system; identity is the canonical path.
pub struct FsReader;

impl SourceReader for FsReader {
    fn resolve(&self, path: &str, importer: Option<&str>) -> Result<String, String> {
        let joined: PathBuf = match importer {
            Some(importer) => Path::new(importer)
                .parent()
                .map_or_else(|| PathBuf::from(path), |dir| dir.join(path)),
            None => PathBuf::from(path),
        };
        match std::fs::canonicalize(&joined) {
            Ok(canonical) => {
                if canonical.is_file() {
                    Ok(canonical.to_string_lossy().into_owned())
                } else {
                    Err(format!("Failed to read file \"{path}\": Path is not a regular file"))
                }
            }
            Err(err) => Err(format!("Failed to read file \"{path}\": {err}")),
        }
    }

    fn read(&self, resolved: &str) -> Result<String, String> {
        std::fs::read_to_string(resolved).map_err(|err| format!("Failed to read file \"{resolved}\": {err}"))
    }
}

/// In-memory sources keyed by path, for tests and embedded use.
pub struct MapReader<'a> {
    pub files: &'a [(&'a str, &'a str)],
}

impl SourceReader for MapReader<'_> {
    fn resolve(&self, path: &str, _importer: Option<&str>) -> Result<String, String> {
        if self.files.iter().any(|(name, _)| *name == path) {
            Ok(path.to_owned())
        } else {
            Err(format!("Failed to read file \"{path}\""))
        }
    }

    fn read(&self, resolved: &str) -> Result<String, String> {
        self.files
            .iter()
            .find(|(name, _)| *name == resolved)
            .map(|(_, source)| (*source).to_owned())
            .ok_or_else(|| format!("Failed to read file \"{resolved}\""))
    }
}

struct Node {
    path: String,
    name: String,
    stmts: Vec<Stmt>,
    deps: Vec<usize>,
    builtin: bool,
    emitted: bool,
}

struct Loader<'a> {
    reader: &'a dyn SourceReader,
    nodes: Vec<Node>,
    decls: Decls,
}

/// Loads the program rooted at `input_path`.
pub fn load_program(input_path: &str, reader: &dyn SourceReader) -> CompileResult<Program> {
    let mut loader = Loader {
        reader,
        nodes: Vec::new(),
        decls: Decls::default(),
    };

    loader.load_module(input_path, 0, None)?;

    // DFS post-order: leaves first, so every module follows its imports
    let mut order = Vec::new();
    for index in 0..loader.nodes.len() {
        loader.emit(index, &mut order);
    }

    let mut modules = Vec::with_capacity(order.len());
    for index in order {
        let node = &mut loader.nodes[index];
        modules.push(Module {
            path: std::mem::take(&mut node.path),
            name: std::mem::take(&mut node.name),
            stmts: std::mem::take(&mut node.stmts),
        });
    }

    Ok(Program {
        modules,
        decls: loader.decls,
        assigns: Vec::new(),
        next_section: 0,
    })
}

impl Loader<'_> {
    fn emit(&mut self, index: usize, order: &mut Vec<usize>) {
        if self.nodes[index].emitted {
            return;
        }
        self.nodes[index].emitted = true;

        let deps = self.nodes[index].deps.clone();
        for dep in deps {
            self.emit(dep, order);
        }
        order.push(index);
    }

    fn ensure_builtin(&mut self, name: &str) -> CompileResult<usize> {
        if let Some(index) = self
            .nodes
            .iter()
            .position(|node| node.builtin && node.name == name)
        {
            return Ok(index);
        }

        let source = builtin_source(name).expect("unknown built-in module");
        let tokens = scanner::scan(name, source)?;
        let stmts = parse::parse(name, &tokens, &mut self.decls)?;

        self.nodes.push(Node {
            path: name.to_owned(),
            name: name.to_owned(),
            stmts,
            deps: Vec::new(),
            builtin: true,
            emitted: false,
        });
        Ok(self.nodes.len() - 1)
    }

    fn check_name_conflict(&self, name: &str, line: u32, file: &str) -> CompileResult<()> {
        if self.nodes.iter().any(|node| node.name == name) {
            return Err(CompileError::new(
                format!("Module \"{name}\" is already defined"),
                line,
                file,
            ));
        }
        Ok(())
    }

    fn reaches(&self, from: usize, target: usize) -> bool {
        self.nodes[from]
            .deps
            .iter()
            .any(|&dep| dep == target || self.reaches(dep, target))
    }

    fn load_module(&mut self, path: &str, import_line: u32, importer: Option<&str>) -> CompileResult<usize> {
        let importer_file = importer.unwrap_or("");

        let resolved = self
            .reader
            .resolve(path, importer)
            .map_err(|message| CompileError::new(message, import_line, importer_file))?;

        if let Some(index) = self
            .nodes
            .iter()
            .position(|node| !node.builtin && node.path == resolved)
        {
            return Ok(index);
        }

        let source = self
            .reader
            .read(&resolved)
            .map_err(|message| CompileError::new(message, import_line, importer_file))?;

        let name = module_name(&resolved);

        let tokens = scanner::scan(&resolved, &source)?;
        let mut stmts = parse::parse(&resolved, &tokens, &mut self.decls)?;

        // every user module implicitly imports every built-in
        let mut deps = Vec::with_capacity(BUILT_IN_MODULES.len());
        for (builtin, _) in BUILT_IN_MODULES {
            deps.push(self.ensure_builtin(builtin)?);
        }
        self.check_name_conflict(&name, import_line, importer_file)?;
        for (offset, (builtin, _)) in BUILT_IN_MODULES.iter().enumerate() {
            stmts.insert(
                offset,
                Stmt::Import(ImportStmt {
                    line: 0,
                    path: (*builtin).to_owned(),
                    module_name: (*builtin).to_owned(),
                    modifiers: Modifiers {
                        public_specified: true,
                        public_value: true,
                        external_specified: false,
                        external_value: false,
                    },
                    builtin: true,
                }),
            );
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            path: resolved.clone(),
            name,
            stmts,
            deps,
            builtin: false,
            emitted: false,
        });

        // imports must precede everything else; collect them first so the
        // node's statement list is free to borrow during recursion
        let mut imports = Vec::new();
        for stmt in &self.nodes[index].stmts {
            match stmt {
                Stmt::Modifier(_) => {}
                Stmt::Import(import) if import.builtin => {}
                Stmt::Import(import) => imports.push((import.path.clone(), import.line)),
                _ => break,
            }
        }

        for (import_path, line) in imports {
            if import_path.is_empty() {
                return Err(CompileError::new(
                    "Empty import statements are not allowed",
                    line,
                    &resolved,
                ));
            }

            let imported = self.load_module(&import_path, line, Some(&resolved))?;
            let imported_name = self.nodes[imported].name.clone();

            // patch the import with the module it resolved to
            for stmt in &mut self.nodes[index].stmts {
                if let Stmt::Import(import) = stmt
                    && !import.builtin
                    && import.path == import_path
                {
                    import.module_name.clone_from(&imported_name);
                }
            }

            self.nodes[index].deps.push(imported);
            if imported == index || self.reaches(imported, index) {
                return Err(CompileError::new("Circular dependency detected", line, &resolved));
            }
        }

        Ok(index)
    }
}

fn module_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map_or_else(|| path.to_owned(), |stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_single_module_with_builtins_first() {
        let files = [("main.cres", "@init { x = 1; }")];
        let program = load_program("main.cres", &MapReader { files: &files }).unwrap();

        assert_eq!(program.modules.last().unwrap().name, "main");
        assert_eq!(program.modules.len(), BUILT_IN_MODULES.len() + 1);
        // the root's statement list leads with the implicit imports
        let main = program.modules.last().unwrap();
        assert!(matches!(&main.stmts[0], Stmt::Import(i) if i.builtin && i.module_name == "jsfx"));
    }

    #[test]
    fn orders_imports_before_importers() {
        let files = [
            ("main.cres", "import \"util.cres\";\n@init { x = 1; }"),
            ("util.cres", "public int helper() { return 1; }"),
        ];
        let program = load_program("main.cres", &MapReader { files: &files }).unwrap();

        let names: Vec<&str> = program.modules.iter().map(|m| m.name.as_str()).collect();
        let util = names.iter().position(|n| *n == "util").unwrap();
        let main = names.iter().position(|n| *n == "main").unwrap();
        assert!(util < main);
    }

    #[test]
    fn detects_circular_imports() {
        let files = [
            ("m1.cres", "import \"m2.cres\";"),
            ("m2.cres", "import \"m1.cres\";"),
        ];
        let err = load_program("m1.cres", &MapReader { files: &files }).unwrap_err();
        assert_eq!(err.rendered_message(), "Circular dependency detected");
    }

    #[test]
    fn rejects_module_name_conflicts_with_builtins() {
        let files = [
            ("main.cres", "import \"math.cres\";"),
            ("math.cres", "public int helper() { return 1; }"),
        ];
        let err = load_program("main.cres", &MapReader { files: &files }).unwrap_err();
        assert_eq!(err.rendered_message(), "Module \"math\" is already defined");
    }

    #[test]
    fn rejects_empty_import() {
        let files = [("main.cres", "import \"\";")];
        let err = load_program("main.cres", &MapReader { files: &files }).unwrap_err();
        assert_eq!(err.rendered_message(), "Empty import statements are not allowed");
    }

    #[test]
    fn missing_file_is_reported() {
        let files = [("main.cres", "import \"missing.cres\";")];
        let err = load_program("main.cres", &MapReader { files: &files }).unwrap_err();
        assert!(err.rendered_message().starts_with("Failed to read file"));
    }

    #[test]
    fn shared_file_is_parsed_once() {
        let files = [
            ("main.cres", "import \"a.cres\";\nimport \"b.cres\";"),
            ("a.cres", "import \"shared.cres\";"),
            ("b.cres", "import \"shared.cres\";"),
            ("shared.cres", "public int helper() { return 1; }"),
        ];
        let program = load_program("main.cres", &MapReader { files: &files }).unwrap();
        let shared_count = program.modules.iter().filter(|m| m.name == "shared").count();
        assert_eq!(shared_count, 1);
    }
}
