//! The compilation driver: load, transform, emit.

use std::path::Path;

use crate::{
    ast::Program,
    error::{CompileError, CompileResult},
    loader::{FsReader, MapReader, SourceReader, load_program},
    passes, writer,
};

/// Compiles the program rooted at `input_path` and writes the result to
/// `output_path`.
pub fn compile_file(input_path: &str, output_path: &str) -> CompileResult<()> {
    check_output_writeable(output_path)?;

    let code = compile_with_reader(input_path, &FsReader)?;

    std::fs::write(output_path, code)
        .map_err(|err| CompileError::bare(format!("Failed to write file \"{output_path}\": {err}")))
}

/// Compiles in-memory sources; `files[0]` should name the root. Used by the
/// test harnesses and embedding callers.
pub fn compile_sources(root: &str, files: &[(&str, &str)]) -> CompileResult<String> {
    compile_with_reader(root, &MapReader { files })
}

fn compile_with_reader(root: &str, reader: &dyn SourceReader) -> CompileResult<String> {
    let mut program = load_program(root, reader)?;
    passes::run_all(&mut program)?;
    Ok(writer::write_program(&program))
}

/// Loads and parses without transforming, then renders the tree; the CLI's
/// `--dump-ast`.
pub fn dump_file(input_path: &str) -> CompileResult<String> {
    let program: Program = load_program(input_path, &FsReader)?;
    Ok(crate::printer::print_program(&program))
}

fn check_output_writeable(path: &str) -> CompileResult<()> {
    let path_ref = Path::new(path);
    if path_ref.exists() && path_ref.is_dir() {
        return Err(CompileError::bare(format!(
            "Failed to write file \"{path}\": Path is not a regular file"
        )));
    }
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(CompileError::bare(format!(
            "Failed to write file \"{path}\": No such directory"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_plugin() {
        let files = [(
            "main.cres",
            "desc [description: \"Test\"];\n@sample { jsfx.spl0 = jsfx.spl0 * 0.5; }",
        )];
        let output = compile_sources("main.cres", &files).unwrap();
        assert!(output.contains("desc:Test"));
        assert!(output.contains("@sample"));
        assert!(output.contains("spl0"));
    }

    #[test]
    fn propagates_resolver_errors() {
        let files = [("main.cres", "@init { int x = unknown_name; }")];
        let err = compile_sources("main.cres", &files).unwrap_err();
        assert_eq!(err.rendered_message(), "Unknown identifier \"unknown_name\"");
    }
}
