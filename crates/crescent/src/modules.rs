//! The built-in modules embedded in the compiler.
//!
//! Each entry is an ordinary source file compiled into the binary; the
//! module loader parses each at most once per compilation and prepends an
//! implicit import of every one of them to every user module. The order
//! here is the order the implicit imports appear in.

/// Name and source of every built-in module.
pub const BUILT_IN_MODULES: &[(&str, &str)] = &[
    ("jsfx", include_str!("modules/jsfx.cres")),
    ("math", include_str!("modules/math.cres")),
    ("str", include_str!("modules/str.cres")),
    ("gfx", include_str!("modules/gfx.cres")),
    ("time", include_str!("modules/time.cres")),
    ("file", include_str!("modules/file.cres")),
    ("mem", include_str!("modules/mem.cres")),
    ("stack", include_str!("modules/stack.cres")),
    ("atomic", include_str!("modules/atomic.cres")),
    ("slider", include_str!("modules/slider.cres")),
    ("midi", include_str!("modules/midi.cres")),
    ("pin_mapper", include_str!("modules/pin_mapper.cres")),
];

/// Looks up the embedded source of a built-in module.
pub fn builtin_source(name: &str) -> Option<&'static str> {
    BUILT_IN_MODULES
        .iter()
        .find(|(module, _)| *module == name)
        .map(|(_, source)| *source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_scan_and_parse() {
        for (name, source) in BUILT_IN_MODULES {
            let tokens = crate::scanner::scan(name, source)
                .unwrap_or_else(|err| panic!("builtin {name} failed to scan: {err}"));
            let mut decls = crate::ast::Decls::default();
            crate::parse::parse(name, &tokens, &mut decls)
                .unwrap_or_else(|err| panic!("builtin {name} failed to parse: {err}"));
        }
    }

    #[test]
    fn lookup_finds_every_module() {
        for name in [
            "jsfx", "math", "str", "gfx", "time", "file", "mem", "stack", "atomic", "slider", "midi", "pin_mapper",
        ] {
            assert!(builtin_source(name).is_some(), "missing builtin {name}");
        }
        assert!(builtin_source("mouse").is_none());
    }
}
