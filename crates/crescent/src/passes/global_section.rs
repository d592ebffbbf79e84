//! Moves module-level declarations into a synthesized `@init` section.
//!
//! After this pass every remaining top-level statement is an import, input,
//! desc, or section, so the use-analysis passes and the writer only ever
//! walk section bodies. Section identities used by the dependency walk are
//! assigned here, for synthesized and written sections alike.

use crate::ast::{Block, Program, SectionKind, SectionStmt, Stmt};

pub fn run(program: &mut Program) {
    for module_index in 0..program.modules.len() {
        let mut stmts = std::mem::take(&mut program.modules[module_index].stmts);

        let mut moved = Vec::new();
        let mut insert_at = None;
        for (index, stmt) in stmts.iter_mut().enumerate() {
            match stmt {
                Stmt::VarDecl(_) | Stmt::FuncDecl(_) | Stmt::Block(_) => {
                    if insert_at.is_none() {
                        insert_at = Some(index);
                    }
                    moved.push(stmt.take());
                }
                Stmt::Section(section) => {
                    if section.id.is_none() {
                        section.id = Some(program.alloc_section_id());
                    }
                }
                _ => {}
            }
        }

        if let Some(index) = insert_at {
            let section = SectionStmt {
                line: 0,
                kind: SectionKind::Init,
                block: Block { line: 0, stmts: moved },
                properties: None,
                width: None,
                height: None,
                id: Some(program.alloc_section_id()),
            };
            stmts[index] = Stmt::Section(Box::new(section));
        }

        program.modules[module_index].stmts = stmts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Module, VarDecl};
    use crate::types::{Primitive, TypeRef};

    #[test]
    fn declarations_move_into_an_init_section() {
        let mut program = Program::default();
        let var = program
            .decls
            .alloc_var(VarDecl::new("a".into(), TypeRef::primitive(Primitive::Int, 1), 1));
        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![
                Stmt::VarDecl(var),
                Stmt::Section(Box::new(SectionStmt {
                    line: 2,
                    kind: SectionKind::Block,
                    block: Block::default(),
                    properties: None,
                    width: None,
                    height: None,
                    id: None,
                })),
            ],
        });

        run(&mut program);

        let stmts = &program.modules[0].stmts;
        let Stmt::Section(init) = &stmts[0] else {
            panic!("expected synthesized init section, got {:?}", stmts[0])
        };
        assert_eq!(init.kind, SectionKind::Init);
        assert!(init.id.is_some());
        assert!(matches!(init.block.stmts[0], Stmt::VarDecl(_)));

        let Stmt::Section(existing) = &stmts[1] else { panic!() };
        assert!(existing.id.is_some());
        assert_ne!(existing.id, init.id);
    }

    #[test]
    fn module_with_only_sections_is_untouched() {
        let mut program = Program::default();
        program.modules.push(Module {
            path: "test.cres".into(),
            name: "test".into(),
            stmts: vec![],
        });
        run(&mut program);
        assert!(program.modules[0].stmts.is_empty());
    }
}
