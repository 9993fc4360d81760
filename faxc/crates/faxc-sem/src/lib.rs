//! Semantic analysis over the parsed AST, ahead of IR construction.
//!
//! This language resolves variables dynamically: a name reference is a
//! property lookup walking the live scope-object prototype chain at
//! execution time (`faxc-vm`'s `ACCESS_STRING_KEY`/`ASSIGN_STRING_KEY`),
//! never a statically assigned local slot. So this crate's job is not
//! classical name binding — it is the checks that genuinely can (and per
//! spec's error taxonomy, must) be caught before a function ever runs:
//! break/continue targeting a real enclosing loop, and assignment not
//! targeting a `const` binding. [`scope::ScopeTree`] mirrors the runtime
//! scope-object nesting (function/block/loop ribs) purely to answer those
//! two questions; the VM never consults it.

pub mod scope;

use faxc_par::ast::*;
use faxc_util::{DefIdGenerator, Symbol};

use scope::{RibKind, ScopeTree};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SemError {
    #[error("break outside of any loop at line {line}")]
    BreakOutsideLoop { line: u32 },
    #[error("continue outside of any loop at line {line}")]
    ContinueOutsideLoop { line: u32 },
    #[error("label '{label}' not found for break/continue at line {line}")]
    UnresolvedLabel { label: String, line: u32 },
    #[error("cannot assign to const binding '{name}' at line {line}")]
    AssignToConst { name: String, line: u32 },
}

pub type Result<T> = std::result::Result<T, SemError>;

/// Walks `program`, validating loop-label targeting and const-reassignment.
/// Returns `Ok(())` if the program may proceed to IR construction.
pub fn analyze(program: &Program) -> Result<()> {
    let mut analyzer = Analyzer {
        scopes: ScopeTree::new(),
        defs: DefIdGenerator::new(),
        const_set: faxc_util::FxHashSet::default(),
    };
    analyzer.analyze_block(program)?;
    Ok(())
}

struct Analyzer {
    scopes: ScopeTree,
    defs: DefIdGenerator,
    const_set: faxc_util::FxHashSet<Symbol>,
}

impl Analyzer {
    fn analyze_block(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.analyze_stmt(stmt)?;
        }
        Ok(())
    }

    fn declare(&mut self, name: Symbol, is_const: bool) {
        let def_id = self.defs.next();
        self.scopes.add_binding(name, def_id);
        if is_const {
            self.const_names_mut().insert(name);
        }
    }

    /// Kept separate from `ScopeTree` so `scope.rs` stays a reusable,
    /// const-agnostic binder; shadowing across scopes is fine since we
    /// only ever check membership, never remove on scope exit.
    fn const_names_mut(&mut self) -> &mut faxc_util::FxHashSet<Symbol> {
        &mut self.const_set
    }

    fn analyze_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl { kind, name, init, .. } => {
                if let Some(init) = init {
                    self.analyze_expr(init)?;
                }
                self.declare(*name, matches!(kind, DeclKind::Const));
                Ok(())
            }
            Stmt::Expr(expr) => self.analyze_expr(expr),
            Stmt::If { cond, then_branch, else_branch } => {
                self.analyze_expr(cond)?;
                self.scopes.enter_scope(RibKind::Block);
                self.analyze_block(then_branch)?;
                self.scopes.exit_scope();
                if let Some(else_branch) = else_branch {
                    self.scopes.enter_scope(RibKind::Block);
                    self.analyze_block(else_branch)?;
                    self.scopes.exit_scope();
                }
                Ok(())
            }
            Stmt::While { label, cond, body } => {
                self.analyze_expr(cond)?;
                self.scopes.enter_scope(RibKind::Loop(*label));
                self.analyze_block(body)?;
                self.scopes.exit_scope();
                Ok(())
            }
            Stmt::For { label, init, cond, step, body } => {
                self.scopes.enter_scope(RibKind::Block);
                if let Some(init) = init {
                    self.analyze_stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.analyze_expr(cond)?;
                }
                if let Some(step) = step {
                    self.analyze_expr(step)?;
                }
                self.scopes.enter_scope(RibKind::Loop(*label));
                self.analyze_block(body)?;
                self.scopes.exit_scope();
                self.scopes.exit_scope();
                Ok(())
            }
            Stmt::ForIn { label, key, value, iter, body } => {
                self.analyze_expr(iter)?;
                self.scopes.enter_scope(RibKind::Block);
                if let Some(key) = key {
                    self.declare(*key, false);
                }
                self.declare(*value, false);
                self.scopes.enter_scope(RibKind::Loop(*label));
                self.analyze_block(body)?;
                self.scopes.exit_scope();
                self.scopes.exit_scope();
                Ok(())
            }
            Stmt::Break { label, span } => {
                if self.scopes.find_loop(*label).is_none() {
                    return Err(match label {
                        Some(l) => SemError::UnresolvedLabel { label: l.as_str().to_string(), line: span.line },
                        None => SemError::BreakOutsideLoop { line: span.line },
                    });
                }
                Ok(())
            }
            Stmt::Continue { label, span } => {
                if self.scopes.find_loop(*label).is_none() {
                    return Err(match label {
                        Some(l) => SemError::UnresolvedLabel { label: l.as_str().to_string(), line: span.line },
                        None => SemError::ContinueOutsideLoop { line: span.line },
                    });
                }
                Ok(())
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.analyze_expr(value)?;
                }
                Ok(())
            }
        }
    }

    fn analyze_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Null(_)
            | Expr::Bool(..)
            | Expr::Int(..)
            | Expr::Float(..)
            | Expr::Str(..)
            | Expr::Ident(..)
            | Expr::This(_) => Ok(()),
            Expr::Array(elems, _) => {
                for e in elems {
                    self.analyze_expr(e)?;
                }
                Ok(())
            }
            Expr::Object(fields, _) => self.analyze_fields(fields),
            Expr::New { proto, body, .. } => {
                self.analyze_expr(proto)?;
                self.analyze_fields(body)
            }
            Expr::Function(lit) => {
                self.scopes.enter_scope(RibKind::Function);
                for p in &lit.params {
                    self.declare(*p, false);
                }
                self.analyze_block(&lit.body)?;
                self.scopes.exit_scope();
                Ok(())
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.analyze_expr(left)?;
                self.analyze_expr(right)
            }
            Expr::Unary { expr, .. } => self.analyze_expr(expr),
            Expr::In { key, obj, .. } => {
                self.analyze_expr(key)?;
                self.analyze_expr(obj)
            }
            Expr::InstanceOf { value, proto, .. } => {
                self.analyze_expr(value)?;
                self.analyze_expr(proto)
            }
            Expr::Assign { target, value, span } => {
                self.analyze_expr(value)?;
                if let Expr::Ident(name, _) = target.as_ref() {
                    if self.const_set.contains(name) && self.scopes.resolve(*name).is_some() {
                        return Err(SemError::AssignToConst { name: name.as_str().to_string(), line: span.line });
                    }
                }
                self.analyze_expr(target)
            }
            Expr::Call { callee, args, .. } => {
                self.analyze_expr(callee)?;
                for a in args {
                    self.analyze_expr(a)?;
                }
                Ok(())
            }
            Expr::Index { obj, index, .. } => {
                self.analyze_expr(obj)?;
                self.analyze_expr(index)
            }
            Expr::Field { obj, .. } => self.analyze_expr(obj),
        }
    }

    fn analyze_fields(&mut self, fields: &[ObjectField]) -> Result<()> {
        for field in fields {
            if let Some(c) = &field.constraint {
                self.analyze_expr(c)?;
            }
            self.analyze_expr(&field.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod edge_cases {
    use super::*;

    fn check(src: &str) -> Result<()> {
        let program = faxc_par::parse(src).expect("parses");
        analyze(&program)
    }

    #[test]
    fn plain_loop_break_is_fine() {
        assert!(check("while (true) { break; }").is_ok());
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert_eq!(check("break;"), Err(SemError::BreakOutsideLoop { line: 1 }));
    }

    #[test]
    fn continue_outside_loop_is_rejected() {
        assert_eq!(check("continue;"), Err(SemError::ContinueOutsideLoop { line: 1 }));
    }

    #[test]
    fn labeled_break_finds_matching_outer_loop() {
        assert!(check("outer: while (true) { while (true) { break outer; } }").is_ok());
    }

    #[test]
    fn labeled_break_with_unknown_label_is_rejected() {
        let err = check("while (true) { break nope; }").unwrap_err();
        assert!(matches!(err, SemError::UnresolvedLabel { .. }));
    }

    #[test]
    fn for_in_loop_binds_key_and_value() {
        assert!(check("for (var k, v in obj) { print(k); print(v); }").is_ok());
    }

    #[test]
    fn assigning_to_const_is_rejected() {
        let err = check("const x = 1; x = 2;").unwrap_err();
        assert!(matches!(err, SemError::AssignToConst { .. }));
    }

    #[test]
    fn reassigning_var_is_fine() {
        assert!(check("var x = 1; x = 2;").is_ok());
    }

    #[test]
    fn nested_function_has_its_own_loop_scope() {
        // break inside the nested function must not see the outer loop.
        let err = check("while (true) { var f = function() { break; }; }").unwrap_err();
        assert!(matches!(err, SemError::BreakOutsideLoop { .. }));
    }
}
