//! AST → SSA IR lowering.
//!
//! There is no notion of a static local slot: every `var`/`const` declares a
//! fresh child scope object (parent = the previous scope), bare identifiers
//! are ACCESS/ASSIGN_EXISTING against the live scope chain, `obj.x` is
//! ASSIGN_SHADOWING, and `obj[i]` is plain ASSIGN. Declaring `var` allocates
//! its scope object *before* lowering the initializer, so a closure created
//! by the initializer captures the not-yet-populated scope and can still see
//! itself once the assignment lands (`var f = function() { f(); };`).
//! Lexical blocks (`if`/`while`/`for` bodies) don't open a scope themselves —
//! only declarations do — so the builder's notion of "current scope" is
//! simply saved and restored around each block, mirroring how a block
//! forgets every `var` it introduced once control leaves it.

use faxc_par::ast::{self, BinOp, DeclKind, Expr, FunctionLit, LogicalOp, Program, Stmt, UnOp};
use faxc_util::{index_vec::IndexVec, Symbol};
use fgc::Value;

use crate::builder::{Builder, NULL_SLOT, SCOPE_SLOT};
use crate::mir::{Arg, BlockId, CompiledModule, SetMode, SlotId, UserFunctionId};

/// Lowers a whole parsed module into a [`CompiledModule`]: the module body
/// becomes the entry function (arity 0, context = the caller-supplied root
/// scope in slot 1), and every function/method literal reached while
/// lowering it is collected alongside, addressable by the `UserFunctionId`s
/// embedded in `AllocClosureObject` instructions.
pub fn lower_program(program: &Program) -> CompiledModule {
    let mut functions = IndexVec::new();
    let entry = lower_module_body(program, &mut functions);
    CompiledModule { functions, entry }
}

/// The module entry point is lowered like any other function except for two
/// things: it runs directly against the incoming scope (slot 1) rather than
/// allocating a parameter frame over it — there are no parameters — and it
/// returns that scope explicitly rather than falling through to an implicit
/// null, so a REPL can thread one module's bindings into the next as its
/// starting context.
fn lower_module_body(
    body: &[Stmt],
    functions: &mut IndexVec<UserFunctionId, crate::mir::UserFunction>,
) -> UserFunctionId {
    let b = Builder::new(None, 0, false, false);
    let mut lowerer = Lowerer { b, scope: Arg::Slot(SCOPE_SLOT), loops: Vec::new(), functions };
    lowerer.lower_block(body);
    if !lowerer.b.is_current_block_terminated() {
        let scope = lowerer.scope;
        lowerer.b.ret(scope);
    }
    let function = lowerer.b.build();
    functions.push(function)
}

struct Lowerer<'f> {
    b: Builder,
    scope: Arg,
    loops: Vec<LoopCtx>,
    functions: &'f mut IndexVec<UserFunctionId, crate::mir::UserFunction>,
}

struct LoopCtx {
    label: Option<Symbol>,
    continue_target: BlockId,
    break_target: BlockId,
}

fn lower_function_body(
    name: Option<Symbol>,
    params: &[Symbol],
    variadic_tail: bool,
    is_method: bool,
    body: &[Stmt],
    functions: &mut IndexVec<UserFunctionId, crate::mir::UserFunction>,
) -> UserFunctionId {
    let mut b = Builder::new(name, params.len(), variadic_tail, is_method);

    // Slot 1 is the incoming context (the closure's captured environment,
    // or — for a method — the fresh `this`-bound child the VM's
    // `setup_call` already allocated). Parameters get their own child scope
    // on top of that, closed once bound so later refslot extraction can see
    // a stable member set.
    let param_scope = b.alloc_object(Arg::Slot(SCOPE_SLOT));
    for (i, param) in params.iter().enumerate() {
        let key = b.alloc_string_object(*param);
        b.assign(
            Arg::Slot(param_scope),
            Arg::Slot(key),
            Arg::Slot(SlotId(2 + i as u32)),
            SetMode::Plain,
        );
    }
    b.close_object(Arg::Slot(param_scope));

    // Nested function literals reached while lowering `body` push themselves
    // onto `functions` as they're encountered, so this function's own id
    // (pushed last, below) generally lands after the ids of closures it
    // textually contains. Only stability of the id matters, not ordering.
    let mut lowerer = Lowerer { b, scope: Arg::Slot(param_scope), loops: Vec::new(), functions };
    lowerer.lower_block(body);
    let function = lowerer.b.build();
    functions.push(function)
}

impl<'f> Lowerer<'f> {
    fn lower_block(&mut self, stmts: &[Stmt]) {
        let saved_scope = self.scope;
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
        self.scope = saved_scope;
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { kind, name, init, .. } => {
                // Allocate the child scope *before* lowering the initializer
                // so a self-recursive closure captures this frame, not the
                // parent one.
                let new_scope = self.b.alloc_object(self.scope);
                self.scope = Arg::Slot(new_scope);
                let key = self.b.alloc_string_object(*name);
                let value = match init {
                    Some(e) => self.lower_expr(e),
                    None => Arg::Value(Value::Null),
                };
                self.b.assign(self.scope, Arg::Slot(key), value, SetMode::Plain);
                self.b.close_object(self.scope);
                if matches!(kind, DeclKind::Const) {
                    self.b.freeze_object(self.scope);
                }
            }
            Stmt::Expr(e) => {
                self.lower_expr(e);
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.lower_if(cond, then_branch, else_branch.as_deref());
            }
            Stmt::While { label, cond, body } => {
                self.lower_while(*label, cond, body);
            }
            Stmt::For { label, init, cond, step, body } => {
                self.lower_for(*label, init.as_deref(), cond.as_ref(), step.as_ref(), body);
            }
            Stmt::ForIn { label, key, value, iter, body } => {
                self.lower_for_in(*label, key.as_ref().copied(), *value, iter, body);
            }
            Stmt::Break { label, .. } => {
                let target = self.find_loop(*label).break_target;
                self.b.branch(target);
            }
            Stmt::Continue { label, .. } => {
                let target = self.find_loop(*label).continue_target;
                self.b.branch(target);
            }
            Stmt::Return { value, .. } => {
                let arg = match value {
                    Some(e) => self.lower_expr(e),
                    None => Arg::Value(Value::Null),
                };
                self.b.ret(arg);
            }
        }
    }

    fn find_loop(&self, label: Option<Symbol>) -> &LoopCtx {
        match label {
            Some(l) => self
                .loops
                .iter()
                .rev()
                .find(|lp| lp.label == Some(l))
                .expect("break/continue label resolved by faxc-sem but missing at lowering"),
            None => self.loops.last().expect("break/continue outside a loop slipped past faxc-sem"),
        }
    }

    fn lower_if(&mut self, cond: &Expr, then_branch: &[Stmt], else_branch: Option<&[Stmt]>) {
        let cond_arg = self.lower_expr(cond);
        let test = self.b.test(cond_arg);
        let entry = self.b.current_block();

        let then_blk = self.b.new_block();
        self.lower_block(then_branch);
        let then_end = self.b.current_block();
        let then_terminated = self.b.is_current_block_terminated();

        let (else_blk, else_end, else_terminated) = if let Some(else_branch) = else_branch {
            let else_blk = self.b.new_block();
            self.lower_block(else_branch);
            let else_end = self.b.current_block();
            let else_terminated = self.b.is_current_block_terminated();
            (else_blk, Some(else_end), else_terminated)
        } else {
            (then_blk, None, false) // placeholder; replaced below when there's no else
        };

        let merge = self.b.new_block();

        if !then_terminated {
            self.b.set_current_block(then_end);
            self.b.branch(merge);
        }
        if else_branch.is_some() {
            if !else_terminated {
                self.b.set_current_block(else_end.unwrap());
                self.b.branch(merge);
            }
        }

        self.b.set_current_block(entry);
        let false_target = if else_branch.is_some() { else_blk } else { merge };
        self.b.test_branch(Arg::Slot(test), then_blk, false_target);

        self.b.set_current_block(merge);
    }

    fn lower_while(&mut self, label: Option<Symbol>, cond: &Expr, body: &[Stmt]) {
        // `new_block` both allocates and switches to the new block, so the
        // entry block is left unterminated until we come back to it below —
        // nothing requires blocks to be finished in the order they're
        // created, only that every block has a terminator by the time
        // `Builder::build` runs.
        let entry = self.b.current_block();
        let test_blk = self.b.new_block();

        let cond_arg = self.lower_expr(cond);
        let test = self.b.test(cond_arg);
        let test_end = self.b.current_block();

        let loop_blk = self.b.new_block();
        self.loops.push(LoopCtx { label, continue_target: test_blk, break_target: BlockId(0) });
        let loop_idx = self.loops.len() - 1;
        self.lower_block(body);
        let body_terminated = self.b.is_current_block_terminated();
        let body_end = self.b.current_block();
        if !body_terminated {
            self.b.set_current_block(body_end);
            self.b.branch(test_blk);
        }

        let end_blk = self.b.new_block();
        self.loops[loop_idx].break_target = end_blk;
        self.loops.pop();

        self.b.set_current_block(entry);
        self.b.branch(test_blk);

        self.b.set_current_block(test_end);
        self.b.test_branch(Arg::Slot(test), loop_blk, end_blk);

        self.b.set_current_block(end_blk);
    }

    fn lower_for(
        &mut self,
        label: Option<Symbol>,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &[Stmt],
    ) {
        let saved_scope = self.scope;
        if let Some(init) = init {
            self.lower_stmt(init);
        }

        let entry = self.b.current_block();
        let test_blk = self.b.new_block();

        let test_slot = match cond {
            Some(cond) => {
                let cond_arg = self.lower_expr(cond);
                Some(self.b.test(cond_arg))
            }
            None => None,
        };
        let test_end = self.b.current_block();

        let loop_blk = self.b.new_block();
        let end_blk_placeholder = BlockId(0);
        self.loops.push(LoopCtx { label, continue_target: BlockId(0), break_target: end_blk_placeholder });
        let loop_idx = self.loops.len() - 1;
        self.lower_block(body);
        let body_terminated = self.b.is_current_block_terminated();
        let body_end = self.b.current_block();

        let step_blk = self.b.new_block();
        self.loops[loop_idx].continue_target = step_blk;
        if !body_terminated {
            self.b.set_current_block(body_end);
            self.b.branch(step_blk);
        }
        self.b.set_current_block(step_blk);
        if let Some(step) = step {
            self.lower_expr(step);
        }
        let step_end = self.b.current_block();
        self.b.set_current_block(step_end);
        self.b.branch(test_blk);

        let end_blk = self.b.new_block();
        self.loops[loop_idx].break_target = end_blk;
        self.loops.pop();

        self.b.set_current_block(entry);
        self.b.branch(test_blk);

        self.b.set_current_block(test_end);
        match test_slot {
            Some(test) => self.b.test_branch(Arg::Slot(test), loop_blk, end_blk),
            None => {
                // no condition clause: unconditional loop, `break` is the
                // only way out.
                self.b.branch(loop_blk);
            }
        }

        self.b.set_current_block(end_blk);
        self.scope = saved_scope;
    }

    fn lower_for_in(&mut self, label: Option<Symbol>, key: Option<Symbol>, value: Symbol, iter: &Expr, body: &[Stmt]) {
        let saved_scope = self.scope;
        let obj_arg = self.lower_expr(iter);
        let iterator_key = self.b.alloc_string_object(Symbol::intern("iterator"));
        let iter_fn = self.b.access(obj_arg, Arg::Slot(iterator_key));
        let iter_obj = self.b.call(Arg::Slot(iter_fn), obj_arg, Vec::new());

        let entry = self.b.current_block();
        let test_blk = self.b.new_block();

        let next_key = self.b.alloc_string_object(Symbol::intern("next"));
        let next_fn = self.b.access(Arg::Slot(iter_obj), Arg::Slot(next_key));
        let pass = self.b.call(Arg::Slot(next_fn), Arg::Slot(iter_obj), Vec::new());
        let done_key = self.b.alloc_string_object(Symbol::intern("done"));
        let done_val = self.b.access(Arg::Slot(pass), Arg::Slot(done_key));
        let done_test = self.b.test(Arg::Slot(done_val));
        let test_end = self.b.current_block();

        let body_blk = self.b.new_block();

        let var_scope = self.b.alloc_object(self.scope);
        self.scope = Arg::Slot(var_scope);
        let value_name_key = self.b.alloc_string_object(value);
        let value_key = self.b.alloc_string_object(Symbol::intern("value"));
        let value_val = self.b.access(Arg::Slot(pass), Arg::Slot(value_key));
        self.b.assign(self.scope, Arg::Slot(value_name_key), Arg::Slot(value_val), SetMode::Plain);
        if let Some(key_name) = key {
            let key_name_key = self.b.alloc_string_object(key_name);
            let key_key = self.b.alloc_string_object(Symbol::intern("key"));
            let key_val = self.b.access(Arg::Slot(pass), Arg::Slot(key_key));
            self.b.assign(self.scope, Arg::Slot(key_name_key), Arg::Slot(key_val), SetMode::Plain);
        }
        self.b.close_object(self.scope);

        self.loops.push(LoopCtx { label, continue_target: test_blk, break_target: BlockId(0) });
        let loop_idx = self.loops.len() - 1;
        self.lower_block(body);
        let body_terminated = self.b.is_current_block_terminated();
        let body_end = self.b.current_block();
        if !body_terminated {
            self.b.set_current_block(body_end);
            self.b.branch(test_blk);
        }

        let end_blk = self.b.new_block();
        self.loops[loop_idx].break_target = end_blk;
        self.loops.pop();

        self.b.set_current_block(entry);
        self.b.branch(test_blk);

        self.b.set_current_block(test_end);
        self.b.test_branch(Arg::Slot(done_test), end_blk, body_blk);

        self.b.set_current_block(end_blk);
        self.scope = saved_scope;
    }

    fn lower_expr(&mut self, expr: &Expr) -> Arg {
        match expr {
            Expr::Null(_) => Arg::Value(Value::Null),
            Expr::Bool(v, _) => Arg::Slot(self.b.alloc_bool_object(Arg::Value(Value::Bool(*v)))),
            Expr::Int(v, _) => Arg::Slot(self.b.alloc_int_object(Arg::Value(Value::Int(*v as i32)))),
            Expr::Float(v, _) => Arg::Slot(self.b.alloc_float_object(Arg::Value(Value::Float(*v as f32)))),
            Expr::Str(s, _) => Arg::Slot(self.b.alloc_string_object(*s)),
            Expr::Ident(name, _) => self.access_scope(*name),
            Expr::This(_) => self.access_scope(Symbol::intern("this")),
            Expr::Array(elems, _) => {
                let values: Vec<Arg> = elems.iter().map(|e| self.lower_expr(e)).collect();
                Arg::Slot(self.b.alloc_array_object(values))
            }
            Expr::Object(fields, _) => {
                let obj = self.b.alloc_object(Arg::Slot(NULL_SLOT));
                self.lower_object_fields(Arg::Slot(obj), fields);
                Arg::Slot(obj)
            }
            Expr::New { proto, body, .. } => {
                let proto_arg = self.lower_expr(proto);
                let obj = self.b.alloc_object(proto_arg);
                self.lower_object_fields(Arg::Slot(obj), body);
                Arg::Slot(obj)
            }
            Expr::Function(lit) => self.lower_function_expr(lit),
            Expr::Binary { op, left, right, .. } => self.lower_binary(*op, left, right),
            Expr::Logical { op, left, right, .. } => self.lower_logical(*op, left, right),
            Expr::Unary { op, expr, .. } => self.lower_unary(*op, expr),
            Expr::In { key, obj, .. } => {
                let obj_arg = self.lower_expr(obj);
                let key_arg = self.lower_expr(key);
                Arg::Slot(self.b.key_in_obj(obj_arg, key_arg))
            }
            Expr::InstanceOf { value, proto, .. } => {
                let value_arg = self.lower_expr(value);
                let proto_arg = self.lower_expr(proto);
                Arg::Slot(self.b.instance_of(value_arg, proto_arg))
            }
            Expr::Assign { target, value, .. } => self.lower_assign(target, value),
            Expr::Call { callee, args, optional, .. } => self.lower_call(callee, args, *optional),
            Expr::Index { obj, index, optional, .. } => {
                let obj_arg = self.lower_expr(obj);
                if *optional {
                    let index = index.clone();
                    self.null_guard(obj_arg, |this| {
                        let idx_arg = this.lower_expr(&index);
                        Arg::Slot(this.b.access(obj_arg, idx_arg))
                    })
                } else {
                    let idx_arg = self.lower_expr(index);
                    Arg::Slot(self.b.access(obj_arg, idx_arg))
                }
            }
            Expr::Field { obj, name, optional, .. } => {
                let obj_arg = self.lower_expr(obj);
                if *optional {
                    self.null_guard(obj_arg, |this| {
                        let key = this.b.alloc_string_object(*name);
                        Arg::Slot(this.b.access(obj_arg, Arg::Slot(key)))
                    })
                } else {
                    let key = self.b.alloc_string_object(*name);
                    Arg::Slot(self.b.access(obj_arg, Arg::Slot(key)))
                }
            }
        }
    }

    fn lower_object_fields(&mut self, obj: Arg, fields: &[ast::ObjectField]) {
        for field in fields {
            let key = self.b.alloc_string_object(field.name);
            let value = self.lower_expr(&field.value);
            self.b.assign(obj, Arg::Slot(key), value, SetMode::Plain);
            if let Some(constraint) = &field.constraint {
                let constraint_arg = self.lower_expr(constraint);
                self.b.set_constraint(obj, Arg::Slot(key), constraint_arg);
            }
        }
    }

    fn lower_function_expr(&mut self, lit: &FunctionLit) -> Arg {
        let id = lower_function_body(
            lit.name,
            &lit.params,
            lit.variadic_tail,
            lit.is_method,
            &lit.body,
            self.functions,
        );
        Arg::Slot(self.b.alloc_closure_object(self.scope, id))
    }

    /// Every bare identifier is a property lookup against the live scope
    /// chain: `this` included, since method dispatch installs it as a key
    /// on the fresh per-call scope rather than threading it separately.
    fn access_scope(&mut self, name: Symbol) -> Arg {
        let key = self.b.alloc_string_object(name);
        Arg::Slot(self.b.access(self.scope, Arg::Slot(key)))
    }

    /// All sixteen binary operators dispatch the same way: look up the
    /// operator's name as a property on the left operand, then call it with
    /// the left operand as `this` and the right operand as the sole
    /// argument. This is what makes operators user-overloadable — a
    /// descendant of int_base can shadow `+` to change what `a + b` does.
    fn lower_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Arg {
        let lhs = self.lower_expr(left);
        let rhs = self.lower_expr(right);
        self.dispatch_operator(binop_name(op), lhs, &[rhs])
    }

    fn lower_unary(&mut self, op: UnOp, expr: &Expr) -> Arg {
        let val = self.lower_expr(expr);
        let name = match op {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
        };
        self.dispatch_operator(name, val, &[])
    }

    fn dispatch_operator(&mut self, name: &str, this: Arg, args: &[Arg]) -> Arg {
        let key = self.b.alloc_string_object(Symbol::intern(name));
        let func = self.b.access(this, Arg::Slot(key));
        Arg::Slot(self.b.call(Arg::Slot(func), this, args.to_vec()))
    }

    fn lower_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> Arg {
        let lhs = self.lower_expr(left);
        let lhs_blk = self.b.current_block();
        let test = self.b.test(lhs);

        let rhs_blk = self.b.new_block();
        let rhs = self.lower_expr(right);
        let rhs_end = self.b.current_block();

        let merge = self.b.new_block();
        self.b.set_current_block(rhs_end);
        if !self.b.is_current_block_terminated() {
            self.b.branch(merge);
        }

        self.b.set_current_block(lhs_blk);
        match op {
            // `a && b`: b if truthy(a), else a.
            LogicalOp::And => self.b.test_branch(Arg::Slot(test), rhs_blk, merge),
            // `a || b`: a if truthy(a), else b.
            LogicalOp::Or => self.b.test_branch(Arg::Slot(test), merge, rhs_blk),
        }

        self.b.set_current_block(merge);
        Arg::Slot(self.b.phi(vec![(lhs_blk, lhs), (rhs_end, rhs)]))
    }

    /// Guards `compute` so it only runs when `probe` isn't null, producing
    /// null directly otherwise — the `?.`/`?(`/`?[` short-circuit.
    fn null_guard(&mut self, probe: Arg, compute: impl FnOnce(&mut Self) -> Arg) -> Arg {
        let entry = self.b.current_block();
        let is_null = self.b.identical(probe, Arg::Value(Value::Null));

        let value_blk = self.b.new_block();
        let result = compute(self);
        let value_end = self.b.current_block();

        let merge = self.b.new_block();
        self.b.set_current_block(value_end);
        if !self.b.is_current_block_terminated() {
            self.b.branch(merge);
        }

        self.b.set_current_block(entry);
        self.b.test_branch(Arg::Slot(is_null), merge, value_blk);

        self.b.set_current_block(merge);
        Arg::Slot(self.b.phi(vec![(entry, Arg::Value(Value::Null)), (value_end, result)]))
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> Arg {
        match target {
            Expr::Ident(name, _) => {
                let key = self.b.alloc_string_object(*name);
                let value_arg = self.lower_expr(value);
                self.b.assign(self.scope, Arg::Slot(key), value_arg, SetMode::Existing);
                value_arg
            }
            Expr::Field { obj, name, .. } => {
                let obj_arg = self.lower_expr(obj);
                let key = self.b.alloc_string_object(*name);
                let value_arg = self.lower_expr(value);
                self.b.assign(obj_arg, Arg::Slot(key), value_arg, SetMode::Shadowing);
                value_arg
            }
            Expr::Index { obj, index, .. } => {
                let obj_arg = self.lower_expr(obj);
                let idx_arg = self.lower_expr(index);
                let value_arg = self.lower_expr(value);
                self.b.assign(obj_arg, idx_arg, value_arg, SetMode::Plain);
                value_arg
            }
            _ => unreachable!("faxc-par's is_lvalue rejects any other assignment target"),
        }
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], optional: bool) -> Arg {
        let (fn_arg, this_arg) = match callee {
            Expr::Field { obj, name, .. } => {
                let obj_arg = self.lower_expr(obj);
                let key = self.b.alloc_string_object(*name);
                (Arg::Slot(self.b.access(obj_arg, Arg::Slot(key))), obj_arg)
            }
            Expr::Index { obj, index, .. } => {
                let obj_arg = self.lower_expr(obj);
                let idx_arg = self.lower_expr(index);
                (Arg::Slot(self.b.access(obj_arg, idx_arg)), obj_arg)
            }
            other => (self.lower_expr(other), Arg::Value(Value::Null)),
        };
        let args_arg: Vec<Arg> = args.iter().map(|a| self.lower_expr(a)).collect();
        if optional {
            self.null_guard(fn_arg, |this| Arg::Slot(this.b.call(fn_arg, this_arg, args_arg)))
        } else {
            Arg::Slot(self.b.call(fn_arg, this_arg, args_arg))
        }
    }
}

fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faxc_par::parse;

    fn lower_src(src: &str) -> CompiledModule {
        let program = parse(src).expect("parse");
        lower_program(&program)
    }

    #[test]
    fn empty_program_returns_null_scope() {
        let module = lower_src("");
        let entry = module.entry_function();
        assert_eq!(entry.arity, 0);
        assert!(entry.body.instr_count() >= 1);
    }

    #[test]
    fn var_decl_chains_a_new_scope_object() {
        let module = lower_src("var x = 1;");
        let entry = module.entry_function();
        // alloc_object(var scope) + alloc_string_object(key) + assign +
        // close + return, at minimum.
        assert!(entry.body.instr_count() >= 4);
    }

    #[test]
    fn self_recursive_closure_captures_its_own_scope() {
        let module = lower_src("var f = function() { f(); };");
        assert_eq!(module.functions.len(), 2); // entry + the closure body
    }

    #[test]
    fn if_without_else_merges_back_to_one_block() {
        let module = lower_src("if (true) { var x = 1; }");
        let entry = module.entry_function();
        assert!(entry.body.blocks.len() >= 3); // entry/then/merge at least
    }

    #[test]
    fn for_in_over_empty_iterator_is_well_formed() {
        let module = lower_src("for (var k, v in obj) { }");
        let entry = module.entry_function();
        for block in entry.body.blocks.as_slice() {
            assert!(block.instrs.last().unwrap().kind.is_terminator());
        }
    }

    #[test]
    fn optional_chain_builds_a_null_guard() {
        let module = lower_src("var x = a?.b?.c;");
        let entry = module.entry_function();
        for block in entry.body.blocks.as_slice() {
            assert!(block.instrs.last().unwrap().kind.is_terminator());
        }
    }

    #[test]
    fn labeled_break_targets_the_labeled_loop() {
        let module = lower_src("outer: while (true) { while (true) { break outer; } }");
        let entry = module.entry_function();
        for block in entry.body.blocks.as_slice() {
            assert!(block.instrs.last().unwrap().kind.is_terminator());
        }
    }
}
