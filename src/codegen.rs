//! Code-generation driver.
//!
//! One entry point per concern: identifier listings and the ABI are pure
//! functions of the resolved declarations and never require code
//! generation; code generation itself runs the backend checker first and
//! refuses to emit while errors are outstanding. The driver assembles
//! per-function instruction trees into one contract node and hands that
//! node to the optimizer as an opaque value.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::abi::{self, AbiContract};
use crate::ast::{
    Ast, Block, ContractId, Expr, FunId, FunctionKind, Lit, Pragmas, SourceUnit, Stmt,
};
use crate::bytecode::{self, Contract, Function, FunctionSlot, Pusher};
use crate::check::Checker;
use crate::config::CompilerConfig;
use crate::constructor::ConstructorSynthesizer;
use crate::diagnostic::Reporter;
use crate::funcid;

pub struct ContractCompiler<'a> {
    ast: &'a Ast,
    config: &'a CompilerConfig,
}

impl<'a> ContractCompiler<'a> {
    pub fn new(ast: &'a Ast, config: &'a CompilerConfig) -> Self {
        Self { ast, config }
    }

    // ── Identifier listings ───────────────────────────────────────

    /// Routing identifier of every externally callable function,
    /// including getters synthesized for public state variables.
    ///
    /// Deterministic and independent of code-generation order, so
    /// tooling can agree with the eventual bytecode without generating
    /// it.
    pub fn print_function_ids(&self, contract: ContractId) -> BTreeMap<String, u32> {
        let mut ids = BTreeMap::new();
        for fid in self.ast.effective_functions(contract) {
            let f = self.ast.function(fid);
            if f.visibility.is_public() {
                ids.insert(f.name.node.clone(), funcid::function_id(self.ast, fid));
            }
        }
        if let Some(ctor) = self.ast.constructor_of(contract) {
            ids.insert(
                "constructor".to_string(),
                funcid::function_id(self.ast, ctor),
            );
        }
        for &cid in &self.ast.contract(contract).linearized {
            for &vid in &self.ast.contract(cid).state_vars {
                let v = self.ast.variable(vid);
                if v.is_public {
                    ids.insert(
                        v.name.node.clone(),
                        funcid::derived_id(&funcid::getter_signature(self.ast, vid)),
                    );
                }
            }
        }
        ids
    }

    /// Same listing, additionally covering private and internal
    /// functions. Those identifiers are only unique within reachable
    /// call graphs, so the whole unit set is consulted for free
    /// functions.
    pub fn print_private_function_ids(
        &self,
        contract: ContractId,
        units: &[SourceUnit],
    ) -> BTreeMap<String, u32> {
        let mut ids = self.print_function_ids(contract);
        for &cid in &self.ast.contract(contract).linearized {
            for &fid in &self.ast.contract(cid).functions {
                let f = self.ast.function(fid);
                if f.kind == FunctionKind::Regular && !f.visibility.is_public() {
                    ids.entry(f.name.node.clone())
                        .or_insert_with(|| funcid::derived_id(&funcid::signature(self.ast, fid)));
                }
            }
        }
        for unit in units {
            for &fid in &unit.free_functions {
                let f = self.ast.function(fid);
                ids.entry(f.name.node.clone())
                    .or_insert_with(|| funcid::derived_id(&funcid::signature(self.ast, fid)));
            }
        }
        ids
    }

    /// Text form of an identifier listing, one `name: 0x…` line each.
    pub fn render_ids(ids: &BTreeMap<String, u32>) -> String {
        let mut out = String::new();
        for (name, id) in ids {
            out.push_str(&format!("{name}: 0x{id:08x}\n"));
        }
        out
    }

    // ── ABI ───────────────────────────────────────────────────────

    pub fn generate_abi(&self, contract: ContractId, pragmas: &Pragmas) -> AbiContract {
        abi::build(self.ast, contract, pragmas)
    }

    pub fn save_abi(
        &self,
        contract: ContractId,
        pragmas: &Pragmas,
        path: &Path,
    ) -> io::Result<()> {
        let abi = self.generate_abi(contract, pragmas);
        let json = abi
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json + "\n")
    }

    // ── Code generation ───────────────────────────────────────────

    /// Generate the contract's bytecode tree.
    ///
    /// Runs the backend checker first; while errors are outstanding the
    /// pipeline still accumulates diagnostics but produces no tree.
    pub fn generate_contract_code(
        &self,
        contract: ContractId,
        reporter: &mut Reporter,
    ) -> Option<Contract> {
        Checker::check(self.ast, contract, self.config, reporter);
        if reporter.has_errors() {
            return None;
        }

        let mut functions = Vec::new();
        let mut synthesizer = ConstructorSynthesizer::new(self.ast, self.config, reporter);
        functions.push(synthesizer.synthesize(contract));

        for fid in self.inline_functions(contract) {
            functions.push(self.emit_function(fid));
        }
        for fid in self.dispatch_functions(contract) {
            functions.push(self.emit_function(fid));
        }

        // Constructor synthesis can report missing base arguments.
        if reporter.has_errors() {
            return None;
        }
        Some(Contract {
            name: self.ast.contract(contract).name.node.clone(),
            functions,
        })
    }

    /// Generate, optimize, and persist. No artifact is written while
    /// errors are outstanding.
    pub fn generate_code_and_save_to_file(
        &self,
        contract: ContractId,
        reporter: &mut Reporter,
        path: &Path,
    ) -> io::Result<Option<Contract>> {
        let Some(mut code) = self.generate_contract_code(contract, reporter) else {
            return Ok(None);
        };
        Self::optimize_code(&mut code);
        fs::write(path, format!("{code}\n"))?;
        Ok(Some(code))
    }

    /// Idempotent optimization pass over an already-generated tree.
    pub fn optimize_code(code: &mut Contract) {
        bytecode::optimize(code);
    }

    pub fn code_path(dir: &Path, contract_name: &str) -> PathBuf {
        dir.join(format!("{contract_name}.code"))
    }

    pub fn abi_path(dir: &Path, contract_name: &str) -> PathBuf {
        dir.join(format!("{contract_name}.abi.json"))
    }

    // ── Function selection ────────────────────────────────────────

    /// Inline functions along the chain, most-derived definition first.
    /// Bases' inline bodies are materialized into the derived contract's
    /// emitted code so calls to them never cross contract boundaries.
    fn inline_functions(&self, contract: ContractId) -> Vec<FunId> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for &cid in &self.ast.contract(contract).linearized {
            for &fid in &self.ast.contract(cid).functions {
                let f = self.ast.function(fid);
                if f.kind == FunctionKind::Regular
                    && f.is_inline
                    && seen.insert(f.name.node.as_str())
                {
                    out.push(fid);
                }
            }
        }
        out
    }

    /// Everything emitted besides the synthesized constructor and the
    /// materialized inline set: effective regular functions plus the
    /// special entry points, most-derived definition winning per kind.
    fn dispatch_functions(&self, contract: ContractId) -> Vec<FunId> {
        let mut out: Vec<FunId> = self
            .ast
            .effective_functions(contract)
            .into_iter()
            .filter(|&fid| !self.ast.function(fid).is_inline)
            .collect();
        for kind in [
            FunctionKind::Receive,
            FunctionKind::Fallback,
            FunctionKind::OnTickTock,
            FunctionKind::OnBounce,
        ] {
            let slot_fn = self
                .ast
                .contract(contract)
                .linearized
                .iter()
                .flat_map(|&cid| self.ast.contract(cid).functions.iter().copied())
                .find(|&fid| self.ast.function(fid).kind == kind);
            if let Some(fid) = slot_fn {
                out.push(fid);
            }
        }
        out
    }

    fn emit_function(&self, fid: FunId) -> Function {
        let f = self.ast.function(fid);
        let slot = match f.kind {
            FunctionKind::Constructor => FunctionSlot::Constructor,
            FunctionKind::Receive => FunctionSlot::Receive,
            FunctionKind::Fallback => FunctionSlot::Fallback,
            FunctionKind::OnTickTock => FunctionSlot::TickTock,
            FunctionKind::OnBounce => FunctionSlot::Internal,
            FunctionKind::Regular => {
                if f.is_inline || !f.visibility.is_public() {
                    FunctionSlot::Internal
                } else {
                    FunctionSlot::Id(funcid::function_id(self.ast, fid))
                }
            }
        };

        let mut pusher = Pusher::new();
        pusher.comment(funcid::signature(self.ast, fid));
        if let Some(body) = &f.body {
            emit_block(self.ast, &mut pusher, body);
        }
        pusher.ret();

        let name = match f.contract {
            Some(cid) => format!("{}::{}", self.ast.contract(cid).name.node, f.name.node),
            None => f.name.node.clone(),
        };
        pusher.finish(name, slot)
    }
}

// ─── Statement & expression lowering ──────────────────────────────

fn emit_block(ast: &Ast, pusher: &mut Pusher, block: &Block) {
    for stmt in &block.stmts {
        emit_stmt(ast, pusher, stmt);
    }
}

fn emit_stmt(ast: &Ast, pusher: &mut Pusher, stmt: &Stmt) {
    match stmt {
        Stmt::Block(block) => emit_block(ast, pusher, block),
        Stmt::VarDecl { init, .. } => {
            if let Some(init) = init {
                emit_expr(ast, pusher, init);
            }
        }
        Stmt::Expr(expr) => {
            emit_expr(ast, pusher, expr);
            // Statement results are discarded; assignments already
            // consume their value.
            if !matches!(expr, Expr::Assign { .. }) {
                pusher.drop_top(1);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                emit_expr(ast, pusher, value);
            }
            pusher.ret();
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            emit_expr(ast, pusher, cond);
            pusher.call("branch");
            emit_block(ast, pusher, then_branch);
            if let Some(else_branch) = else_branch {
                pusher.call("branch_else");
                emit_block(ast, pusher, else_branch);
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            if let Some(init) = init {
                emit_stmt(ast, pusher, init);
            }
            pusher.call("loop_enter");
            if let Some(cond) = cond {
                emit_expr(ast, pusher, cond);
            }
            emit_block(ast, pusher, body);
            if let Some(post) = post {
                emit_expr(ast, pusher, post);
                pusher.drop_top(1);
            }
            pusher.call("loop_exit");
        }
        Stmt::TryCatch { body, clause, .. } => {
            pusher.call("try_enter");
            emit_block(ast, pusher, body);
            pusher.call("catch_enter");
            emit_block(ast, pusher, clause);
        }
        Stmt::Asm { body, .. } => {
            pusher.comment(format!("asm {{ {body} }}"));
        }
    }
}

/// Minimal stack lowering: literals are pushed directly, every other
/// operation becomes a named primitive call over its pushed operands.
pub(crate) fn emit_expr(ast: &Ast, pusher: &mut Pusher, expr: &Expr) {
    match expr {
        Expr::Literal { value, .. } => match value {
            Lit::Number(n) => pusher.push(*n),
            Lit::Bool(b) => pusher.push(u128::from(*b)),
            Lit::Str(s) => {
                pusher.comment(format!("string literal {s:?}"));
                pusher.push(0);
            }
        },
        Expr::Ident { name, .. } => pusher.call(format!("load_{name}")),
        Expr::Path { segments, .. } => {
            let path: Vec<&str> = segments.iter().map(|s| s.node.as_str()).collect();
            pusher.call(path.join("::"));
        }
        Expr::Call { callee, args, .. } => {
            for arg in args {
                emit_expr(ast, pusher, arg);
            }
            match callee.as_ref() {
                Expr::Ident { name, .. } => pusher.call(name.clone()),
                Expr::Member { base, member, .. } => {
                    emit_expr(ast, pusher, base);
                    pusher.call(member.node.clone());
                }
                other => {
                    emit_expr(ast, pusher, other);
                    pusher.call("invoke");
                }
            }
        }
        Expr::Member { base, member, .. } => {
            emit_expr(ast, pusher, base);
            pusher.call(format!("get_{}", member.node));
        }
        Expr::Index { base, index, .. } => {
            emit_expr(ast, pusher, base);
            emit_expr(ast, pusher, index);
            pusher.call("index");
        }
        Expr::RangeIndex {
            base, start, end, ..
        } => {
            emit_expr(ast, pusher, base);
            match start {
                Some(start) => emit_expr(ast, pusher, start),
                None => pusher.push(0),
            }
            match end {
                Some(end) => emit_expr(ast, pusher, end),
                None => pusher.call("byte_length"),
            }
            pusher.call("slice_range");
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            emit_expr(ast, pusher, lhs);
            emit_expr(ast, pusher, rhs);
            pusher.call(op_label(*op));
        }
        Expr::Assign { lhs, rhs, .. } => {
            emit_expr(ast, pusher, rhs);
            match lhs.as_ref() {
                Expr::Ident { name, .. } => pusher.call(format!("store_{name}")),
                other => {
                    emit_expr(ast, pusher, other);
                    pusher.call("store");
                }
            }
        }
    }
}

fn op_label(op: crate::ast::BinOp) -> &'static str {
    use crate::ast::BinOp;
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Eq => "eq",
        BinOp::Lt => "lt",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}
