//! Backend semantic checker.
//!
//! A second pass over each contract, run after resolution and generic
//! type checking, enforcing the constraints the target machine imposes
//! but the generic front end cannot express: function-identifier ranges
//! and reservations, override consistency, public-overload rejection,
//! reserved-hook signatures, and storage-type restrictions.
//!
//! Expected violations are reported through the `Reporter`, never
//! returned; a malformed tree that should be structurally impossible is
//! an assertion, not a diagnostic.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, Block, ContractId, Expr, FunId, FunctionKind, Stmt, Ty, VarId, Visibility};
use crate::config::CompilerConfig;
use crate::diagnostic::{codes, Diagnostic, Reporter};
use crate::span::Span;

/// Reserved name of the post-upgrade migration hook.
pub const UPGRADE_HOOK: &str = "on_code_upgrade";
/// Reserved name of the pre-dispatch signature rewriting hook.
pub const DISPATCH_HOOK: &str = "after_signature_check";

pub struct Checker<'a> {
    ast: &'a Ast,
    config: &'a CompilerConfig,
    reporter: &'a mut Reporter,
}

impl<'a> Checker<'a> {
    /// Check one contract. All independently detectable violations on a
    /// declaration are reported together.
    pub fn check(
        ast: &'a Ast,
        contract: ContractId,
        config: &'a CompilerConfig,
        reporter: &'a mut Reporter,
    ) {
        let mut checker = Checker {
            ast,
            config,
            reporter,
        };
        checker.check_override_and_overload(contract);

        let contract_def = ast.contract(contract);
        for &fid in &contract_def.functions {
            checker.check_function(fid);
            let function = ast.function(fid);
            for &vid in function.params.iter().chain(function.returns.iter()) {
                let v = ast.variable(vid);
                checker.check_type(&v.ty.node, v.ty.span);
            }
            if let Some(body) = &function.body {
                checker.check_block(body);
            }
        }
        for &vid in &contract_def.state_vars {
            checker.check_state_variable(vid);
            let v = ast.variable(vid);
            checker.check_type(&v.ty.node, v.ty.span);
        }
        for &sid in &contract_def.structs {
            for &member in &ast.struct_def(sid).members {
                let v = ast.variable(member);
                checker.check_type(&v.ty.node, v.ty.span);
            }
        }
    }

    // ── Override & overload ───────────────────────────────────────

    /// Transitive override closure of a function.
    fn all_base_functions(&self, fid: FunId) -> HashSet<FunId> {
        let mut closure = HashSet::new();
        let mut work = vec![fid];
        while let Some(current) = work.pop() {
            for &base in &self.ast.function(current).base_functions {
                if closure.insert(base) {
                    work.push(base);
                }
            }
        }
        closure
    }

    fn in_override_relation(&self, a: FunId, b: FunId) -> bool {
        self.all_base_functions(a).contains(&b) || self.all_base_functions(b).contains(&a)
    }

    fn check_override_and_overload(&mut self, contract: ContractId) {
        let contract_def = self.ast.contract(contract);

        let mut overridden: HashSet<FunId> = HashSet::new();
        // Declaration order preserved for reproducible diagnostics.
        let mut functions: Vec<FunId> = Vec::new();
        let mut id_claims: HashMap<u32, FunId> = HashMap::new();

        // Reversed linearization: the most-base contract writes its
        // claims first, so a derived override is checked against the
        // entry its base left behind.
        for &cid in contract_def.linearized.iter().rev() {
            for &fid in &self.ast.contract(cid).functions {
                let function = self.ast.function(fid);

                if let Some(id) = &function.function_id {
                    match id_claims.get(&id.node) {
                        Some(&claimant) => {
                            if !self.in_override_relation(fid, claimant) {
                                let claimant_span = self.ast.function(claimant).span;
                                self.reporter.report(
                                    Diagnostic::error(
                                        codes::DUPLICATE_FUNCTION_ID,
                                        "Two functions have the same functionID.",
                                        function.span,
                                    )
                                    .with_secondary(
                                        claimant_span,
                                        "Declaration of the function with the same function ID:",
                                    ),
                                );
                            }
                        }
                        None => {
                            id_claims.insert(id.node, fid);
                        }
                    }
                }

                if matches!(
                    function.kind,
                    FunctionKind::Constructor
                        | FunctionKind::Receive
                        | FunctionKind::Fallback
                        | FunctionKind::OnTickTock
                ) {
                    continue;
                }

                if !function.base_functions.is_empty() {
                    overridden.insert(fid);
                    for &bid in &function.base_functions {
                        overridden.insert(bid);
                        self.check_override_pair(fid, bid);
                    }
                }
                functions.push(fid);
            }
        }

        // Overload rejection: public/external, outside any override
        // relation, same name. Each unordered pair reported exactly once.
        for (i, &f) in functions.iter().enumerate() {
            let fd = self.ast.function(f);
            if !fd.visibility.is_public() || overridden.contains(&f) {
                continue;
            }
            for &g in &functions[i + 1..] {
                let gd = self.ast.function(g);
                if !gd.visibility.is_public() || overridden.contains(&g) {
                    continue;
                }
                if fd.name.node == gd.name.node {
                    self.reporter.report(
                        Diagnostic::error(
                            codes::PUBLIC_OVERLOAD,
                            "Function overloading is not supported for public functions.",
                            fd.span,
                        )
                        .with_secondary(gd.span, "Another overloaded function is here:"),
                    );
                }
            }
        }
    }

    /// One diagnostic per violated dimension, each citing both ends.
    fn check_override_pair(&mut self, fid: FunId, bid: FunId) {
        let function = self.ast.function(fid);
        let base = self.ast.function(bid);
        let base_label = "Declaration of the base function:";

        if function.function_id.is_some() != base.function_id.is_some() {
            self.reporter.report(
                Diagnostic::error(
                    codes::OVERRIDE_ID_PRESENCE,
                    "Both override and base functions should have functionID \
                     if it is defined for one of them.",
                    function.span,
                )
                .with_secondary(base.span, base_label),
            );
        } else if let (Some(own), Some(inherited)) = (&function.function_id, &base.function_id) {
            if own.node != inherited.node {
                self.reporter.report(
                    Diagnostic::error(
                        codes::OVERRIDE_ID_VALUE,
                        format!(
                            "Override function should have functionID = {}.",
                            inherited.node
                        ),
                        function.span,
                    )
                    .with_secondary(base.span, base_label),
                );
            }
        }

        if function.is_responsible != base.is_responsible {
            self.reporter.report(
                Diagnostic::error(
                    codes::OVERRIDE_RESPONSIBLE,
                    "Both override and base functions should be marked as responsible or not.",
                    function.span,
                )
                .with_secondary(base.span, base_label),
            );
        }

        if function.internal_msg != base.internal_msg || function.external_msg != base.external_msg
        {
            self.reporter.report(
                Diagnostic::error(
                    codes::OVERRIDE_MSG_DIRECTION,
                    "Both override and base functions should be marked as internalMsg \
                     or externalMsg.",
                    function.span,
                )
                .with_secondary(base.span, base_label),
            );
        }
    }

    // ── Per-function rules ────────────────────────────────────────

    fn check_function(&mut self, fid: FunId) {
        let function = self.ast.function(fid);

        if let Some(id) = &function.function_id {
            if id.node == 0 {
                self.reporter.report(Diagnostic::error(
                    codes::FUNCTION_ID_ZERO,
                    "functionID can't be equal to zero because this value is reserved \
                     for the receive function.",
                    function.span,
                ));
            }
            if !function.visibility.is_public() && function.name.node != UPGRADE_HOOK {
                self.reporter.report(Diagnostic::error(
                    codes::FUNCTION_ID_NOT_ELIGIBLE,
                    format!(
                        "Only public/external functions and the function `{UPGRADE_HOOK}` \
                         can have a functionID."
                    ),
                    function.span,
                ));
            }
            if matches!(
                function.kind,
                FunctionKind::Receive
                    | FunctionKind::Fallback
                    | FunctionKind::OnTickTock
                    | FunctionKind::OnBounce
            ) {
                self.reporter.report(Diagnostic::error(
                    codes::FUNCTION_ID_SPECIAL_KIND,
                    "functionID isn't supported for receive, fallback, on_bounce and \
                     on_tick_tock functions.",
                    function.span,
                ));
            }
        }

        if function.is_inline && function.visibility.is_public() {
            self.reporter.report(Diagnostic::error(
                codes::INLINE_PUBLIC,
                "Inline function should have private or internal visibility.",
                function.span,
            ));
        }

        if function.name.node == UPGRADE_HOOK {
            self.check_upgrade_hook(fid);
        }
        if function.name.node == DISPATCH_HOOK {
            self.check_dispatch_hook(fid);
        }
    }

    fn check_upgrade_hook(&mut self, fid: FunId) {
        let function = self.ast.function(fid);
        let expected =
            format!("\nExpected function signature: function {UPGRADE_HOOK}(...) (internal|private) {{ /*...*/ }}");

        if let Some(&first_return) = function.returns.first() {
            let span = self.ast.variable(first_return).span;
            self.reporter.report(Diagnostic::error(
                codes::UPGRADE_HOOK_RETURNS,
                format!("Function mustn't return any parameters.{expected}"),
                span,
            ));
        }
        if function.visibility.is_public() {
            self.reporter.report(Diagnostic::error(
                codes::UPGRADE_HOOK_VISIBILITY,
                format!("Bad function visibility.{expected}"),
                function.span,
            ));
        }
    }

    fn check_dispatch_hook(&mut self, fid: FunId) {
        let function = self.ast.function(fid);
        let expected = format!(
            "\nExpected format: function {DISPATCH_HOOK}(slice body, cell message) \
             private inline returns (slice) {{ /*...*/ }}"
        );

        let param_ty = |vid: &VarId| &self.ast.variable(*vid).ty.node;
        let params_ok = function.params.len() == 2
            && *param_ty(&function.params[0]) == Ty::Slice
            && *param_ty(&function.params[1]) == Ty::Cell;
        if !params_ok {
            self.reporter.report(Diagnostic::error(
                codes::DISPATCH_HOOK_PARAMS,
                format!("Unexpected function parameters.{expected}"),
                function.span,
            ));
        }

        let returns_ok =
            function.returns.len() == 1 && *param_ty(&function.returns[0]) == Ty::Slice;
        if !returns_ok {
            self.reporter.report(Diagnostic::error(
                codes::DISPATCH_HOOK_RETURN,
                format!("Should return slice.{expected}"),
                function.span,
            ));
        }

        if function.visibility != Visibility::Private {
            self.reporter.report(Diagnostic::error(
                codes::DISPATCH_HOOK_VISIBILITY,
                format!("Should be marked as private.{expected}"),
                function.span,
            ));
        }
        if !function.is_inline {
            self.reporter.report(Diagnostic::error(
                codes::DISPATCH_HOOK_INLINE,
                format!("Should be marked as inline.{expected}"),
                function.span,
            ));
        }
    }

    // ── Storage & type rules ──────────────────────────────────────

    fn check_state_variable(&mut self, vid: VarId) {
        let variable = self.ast.variable(vid);
        if variable.is_state && variable.ty.node == Ty::Slice {
            self.reporter.report(Diagnostic::error(
                codes::STATE_VARIABLE_TRANSIENT,
                "This type can't be used for state variables.",
                variable.span,
            ));
        }
    }

    /// Walk a written type looking for mapping nodes.
    fn check_type(&mut self, ty: &Ty, ty_span: Span) {
        match ty {
            Ty::Mapping(key, value) => {
                self.check_mapping_key(key, ty_span);
                self.check_type(key, ty_span);
                self.check_type(value, ty_span);
            }
            Ty::Array(inner) | Ty::FixedArray(inner, _) => self.check_type(inner, ty_span),
            Ty::Tuple(parts) => {
                for part in parts {
                    self.check_type(part, ty_span);
                }
            }
            _ => {}
        }
    }

    fn check_mapping_key(&mut self, key: &Ty, key_span: Span) {
        let Ty::Struct(sid) = key else {
            return;
        };
        let mut bit_length: u64 = 0;
        for &member in &self.ast.struct_def(*sid).members {
            let m = self.ast.variable(member);
            match m.ty.node.scalar_bits() {
                Some(bits) => bit_length += u64::from(bits),
                None => {
                    // Reported against the member itself, not the mapping.
                    self.reporter.report(Diagnostic::error(
                        codes::MAPPING_KEY_MEMBER,
                        "If a struct type is used as a mapping key, then every member of \
                         the struct must have an integer, boolean, fixed bytes or enum type.",
                        m.span,
                    ));
                }
            }
        }
        if bit_length > u64::from(self.config.cell_bits) {
            self.reporter.report(Diagnostic::error(
                codes::MAPPING_KEY_WIDTH,
                format!(
                    "If a struct type is used as a mapping key, the struct must fit \
                     in {} bits.",
                    self.config.cell_bits
                ),
                key_span,
            ));
        }
    }

    // ── Expression rules ──────────────────────────────────────────

    fn check_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            Stmt::VarDecl { init, .. } => {
                if let Some(init) = init {
                    self.check_expr(init);
                }
            }
            Stmt::Expr(expr) => self.check_expr(expr),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_expr(cond);
                self.check_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_block(else_branch);
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
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(post) = post {
                    self.check_expr(post);
                }
                self.check_block(body);
            }
            Stmt::TryCatch { body, clause, .. } => {
                self.check_block(body);
                self.check_block(clause);
            }
            Stmt::Asm { .. } => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::RangeIndex {
                base, start, end, ..
            } => {
                // An unannotated base means the upstream pass already
                // diagnosed it; do not re-validate.
                if let Some(base_ty) = self.ast.expr_types.get(&base.node()) {
                    if !base_ty.is_byte_array() {
                        self.reporter.report(Diagnostic::error(
                            codes::RANGE_ACCESS_BASE,
                            "Index range access is available only for bytes.",
                            expr.span(),
                        ));
                    }
                }
                self.check_expr(base);
                if let Some(start) = start {
                    self.check_expr(start);
                }
                if let Some(end) = end {
                    self.check_expr(end);
                }
            }
            Expr::Call { callee, args, .. } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            Expr::Member { base, .. } => self.check_expr(base),
            Expr::Index { base, index, .. } => {
                self.check_expr(base);
                self.check_expr(index);
            }
            Expr::Binary { lhs, rhs, .. } | Expr::Assign { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            Expr::Ident { .. } | Expr::Path { .. } | Expr::Literal { .. } => {}
        }
    }
}
