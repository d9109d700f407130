//! Declaration resolver.
//!
//! Walks the AST once, maintaining an explicit stack of lexical scopes,
//! and records for every identifier and qualified path which declaration
//! it denotes. The result is a side table; the tree itself is not
//! mutated. Downstream passes may assume that a node absent from the
//! table has already been diagnosed here.

use std::collections::HashMap;

use crate::ast::{
    Ast, Block, ContractId, DeclId, Expr, FunId, NodeId, SourceUnit, Stmt, VarId,
};
use crate::diagnostic::{codes, Diagnostic, Reporter};
use crate::span::Span;

/// Resolution results, keyed by node identity.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Uniquely resolved identifiers and paths.
    pub refs: HashMap<NodeId, DeclId>,
    /// Ambiguous identifiers: the candidate set (size >= 2). Only an
    /// error if a later pass requires a unique referent.
    pub candidates: HashMap<NodeId, Vec<DeclId>>,
    /// Full declaration chains of qualified paths.
    pub paths: HashMap<NodeId, Vec<DeclId>>,
    /// Per return statement: the function whose return parameter list is
    /// in scope, or `None` inside a modifier body.
    pub return_params: HashMap<NodeId, Option<FunId>>,
    /// Per documented declaration: the contract its documentation is
    /// inherited from.
    pub inheritdoc: HashMap<DeclId, ContractId>,
}

/// Marker for resolution failures that must abort the current statement's
/// subtree (continuing would dereference an unresolved declaration).
struct Fatal;

/// Resolve all identifiers in the given units.
///
/// Returns the side table and `true` iff this traversal reported no
/// error.
pub fn resolve(ast: &Ast, units: &[SourceUnit], reporter: &mut Reporter) -> (Resolution, bool) {
    let mut resolver = Resolver {
        ast,
        scopes: ScopeStack::default(),
        return_markers: Vec::new(),
        res: Resolution::default(),
        errored: false,
        reporter,
    };
    resolver.run(units);
    let errored = resolver.errored;
    (resolver.res, !errored)
}

// ─── Scope stack ──────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct ScopeEntry {
    decl: DeclId,
    /// Mid-block declarations start inactive and are activated after the
    /// declaring statement completes.
    active: bool,
}

#[derive(Default)]
struct ScopeStack {
    scopes: Vec<HashMap<String, Vec<ScopeEntry>>>,
}

impl ScopeStack {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        let popped = self.scopes.pop();
        assert!(popped.is_some(), "scope stack underflow");
    }

    fn declare(&mut self, name: &str, decl: DeclId, active: bool) {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => unreachable!("declaration outside any scope"),
        };
        scope
            .entry(name.to_string())
            .or_default()
            .push(ScopeEntry { decl, active });
    }

    /// Activate every entry for `name` in the innermost scope declaring it.
    fn activate(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(entries) = scope.get_mut(name) {
                for entry in entries {
                    entry.active = true;
                }
                return;
            }
        }
    }

    /// All active declarations of `name` from the nearest scope that has
    /// any. Multiple hits mean an overload set.
    fn lookup(&self, name: &str) -> Vec<DeclId> {
        for scope in self.scopes.iter().rev() {
            if let Some(entries) = scope.get(name) {
                let active: Vec<DeclId> = entries
                    .iter()
                    .filter(|e| e.active)
                    .map(|e| e.decl)
                    .collect();
                if !active.is_empty() {
                    return active;
                }
            }
        }
        Vec::new()
    }

    /// Whether `name` is declared somewhere in the stack but not active
    /// (or shadowed into inactivity) at this point.
    fn declared_but_inactive(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.contains_key(name))
            && self.lookup(name).is_empty()
    }

    /// Names visible at this point, for similarity suggestions.
    fn visible_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for scope in &self.scopes {
            for (name, entries) in scope {
                if entries.iter().any(|e| e.active) {
                    names.push(name.as_str());
                }
            }
        }
        names
    }
}

// ─── Similarity search ────────────────────────────────────────────

/// Levenshtein edit distance, two-row DP.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b.chars().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// The closest visible name within the edit-distance threshold.
fn similar_name(name: &str, visible: &[&str]) -> Option<String> {
    let max_distance = if name.chars().count() <= 4 { 2 } else { 3 };
    let mut best: Option<(&str, usize)> = None;
    for &candidate in visible {
        if candidate == name {
            continue;
        }
        let distance = edit_distance(name, candidate);
        if distance <= max_distance {
            match best {
                None => best = Some((candidate, distance)),
                Some((_, best_dist)) if distance < best_dist => {
                    best = Some((candidate, distance));
                }
                _ => {}
            }
        }
    }
    best.map(|(candidate, _)| candidate.to_string())
}

// ─── Resolver ─────────────────────────────────────────────────────

struct Resolver<'a> {
    ast: &'a Ast,
    scopes: ScopeStack,
    /// One marker per enclosing function or modifier; modifiers push
    /// `None` so nested returns are clearly not function returns.
    return_markers: Vec<Option<FunId>>,
    res: Resolution,
    errored: bool,
    reporter: &'a mut Reporter,
}

impl Resolver<'_> {
    fn run(&mut self, units: &[SourceUnit]) {
        self.scopes.push();
        for unit in units {
            for &cid in &unit.contracts {
                let contract = self.ast.contract(cid);
                self.scopes
                    .declare(&contract.name.node, DeclId::Contract(cid), true);
            }
            for &fid in &unit.free_functions {
                let function = self.ast.function(fid);
                self.scopes
                    .declare(&function.name.node, DeclId::Function(fid), true);
            }
        }

        for unit in units {
            for &cid in &unit.contracts {
                self.resolve_contract(cid);
            }
            for &fid in &unit.free_functions {
                self.resolve_function(fid);
            }
        }
        self.scopes.pop();
    }

    fn resolve_contract(&mut self, cid: ContractId) {
        let contract = self.ast.contract(cid);
        self.scopes.push();

        // Members of the whole linearized chain are in scope; derived
        // declarations are pushed first so they shadow base ones.
        for &base in &contract.linearized {
            let base_def = self.ast.contract(base);
            for &fid in &base_def.functions {
                let f = self.ast.function(fid);
                self.scopes
                    .declare(&f.name.node, DeclId::Function(fid), true);
            }
            for &vid in &base_def.state_vars {
                let v = self.ast.variable(vid);
                self.scopes
                    .declare(&v.name.node, DeclId::Variable(vid), true);
            }
            for &sid in &base_def.structs {
                let s = self.ast.struct_def(sid);
                self.scopes.declare(&s.name.node, DeclId::Struct(sid), true);
            }
            for &mid in &base_def.modifiers {
                let m = self.ast.modifier(mid);
                self.scopes
                    .declare(&m.name.node, DeclId::Modifier(mid), true);
            }
        }

        for &vid in &contract.state_vars {
            let v = self.ast.variable(vid);
            if let Some(doc) = v.doc.clone() {
                self.resolve_inherit_doc(DeclId::Variable(vid), &doc);
            }
        }
        for &fid in &contract.functions {
            self.resolve_function(fid);
        }
        for &mid in &contract.modifiers {
            self.resolve_modifier(mid);
        }

        self.scopes.pop();
    }

    fn resolve_function(&mut self, fid: FunId) {
        let function = self.ast.function(fid);
        if let Some(doc) = function.doc.clone() {
            self.resolve_inherit_doc(DeclId::Function(fid), &doc);
        }

        self.return_markers.push(Some(fid));
        self.scopes.push();
        for &vid in function.params.iter().chain(function.returns.iter()) {
            let v = self.ast.variable(vid);
            self.scopes
                .declare(&v.name.node, DeclId::Variable(vid), true);
        }
        if let Some(body) = &function.body {
            self.resolve_block(body);
        }
        self.scopes.pop();
        let marker = self.return_markers.pop();
        assert!(marker.is_some(), "return-parameter stack underflow");
    }

    fn resolve_modifier(&mut self, mid: crate::ast::ModId) {
        let modifier = self.ast.modifier(mid);
        if let Some(doc) = modifier.doc.clone() {
            self.resolve_inherit_doc(DeclId::Modifier(mid), &doc);
        }

        self.return_markers.push(None);
        self.scopes.push();
        for &vid in &modifier.params {
            let v = self.ast.variable(vid);
            self.scopes
                .declare(&v.name.node, DeclId::Variable(vid), true);
        }
        if let Some(body) = &modifier.body {
            self.resolve_block(body);
        }
        self.scopes.pop();
        let marker = self.return_markers.pop();
        assert!(marker.is_some(), "return-parameter stack underflow");
    }

    fn resolve_block(&mut self, block: &Block) {
        self.scopes.push();

        // Pre-register every declaration of the block as inactive, so a
        // use before the declaring statement reads as "not yet visible"
        // rather than "undeclared".
        for stmt in &block.stmts {
            if let Stmt::VarDecl { vars, .. } = stmt {
                for &vid in vars {
                    let v = self.ast.variable(vid);
                    self.scopes
                        .declare(&v.name.node, DeclId::Variable(vid), false);
                }
            }
        }

        for stmt in &block.stmts {
            // A fatal failure aborts only this statement's subtree.
            let _ = self.resolve_stmt(stmt);
        }

        self.scopes.pop();
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<(), Fatal> {
        match stmt {
            Stmt::Block(block) => {
                self.resolve_block(block);
                Ok(())
            }
            Stmt::VarDecl { vars, init, .. } => {
                let result = match init {
                    Some(init) => self.resolve_expr(init),
                    None => Ok(()),
                };
                // Activation fires after the statement is fully processed,
                // making the variables visible to subsequent siblings only.
                for &vid in vars {
                    self.activate_variable(vid);
                }
                result
            }
            Stmt::Expr(expr) => self.resolve_expr(expr),
            Stmt::Return { node, value, .. } => {
                let marker = match self.return_markers.last() {
                    Some(marker) => *marker,
                    None => unreachable!("return outside any function or modifier"),
                };
                self.res.return_params.insert(*node, marker);
                match value {
                    Some(value) => self.resolve_expr(value),
                    None => Ok(()),
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(cond)?;
                self.resolve_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_block(else_branch);
                }
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                // The loop header shares one scope with the body; the
                // scope is restored on every exit path.
                self.scopes.push();
                let result = self.resolve_for_parts(init, cond, post, body);
                self.scopes.pop();
                result
            }
            Stmt::TryCatch {
                body,
                clause_params,
                clause,
                ..
            } => {
                self.resolve_block(body);
                self.scopes.push();
                for &vid in clause_params {
                    let v = self.ast.variable(vid);
                    self.scopes
                        .declare(&v.name.node, DeclId::Variable(vid), true);
                }
                self.resolve_block(clause);
                self.scopes.pop();
                Ok(())
            }
            // Inline assembly is opaque to this resolver.
            Stmt::Asm { .. } => Ok(()),
        }
    }

    fn resolve_for_parts(
        &mut self,
        init: &Option<Box<Stmt>>,
        cond: &Option<Expr>,
        post: &Option<Expr>,
        body: &Block,
    ) -> Result<(), Fatal> {
        if let Some(init) = init {
            if let Stmt::VarDecl { vars, .. } = init.as_ref() {
                for &vid in vars {
                    let v = self.ast.variable(vid);
                    self.scopes
                        .declare(&v.name.node, DeclId::Variable(vid), false);
                }
            }
            self.resolve_stmt(init)?;
        }
        if let Some(cond) = cond {
            self.resolve_expr(cond)?;
        }
        if let Some(post) = post {
            self.resolve_expr(post)?;
        }
        self.resolve_block(body);
        Ok(())
    }

    fn activate_variable(&mut self, vid: VarId) {
        let name = &self.ast.variable(vid).name.node;
        self.scopes.activate(name);
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<(), Fatal> {
        match expr {
            Expr::Ident { node, name, span } => {
                self.resolve_ident(*node, name, *span);
                Ok(())
            }
            Expr::Path {
                node,
                segments,
                span,
            } => self.resolve_path(*node, segments, *span),
            Expr::Literal { .. } => Ok(()),
            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            // Member names resolve against the base expression's type,
            // which is the generic type checker's business, not ours.
            Expr::Member { base, .. } => self.resolve_expr(base),
            Expr::Index { base, index, .. } => {
                self.resolve_expr(base)?;
                self.resolve_expr(index)
            }
            Expr::RangeIndex {
                base, start, end, ..
            } => {
                self.resolve_expr(base)?;
                if let Some(start) = start {
                    self.resolve_expr(start)?;
                }
                if let Some(end) = end {
                    self.resolve_expr(end)?;
                }
                Ok(())
            }
            Expr::Binary { lhs, rhs, .. } | Expr::Assign { lhs, rhs, .. } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)
            }
        }
    }

    fn resolve_ident(&mut self, node: NodeId, name: &str, span: Span) {
        let declarations = self.scopes.lookup(name);
        match declarations.len() {
            0 => {
                let mut message = "Undeclared identifier.".to_string();
                if self.scopes.declared_but_inactive(name) {
                    message.push_str(&format!(
                        " \"{name}\" is not (or not yet) visible at this point."
                    ));
                } else if let Some(suggestion) = similar_name(name, &self.scopes.visible_names()) {
                    message.push_str(&format!(" Did you mean \"{suggestion}\"?"));
                }
                self.error(Diagnostic::error(
                    codes::UNDECLARED_IDENTIFIER,
                    message,
                    span,
                ));
            }
            1 => {
                self.res.refs.insert(node, declarations[0]);
            }
            _ => {
                self.res.candidates.insert(node, declarations);
            }
        }
    }

    fn resolve_path(
        &mut self,
        node: NodeId,
        segments: &[crate::span::Spanned<String>],
        span: Span,
    ) -> Result<(), Fatal> {
        match self.lookup_path(segments) {
            Some(chain) => {
                if let Some(&last) = chain.last() {
                    self.res.refs.insert(node, last);
                }
                self.res.paths.insert(node, chain);
                Ok(())
            }
            None => {
                self.error(Diagnostic::error(
                    codes::PATH_NOT_UNIQUE,
                    "Identifier not found or not unique.",
                    span,
                ));
                Err(Fatal)
            }
        }
    }

    /// Resolve a dotted path segment by segment. Every intermediate step
    /// must be unique; any failure yields `None`.
    fn lookup_path(&self, segments: &[crate::span::Spanned<String>]) -> Option<Vec<DeclId>> {
        let first = segments.first()?;
        let hits = self.scopes.lookup(&first.node);
        if hits.len() != 1 {
            return None;
        }
        let mut chain = vec![hits[0]];
        for segment in &segments[1..] {
            let current = *chain.last()?;
            let members = self.members_of(current, &segment.node);
            if members.len() != 1 {
                return None;
            }
            chain.push(members[0]);
        }
        Some(chain)
    }

    /// Declarations named `name` inside `decl`. For contracts the whole
    /// linearized chain is searched, nearest contract first.
    fn members_of(&self, decl: DeclId, name: &str) -> Vec<DeclId> {
        match decl {
            DeclId::Contract(cid) => {
                for &base in &self.ast.contract(cid).linearized {
                    let base_def = self.ast.contract(base);
                    let mut hits = Vec::new();
                    for &fid in &base_def.functions {
                        if self.ast.function(fid).name.node == name {
                            hits.push(DeclId::Function(fid));
                        }
                    }
                    for &vid in &base_def.state_vars {
                        if self.ast.variable(vid).name.node == name {
                            hits.push(DeclId::Variable(vid));
                        }
                    }
                    for &sid in &base_def.structs {
                        if self.ast.struct_def(sid).name.node == name {
                            hits.push(DeclId::Struct(sid));
                        }
                    }
                    for &mid in &base_def.modifiers {
                        if self.ast.modifier(mid).name.node == name {
                            hits.push(DeclId::Modifier(mid));
                        }
                    }
                    if !hits.is_empty() {
                        return hits;
                    }
                }
                Vec::new()
            }
            DeclId::Struct(sid) => self
                .ast
                .struct_def(sid)
                .members
                .iter()
                .copied()
                .filter(|&vid| self.ast.variable(vid).name.node == name)
                .map(DeclId::Variable)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn resolve_inherit_doc(&mut self, decl: DeclId, doc: &crate::ast::DocComment) {
        let occurrences: Vec<&str> = doc
            .tags
            .iter()
            .filter(|(tag, _)| tag == "inheritdoc")
            .map(|(_, body)| body.as_str())
            .collect();

        let name = match occurrences.as_slice() {
            [] => return,
            [name] => name.trim(),
            _ => {
                self.error(Diagnostic::error(
                    codes::INHERITDOC_REPEATED,
                    "Documentation tag @inheritdoc can only be given once.",
                    doc.span,
                ));
                return;
            }
        };

        if name.is_empty() {
            self.error(Diagnostic::error(
                codes::INHERITDOC_MISSING_NAME,
                "Expected contract name following documentation tag @inheritdoc.",
                doc.span,
            ));
            return;
        }

        let segments: Vec<crate::span::Spanned<String>> = name
            .split('.')
            .map(|s| crate::span::Spanned::new(s.to_string(), doc.span))
            .collect();
        if segments.iter().any(|s| s.node.is_empty()) {
            self.error(Diagnostic::error(
                codes::INHERITDOC_MALFORMED,
                format!("Documentation tag @inheritdoc reference \"{name}\" is malformed."),
                doc.span,
            ));
            return;
        }

        let chain = match self.lookup_path(&segments) {
            Some(chain) => chain,
            None => {
                self.error(Diagnostic::error(
                    codes::INHERITDOC_UNKNOWN_CONTRACT,
                    format!(
                        "Documentation tag @inheritdoc references inexistent contract \"{name}\"."
                    ),
                    doc.span,
                ));
                return;
            }
        };

        match chain.last() {
            Some(DeclId::Contract(cid)) => {
                self.res.inheritdoc.insert(decl, *cid);
            }
            _ => {
                self.error(Diagnostic::error(
                    codes::INHERITDOC_NOT_A_CONTRACT,
                    format!(
                        "Documentation tag @inheritdoc reference \"{name}\" is not a contract."
                    ),
                    doc.span,
                ));
            }
        }
    }

    fn error(&mut self, diagnostic: Diagnostic) {
        self.errored = true;
        self.reporter.report(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ContractDef, DocComment, FunctionDef, FunctionKind, StructDef, StructId, Ty,
        VariableDef, Visibility,
    };
    use crate::span::Spanned;

    fn local(ast: &mut Ast, name: &str) -> VarId {
        let id = VarId(ast.variables.len());
        ast.variables.push(VariableDef {
            name: Spanned::dummy(name.to_string()),
            ty: Spanned::dummy(Ty::Uint(256)),
            is_state: false,
            is_public: false,
            contract: None,
            doc: None,
            span: Span::dummy(),
        });
        id
    }

    fn ident(ast: &mut Ast, name: &str) -> Expr {
        Expr::Ident {
            node: ast.fresh_node(),
            name: name.to_string(),
            span: Span::dummy(),
        }
    }

    fn free_function(ast: &mut Ast, name: &str, body: Block) -> FunId {
        let id = FunId(ast.functions.len());
        ast.functions.push(FunctionDef {
            name: Spanned::dummy(name.to_string()),
            contract: None,
            visibility: Visibility::Internal,
            kind: FunctionKind::Regular,
            function_id: None,
            is_responsible: false,
            is_inline: false,
            internal_msg: true,
            external_msg: false,
            params: Vec::new(),
            returns: Vec::new(),
            base_functions: Vec::new(),
            base_calls: Vec::new(),
            body: Some(body),
            doc: None,
            span: Span::dummy(),
        });
        id
    }

    fn empty_contract(ast: &mut Ast, name: &str) -> ContractId {
        let id = ContractId(ast.contracts.len());
        ast.contracts.push(ContractDef {
            name: Spanned::dummy(name.to_string()),
            linearized: vec![id],
            inheritance: Vec::new(),
            functions: Vec::new(),
            state_vars: Vec::new(),
            structs: Vec::new(),
            modifiers: Vec::new(),
            doc: None,
            span: Span::dummy(),
        });
        id
    }

    fn unit_with(contracts: Vec<ContractId>, free_functions: Vec<FunId>) -> SourceUnit {
        SourceUnit {
            pragmas: Default::default(),
            contracts,
            free_functions,
        }
    }

    fn resolve_unit(ast: &Ast, unit: SourceUnit) -> (Resolution, Vec<Diagnostic>, bool) {
        let mut reporter = Reporter::new();
        let (res, ok) = resolve(ast, &[unit], &mut reporter);
        (res, reporter.take(), ok)
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("balance", "balanse"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_use_before_declaration_is_not_yet_visible() {
        let mut ast = Ast::new();
        let x = local(&mut ast, "x");
        let use_x = ident(&mut ast, "x");
        let body = Block {
            stmts: vec![
                Stmt::Expr(use_x),
                Stmt::VarDecl {
                    vars: vec![x],
                    init: None,
                    span: Span::dummy(),
                },
            ],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (_, diags, ok) = resolve_unit(&ast, unit_with(vec![], vec![f]));
        assert!(!ok);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::UNDECLARED_IDENTIFIER);
        assert!(
            diags[0].message.contains("not (or not yet) visible"),
            "got: {}",
            diags[0].message
        );
    }

    #[test]
    fn test_use_after_declaration_resolves() {
        let mut ast = Ast::new();
        let x = local(&mut ast, "x");
        let use_x = ident(&mut ast, "x");
        let use_node = use_x.node();
        let body = Block {
            stmts: vec![
                Stmt::VarDecl {
                    vars: vec![x],
                    init: None,
                    span: Span::dummy(),
                },
                Stmt::Expr(use_x),
            ],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (res, diags, ok) = resolve_unit(&ast, unit_with(vec![], vec![f]));
        assert!(ok, "unexpected diagnostics: {diags:?}");
        assert_eq!(res.refs.get(&use_node), Some(&DeclId::Variable(x)));
    }

    #[test]
    fn test_unknown_name_suggests_near_miss() {
        let mut ast = Ast::new();
        let balance = local(&mut ast, "balance");
        let use_bad = ident(&mut ast, "balanse");
        let body = Block {
            stmts: vec![
                Stmt::VarDecl {
                    vars: vec![balance],
                    init: None,
                    span: Span::dummy(),
                },
                Stmt::Expr(use_bad),
            ],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (_, diags, _) = resolve_unit(&ast, unit_with(vec![], vec![f]));
        assert_eq!(diags.len(), 1);
        assert!(
            diags[0].message.contains("Did you mean \"balance\"?"),
            "got: {}",
            diags[0].message
        );
    }

    #[test]
    fn test_unknown_name_without_near_miss_is_plain_undeclared() {
        let mut ast = Ast::new();
        let use_bad = ident(&mut ast, "zzz_nothing_alike");
        let body = Block {
            stmts: vec![Stmt::Expr(use_bad)],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (_, diags, _) = resolve_unit(&ast, unit_with(vec![], vec![f]));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Undeclared identifier.");
    }

    #[test]
    fn test_fatal_path_aborts_only_its_statement() {
        let mut ast = Ast::new();
        let x = local(&mut ast, "x");
        let bad_path = Expr::Path {
            node: ast.fresh_node(),
            segments: vec![
                Spanned::dummy("Nowhere".to_string()),
                Spanned::dummy("thing".to_string()),
            ],
            span: Span::dummy(),
        };
        let use_x = ident(&mut ast, "x");
        let use_node = use_x.node();
        let body = Block {
            stmts: vec![
                Stmt::VarDecl {
                    vars: vec![x],
                    init: None,
                    span: Span::dummy(),
                },
                Stmt::Expr(bad_path),
                Stmt::Expr(use_x),
            ],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (res, diags, ok) = resolve_unit(&ast, unit_with(vec![], vec![f]));
        assert!(!ok);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::PATH_NOT_UNIQUE);
        // The statement after the fatal one was still resolved.
        assert_eq!(res.refs.get(&use_node), Some(&DeclId::Variable(x)));
    }

    #[test]
    fn test_qualified_path_resolves_chain() {
        let mut ast = Ast::new();
        let cid = empty_contract(&mut ast, "Wallet");
        let member = local(&mut ast, "owner");
        ast.variables[member.0].is_state = true;
        ast.variables[member.0].contract = Some(cid);
        ast.contracts[cid.0].state_vars.push(member);

        let path = Expr::Path {
            node: ast.fresh_node(),
            segments: vec![
                Spanned::dummy("Wallet".to_string()),
                Spanned::dummy("owner".to_string()),
            ],
            span: Span::dummy(),
        };
        let path_node = path.node();
        let body = Block {
            stmts: vec![Stmt::Expr(path)],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (res, diags, ok) = resolve_unit(&ast, unit_with(vec![cid], vec![f]));
        assert!(ok, "unexpected diagnostics: {diags:?}");
        let chain = res.paths.get(&path_node).unwrap();
        assert_eq!(
            chain.as_slice(),
            &[DeclId::Contract(cid), DeclId::Variable(member)]
        );
        assert_eq!(res.refs.get(&path_node), Some(&DeclId::Variable(member)));
    }

    #[test]
    fn test_return_captures_function_and_modifier_marker() {
        let mut ast = Ast::new();
        let ret_in_fn = ast.fresh_node();
        let body = Block {
            stmts: vec![Stmt::Return {
                node: ret_in_fn,
                value: None,
                span: Span::dummy(),
            }],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);

        let cid = empty_contract(&mut ast, "C");
        let ret_in_mod = ast.fresh_node();
        let mid = crate::ast::ModId(ast.modifiers.len());
        ast.modifiers.push(crate::ast::ModifierDef {
            name: Spanned::dummy("guard".to_string()),
            contract: Some(cid),
            params: Vec::new(),
            body: Some(Block {
                stmts: vec![Stmt::Return {
                    node: ret_in_mod,
                    value: None,
                    span: Span::dummy(),
                }],
                span: Span::dummy(),
            }),
            doc: None,
            span: Span::dummy(),
        });
        ast.contracts[cid.0].modifiers.push(mid);

        let (res, diags, ok) = resolve_unit(&ast, unit_with(vec![cid], vec![f]));
        assert!(ok, "unexpected diagnostics: {diags:?}");
        assert_eq!(res.return_params.get(&ret_in_fn), Some(&Some(f)));
        assert_eq!(res.return_params.get(&ret_in_mod), Some(&None));
    }

    #[test]
    fn test_asm_block_is_opaque() {
        let mut ast = Ast::new();
        let body = Block {
            stmts: vec![Stmt::Asm {
                body: "PUSHINT undeclared_thing".to_string(),
                span: Span::dummy(),
            }],
            span: Span::dummy(),
        };
        let f = free_function(&mut ast, "f", body);
        let (_, diags, ok) = resolve_unit(&ast, unit_with(vec![], vec![f]));
        assert!(ok, "asm must not be traversed: {diags:?}");
    }

    fn doc_with(tags: &[(&str, &str)]) -> DocComment {
        DocComment {
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            span: Span::new(0, 1, 5),
        }
    }

    fn contract_with_documented_fn(
        ast: &mut Ast,
        doc: DocComment,
    ) -> (ContractId, FunId) {
        let base = empty_contract(ast, "Base");
        let cid = empty_contract(ast, "C");
        ast.contracts[cid.0].linearized = vec![cid, base];
        let fid = free_function(
            ast,
            "f",
            Block {
                stmts: vec![],
                span: Span::dummy(),
            },
        );
        ast.functions[fid.0].contract = Some(cid);
        ast.functions[fid.0].doc = Some(doc);
        ast.contracts[cid.0].functions.push(fid);
        (cid, fid)
    }

    #[test]
    fn test_inheritdoc_resolves_contract() {
        let mut ast = Ast::new();
        let (cid, fid) = contract_with_documented_fn(&mut ast, doc_with(&[("inheritdoc", "Base")]));
        let base = ast.contracts[cid.0].linearized[1];
        let unit = unit_with(vec![base, cid], vec![]);
        let (res, diags, ok) = resolve_unit(&ast, unit);
        assert!(ok, "unexpected diagnostics: {diags:?}");
        assert_eq!(res.inheritdoc.get(&DeclId::Function(fid)), Some(&base));
    }

    #[test]
    fn test_inheritdoc_failure_modes_are_distinct() {
        let cases: Vec<(DocComment, u32)> = vec![
            (
                doc_with(&[("inheritdoc", "Base"), ("inheritdoc", "Base")]),
                codes::INHERITDOC_REPEATED,
            ),
            (doc_with(&[("inheritdoc", "")]), codes::INHERITDOC_MISSING_NAME),
            (
                doc_with(&[("inheritdoc", "Base..x")]),
                codes::INHERITDOC_MALFORMED,
            ),
            (
                doc_with(&[("inheritdoc", "Missing")]),
                codes::INHERITDOC_UNKNOWN_CONTRACT,
            ),
            (doc_with(&[("inheritdoc", "f")]), codes::INHERITDOC_NOT_A_CONTRACT),
        ];
        for (doc, expected_code) in cases {
            let mut ast = Ast::new();
            let (cid, _) = contract_with_documented_fn(&mut ast, doc);
            let base = ast.contracts[cid.0].linearized[1];
            let unit = unit_with(vec![base, cid], vec![]);
            let (_, diags, ok) = resolve_unit(&ast, unit);
            assert!(!ok);
            assert_eq!(diags.len(), 1, "diags: {diags:?}");
            assert_eq!(diags[0].code, expected_code, "message: {}", diags[0].message);
        }
    }

    #[test]
    fn test_overload_set_recorded_as_candidates() {
        let mut ast = Ast::new();
        let cid = empty_contract(&mut ast, "C");
        let empty = Block {
            stmts: vec![],
            span: Span::dummy(),
        };
        let f1 = free_function(&mut ast, "get", empty.clone());
        let f2 = free_function(&mut ast, "get", empty.clone());
        ast.contracts[cid.0].functions.extend([f1, f2]);

        let use_get = ident(&mut ast, "get");
        let use_node = use_get.node();
        let caller = free_function(
            &mut ast,
            "caller",
            Block {
                stmts: vec![Stmt::Expr(use_get)],
                span: Span::dummy(),
            },
        );
        ast.contracts[cid.0].functions.push(caller);

        let (res, diags, ok) = resolve_unit(&ast, unit_with(vec![cid], vec![]));
        assert!(ok, "unexpected diagnostics: {diags:?}");
        let candidates = res.candidates.get(&use_node).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_struct_member_path() {
        let mut ast = Ast::new();
        let cid = empty_contract(&mut ast, "C");
        let member = local(&mut ast, "slot");
        let sid = StructId(ast.structs.len());
        ast.structs.push(StructDef {
            name: Spanned::dummy("Layout".to_string()),
            members: vec![member],
            span: Span::dummy(),
        });
        ast.contracts[cid.0].structs.push(sid);

        let path = Expr::Path {
            node: ast.fresh_node(),
            segments: vec![
                Spanned::dummy("C".to_string()),
                Spanned::dummy("Layout".to_string()),
                Spanned::dummy("slot".to_string()),
            ],
            span: Span::dummy(),
        };
        let path_node = path.node();
        let f = free_function(
            &mut ast,
            "f",
            Block {
                stmts: vec![Stmt::Expr(path)],
                span: Span::dummy(),
            },
        );
        let (res, diags, ok) = resolve_unit(&ast, unit_with(vec![cid], vec![f]));
        assert!(ok, "unexpected diagnostics: {diags:?}");
        let chain = res.paths.get(&path_node).unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[2], DeclId::Variable(member));
    }
}
