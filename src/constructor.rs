//! Constructor composition.
//!
//! Every contract gets exactly one physical constructor entry point, no
//! matter how many ancestors define constructors of their own. The
//! synthesizer walks the base-argument graph depth first, visits each
//! ancestor at most once, and emits the ancestor constructor bodies
//! base-first under a storage-init and run-once prologue.

use std::collections::{HashMap, HashSet};

use petgraph::graphmap::DiGraphMap;

use crate::ast::{Ast, ContractId, Expr};
use crate::bytecode::{Function, FunctionSlot, Pusher};
use crate::codegen::emit_expr;
use crate::config::CompilerConfig;
use crate::diagnostic::{codes, Diagnostic, Reporter};

enum Walk {
    Enter(ContractId, Option<ContractId>),
    Exit(ContractId),
}

pub struct ConstructorSynthesizer<'a> {
    ast: &'a Ast,
    config: &'a CompilerConfig,
    reporter: &'a mut Reporter,
}

impl<'a> ConstructorSynthesizer<'a> {
    pub fn new(ast: &'a Ast, config: &'a CompilerConfig, reporter: &'a mut Reporter) -> Self {
        Self {
            ast,
            config,
            reporter,
        }
    }

    /// Compose the single constructor entry point for `contract`.
    pub fn synthesize(&mut self, contract: ContractId) -> Function {
        let (order, taken_args) = self.base_order(contract);
        self.check_required_args(contract, &order, &taken_args);

        let contract_def = self.ast.contract(contract);
        let mut pusher = Pusher::new();
        pusher.comment(format!("constructor of {}", contract_def.name.node));
        pusher.init_storage();
        pusher.once_guard(self.config.constructor_guard_exception);

        for &cid in &order {
            if self.ast.constructor_of(cid).is_none() {
                continue;
            }
            let base_def = self.ast.contract(cid);
            pusher.comment(format!("{} constructor body", base_def.name.node));
            if let Some(args) = taken_args.get(&cid) {
                for arg in *args {
                    emit_expr(self.ast, &mut pusher, arg);
                }
            }
            pusher.call(format!("{}::constructor", base_def.name.node));
        }
        pusher.ret();
        pusher.finish("constructor", FunctionSlot::Constructor)
    }

    /// Depth-first visitation order over the base-argument graph,
    /// ancestors before descendants, plus the argument list bound to
    /// each ancestor.
    ///
    /// A diamond-shared ancestor is visited once; the first visit binds
    /// its arguments. An ancestor the taken path reaches without
    /// arguments may still receive them through another edge, for
    /// example a constructor header naming a non-direct base; the most
    /// derived supplier wins then.
    fn base_order(
        &self,
        contract: ContractId,
    ) -> (Vec<ContractId>, HashMap<ContractId, &'a [Expr]>) {
        let mut graph: DiGraphMap<ContractId, Option<&'a [Expr]>> = DiGraphMap::new();

        for &cid in &self.ast.contract(contract).linearized {
            graph.add_node(cid);
            let def = self.ast.contract(cid);
            for spec in &def.inheritance {
                graph.add_edge(cid, spec.base, spec.args.as_deref());
            }
            // Forwarding written on the constructor header wins over the
            // inheritance list: the edge weight is overwritten in place.
            if let Some(ctor) = self.ast.constructor_of(cid) {
                for call in &self.ast.function(ctor).base_calls {
                    graph.add_edge(cid, call.base, Some(call.args.as_slice()));
                }
            }
        }
        // A cycle here means the upstream linearization is broken.
        assert!(
            !petgraph::algo::is_cyclic_directed(&graph),
            "cyclic inheritance reached constructor composition"
        );

        let mut visited: HashSet<ContractId> = HashSet::new();
        let mut order: Vec<ContractId> = Vec::new();
        let mut taken_args: HashMap<ContractId, &'a [Expr]> = HashMap::new();

        let mut stack = vec![Walk::Enter(contract, None)];
        while let Some(step) = stack.pop() {
            match step {
                Walk::Enter(cid, from) => {
                    if !visited.insert(cid) {
                        continue;
                    }
                    if let Some(from) = from {
                        if let Some(&Some(args)) = graph.edge_weight(from, cid) {
                            taken_args.insert(cid, args);
                        }
                    }
                    stack.push(Walk::Exit(cid));
                    // Reversed push so the first declared base is entered
                    // first. Edge insertion order is declaration order.
                    let bases: Vec<ContractId> = graph.neighbors(cid).collect();
                    for &base in bases.iter().rev() {
                        stack.push(Walk::Enter(base, Some(cid)));
                    }
                }
                Walk::Exit(cid) => order.push(cid),
            }
        }
        debug_assert_eq!(order.len(), visited.len());
        debug_assert_eq!(order.last(), Some(&contract));

        // Arguments written on edges the walk did not take.
        for &cid in &order {
            if taken_args.contains_key(&cid) {
                continue;
            }
            for &from in &self.ast.contract(contract).linearized {
                if let Some(&Some(args)) = graph.edge_weight(from, cid) {
                    taken_args.insert(cid, args);
                    break;
                }
            }
        }
        (order, taken_args)
    }

    /// An ancestor whose constructor requires arguments must have been
    /// bound arguments somewhere along the chain.
    fn check_required_args(
        &mut self,
        contract: ContractId,
        order: &[ContractId],
        taken_args: &HashMap<ContractId, &'a [Expr]>,
    ) {
        for &cid in order {
            if cid == contract {
                continue;
            }
            let Some(ctor) = self.ast.constructor_of(cid) else {
                continue;
            };
            let ctor_def = self.ast.function(ctor);
            if !ctor_def.params.is_empty() && !taken_args.contains_key(&cid) {
                let contract_def = self.ast.contract(contract);
                self.reporter.report(
                    Diagnostic::error(
                        codes::BASE_CONSTRUCTOR_ARGS,
                        format!(
                            "Constructor of the base contract `{}` requires arguments, \
                             but none are forwarded to it.",
                            self.ast.contract(cid).name.node
                        ),
                        contract_def.span,
                    )
                    .with_secondary(ctor_def.span, "Declaration of the base constructor:"),
                );
            }
        }
    }
}
