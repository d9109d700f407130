//! Contract AST, as handed to the backend.
//!
//! The tree arrives fully parsed, with generic types already assigned by
//! the upstream type checker (the `expr_types` side table). Declarations
//! live in per-kind arenas on `Ast` and are addressed by copyable typed
//! IDs, so declaration identity is stable and cheap to key sets and maps
//! with.

use std::collections::HashMap;

use crate::span::{Span, Spanned};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

arena_id!(ContractId);
arena_id!(FunId);
arena_id!(VarId);
arena_id!(StructId);
arena_id!(ModId);

/// Identity of an expression or statement node, used to key side tables
/// (resolution results, upstream type assignment).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A named declaration of any kind. Closed set: downstream code matches
/// exhaustively instead of downcasting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclId {
    Contract(ContractId),
    Function(FunId),
    Variable(VarId),
    Struct(StructId),
    Modifier(ModId),
}

// ─── Types ────────────────────────────────────────────────────────

/// Target-machine types, as assigned by the upstream type checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Uint(u16),
    Int(u16),
    Bool,
    Address,
    FixedBytes(u8),
    /// Enum values are stored as one byte.
    Enum(String),
    /// Transient read cursor over a serialized cell.
    Slice,
    /// The serialized blob value type.
    Cell,
    /// Write cursor, counterpart of `Slice`.
    Builder,
    Bytes,
    Str,
    Array(Box<Ty>),
    FixedArray(Box<Ty>, u64),
    Mapping(Box<Ty>, Box<Ty>),
    Struct(StructId),
    Tuple(Vec<Ty>),
}

impl Ty {
    /// Bit width of fixed-width scalar kinds (integer, boolean, fixed-size
    /// byte array, enum). `None` for everything else.
    pub fn scalar_bits(&self) -> Option<u32> {
        match self {
            Ty::Uint(bits) | Ty::Int(bits) => Some(u32::from(*bits)),
            Ty::Bool => Some(1),
            Ty::FixedBytes(len) => Some(u32::from(*len) * 8),
            Ty::Enum(_) => Some(8),
            _ => None,
        }
    }

    /// Whether a sub-range index may be taken on a value of this type.
    pub fn is_byte_array(&self) -> bool {
        matches!(self, Ty::Bytes | Ty::Str)
    }

    /// Canonical type name used in signatures and the ABI.
    pub fn canonical_name(&self, ast: &Ast) -> String {
        match self {
            Ty::Uint(bits) => format!("uint{bits}"),
            Ty::Int(bits) => format!("int{bits}"),
            Ty::Bool => "bool".to_string(),
            Ty::Address => "address".to_string(),
            Ty::FixedBytes(len) => format!("fixedbytes{len}"),
            Ty::Enum(name) => format!("enum {name}"),
            Ty::Slice => "slice".to_string(),
            Ty::Cell => "cell".to_string(),
            Ty::Builder => "builder".to_string(),
            Ty::Bytes => "bytes".to_string(),
            Ty::Str => "string".to_string(),
            Ty::Array(inner) => format!("{}[]", inner.canonical_name(ast)),
            Ty::FixedArray(inner, len) => format!("{}[{len}]", inner.canonical_name(ast)),
            Ty::Mapping(key, value) => format!(
                "map({},{})",
                key.canonical_name(ast),
                value.canonical_name(ast)
            ),
            Ty::Struct(sid) => ast.structs[sid.0].name.node.clone(),
            Ty::Tuple(parts) => {
                let names: Vec<String> = parts.iter().map(|t| t.canonical_name(ast)).collect();
                format!("({})", names.join(","))
            }
        }
    }
}

// ─── Declarations ─────────────────────────────────────────────────

/// Documentation block attached to a declaration. Tags are `(name, body)`
/// pairs in source order; the same tag may repeat.
#[derive(Clone, Debug, Default)]
pub struct DocComment {
    pub tags: Vec<(String, String)>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Internal,
    Public,
    External,
}

impl Visibility {
    /// Part of the contract's callable surface.
    pub fn is_public(self) -> bool {
        matches!(self, Visibility::Public | Visibility::External)
    }
}

/// What role a function plays in the calling convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Regular,
    Constructor,
    Receive,
    Fallback,
    OnTickTock,
    OnBounce,
}

/// Explicit constructor-argument forwarding to one base, written inside
/// the constructor header.
#[derive(Clone, Debug)]
pub struct BaseCall {
    pub base: ContractId,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: Spanned<String>,
    pub contract: Option<ContractId>,
    pub visibility: Visibility,
    pub kind: FunctionKind,
    /// Explicit numeric identifier from the source, if any.
    pub function_id: Option<Spanned<u32>>,
    pub is_responsible: bool,
    pub is_inline: bool,
    pub internal_msg: bool,
    pub external_msg: bool,
    /// Parameters and return parameters are variable declarations so
    /// they participate in name resolution like any other declaration.
    pub params: Vec<VarId>,
    pub returns: Vec<VarId>,
    /// The override set, populated by generic resolution upstream.
    pub base_functions: Vec<FunId>,
    /// Only meaningful on constructors.
    pub base_calls: Vec<BaseCall>,
    pub body: Option<Block>,
    pub doc: Option<DocComment>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct VariableDef {
    pub name: Spanned<String>,
    pub ty: Spanned<Ty>,
    /// Contract-level persistent variable, as opposed to a local.
    pub is_state: bool,
    pub is_public: bool,
    pub contract: Option<ContractId>,
    pub doc: Option<DocComment>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: Spanned<String>,
    /// Members are variable declarations so each carries its own location.
    pub members: Vec<VarId>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ModifierDef {
    pub name: Spanned<String>,
    pub contract: Option<ContractId>,
    pub params: Vec<VarId>,
    pub body: Option<Block>,
    pub doc: Option<DocComment>,
    pub span: Span,
}

/// A base named in a contract header, optionally with forwarded
/// constructor arguments.
#[derive(Clone, Debug)]
pub struct InheritanceSpec {
    pub base: ContractId,
    pub args: Option<Vec<Expr>>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ContractDef {
    pub name: Spanned<String>,
    /// Linearized base chain, most-derived first; `self` is element 0.
    /// Computed upstream, immutable here.
    pub linearized: Vec<ContractId>,
    pub inheritance: Vec<InheritanceSpec>,
    /// Defined functions in declaration order.
    pub functions: Vec<FunId>,
    pub state_vars: Vec<VarId>,
    pub structs: Vec<StructId>,
    pub modifiers: Vec<ModId>,
    pub doc: Option<DocComment>,
    pub span: Span,
}

impl ContractDef {
    pub fn name_str(&self) -> &str {
        &self.name.node
    }
}

// ─── Statements & expressions ─────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Block(Block),
    /// Local declaration. The variables become visible to subsequent
    /// sibling statements only, after an explicit activation step.
    VarDecl {
        vars: Vec<VarId>,
        init: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
    Return {
        node: NodeId,
        value: Option<Expr>,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Expr>,
        body: Block,
        span: Span,
    },
    TryCatch {
        body: Block,
        clause_params: Vec<VarId>,
        clause: Block,
        span: Span,
    },
    /// Inline low-level assembly, opaque to resolution.
    Asm {
        body: String,
        span: Span,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lit {
    Number(u128),
    Bool(bool),
    Str(String),
}

#[derive(Clone, Debug)]
pub enum Expr {
    Ident {
        node: NodeId,
        name: String,
        span: Span,
    },
    /// Qualified path `A.B.C`.
    Path {
        node: NodeId,
        segments: Vec<Spanned<String>>,
        span: Span,
    },
    Literal {
        node: NodeId,
        value: Lit,
        span: Span,
    },
    Call {
        node: NodeId,
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Member {
        node: NodeId,
        base: Box<Expr>,
        member: Spanned<String>,
        span: Span,
    },
    Index {
        node: NodeId,
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// Sub-range index `base[start:end]`.
    RangeIndex {
        node: NodeId,
        base: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        span: Span,
    },
    Binary {
        node: NodeId,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Assign {
        node: NodeId,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn node(&self) -> NodeId {
        match self {
            Expr::Ident { node, .. }
            | Expr::Path { node, .. }
            | Expr::Literal { node, .. }
            | Expr::Call { node, .. }
            | Expr::Member { node, .. }
            | Expr::Index { node, .. }
            | Expr::RangeIndex { node, .. }
            | Expr::Binary { node, .. }
            | Expr::Assign { node, .. } => *node,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Ident { span, .. }
            | Expr::Path { span, .. }
            | Expr::Literal { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. }
            | Expr::RangeIndex { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. } => *span,
        }
    }
}

// ─── Compilation unit ─────────────────────────────────────────────

/// Pragma directives relevant to the backend: which implicit header
/// fields external messages carry.
#[derive(Clone, Copy, Debug, Default)]
pub struct Pragmas {
    pub pubkey: bool,
    pub time: bool,
    pub expire: bool,
}

/// One source unit: pragmas plus top-level declarations.
#[derive(Clone, Debug, Default)]
pub struct SourceUnit {
    pub pragmas: Pragmas,
    pub contracts: Vec<ContractId>,
    pub free_functions: Vec<FunId>,
}

/// The whole compilation's declaration arenas plus side tables filled by
/// the upstream passes.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    pub contracts: Vec<ContractDef>,
    pub functions: Vec<FunctionDef>,
    pub variables: Vec<VariableDef>,
    pub structs: Vec<StructDef>,
    pub modifiers: Vec<ModifierDef>,
    /// Types assigned to expressions by the upstream type checker.
    pub expr_types: HashMap<NodeId, Ty>,
    next_node: u32,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub fn contract(&self, id: ContractId) -> &ContractDef {
        &self.contracts[id.0]
    }

    pub fn function(&self, id: FunId) -> &FunctionDef {
        &self.functions[id.0]
    }

    pub fn variable(&self, id: VarId) -> &VariableDef {
        &self.variables[id.0]
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0]
    }

    pub fn modifier(&self, id: ModId) -> &ModifierDef {
        &self.modifiers[id.0]
    }

    pub fn decl_name(&self, decl: DeclId) -> &str {
        match decl {
            DeclId::Contract(id) => &self.contract(id).name.node,
            DeclId::Function(id) => &self.function(id).name.node,
            DeclId::Variable(id) => &self.variable(id).name.node,
            DeclId::Struct(id) => &self.struct_def(id).name.node,
            DeclId::Modifier(id) => &self.modifier(id).name.node,
        }
    }

    pub fn decl_span(&self, decl: DeclId) -> Span {
        match decl {
            DeclId::Contract(id) => self.contract(id).span,
            DeclId::Function(id) => self.function(id).span,
            DeclId::Variable(id) => self.variable(id).span,
            DeclId::Struct(id) => self.struct_def(id).span,
            DeclId::Modifier(id) => self.modifier(id).span,
        }
    }

    /// The defined constructor of a contract, if any.
    pub fn constructor_of(&self, contract: ContractId) -> Option<FunId> {
        self.contract(contract)
            .functions
            .iter()
            .copied()
            .find(|&fid| self.function(fid).kind == FunctionKind::Constructor)
    }

    /// The contract's effective function set: for each name/kind, the
    /// most-derived definition along the linearized chain.
    ///
    /// Iteration order is derived-first within the chain, declaration
    /// order within each contract; a name already claimed by a more
    /// derived contract is skipped.
    pub fn effective_functions(&self, contract: ContractId) -> Vec<FunId> {
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
        let mut out = Vec::new();
        for &cid in &self.contract(contract).linearized {
            for &fid in &self.contract(cid).functions {
                let f = self.function(fid);
                if f.kind != FunctionKind::Regular {
                    continue;
                }
                if seen.insert(&f.name.node) {
                    out.push(fid);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_bits() {
        assert_eq!(Ty::Uint(256).scalar_bits(), Some(256));
        assert_eq!(Ty::Int(9).scalar_bits(), Some(9));
        assert_eq!(Ty::Bool.scalar_bits(), Some(1));
        assert_eq!(Ty::FixedBytes(4).scalar_bits(), Some(32));
        assert_eq!(Ty::Enum("Color".into()).scalar_bits(), Some(8));
        assert_eq!(Ty::Slice.scalar_bits(), None);
        assert_eq!(Ty::Array(Box::new(Ty::Bool)).scalar_bits(), None);
        assert_eq!(Ty::Address.scalar_bits(), None);
    }

    #[test]
    fn test_byte_array_kinds() {
        assert!(Ty::Bytes.is_byte_array());
        assert!(Ty::Str.is_byte_array());
        assert!(!Ty::Slice.is_byte_array());
        assert!(!Ty::FixedArray(Box::new(Ty::Uint(8)), 32).is_byte_array());
    }

    #[test]
    fn test_fresh_node_monotonic() {
        let mut ast = Ast::new();
        let a = ast.fresh_node();
        let b = ast.fresh_node();
        assert!(a < b);
    }

    #[test]
    fn test_canonical_names() {
        let ast = Ast::new();
        assert_eq!(Ty::Uint(64).canonical_name(&ast), "uint64");
        assert_eq!(
            Ty::Mapping(Box::new(Ty::Uint(8)), Box::new(Ty::Cell)).canonical_name(&ast),
            "map(uint8,cell)"
        );
        assert_eq!(
            Ty::Array(Box::new(Ty::Bool)).canonical_name(&ast),
            "bool[]"
        );
    }
}
