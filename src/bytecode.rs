//! Instruction tree and stack-primitive builder.
//!
//! This is the emission library the code-generation driver calls into.
//! The driver treats the produced trees as opaque values: it requests
//! construction through `Pusher`, assembles function nodes into one
//! contract node, and hands the result to `optimize`. It never rewrites
//! individual instructions itself.

use std::fmt;

/// One node of the emitted instruction tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    Comment(String),
    Push(u128),
    Drop(u32),
    Call(String),
    /// Unpack the persistent storage cell into working registers.
    InitStorage,
    /// Throw `exception` unless this is the first constructor run for
    /// this contract instance.
    OnceGuard { exception: u16 },
    Throw(u16),
    Ret,
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Comment(text) => write!(f, "; {text}"),
            Instr::Push(value) => write!(f, "PUSHINT {value}"),
            Instr::Drop(count) => write!(f, "DROP {count}"),
            Instr::Call(label) => write!(f, "CALL ${label}$"),
            Instr::InitStorage => write!(f, "INITSTORAGE"),
            Instr::OnceGuard { exception } => write!(f, "ONCEGUARD {exception}"),
            Instr::Throw(code) => write!(f, "THROW {code}"),
            Instr::Ret => write!(f, "RET"),
        }
    }
}

/// What dispatch slot a generated function occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionSlot {
    Constructor,
    Receive,
    Fallback,
    TickTock,
    /// Routed by numeric identifier.
    Id(u32),
    /// Reachable only through direct calls.
    Internal,
}

/// One emitted function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub slot: FunctionSlot,
    pub body: Vec<Instr>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".func {}", self.name)?;
        for instr in &self.body {
            writeln!(f, "  {instr}")?;
        }
        write!(f, ".endfunc")
    }
}

/// The contract-level output node: every generated function, ready for
/// serialization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Contract {
    pub name: String,
    pub functions: Vec<Function>,
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".contract {}", self.name)?;
        for function in &self.functions {
            writeln!(f, "{function}")?;
        }
        write!(f, ".endcontract")
    }
}

/// Builder for one function's instruction list.
#[derive(Debug, Default)]
pub struct Pusher {
    body: Vec<Instr>,
}

impl Pusher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.body.push(Instr::Comment(text.into()));
    }

    pub fn push(&mut self, value: u128) {
        self.body.push(Instr::Push(value));
    }

    pub fn drop_top(&mut self, count: u32) {
        self.body.push(Instr::Drop(count));
    }

    pub fn call(&mut self, label: impl Into<String>) {
        self.body.push(Instr::Call(label.into()));
    }

    pub fn init_storage(&mut self) {
        self.body.push(Instr::InitStorage);
    }

    pub fn once_guard(&mut self, exception: u16) {
        self.body.push(Instr::OnceGuard { exception });
    }

    pub fn throw(&mut self, code: u16) {
        self.body.push(Instr::Throw(code));
    }

    pub fn ret(&mut self) {
        self.body.push(Instr::Ret);
    }

    pub fn finish(self, name: impl Into<String>, slot: FunctionSlot) -> Function {
        Function {
            name: name.into(),
            slot,
            body: self.body,
        }
    }
}

// ─── Optimizer ────────────────────────────────────────────────────

/// Peephole-optimize the whole contract tree in place.
///
/// Each function body is rewritten to a fixpoint, which makes the pass
/// idempotent: a second application finds nothing left to rewrite.
pub fn optimize(contract: &mut Contract) {
    for function in &mut contract.functions {
        loop {
            let rewritten = peephole(&function.body);
            if rewritten == function.body {
                break;
            }
            function.body = rewritten;
        }
    }
}

/// One rewrite sweep over an instruction list.
fn peephole(body: &[Instr]) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        match (&body[i], body.get(i + 1)) {
            // A pushed value immediately dropped cancels out.
            (Instr::Push(_), Some(Instr::Drop(n))) => {
                if *n > 1 {
                    out.push(Instr::Drop(n - 1));
                }
                i += 2;
            }
            // Adjacent drops merge.
            (Instr::Drop(a), Some(Instr::Drop(b))) => {
                out.push(Instr::Drop(a + b));
                i += 2;
            }
            // Nothing executes after a return; keep trailing comments.
            (Instr::Ret, Some(next)) if !matches!(next, Instr::Comment(_)) => {
                out.push(Instr::Ret);
                i += 2;
            }
            (instr, _) => {
                out.push(instr.clone());
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract_with(body: Vec<Instr>) -> Contract {
        Contract {
            name: "C".to_string(),
            functions: vec![Function {
                name: "f".to_string(),
                slot: FunctionSlot::Internal,
                body,
            }],
        }
    }

    #[test]
    fn test_push_drop_cancels() {
        let mut c = contract_with(vec![Instr::Push(7), Instr::Drop(1), Instr::Ret]);
        optimize(&mut c);
        assert_eq!(c.functions[0].body, vec![Instr::Ret]);
    }

    #[test]
    fn test_push_wide_drop_shrinks() {
        let mut c = contract_with(vec![Instr::Push(7), Instr::Drop(3), Instr::Ret]);
        optimize(&mut c);
        assert_eq!(c.functions[0].body, vec![Instr::Drop(2), Instr::Ret]);
    }

    #[test]
    fn test_adjacent_drops_merge() {
        let mut c = contract_with(vec![Instr::Drop(2), Instr::Drop(3)]);
        optimize(&mut c);
        assert_eq!(c.functions[0].body, vec![Instr::Drop(5)]);
    }

    #[test]
    fn test_dead_code_after_ret_removed() {
        let mut c = contract_with(vec![Instr::Ret, Instr::Push(1), Instr::Push(2)]);
        optimize(&mut c);
        assert_eq!(c.functions[0].body, vec![Instr::Ret]);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let mut once = contract_with(vec![
            Instr::Push(1),
            Instr::Push(2),
            Instr::Drop(1),
            Instr::Drop(1),
            Instr::Call("g".to_string()),
            Instr::Ret,
            Instr::Push(9),
        ]);
        optimize(&mut once);
        let mut twice = once.clone();
        optimize(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pusher_builds_in_order() {
        let mut pusher = Pusher::new();
        pusher.comment("prologue");
        pusher.init_storage();
        pusher.once_guard(51);
        pusher.call("Base::constructor");
        pusher.ret();
        let function = pusher.finish("constructor", FunctionSlot::Constructor);
        assert_eq!(function.body.len(), 5);
        assert_eq!(function.slot, FunctionSlot::Constructor);
        assert_eq!(function.body[2], Instr::OnceGuard { exception: 51 });
    }

    #[test]
    fn test_display_roundtrips_shape() {
        let mut pusher = Pusher::new();
        pusher.push(5);
        pusher.ret();
        let function = pusher.finish("f", FunctionSlot::Id(42));
        let contract = Contract {
            name: "Wallet".to_string(),
            functions: vec![function],
        };
        let text = contract.to_string();
        assert!(text.starts_with(".contract Wallet"));
        assert!(text.contains("PUSHINT 5"));
        assert!(text.ends_with(".endcontract"));
    }
}
