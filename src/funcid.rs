//! Numeric function identifiers.
//!
//! The calling convention routes external calls by a stable 32-bit tag
//! instead of name-based dispatch. An explicit `functionID` from the
//! source wins; otherwise the identifier is derived from the canonical
//! signature, so it is deterministic and independent of code-generation
//! order.

use crate::ast::{Ast, FunId, VarId};

/// Identifier 0 is reserved for the receive entry point.
pub const RESERVED_RECEIVE_ID: u32 = 0;

/// Canonical signature text: `name(paramtypes)(returntypes)`.
pub fn signature(ast: &Ast, fid: FunId) -> String {
    let function = ast.function(fid);
    let fmt = |vars: &[VarId]| -> String {
        let names: Vec<String> = vars
            .iter()
            .map(|&vid| ast.variable(vid).ty.node.canonical_name(ast))
            .collect();
        names.join(",")
    };
    format!(
        "{}({})({})",
        function.name.node,
        fmt(&function.params),
        fmt(&function.returns)
    )
}

/// Canonical signature of a getter synthesized for a public state
/// variable: no inputs, one output of the variable's type.
pub fn getter_signature(ast: &Ast, vid: VarId) -> String {
    let variable = ast.variable(vid);
    format!(
        "{}()({})",
        variable.name.node,
        variable.ty.node.canonical_name(ast)
    )
}

/// Derive an identifier from a canonical signature: first 32 bits of the
/// signature hash, masked to 31 bits, mapped away from the reserved 0.
pub fn derived_id(signature: &str) -> u32 {
    let digest = blake3::hash(signature.as_bytes());
    let bytes: [u8; 4] = match digest.as_bytes()[..4].try_into() {
        Ok(bytes) => bytes,
        Err(_) => unreachable!("digest shorter than four bytes"),
    };
    let id = u32::from_be_bytes(bytes) & 0x7FFF_FFFF;
    if id == RESERVED_RECEIVE_ID {
        1
    } else {
        id
    }
}

/// The identifier a function answers to: explicit if present, derived
/// otherwise.
pub fn function_id(ast: &Ast, fid: FunId) -> u32 {
    match &ast.function(fid).function_id {
        Some(explicit) => explicit.node,
        None => derived_id(&signature(ast, fid)),
    }
}
