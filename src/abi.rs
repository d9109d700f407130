//! Interface description of a contract's public surface.
//!
//! The ABI is a pure function of the resolved declarations: building it
//! never requires code generation to have run. Callers and off-chain
//! tooling consume the JSON form.

use crate::ast::{Ast, ContractId, Pragmas, VarId};
use crate::funcid;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AbiContract {
    pub abi_version: u8,
    /// Implicit header fields external messages carry, gated by pragmas.
    pub header: Vec<&'static str>,
    pub functions: Vec<AbiFunction>,
}

#[derive(Debug, Serialize)]
pub struct AbiFunction {
    pub name: String,
    pub inputs: Vec<AbiParam>,
    pub outputs: Vec<AbiParam>,
    /// Routing identifier, hex with the `0x` prefix.
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct AbiParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

pub const ABI_VERSION: u8 = 2;

/// Build the interface description for one contract.
pub fn build(ast: &Ast, contract: ContractId, pragmas: &Pragmas) -> AbiContract {
    let mut header = Vec::new();
    if pragmas.pubkey {
        header.push("pubkey");
    }
    if pragmas.time {
        header.push("time");
    }
    if pragmas.expire {
        header.push("expire");
    }

    let params = |vars: &[VarId]| -> Vec<AbiParam> {
        vars.iter()
            .map(|&vid| {
                let v = ast.variable(vid);
                AbiParam {
                    name: v.name.node.clone(),
                    ty: v.ty.node.canonical_name(ast),
                }
            })
            .collect()
    };

    let mut functions = Vec::new();
    if let Some(ctor) = ast.constructor_of(contract) {
        let ctor_def = ast.function(ctor);
        functions.push(AbiFunction {
            name: "constructor".to_string(),
            inputs: params(&ctor_def.params),
            outputs: Vec::new(),
            id: hex_id(funcid::function_id(ast, ctor)),
        });
    }
    for fid in ast.effective_functions(contract) {
        let f = ast.function(fid);
        if !f.visibility.is_public() {
            continue;
        }
        functions.push(AbiFunction {
            name: f.name.node.clone(),
            inputs: params(&f.params),
            outputs: params(&f.returns),
            id: hex_id(funcid::function_id(ast, fid)),
        });
    }
    // Public state variables expose synthesized getters.
    for &cid in &ast.contract(contract).linearized {
        for &vid in &ast.contract(cid).state_vars {
            let v = ast.variable(vid);
            if !v.is_public {
                continue;
            }
            functions.push(AbiFunction {
                name: v.name.node.clone(),
                inputs: Vec::new(),
                outputs: vec![AbiParam {
                    name: v.name.node.clone(),
                    ty: v.ty.node.canonical_name(ast),
                }],
                id: hex_id(funcid::derived_id(&funcid::getter_signature(ast, vid))),
            });
        }
    }

    AbiContract {
        abi_version: ABI_VERSION,
        header,
        functions,
    }
}

impl AbiContract {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn hex_id(id: u32) -> String {
    format!("0x{id:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ContractDef, FunctionDef, FunctionKind, Ty, VariableDef, Visibility};
    use crate::span::{Span, Spanned};

    fn sample() -> (Ast, ContractId) {
        let mut ast = Ast::new();
        let contract = ContractId(0);
        ast.contracts.push(ContractDef {
            name: Spanned::dummy("Wallet".to_string()),
            linearized: vec![contract],
            inheritance: Vec::new(),
            functions: Vec::new(),
            state_vars: Vec::new(),
            structs: Vec::new(),
            modifiers: Vec::new(),
            doc: None,
            span: Span::dummy(),
        });

        let to = crate::ast::VarId(ast.variables.len());
        ast.variables.push(VariableDef {
            name: Spanned::dummy("to".to_string()),
            ty: Spanned::dummy(Ty::Address),
            is_state: false,
            is_public: false,
            contract: None,
            doc: None,
            span: Span::dummy(),
        });

        let transfer = crate::ast::FunId(ast.functions.len());
        ast.functions.push(FunctionDef {
            name: Spanned::dummy("transfer".to_string()),
            contract: Some(contract),
            visibility: Visibility::Public,
            kind: FunctionKind::Regular,
            function_id: None,
            is_responsible: false,
            is_inline: false,
            internal_msg: false,
            external_msg: true,
            params: vec![to],
            returns: Vec::new(),
            base_functions: Vec::new(),
            base_calls: Vec::new(),
            body: None,
            doc: None,
            span: Span::dummy(),
        });
        ast.contracts[0].functions.push(transfer);

        let helper = crate::ast::FunId(ast.functions.len());
        ast.functions.push(FunctionDef {
            name: Spanned::dummy("helper".to_string()),
            contract: Some(contract),
            visibility: Visibility::Private,
            kind: FunctionKind::Regular,
            function_id: None,
            is_responsible: false,
            is_inline: false,
            internal_msg: false,
            external_msg: true,
            params: Vec::new(),
            returns: Vec::new(),
            base_functions: Vec::new(),
            base_calls: Vec::new(),
            body: None,
            doc: None,
            span: Span::dummy(),
        });
        ast.contracts[0].functions.push(helper);

        let owner = crate::ast::VarId(ast.variables.len());
        ast.variables.push(VariableDef {
            name: Spanned::dummy("owner".to_string()),
            ty: Spanned::dummy(Ty::Address),
            is_state: true,
            is_public: true,
            contract: Some(contract),
            doc: None,
            span: Span::dummy(),
        });
        ast.contracts[0].state_vars.push(owner);

        (ast, contract)
    }

    #[test]
    fn test_public_surface_only() {
        let (ast, contract) = sample();
        let abi = build(&ast, contract, &Pragmas::default());
        let names: Vec<&str> = abi.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["transfer", "owner"]);
    }

    #[test]
    fn test_header_gated_by_pragmas() {
        let (ast, contract) = sample();
        let pragmas = Pragmas {
            pubkey: true,
            time: false,
            expire: true,
        };
        let abi = build(&ast, contract, &pragmas);
        assert_eq!(abi.header, vec!["pubkey", "expire"]);
    }

    #[test]
    fn test_json_shape() {
        let (ast, contract) = sample();
        let abi = build(&ast, contract, &Pragmas::default());
        let json = abi.to_json().unwrap();
        assert!(json.contains("\"abi_version\": 2"));
        assert!(json.contains("\"type\": \"address\""));
        assert!(json.contains("\"id\": \"0x"));
    }

    #[test]
    fn test_getter_identifier_matches_signature_derivation() {
        let (ast, contract) = sample();
        let abi = build(&ast, contract, &Pragmas::default());
        let getter = abi.functions.iter().find(|f| f.name == "owner").unwrap();
        let expected = funcid::derived_id("owner()(address)");
        assert_eq!(getter.id, format!("0x{expected:08x}"));
    }
}
