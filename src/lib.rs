pub mod abi;
pub mod ast;
pub mod bytecode;
pub mod check;
pub mod codegen;
pub mod config;
pub mod constructor;
pub mod diagnostic;
pub mod funcid;
pub mod resolve;
pub mod span;

// Re-export the names callers touch on every compilation.
pub use ast::Ast;
pub use codegen::ContractCompiler;
pub use config::CompilerConfig;
pub use diagnostic::{Diagnostic, Reporter};

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use ast::{ContractId, Pragmas, SourceUnit};

/// Which artifacts one compilation run should produce.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    pub generate_abi: bool,
    pub generate_code: bool,
    pub print_function_ids: bool,
    pub print_private_function_ids: bool,
    /// When set, generated code and the ABI are persisted here.
    pub output_dir: Option<PathBuf>,
}

/// Everything produced for one contract.
#[derive(Debug, Default)]
pub struct ContractArtifacts {
    pub code: Option<bytecode::Contract>,
    pub abi: Option<abi::AbiContract>,
    pub function_ids: Option<BTreeMap<String, u32>>,
    pub private_function_ids: Option<BTreeMap<String, u32>>,
}

/// Run the requested driver entry points for one contract.
///
/// Identifier listings and the ABI never require code generation and
/// are produced even when diagnostics are outstanding; code generation
/// consults the reporter and yields `None` while errors exist, so no
/// partial bytecode escapes.
pub fn proceed_contract(
    ast: &Ast,
    units: &[SourceUnit],
    contract: ContractId,
    pragmas: &Pragmas,
    config: &CompilerConfig,
    options: &CompileOptions,
    reporter: &mut Reporter,
) -> io::Result<ContractArtifacts> {
    let compiler = ContractCompiler::new(ast, config);
    let name = ast.contract(contract).name.node.clone();
    let mut artifacts = ContractArtifacts::default();

    if options.print_function_ids {
        artifacts.function_ids = Some(compiler.print_function_ids(contract));
    }
    if options.print_private_function_ids {
        artifacts.private_function_ids = Some(compiler.print_private_function_ids(contract, units));
    }
    if options.generate_abi {
        if let Some(dir) = &options.output_dir {
            compiler.save_abi(contract, pragmas, &ContractCompiler::abi_path(dir, &name))?;
        }
        artifacts.abi = Some(compiler.generate_abi(contract, pragmas));
    }
    if options.generate_code {
        artifacts.code = match &options.output_dir {
            Some(dir) => compiler.generate_code_and_save_to_file(
                contract,
                reporter,
                &ContractCompiler::code_path(dir, &name),
            )?,
            None => compiler.generate_contract_code(contract, reporter).map(|mut code| {
                ContractCompiler::optimize_code(&mut code);
                code
            }),
        };
    }
    Ok(artifacts)
}

/// Everything one `compile` run yields: the resolver's side tables,
/// which downstream tooling queries for resolved references, plus the
/// per-contract artifacts.
#[derive(Debug)]
pub struct CompilationOutput {
    pub resolution: resolve::Resolution,
    pub artifacts: Vec<ContractArtifacts>,
}

/// Compile a whole unit set: resolve once, then drive every contract in
/// declaration order. A failing contract stops nothing but its own
/// emission; later contracts still get their diagnostics.
pub fn compile(
    ast: &Ast,
    units: &[SourceUnit],
    config: &CompilerConfig,
    options: &CompileOptions,
    reporter: &mut Reporter,
) -> io::Result<CompilationOutput> {
    let (resolution, _clean) = resolve::resolve(ast, units, reporter);
    let mut artifacts = Vec::new();
    for unit in units {
        for &contract in &unit.contracts {
            artifacts.push(proceed_contract(
                ast,
                units,
                contract,
                &unit.pragmas,
                config,
                options,
                reporter,
            )?);
        }
    }
    Ok(CompilationOutput {
        resolution,
        artifacts,
    })
}
