//! Whole-program compilation.
//!
//! Loads the input module and everything it imports, checks the program as
//! a whole, emits one assembly file behind the startup stub and hands it to
//! the external assembler and linker.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    process::Command,
    rc::Rc,
    time::Instant,
};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

use crate::{
    ast::ast::{FunctionArena, Import, Module},
    compiler::{
        compiler::{compile_module, Options as CodegenOptions},
        stdlib::startup_stub,
    },
    errors::errors::{format_error, Error, ErrorCollector, ErrorImpl},
    lexer::{lexer::tokenize, tokens::RESERVED_LOOKUP},
    parser::parser::parse,
    validator::{
        symbol_table::SymbolTable,
        validator::{validate_bodies, validate_entry_point, validate_signatures},
    },
    Position,
};

/// Extension of source modules; `import "util";` loads `util.u`.
pub const SOURCE_EXTENSION: &str = "u";

pub const USAGE: &str = "usage: ucompiler [--eliminate-tail-calls] [--print-ast] [--lib-dir <dir>] [-o <file>] [-S] <input>";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub input: PathBuf,
    /// Searched for imports after the importing file's directory.
    pub lib_dir: PathBuf,
    /// Executable to produce. The assembly and object files sit next to it.
    pub output: PathBuf,
    pub eliminate_tail_calls: bool,
    pub print_ast: bool,
    /// When false, stop once the assembly file is written.
    pub assemble: bool,
    pub assembler: String,
    pub linker: String,
}

impl Options {
    pub fn new(input: PathBuf) -> Self {
        Options {
            input,
            lib_dir: PathBuf::from("lib"),
            output: PathBuf::from("output"),
            eliminate_tail_calls: false,
            print_ast: false,
            assemble: true,
            assembler: String::from("nasm"),
            linker: String::from("ld"),
        }
    }

    /// Parses command-line arguments, without the program name.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut args = args.into_iter();
        let mut options = Options::new(PathBuf::new());
        let mut input = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--eliminate-tail-calls" | "--eliminate-tail-recursion" => {
                    options.eliminate_tail_calls = true
                }
                "--print-ast" => options.print_ast = true,
                "-S" => options.assemble = false,
                "--lib-dir" => {
                    let dir = args.next().ok_or("--lib-dir expects a directory")?;
                    options.lib_dir = PathBuf::from(dir);
                }
                "-o" => {
                    let file = args.next().ok_or("-o expects a file name")?;
                    options.output = PathBuf::from(file);
                }
                flag if flag.starts_with('-') => return Err(format!("unknown flag {}", flag)),
                _ if input.is_none() => input = Some(PathBuf::from(arg)),
                _ => return Err(format!("unexpected argument {}", arg)),
            }
        }

        options.input = input.ok_or("no input file given")?;
        Ok(options)
    }

    pub fn assembly_path(&self) -> PathBuf {
        with_suffix(&self.output, "s")
    }

    pub fn object_path(&self) -> PathBuf {
        with_suffix(&self.output, "o")
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Why a compilation stopped.
#[derive(ThisError, Debug)]
pub enum Failure {
    /// Defects in the program, rendered as the error report.
    #[error("{0}")]
    Report(String),
    /// I/O, toolchain or internal compiler errors.
    #[error(transparent)]
    Fatal(#[from] Error),
}

/// A parsed source module with the text it was parsed from.
#[derive(Debug)]
pub struct SourceModule {
    pub module: Module,
    pub source: Rc<String>,
    pub path: PathBuf,
}

/// A raw assembly file pulled in by `import asm`.
#[derive(Debug)]
pub struct AssemblyInclude {
    pub path: PathBuf,
    pub text: String,
}

/// Every module of a program, each placed after the modules it imports.
#[derive(Debug, Default)]
pub struct Program {
    pub arena: FunctionArena,
    pub modules: Vec<SourceModule>,
    pub includes: Vec<AssemblyInclude>,
}

impl Program {
    /// The module compilation started from.
    pub fn entry(&self) -> Option<&SourceModule> {
        self.modules.last()
    }
}

fn io_error(path: &Path, error: std::io::Error) -> Error {
    Error::new(
        ErrorImpl::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        },
        Position::null(),
    )
}

lazy_static! {
    static ref MODULE_NAME: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

/// The file stem, which ends up in assembly labels and `module:name` calls
/// and so has to be a plain identifier.
fn module_name(path: &Path) -> Result<String, ErrorImpl> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    if MODULE_NAME.is_match(&name) && !RESERVED_LOOKUP.contains_key(name.as_str()) {
        Ok(name)
    } else {
        Err(ErrorImpl::InvalidModuleName { name })
    }
}

struct Loader<'a> {
    lib_dir: &'a Path,
    program: Program,
    visited: HashSet<PathBuf>,
}

impl<'a> Loader<'a> {
    fn find(&self, import: &Import, importer_dir: &Path) -> Option<PathBuf> {
        let mut file = PathBuf::from(&import.path);
        if !import.is_assembly && file.extension().is_none() {
            file.set_extension(SOURCE_EXTENSION);
        }

        [importer_dir, self.lib_dir]
            .iter()
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
    }

    fn load(&mut self, path: &Path) -> Result<(), Failure> {
        let canonical = fs::canonicalize(path).map_err(|e| io_error(path, e))?;
        if !self.visited.insert(canonical.clone()) {
            return Ok(());
        }

        let source = Rc::new(fs::read_to_string(&canonical).map_err(|e| io_error(path, e))?);
        let name = module_name(path)
            .map_err(|kind| Failure::Fatal(Error::new(kind, Position::null())))?;

        let report = |error: Error| Failure::Report(format_error(&name, &source, &error));
        let tokens = tokenize(source.to_string(), Some(name.clone())).map_err(report)?;
        let module = parse(tokens, Rc::new(name.clone()), &mut self.program.arena).map_err(report)?;

        debug!(module = %name, path = %canonical.display(), "parsed module");

        let importer_dir = canonical.parent().unwrap_or(Path::new(".")).to_path_buf();
        for import in &module.imports {
            let Some(found) = self.find(import, &importer_dir) else {
                let error = Error::new(
                    ErrorImpl::ModuleOrFileNotFound {
                        path: import.path.clone(),
                    },
                    import.position.clone(),
                );
                return Err(report(error));
            };

            if import.is_assembly {
                self.include(&found)?;
            } else if let Err(kind) = module_name(&found) {
                return Err(report(Error::new(kind, import.position.clone())));
            } else {
                self.load(&found)?;
            }
        }

        self.program.modules.push(SourceModule {
            module,
            source,
            path: canonical,
        });
        Ok(())
    }

    fn include(&mut self, path: &Path) -> Result<(), Failure> {
        let canonical = fs::canonicalize(path).map_err(|e| io_error(path, e))?;
        if !self.visited.insert(canonical.clone()) {
            return Ok(());
        }

        let text = fs::read_to_string(&canonical).map_err(|e| io_error(path, e))?;
        self.program.includes.push(AssemblyInclude {
            path: canonical,
            text,
        });
        Ok(())
    }
}

/// Parses `input` and, transitively, every module it imports.
pub fn load_program(input: &Path, lib_dir: &Path) -> Result<Program, Failure> {
    if !input.is_file() {
        return Err(Failure::Fatal(Error::new(
            ErrorImpl::ModuleOrFileNotFound {
                path: input.display().to_string(),
            },
            Position::null(),
        )));
    }

    let mut loader = Loader {
        lib_dir,
        program: Program::default(),
        visited: HashSet::new(),
    };
    loader.load(input)?;

    debug!(
        modules = loader.program.modules.len(),
        includes = loader.program.includes.len(),
        "loaded program"
    );
    Ok(loader.program)
}

/// Validates the whole program: signatures of every module first, then
/// every body. Returns the concatenated error report, empty on success.
pub fn check_program(program: &mut Program) -> String {
    let mut symbols = SymbolTable::new();
    let mut collectors: Vec<ErrorCollector> = program
        .modules
        .iter()
        .map(|loaded| ErrorCollector::new(Rc::clone(&loaded.module.name), Rc::clone(&loaded.source)))
        .collect();

    for (loaded, errors) in program.modules.iter().zip(collectors.iter_mut()) {
        validate_signatures(&loaded.module, &mut program.arena, &mut symbols, errors);
    }

    if let (Some(entry), Some(errors)) = (program.modules.last(), collectors.last_mut()) {
        validate_entry_point(&entry.module, &program.arena, &symbols, errors);
    }

    for (loaded, errors) in program.modules.iter().zip(collectors.iter_mut()) {
        validate_bodies(&loaded.module, &mut program.arena, &mut symbols, errors);
    }

    collectors
        .iter()
        .map(|errors| errors.get_error_string())
        .collect()
}

/// Emits the program's assembly: the startup stub, every assembly include
/// and then every module in load order.
pub fn generate(program: &Program, eliminate_tail_calls: bool) -> Result<String, Error> {
    let options = CodegenOptions {
        eliminate_tail_calls,
        entry_module: program
            .entry()
            .map(|entry| entry.module.name.to_string())
            .unwrap_or_default(),
    };

    let mut assembly = startup_stub();

    for include in &program.includes {
        assembly.push_str(&format!("\n; import {}\n", include.path.display()));
        assembly.push_str(&include.text);
        if !include.text.ends_with('\n') {
            assembly.push('\n');
        }
    }

    for loaded in &program.modules {
        assembly.push_str(&format!("\n; module {}\n", loaded.module.name));
        assembly.push_str(&compile_module(&loaded.module, &program.arena, &options)?);
    }

    Ok(assembly)
}

fn run_tool(program: &str, args: &[&str]) -> Result<(), Error> {
    let failure = |message: String| {
        Error::new(
            ErrorImpl::ToolchainFailure {
                tool: program.to_string(),
                message,
            },
            Position::null(),
        )
    };

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| failure(e.to_string()))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(failure(format!("{} ({})", stderr.trim(), output.status)));
    }
    if !stderr.trim().is_empty() {
        warn!(tool = program, "{}", stderr.trim());
    }

    Ok(())
}

/// Assembles and links the assembly file named by `options`.
pub fn assemble_and_link(options: &Options) -> Result<(), Error> {
    let assembly = options.assembly_path().to_string_lossy().into_owned();
    let object = options.object_path().to_string_lossy().into_owned();
    let output = options.output.to_string_lossy().into_owned();

    run_tool(
        &options.assembler,
        &["-f", "elf64", assembly.as_str(), "-o", object.as_str()],
    )?;
    run_tool(&options.linker, &["-o", output.as_str(), object.as_str()])?;

    Ok(())
}

/// Runs the whole pipeline described by `options`.
pub fn run(options: &Options) -> Result<(), Failure> {
    let start = Instant::now();

    let mut program = load_program(&options.input, &options.lib_dir)?;
    info!(elapsed = ?start.elapsed(), "parsed program");

    if options.print_ast {
        for loaded in &program.modules {
            println!("// module {}\n{}", loaded.module.name, loaded.module.render(&program.arena));
        }
    }

    let check_start = Instant::now();
    let report = check_program(&mut program);
    info!(elapsed = ?check_start.elapsed(), "validated program");
    if !report.is_empty() {
        return Err(Failure::Report(report));
    }

    let generate_start = Instant::now();
    let assembly = generate(&program, options.eliminate_tail_calls)?;
    info!(elapsed = ?generate_start.elapsed(), bytes = assembly.len(), "generated assembly");

    let assembly_path = options.assembly_path();
    fs::write(&assembly_path, assembly).map_err(|e| io_error(&assembly_path, e))?;

    if options.assemble {
        let toolchain_start = Instant::now();
        assemble_and_link(options)?;
        info!(elapsed = ?toolchain_start.elapsed(), "assembled and linked");
    }

    Ok(())
}
