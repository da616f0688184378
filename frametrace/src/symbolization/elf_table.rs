//! Function tables from ELF symbol tables

use super::memory_maps::parse_memory_maps;
use crate::domain::FunctionDescriptor;
use crate::resolver::FunctionTable;
use anyhow::{Context as _, Result};
use log::{debug, info};
use object::{Object, ObjectKind, ObjectSegment, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::fs;
use std::path::Path;

/// Function table for the running executable, relocated to where it is loaded
///
/// # Errors
/// Returns an error if the executable cannot be located, read or parsed
pub fn load_executable_table() -> Result<FunctionTable> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    load_table_for(std::process::id(), &exe)
}

/// Function table for `binary_path` as mapped into process `pid`
///
/// # Errors
/// Returns an error if the binary is not mapped in `pid`, or cannot be read or parsed
pub fn load_table_for(pid: u32, binary_path: &Path) -> Result<FunctionTable> {
    let data = fs::read(binary_path)
        .with_context(|| format!("Failed to read binary file {}", binary_path.display()))?;
    let obj_file = object::File::parse(&*data).context("Failed to parse object file")?;

    let bias = if obj_file.kind() == ObjectKind::Dynamic {
        let range = parse_memory_maps(pid, binary_path)?;
        let link_base = obj_file.segments().map(|s| s.address()).min().unwrap_or(0) & !0xfff;
        range.start.wrapping_sub(link_base)
    } else {
        0
    };
    info!("Load bias for {}: {bias:#x}", binary_path.display());

    table_from_object(&obj_file, bias)
}

/// Function table for `binary_path` with an explicit load bias
///
/// # Errors
/// Returns an error if the binary cannot be read or parsed
pub fn load_table_from_file(binary_path: &Path, bias: u64) -> Result<FunctionTable> {
    let data = fs::read(binary_path)
        .with_context(|| format!("Failed to read binary file {}", binary_path.display()))?;
    let obj_file = object::File::parse(&*data).context("Failed to parse object file")?;
    table_from_object(&obj_file, bias)
}

/// Demangle a Rust symbol name, dropping the hash suffix
#[must_use]
pub fn demangle_symbol(symbol: &str) -> String {
    format!("{:#}", demangle(symbol))
}

fn table_from_object(obj_file: &object::File<'_>, bias: u64) -> Result<FunctionTable> {
    let mut functions: Vec<FunctionDescriptor> = Vec::new();

    // Stripped binaries still carry dynamic symbols
    let mut symbols: Vec<_> = obj_file.symbols().collect();
    if symbols.is_empty() {
        debug!("No static symbol table, falling back to dynamic symbols");
        symbols = obj_file.dynamic_symbols().collect();
    }

    for symbol in symbols {
        if symbol.kind() != SymbolKind::Text || !symbol.is_definition() || symbol.address() == 0 {
            continue;
        }
        let Ok(name) = symbol.name() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        functions.push(FunctionDescriptor::new(demangle_symbol(name), symbol.address().wrapping_add(bias)));
    }

    functions.sort_by_key(|f| f.start_address);
    functions.dedup_by_key(|f| f.start_address);
    info!("Loaded {} function symbols", functions.len());

    Ok(FunctionTable::new(functions)?)
}
