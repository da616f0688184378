//! Function tables and return-address resolution
//!
//! A return address points just past a call instruction, somewhere inside
//! the calling function. The resolver attributes it to the table entry with
//! the closest start address strictly below it, provided that distance is
//! plausible for a single function.
//!
//! Tables are plain explicit-length sequences. They can come from:
//! - a raw sentinel-terminated array emitted by a build step ([`FunctionTable::from_raw`])
//! - a JSON file ([`FunctionTable::from_json_file`])
//! - the running executable's symbols ([`crate::symbolization::load_executable_table`])

use crate::config::TraceConfig;
use crate::domain::{ArgumentDescriptor, FunctionDescriptor, TableError};
use frametrace_common::RawFunction;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Immutable set of function descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionTable {
    functions: Vec<FunctionDescriptor>,
}

impl FunctionTable {
    /// Build a table, rejecting entries a sentinel-terminated table could
    /// not have held (empty function or argument names)
    ///
    /// # Errors
    /// Returns `TableError::EmptyName` / `EmptyArgumentName` for unnamed entries
    pub fn new(functions: Vec<FunctionDescriptor>) -> Result<Self, TableError> {
        for (index, func) in functions.iter().enumerate() {
            if func.name.is_empty() {
                return Err(TableError::EmptyName { index });
            }
            if let Some(argument) = func.arguments.iter().position(|a| a.name.is_empty()) {
                return Err(TableError::EmptyArgumentName { function: func.name.clone(), argument });
            }
        }
        Ok(Self { functions })
    }

    /// Convert a raw table, stopping at the sentinel or at `max_functions`
    #[must_use]
    pub fn from_raw(raw: &[RawFunction], config: &TraceConfig) -> Self {
        let functions: Vec<FunctionDescriptor> = raw
            .iter()
            .take(config.max_functions)
            .take_while(|func| !func.is_end())
            .map(|func| FunctionDescriptor::from_raw(func, config.max_arguments))
            .collect();
        debug!("Converted raw table with {} functions", functions.len());
        Self { functions }
    }

    /// Load a table from `{"functions": [...]}` JSON
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or holds unnamed entries
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let text = fs::read_to_string(path.as_ref())?;
        let table = Self::from_json_str(&text)?;
        info!("Loaded {} functions from {}", table.len(), path.as_ref().display());
        Ok(table)
    }

    /// # Errors
    /// Returns an error if the text is not a valid table
    pub fn from_json_str(text: &str) -> Result<Self, TableError> {
        let parsed: Self = serde_json::from_str(text)?;
        Self::new(parsed.functions)
    }

    /// Attach argument lists by function name, replacing existing ones
    ///
    /// Returns the number of functions that received arguments.
    pub fn apply_argument_overlay(&mut self, overlay: &HashMap<String, Vec<ArgumentDescriptor>>) -> usize {
        let mut applied = 0;
        for func in &mut self.functions {
            if let Some(arguments) = overlay.get(&func.name) {
                func.arguments.clone_from(arguments);
                applied += 1;
            }
        }
        applied
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.iter()
    }

    /// Find a function by exact name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|func| func.name == name)
    }
}

/// Load an argument overlay: `{"function_name": [{"name", "type", "frame_offset"}]}`
///
/// # Errors
/// Returns an error if the file cannot be read or parsed
pub fn load_argument_overlay<P: AsRef<Path>>(
    path: P,
) -> Result<HashMap<String, Vec<ArgumentDescriptor>>, TableError> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

/// Maps return addresses to table entries
pub struct FunctionResolver<'a> {
    table: &'a FunctionTable,
    max_functions: usize,
    max_function_size: u64,
}

impl<'a> FunctionResolver<'a> {
    pub fn new(table: &'a FunctionTable, config: &TraceConfig) -> Self {
        Self {
            table,
            max_functions: config.max_functions,
            max_function_size: config.max_function_size,
        }
    }

    /// Find the function containing `return_address`
    ///
    /// Scans at most `max_functions` entries in table order, keeping the
    /// smallest strictly positive `return_address - start_address`. Ties
    /// keep the earlier entry. Returns `None` if no distance is below
    /// `max_function_size`.
    #[must_use]
    pub fn resolve(&self, return_address: u64) -> Option<&'a FunctionDescriptor> {
        let mut best: Option<(u64, &'a FunctionDescriptor)> = None;

        for func in self.table.functions.iter().take(self.max_functions) {
            let Some(distance) = return_address.checked_sub(func.start_address) else {
                continue;
            };
            if distance == 0 {
                continue;
            }
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, func));
            }
        }

        match best {
            Some((distance, func)) if distance < self.max_function_size => Some(func),
            _ => None,
        }
    }
}
