use frametrace::symbolization::{load_table_from_file, parse_memory_maps};
use frametrace::{FunctionResolver, TraceConfig};
use std::path::Path;

#[test]
fn test_binary_symbols_are_demangled() {
    let binary_path = Path::new(env!("CARGO_BIN_EXE_frametrace"));
    let table = load_table_from_file(binary_path, 0).unwrap();

    assert!(!table.is_empty());
    assert!(table.iter().any(|f| f.name.ends_with("demo_descend")));
    assert!(table.iter().all(|f| !f.name.starts_with("_ZN")), "mangled names left in table");
    assert!(table.iter().all(|f| f.arguments.is_empty()));
}

#[test]
fn test_bias_shifts_every_start() {
    let binary_path = Path::new(env!("CARGO_BIN_EXE_frametrace"));
    let plain = load_table_from_file(binary_path, 0).unwrap();
    let shifted = load_table_from_file(binary_path, 0x1000_0000).unwrap();

    assert_eq!(plain.len(), shifted.len());
    for (a, b) in plain.iter().zip(shifted.iter()) {
        assert_eq!(a.start_address + 0x1000_0000, b.start_address);
    }
}

#[test]
fn test_resolves_inside_a_symbol() {
    let binary_path = Path::new(env!("CARGO_BIN_EXE_frametrace"));
    let table = load_table_from_file(binary_path, 0).unwrap();
    let config = TraceConfig::default();
    let resolver = FunctionResolver::new(&table, &config);

    let target = table.iter().find(|f| f.name.ends_with("demo_descend")).unwrap();
    let resolved = resolver.resolve(target.start_address + 1).unwrap();
    assert_eq!(resolved.name, target.name);
}

#[test]
fn test_binary_is_not_mapped_in_this_process() {
    let binary_path = Path::new(env!("CARGO_BIN_EXE_frametrace"));
    assert!(parse_memory_maps(std::process::id(), binary_path).is_err());
}
