mod common;

use common::{function_start, numbered_table, return_into, FakeStack, CODE_BASE, DATA_BASE, ENTRY_RETURN, STACK_BASE, W};
use frametrace::domain::{ArgumentType, FunctionDescriptor};
use frametrace::{FatalCause, FunctionTable, TraceConfig, TraceOutcome, FATAL_MARKER};
use std::io::{self, Write};

/// Frame with arguments at `bp + 2W`, `bp + 3W`, ...
fn arg_offset(slot: u64) -> i64 {
    ((2 + slot) * W) as i64
}

#[test]
fn test_depth_n_chain_gives_n_lines_most_recent_first() {
    for depth in [1usize, 2, 5, 12] {
        let mut stack = FakeStack::new();
        let table = numbered_table(depth + 1);
        let returns: Vec<u64> = (0..=depth).map(return_into).collect();
        let bp = stack.chain(&returns, 0);

        let (report, out) = stack.run(&table, bp);

        let expected: String = (0..depth).map(|i| format!("Function f{i}(void), in\n")).collect();
        assert_eq!(out, expected, "depth {depth}");
        assert_eq!(report.outcome, TraceOutcome::Terminated);
        assert_eq!(report.lines_written, depth);
    }
}

#[test]
fn test_clean_root_into_read_only_memory() {
    // Saved fp points below the frame, into non-writable code
    let mut stack = FakeStack::new();
    let table = numbered_table(3);
    let bp = stack.chain(&[return_into(0), return_into(1), return_into(2)], CODE_BASE + 0x10);

    let (report, out) = stack.run(&table, bp);
    assert!(!out.contains("FATAL"));
    assert_eq!(out.lines().count(), 2);
    assert_eq!(report.outcome, TraceOutcome::Terminated);
    assert!(stack.memory.write_log().is_empty());
}

#[test]
fn test_corruption_stops_with_marker() {
    // Second frame saves a writable address below itself
    let mut stack = FakeStack::new();
    let table = numbered_table(4);
    let bp = stack.chain(&[return_into(0), return_into(1), return_into(2)], 0);
    let corrupt_bp = FakeStack::bp(1);
    stack.poke_word(corrupt_bp, STACK_BASE + 0x10);

    let (report, out) = stack.run(&table, bp);
    assert_eq!(out, format!("Function f0(void), in\n{FATAL_MARKER}"));
    assert_eq!(
        report.outcome,
        TraceOutcome::Fatal(FatalCause::CorruptFramePointer { base: corrupt_bp, previous: STACK_BASE + 0x10 })
    );
    assert_eq!(report.lines_written, 1);
}

#[test]
fn test_unreadable_base_pointer_after_advancing() {
    let mut stack = FakeStack::new();
    let table = numbered_table(2);
    let bp = stack.chain(&[return_into(0)], 0xdead_beef_0000);

    let (report, out) = stack.run(&table, bp);
    assert_eq!(out, format!("Function f0(void), in\n{FATAL_MARKER}"));
    assert_eq!(report.outcome, TraceOutcome::Fatal(FatalCause::UnreadableBasePointer(0xdead_beef_0000)));
}

#[test]
fn test_unresolved_return_address_placeholder() {
    let mut stack = FakeStack::new();
    // Function with arguments that would fault if decoded
    let table = FunctionTable::new(vec![
        FunctionDescriptor::new("f1", function_start(1)).with_argument("x", ArgumentType::Int, 0x100_0000)
    ])
    .unwrap();
    // Readable code below every known function start
    let bp = stack.chain(&[ENTRY_RETURN, return_into(1), ENTRY_RETURN], 0);

    let (report, out) = stack.run(&table, bp);
    assert!(out.starts_with(&format!("Function {ENTRY_RETURN:#x}(...), in\nFunction f1(), in\n")), "{out}");
    assert_eq!(report.lines_written, 2);
    assert!(report.outcome.is_fatal());
}

#[test]
fn test_unmapped_return_address_mid_chain_is_fatal() {
    let mut stack = FakeStack::new();
    let table = numbered_table(3);
    let bp = stack.chain(&[return_into(0), 0x10, return_into(2)], 0);

    let (report, out) = stack.run(&table, bp);
    assert_eq!(out, format!("Function f0(void), in\n{FATAL_MARKER}"));
    assert_eq!(report.outcome, TraceOutcome::Fatal(FatalCause::UnreadableReturnAddress(0x10)));
    assert_eq!(report.lines_written, 1);
}

#[test]
fn test_null_return_address_at_root_is_fatal() {
    let mut stack = FakeStack::new();
    let table = numbered_table(2);
    let bp = stack.chain(&[return_into(0), 0], 0);

    let (report, out) = stack.run(&table, bp);
    assert_eq!(out, format!("Function f0(void), in\n{FATAL_MARKER}"));
    assert_eq!(report.outcome, TraceOutcome::Fatal(FatalCause::UnreadableReturnAddress(0)));
}

#[test]
fn test_string_truncation_law_is_idempotent() {
    let short = "abcdefghijklmnopqrstuvwxy";
    let long = "abcdefghijklmnopqrstuvwxyz and more";

    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![FunctionDescriptor::new("show", CODE_BASE)
        .with_argument("a", ArgumentType::String, arg_offset(0))
        .with_argument("b", ArgumentType::String, arg_offset(1))])
    .unwrap();
    let bp = stack.chain(&[return_into(0), ENTRY_RETURN], 0);
    let caller = FakeStack::bp(1);
    let short_at = stack.string(short);
    let long_at = stack.string(long);
    stack.poke_word(caller + 2 * W, short_at);
    stack.poke_word(caller + 3 * W, long_at);

    let expected = format!("Function show(char *a=\"{short}\", char *b=\"abcdefghijklmnopqrstuvwxy...\"), in\n");
    let (_, first) = stack.run(&table, bp);
    let (_, second) = stack.run(&table, bp);
    assert_eq!(first, expected);
    assert_eq!(second, expected);
}

#[test]
fn test_string_array_law() {
    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![FunctionDescriptor::new("main", CODE_BASE)
        .with_argument("three", ArgumentType::StringArray, arg_offset(0))
        .with_argument("more", ArgumentType::StringArray, arg_offset(1))])
    .unwrap();
    let bp = stack.chain(&[return_into(0), ENTRY_RETURN], 0);
    let caller = FakeStack::bp(1);
    let three = stack.string_array(&["s1", "s2", "s3"]);
    let more = stack.string_array(&["a", "b", "c", "d", "e"]);
    stack.poke_word(caller + 2 * W, three);
    stack.poke_word(caller + 3 * W, more);

    let (_, out) = stack.run(&table, bp);
    assert_eq!(
        out,
        "Function main(char **three={\"s1\",\"s2\",\"s3\"}, char **more={\"a\",\"b\",\"c\", ...}), in\n"
    );
}

#[test]
fn test_unreadable_string_renders_pointer() {
    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![
        FunctionDescriptor::new("open", CODE_BASE).with_argument("path", ArgumentType::String, arg_offset(0))
    ])
    .unwrap();
    let bp = stack.chain(&[return_into(0), ENTRY_RETURN], 0);
    stack.poke_word(FakeStack::bp(1) + 2 * W, 0x1234_5678);

    let (report, out) = stack.run(&table, bp);
    assert_eq!(out, "Function open(char *path=0x12345678), in\n");
    assert_eq!(report.outcome, TraceOutcome::Terminated);
}

#[test]
fn test_char_rendering() {
    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![FunctionDescriptor::new("put", CODE_BASE)
        .with_argument("bell", ArgumentType::Char, arg_offset(0))
        .with_argument("letter", ArgumentType::Char, arg_offset(1))])
    .unwrap();
    let bp = stack.chain(&[return_into(0), ENTRY_RETURN], 0);
    let caller = FakeStack::bp(1);
    stack.poke_bytes(caller + 2 * W, &[7]);
    stack.poke_bytes(caller + 3 * W, &[65]);

    let (_, out) = stack.run(&table, bp);
    assert_eq!(out, "Function put(char bell='\\7', char letter='A'), in\n");
}

#[test]
fn test_mixed_argument_types() {
    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![FunctionDescriptor::new("compute", CODE_BASE)
        .with_argument("n", ArgumentType::Int, arg_offset(0))
        .with_argument("ratio", ArgumentType::Float, arg_offset(1))
        .with_argument("scale", ArgumentType::Double, arg_offset(2))
        .with_argument("ctx", ArgumentType::VoidPointer, arg_offset(3))
        .with_argument("blob", ArgumentType::Unknown, arg_offset(4))])
    .unwrap();
    let bp = stack.chain(&[return_into(0), ENTRY_RETURN], 0);
    let caller = FakeStack::bp(1);
    stack.poke_bytes(caller + 2 * W, &(-7i32).to_ne_bytes());
    stack.poke_bytes(caller + 3 * W, &0.25f32.to_ne_bytes());
    stack.poke_bytes(caller + 4 * W, &1e3f64.to_ne_bytes());
    stack.poke_word(caller + 5 * W, DATA_BASE);
    stack.poke_word(caller + 6 * W, 0xff);

    let (_, out) = stack.run(&table, bp);
    assert_eq!(
        out,
        format!(
            "Function compute(int n=-7, float ratio=0.250000, double scale=1000.000000, \
             void *ctx=0v{DATA_BASE:x}, UNKNOWN blob=0xff), in\n"
        )
    );
}

#[test]
fn test_unreadable_argument_slot_truncates_line() {
    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![FunctionDescriptor::new("g", CODE_BASE)
        .with_argument("n", ArgumentType::Int, arg_offset(0))
        .with_argument("lost", ArgumentType::Int, 0x40_0000)])
    .unwrap();
    let bp = stack.chain(&[return_into(0), return_into(0), ENTRY_RETURN], 0);
    stack.poke_bytes(FakeStack::bp(1) + 2 * W, &4i32.to_ne_bytes());

    let (report, out) = stack.run(&table, bp);
    assert_eq!(out, format!("Function g(int n=4, ), in\n{FATAL_MARKER}"));
    assert!(matches!(
        report.outcome,
        TraceOutcome::Fatal(FatalCause::UnreadableArgument { ref function, .. }) if function == "g"
    ));
}

#[test]
fn test_long_lines_are_cut_to_capacity() {
    let mut stack = FakeStack::new();
    let table = FunctionTable::new(vec![FunctionDescriptor::new("a_rather_long_function_name", CODE_BASE)]).unwrap();
    let bp = stack.chain(&[return_into(0), ENTRY_RETURN], 0);
    let config = TraceConfig { max_line_bytes: 16, ..TraceConfig::default() };

    let (report, out) = stack.run_with(&table, &config, bp);
    assert_eq!(out, "Function a_rathe");
    assert_eq!(report.lines_written, 1);
}

struct FailingSink {
    accepted: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.accepted == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        self.accepted -= 1;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_sink_error_aborts_walk() {
    let mut stack = FakeStack::new();
    let table = numbered_table(4);
    let bp = stack.chain(&[return_into(0), return_into(1), return_into(2), ENTRY_RETURN], 0);

    let config = TraceConfig::default();
    let mut sink = FailingSink { accepted: 1 };
    let report = frametrace::Tracer::new(&table, &config).run(&mut stack.memory, bp, &mut sink);

    assert_eq!(report.outcome, TraceOutcome::SinkError(io::ErrorKind::BrokenPipe));
    assert_eq!(report.lines_written, 1);
}
