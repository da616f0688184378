//! Argument decoding
//!
//! Renders each argument of a resolved frame as `type name=value`, reading
//! the value from `base_pointer + frame_offset`. The rules are fixed so that
//! traces stay comparable across runs and tools:
//!
//! | Type          | Rendering                                          |
//! |---------------|----------------------------------------------------|
//! | `Char`        | `char c='A'`, or octal `char c='\7'` if unprintable |
//! | `Int`         | `int n=-12`                                        |
//! | `Float`       | `float x=1.500000`                                 |
//! | `Double`      | `double x=1.500000`                                |
//! | `String`      | `char *s="text"`, `"first 25 chars..."`, or `0x..`  |
//! | `StringArray` | `char **v={"a","b","c", ...}` or `{0x..}`           |
//! | `VoidPointer` | `void *p=0v7ffd1000`                               |
//! | `Unknown`     | `UNKNOWN u=0x7ffd1000`                             |
//!
//! Only the argument slot itself must be readable. Anything a slot points to
//! (string bytes, array elements) may be unmapped; such values fall back to
//! their raw address.

use crate::config::TraceConfig;
use crate::domain::{ArgumentDescriptor, ArgumentFault, ArgumentType, Fault, FunctionDescriptor, WORD_SIZE};
use crate::frame::FrameCursor;
use crate::probe::MemoryProbe;
use std::fmt;

/// Fixed-capacity text buffer for one output line
///
/// Text beyond the capacity is dropped, the way `snprintf` truncates.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    text: String,
    capacity: usize,
}

impl LineBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { text: String::with_capacity(capacity.min(1024)), capacity }
    }

    /// Append as much of `s` as fits
    pub fn push_str(&mut self, s: &str) {
        let room = self.capacity - self.text.len();
        if s.len() <= room {
            self.text.push_str(s);
            return;
        }
        let mut cut = room;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.push_str(&s[..cut]);
    }

    /// Append formatted text, truncated like [`push_str`](Self::push_str)
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) {
        // `write_str` below never fails, so neither can this
        let _ = fmt::Write::write_fmt(self, args);
    }

    /// Append a single character
    pub fn push(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.push_str(c.encode_utf8(&mut utf8));
    }

    /// Current write offset
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.text.len() >= self.capacity
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl fmt::Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

/// Printable in the C locale (`isprint`)
fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

/// `%f`: six fraction digits, lowercase `nan`/`inf`
fn format_fixed(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value.is_sign_negative() { "-inf".to_string() } else { "inf".to_string() }
    } else {
        format!("{value:.6}")
    }
}

/// Renders function arguments according to their declared types
pub struct ArgumentDecoder<'c> {
    config: &'c TraceConfig,
}

impl<'c> ArgumentDecoder<'c> {
    pub fn new(config: &'c TraceConfig) -> Self {
        Self { config }
    }

    /// Render the argument list of `function` for the frame at `frame`
    ///
    /// Appends `arg, arg, ...` (or `void`) to `line` and returns the new
    /// write offset. Stops at the first argument whose slot cannot be read;
    /// arguments rendered before it stay in the buffer.
    ///
    /// # Errors
    /// Returns the argument whose slot faulted
    pub fn decode<P: MemoryProbe + ?Sized>(
        &self,
        probe: &mut P,
        function: &FunctionDescriptor,
        frame: FrameCursor,
        line: &mut LineBuffer,
    ) -> Result<usize, ArgumentFault> {
        let arguments = function.arguments.iter().take(self.config.max_arguments);
        let mut rendered = 0;

        for argument in arguments {
            if rendered > 0 {
                line.push_str(", ");
            }
            self.decode_argument(probe, argument, frame, line)
                .map_err(|fault| ArgumentFault { argument: argument.name.clone(), fault })?;
            rendered += 1;
        }

        if rendered == 0 {
            line.push_str("void");
        }
        Ok(line.len())
    }

    /// Render one `type name=value` token
    ///
    /// The slot is read before anything is written, so a fault leaves the
    /// buffer untouched.
    ///
    /// # Errors
    /// Returns the fault raised reading the argument slot
    pub fn decode_argument<P: MemoryProbe + ?Sized>(
        &self,
        probe: &mut P,
        argument: &ArgumentDescriptor,
        frame: FrameCursor,
        line: &mut LineBuffer,
    ) -> Result<(), Fault> {
        let name = &argument.name;
        let offset = argument.frame_offset;

        match argument.arg_type {
            ArgumentType::Char => {
                let byte = frame.read_u8_at(probe, offset)?;
                if is_printable(byte) {
                    line.push_fmt(format_args!("char {name}='{}'", char::from(byte)));
                } else {
                    line.push_fmt(format_args!("char {name}='\\{byte:o}'"));
                }
            }
            ArgumentType::Int => {
                let value = frame.read_i32_at(probe, offset)?;
                line.push_fmt(format_args!("int {name}={value}"));
            }
            ArgumentType::Float => {
                let value = frame.read_f32_at(probe, offset)?;
                line.push_fmt(format_args!("float {name}={}", format_fixed(f64::from(value))));
            }
            ArgumentType::Double => {
                let value = if self.config.legacy_double_width {
                    f64::from(frame.read_f32_at(probe, offset)?)
                } else {
                    frame.read_f64_at(probe, offset)?
                };
                line.push_fmt(format_args!("double {name}={}", format_fixed(value)));
            }
            ArgumentType::String => {
                let pointer = frame.read_word_at(probe, offset)?;
                line.push_fmt(format_args!("char *{name}="));
                self.render_string(probe, pointer, line);
            }
            ArgumentType::StringArray => {
                let pointer = frame.read_word_at(probe, offset)?;
                line.push_fmt(format_args!("char **{name}="));
                if probe.probe_read(pointer) {
                    self.render_string_array(probe, pointer, line);
                } else {
                    line.push_fmt(format_args!("{{{pointer:#x}}}"));
                }
            }
            ArgumentType::VoidPointer => {
                let value = frame.read_word_at(probe, offset)?;
                line.push_fmt(format_args!("void *{name}=0v{value:x}"));
            }
            ArgumentType::Unknown => {
                let value = frame.read_word_at(probe, offset)?;
                line.push_fmt(format_args!("UNKNOWN {name}={value:#x}"));
            }
        }
        Ok(())
    }

    /// Render the C string at `pointer`
    ///
    /// Quoted if every byte is printable, cut to `max_string_chars` plus
    /// `...` inside the quotes when longer. The raw pointer otherwise,
    /// including when any byte faults.
    pub fn render_string<P: MemoryProbe + ?Sized>(&self, probe: &mut P, pointer: u64, line: &mut LineBuffer) {
        let Ok(scan) = probe.read_c_string(pointer, self.config.string_scan_limit) else {
            line.push_fmt(format_args!("{pointer:#x}"));
            return;
        };

        if !scan.bytes.iter().copied().all(is_printable) {
            line.push_fmt(format_args!("{pointer:#x}"));
            return;
        }

        // All bytes are printable ASCII, so byte and char counts agree
        let text = String::from_utf8_lossy(&scan.bytes);
        let limit = self.config.max_string_chars;
        if scan.terminated && scan.bytes.len() <= limit {
            line.push_fmt(format_args!("\"{text}\""));
        } else {
            line.push_fmt(format_args!("\"{}...\"", &text[..limit.min(text.len())]));
        }
    }

    /// Render the NULL-terminated `char *` array at `pointer`
    ///
    /// At most `max_array_entries` entries; `, ...` marks a further non-null
    /// entry. An unreadable element slot is rendered as its address and
    /// ends the array.
    pub fn render_string_array<P: MemoryProbe + ?Sized>(
        &self,
        probe: &mut P,
        pointer: u64,
        line: &mut LineBuffer,
    ) {
        let max_entries = self.config.max_array_entries;
        let element_slot = |index: usize| pointer.checked_add((index * WORD_SIZE) as u64);

        line.push('{');
        let mut count = 0;
        let mut slot_faulted = false;

        while count < max_entries {
            let Some(slot) = element_slot(count) else {
                slot_faulted = true;
                break;
            };
            match probe.read_word(slot) {
                Err(_) => {
                    if count > 0 {
                        line.push(',');
                    }
                    line.push_fmt(format_args!("{slot:#x}"));
                    slot_faulted = true;
                    break;
                }
                Ok(0) => break,
                Ok(element) => {
                    if count > 0 {
                        line.push(',');
                    }
                    self.render_string(probe, element, line);
                    count += 1;
                }
            }
        }

        if !slot_faulted && count == max_entries {
            let more = element_slot(count)
                .and_then(|slot| probe.read_word(slot).ok())
                .is_some_and(|next| next != 0);
            if more {
                line.push_str(", ...");
            }
        }
        line.push('}');
    }
}
