//! Inspectable hex dump used to present decode errors with visual context.
//!
//! The dump renders a 16-byte window around a highlighted offset with an
//! offset heading, a hex rail, an ASCII rail, and a caret line pointing at
//! the byte where decoding halted.

/// Width of the hex section: 16 bytes, three characters each.
const HEX_SECTION_WIDTH: usize = 48;

/// Column at which the ASCII section starts (`HEX_SECTION_WIDTH` + `"| "`).
const ASCII_SECTION_START: usize = 50;

/// Width of the ASCII section in the separator line.
const ASCII_SECTION_WIDTH: usize = 18;

/// Bytes shown per line, and per highlight window.
const WINDOW_SIZE: usize = 16;

/// A byte slice that can be rendered as a hex dump with a highlighted
/// offset or range.
#[derive(Debug, Clone)]
pub struct InspectableHexDump<'a> {
    bytes: &'a [u8],
    truncation_start: usize,
}

impl<'a> InspectableHexDump<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            truncation_start: 0,
        }
    }

    /// Render the dump with a caret under the byte at `highlight_offset`,
    /// once in the hex rail and once in the ASCII rail.
    ///
    /// ```text
    /// Hex (bytes 0-11)                                | ASCII
    /// ------------------------------------------------+------------------
    /// 48 65 6c 6c 6f 20 57 6f 72 6c 64 21             | Hello World!
    ///                 ^                                      ^
    /// ```
    pub fn format_with_highlighted_offset(&self, highlight_offset: usize) -> String {
        let windowed = self.truncate_around_offset(highlight_offset);

        let mut pointer_line = " ".repeat(windowed.offset_in_hexdump(highlight_offset));
        pointer_line.push('^');

        let ascii_column = windowed.offset_in_ascii(highlight_offset);
        pointer_line.push_str(&" ".repeat(ascii_column - pointer_line.len()));
        pointer_line.push('^');

        format!("{}\n{}", windowed.formatted_string_with_heading(), pointer_line)
    }

    /// Render the dump with a `^----^` span covering `[start_offset, end_offset]`.
    ///
    /// Ranges wider than 10 bytes do not fit the 16-byte window and collapse
    /// to a single caret at the start offset.
    pub fn format_with_highlighted_range(&self, start_offset: usize, end_offset: usize) -> String {
        if end_offset <= start_offset || end_offset - start_offset > 10 {
            return self.format_with_highlighted_offset(start_offset);
        }

        let windowed = self.truncate_around_offset(start_offset);
        let window_last = windowed.truncation_start + windowed.bytes.len().saturating_sub(1);
        let end_offset = end_offset.min(window_last);

        let hex_start = windowed.offset_in_hexdump(start_offset);
        let hex_end = windowed.offset_in_hexdump(end_offset);
        let ascii_start = windowed.offset_in_ascii(start_offset);
        let ascii_end = windowed.offset_in_ascii(end_offset);

        let mut pointer_line = " ".repeat(hex_start);
        pointer_line.push('^');
        pointer_line.push_str(&"-".repeat(hex_end - hex_start - 1));
        pointer_line.push('^');
        pointer_line.push_str(&" ".repeat(ascii_start - pointer_line.len()));
        pointer_line.push('^');
        pointer_line.push_str(&"-".repeat(ascii_end - ascii_start - 1));
        pointer_line.push('^');

        format!("{}\n{}", windowed.formatted_string_with_heading(), pointer_line)
    }

    /// Narrow the dump to a 16-byte window around `offset`, keeping track of
    /// the original byte indices for the heading and caret math.
    pub fn truncate_around_offset(&self, offset: usize) -> InspectableHexDump<'a> {
        let start = offset.saturating_sub(5);
        let end = self.bytes.len().min(start + WINDOW_SIZE);

        InspectableHexDump {
            bytes: &self.bytes[start.min(end)..end],
            truncation_start: start,
        }
    }

    pub fn formatted_string_with_heading(&self) -> String {
        let range_start = self.truncation_start;
        let range_end = self.truncation_start + self.bytes.len().saturating_sub(1);

        let heading = format!("Hex (bytes {}-{})", range_start, range_end);
        let padding = " ".repeat(HEX_SECTION_WIDTH.saturating_sub(heading.len()));
        let separator = format!(
            "{}+{}",
            "-".repeat(HEX_SECTION_WIDTH),
            "-".repeat(ASCII_SECTION_WIDTH)
        );

        format!(
            "{}{}| ASCII\n{}\n{}",
            heading,
            padding,
            separator,
            self.formatted_string()
        )
    }

    /// Hex and ASCII rails, 16 bytes per line, non-printable bytes shown as `.`.
    pub fn formatted_string(&self) -> String {
        let mut out = String::new();
        let mut hex_section = String::new();
        let mut ascii_section = String::new();

        for (i, &b) in self.bytes.iter().enumerate() {
            if i % WINDOW_SIZE == 0 && i != 0 {
                out.push_str(&hex_section);
                out.push_str("| ");
                out.push_str(&ascii_section);
                out.push('\n');
                hex_section.clear();
                ascii_section.clear();
            }

            hex_section.push_str(&format!("{:02x} ", b));
            ascii_section.push(if (32..=126).contains(&b) { b as char } else { '.' });
        }

        if !hex_section.is_empty() {
            if self.bytes.len() % WINDOW_SIZE != 0 {
                let padding = WINDOW_SIZE - (self.bytes.len() % WINDOW_SIZE);
                hex_section.push_str(&"   ".repeat(padding));
            }
            out.push_str(&hex_section);
            out.push_str("| ");
            out.push_str(&ascii_section);
        }

        out
    }

    /// Column of the caret in the hex rail for a byte offset into the
    /// original (untruncated) buffer.
    fn offset_in_hexdump(&self, byte_offset: usize) -> usize {
        let delta = byte_offset - self.truncation_start;
        3 * delta + 1
    }

    /// Column of the caret in the ASCII rail.
    fn offset_in_ascii(&self, byte_offset: usize) -> usize {
        let delta = byte_offset - self.truncation_start;
        ASCII_SECTION_START + delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlighted_offset_hello_world() {
        let bytes = b"Hello World!";
        let dump = InspectableHexDump::new(bytes);
        let rendered = dump.format_with_highlighted_offset(5);

        let expected_heading = format!("{:<48}| ASCII", "Hex (bytes 0-11)");
        let expected_separator = format!("{}+{}", "-".repeat(48), "-".repeat(18));
        let expected_data = format!(
            "{:<48}| Hello World!",
            "48 65 6c 6c 6f 20 57 6f 72 6c 64 21"
        );
        let expected_pointer = format!("{}^{}^", " ".repeat(16), " ".repeat(38));

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], expected_heading);
        assert_eq!(lines[1], expected_separator);
        assert_eq!(lines[2], expected_data);
        assert_eq!(lines[3], expected_pointer);
    }

    #[test]
    fn test_caret_columns() {
        let bytes = b"Hello World!";
        let dump = InspectableHexDump::new(bytes);
        let rendered = dump.format_with_highlighted_offset(5);
        let pointer = rendered.lines().last().unwrap();

        assert_eq!(pointer.find('^'), Some(16));
        assert_eq!(pointer.rfind('^'), Some(55));
    }

    #[test]
    fn test_window_tracks_offset() {
        let bytes: Vec<u8> = (0..64).collect();
        let dump = InspectableHexDump::new(&bytes);
        let rendered = dump.format_with_highlighted_offset(40);

        // Window starts at 40 - 5 = 35 and spans 16 bytes.
        assert!(rendered.starts_with("Hex (bytes 35-50)"));
        assert!(rendered.contains("23 24 25"));
    }

    #[test]
    fn test_non_printable_bytes_render_as_dots() {
        let bytes = [0x00, 0x1f, 0x41, 0x7f];
        let dump = InspectableHexDump::new(&bytes);
        let rendered = dump.formatted_string();

        assert!(rendered.contains("| ..A."));
    }

    #[test]
    fn test_range_highlight_uses_dashes() {
        let bytes = b"Hello World!";
        let dump = InspectableHexDump::new(bytes);
        let rendered = dump.format_with_highlighted_range(2, 5);
        let pointer = rendered.lines().last().unwrap();

        // Hex carets at columns 3*2+1=7 and 3*5+1=16.
        assert_eq!(&pointer[7..17], "^--------^");
        // ASCII carets at columns 52 and 55.
        assert_eq!(&pointer[52..56], "^--^");
    }

    #[test]
    fn test_wide_range_collapses_to_single_caret() {
        let bytes: Vec<u8> = (0..32).collect();
        let dump = InspectableHexDump::new(&bytes);
        let collapsed = dump.format_with_highlighted_range(2, 20);
        let single = dump.format_with_highlighted_offset(2);

        assert_eq!(collapsed, single);
    }

    #[test]
    fn test_multi_line_formatting() {
        let bytes: Vec<u8> = (0..20).map(|i| b'a' + (i % 26)).collect();
        let dump = InspectableHexDump::new(&bytes);
        let rendered = dump.formatted_string();

        assert_eq!(rendered.lines().count(), 2);
    }
}
