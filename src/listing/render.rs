//! Text rendering of an `AddressWriter`.
//!
//! One forward pass in address order. A single depth counter goes up before
//! a function start is printed and down after a function end, and every
//! line of a block at depth `d` is prefixed with `d * indent_width` marker
//! characters. The counter only approximates call nesting: functions that
//! are interleaved or split across the address range nest incorrectly.

use std::fmt::Write;

use crate::config::RenderConfig;
use crate::formats::pe::utils::hex_width;
use crate::listing::writer::{AddressAnnotations, AddressWriter, CODE_CATEGORY};

impl AddressWriter {
    /// Render the whole table. All entries are expected in one address space.
    pub fn render(&self, config: &RenderConfig) -> String {
        let width = self.max_address().map(hex_width).unwrap_or(1);
        let mut out = String::new();
        let mut depth: usize = 0;

        for entry in self.iter() {
            if entry.is_function_start() {
                depth += 1;
            }

            let marker: String = std::iter::repeat(config.indent_char)
                .take(depth * config.indent_width)
                .collect();
            for line in self.block_lines(entry, width) {
                let _ = writeln!(out, "{}{}", marker, line);
            }

            if depth > 0 && entry.is_function_end() {
                depth -= 1;
            }
        }

        out
    }

    /// Lines of one entry: address prefix and label, then categories.
    fn block_lines(&self, entry: &AddressAnnotations, width: usize) -> Vec<String> {
        let prefix = format!("0x{:0width$X}: ", entry.address.address, width = width);
        let pad = " ".repeat(prefix.len());

        let mut body = Vec::new();
        if let Some(label) = self.effective_label(entry) {
            body.push(label);
        }

        let target_note = entry.target.map(|target| {
            let shown = self
                .get(target)
                .and_then(|t| self.effective_label(t))
                .unwrap_or_else(|| format!("0x{:X}", target.address));
            format!(" // -> {}", shown)
        });

        for category in entry.categories() {
            // Instruction text and bytes print bare, without a `name[count]: ` header
            if category.name == CODE_CATEGORY {
                for (i, text) in category.entries.iter().enumerate() {
                    match (&target_note, i) {
                        (Some(note), 0) => body.push(format!("{}{}", text, note)),
                        _ => body.push(text.clone()),
                    }
                }
                continue;
            }

            let header = format!("{}[{}]: ", category.name, category.entries.len());
            let align = " ".repeat(header.len());
            for (i, text) in category.entries.iter().enumerate() {
                if i == 0 {
                    body.push(format!("{}{}", header, text));
                } else {
                    body.push(format!("{}{}", align, text));
                }
            }
        }

        if body.is_empty() {
            return vec![prefix.trim_end().to_string()];
        }

        body.into_iter()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    format!("{}{}", prefix, line)
                } else {
                    format!("{}{}", pad, line)
                }
            })
            .collect()
    }
}
