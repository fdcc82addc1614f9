use crate::domain::config::TerminalMode;

/// One framing atom produced from raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// Printable payload, counts toward line length
    Data(String),
    /// Control character, shown but not counted
    Control(String),
    /// End-of-line match, terminates the line without contributing an
    /// element of its own
    Eol,
}

/// Variant-specific atom extraction for the line state machine.
///
/// Implementations are stateful: partial matches (a split EOL sequence, an
/// incomplete UTF-8 scalar) are carried across chunks. One instance exists
/// per direction.
pub trait LineProcessor: Send + Sync {
    /// Convert an inbound chunk into atoms, carrying partial state
    fn tokenize(&mut self, bytes: &[u8]) -> Vec<Atom>;

    /// Whether consecutive data elements are separated by a Space element
    fn spaced(&self) -> bool;

    /// Drop any carried partial state (used on reload)
    fn reset(&mut self);
}

/// Build the processor matching the configured terminal mode
pub fn create_processor(mode: &TerminalMode) -> Box<dyn LineProcessor> {
    match mode {
        TerminalMode::Binary => Box::new(BinaryProcessor),
        TerminalMode::Text { eol } => Box::new(TextProcessor::new(eol.as_bytes().to_vec())),
    }
}

/// Binary framing: every byte is one atom, rendered as uppercase hex
pub struct BinaryProcessor;

impl LineProcessor for BinaryProcessor {
    fn tokenize(&mut self, bytes: &[u8]) -> Vec<Atom> {
        bytes
            .iter()
            .map(|byte| Atom::Data(hex::encode_upper([*byte])))
            .collect()
    }

    fn spaced(&self) -> bool {
        true
    }

    fn reset(&mut self) {}
}

/// Text framing: atoms are decoded characters; a configured EOL sequence
/// terminates the line
pub struct TextProcessor {
    eol: Vec<u8>,
    /// Unconsumed tail bytes (partial EOL match or incomplete UTF-8 scalar)
    carry: Vec<u8>,
}

impl TextProcessor {
    pub fn new(eol: Vec<u8>) -> Self {
        Self {
            eol,
            carry: Vec::new(),
        }
    }

    fn control_name(byte: u8) -> String {
        match byte {
            0x00 => "<NUL>".to_string(),
            0x07 => "<BEL>".to_string(),
            0x08 => "<BS>".to_string(),
            0x09 => "<TAB>".to_string(),
            0x0A => "<LF>".to_string(),
            0x0D => "<CR>".to_string(),
            0x1B => "<ESC>".to_string(),
            other => format!("<{:02X}>", other),
        }
    }

    fn utf8_width(byte: u8) -> usize {
        match byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        }
    }
}

impl LineProcessor for TextProcessor {
    fn tokenize(&mut self, bytes: &[u8]) -> Vec<Atom> {
        let mut input = std::mem::take(&mut self.carry);
        input.extend_from_slice(bytes);

        let mut atoms = Vec::new();
        let mut pos = 0;

        while pos < input.len() {
            let rest = &input[pos..];

            if !self.eol.is_empty() {
                if rest.starts_with(&self.eol) {
                    atoms.push(Atom::Eol);
                    pos += self.eol.len();
                    continue;
                }
                // A strict prefix of the EOL at the chunk tail may complete
                // with the next chunk
                if rest.len() < self.eol.len() && self.eol.starts_with(rest) {
                    self.carry = rest.to_vec();
                    break;
                }
            }

            let byte = rest[0];
            if byte < 0x20 || byte == 0x7F {
                atoms.push(Atom::Control(Self::control_name(byte)));
                pos += 1;
                continue;
            }

            let width = Self::utf8_width(byte);
            if rest.len() < width {
                self.carry = rest.to_vec();
                break;
            }
            match std::str::from_utf8(&rest[..width]) {
                Ok(text) => {
                    atoms.push(Atom::Data(text.to_string()));
                    pos += width;
                }
                Err(_) => {
                    // Not valid UTF-8, surface the byte as a hex token
                    atoms.push(Atom::Control(format!("<{:02X}>", byte)));
                    pos += 1;
                }
            }
        }

        atoms
    }

    fn spaced(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        self.carry.clear();
    }
}
