/// One rendering-ready token derived from raw elements.
///
/// Data variants count toward the line length; decoration variants
/// (timestamp, margins, spaces, break markers) do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayElement {
    TxData(String),
    RxData(String),
    TxControl(String),
    RxControl(String),
    TimeStamp(String),
    LeftMargin,
    RightMargin,
    Space,
    LineLength(usize),
    LineBreak,
    Error(String),
}

impl DisplayElement {
    /// Whether this element counts toward the line's data length
    pub fn is_data(&self) -> bool {
        matches!(self, DisplayElement::TxData(_) | DisplayElement::RxData(_))
    }

    /// Rendering text of the element
    pub fn text(&self) -> String {
        match self {
            DisplayElement::TxData(text)
            | DisplayElement::RxData(text)
            | DisplayElement::TxControl(text)
            | DisplayElement::RxControl(text)
            | DisplayElement::TimeStamp(text)
            | DisplayElement::Error(text) => text.clone(),
            DisplayElement::LeftMargin | DisplayElement::RightMargin | DisplayElement::Space => {
                " ".to_string()
            }
            DisplayElement::LineLength(count) => format!("({})", count),
            DisplayElement::LineBreak => String::new(),
        }
    }
}

/// A complete sequence of display elements terminated by exactly one
/// [`DisplayElement::LineBreak`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub elements: Vec<DisplayElement>,
}

impl DisplayLine {
    pub fn new(elements: Vec<DisplayElement>) -> Self {
        Self { elements }
    }

    /// Number of data elements in the line
    pub fn data_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_data()).count()
    }

    /// Concatenated rendering text
    pub fn text(&self) -> String {
        self.elements.iter().map(|e| e.text()).collect()
    }
}
