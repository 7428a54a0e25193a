//! DocBank page parser.
//!
//! A page is a list of text blocks, each tagged with a layout label. The
//! parser folds consecutive blocks into labelled segments with a small
//! state machine:
//!
//! * blocks with the same label as the current state are joined with a space;
//! * an author segment also absorbs paragraph blocks that follow it;
//! * once a footer starts, every remaining block on the page is part of it;
//! * ignored labels (equations and figures by default) produce no text, and
//!   the next kept block always opens a new segment.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Label {
    Abstract,
    Author,
    Caption,
    Equation,
    Figure,
    Footer,
    List,
    Paragraph,
    Reference,
    Section,
    Table,
    Title,
    Date,
    Other(String),
}

impl Label {
    pub fn as_str(&self) -> &str {
        match self {
            Label::Abstract => "abstract",
            Label::Author => "author",
            Label::Caption => "caption",
            Label::Equation => "equation",
            Label::Figure => "figure",
            Label::Footer => "footer",
            Label::List => "list",
            Label::Paragraph => "paragraph",
            Label::Reference => "reference",
            Label::Section => "section",
            Label::Table => "table",
            Label::Title => "title",
            Label::Date => "date",
            Label::Other(name) => name,
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "abstract" => Label::Abstract,
            "author" => Label::Author,
            "caption" => Label::Caption,
            "equation" => Label::Equation,
            "figure" => Label::Figure,
            "footer" => Label::Footer,
            "list" => Label::List,
            "paragraph" => Label::Paragraph,
            "reference" => Label::Reference,
            "section" => Label::Section,
            "table" => Label::Table,
            "title" => Label::Title,
            "date" => Label::Date,
            other => Label::Other(other.to_string()),
        }
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label::from(value.as_str())
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBlock {
    pub text: String,
    pub label: Label,
}

impl PageBlock {
    pub fn new(label: Label, text: impl Into<String>) -> Self {
        Self { text: text.into(), label }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: Label,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    Default(Label),
    Author,
    Footer,
    Ignored(Label),
}

impl State {
    fn label(&self) -> Label {
        match self {
            State::Default(label) | State::Ignored(label) => label.clone(),
            State::Author => Label::Author,
            State::Footer => Label::Footer,
        }
    }

    fn is_ignored(&self) -> bool {
        matches!(self, State::Ignored(_))
    }
}

#[derive(Debug, Clone)]
pub struct PageParser {
    ignored: HashSet<Label>,
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new([Label::Equation, Label::Figure])
    }
}

impl PageParser {
    pub fn new(ignored: impl IntoIterator<Item = Label>) -> Self {
        Self {
            ignored: ignored.into_iter().collect(),
        }
    }

    fn state_for(&self, label: &Label) -> State {
        if self.ignored.contains(label) {
            return State::Ignored(label.clone());
        }
        match label {
            Label::Author => State::Author,
            Label::Footer => State::Footer,
            Label::Other(name) => {
                warn!("No parser for label '{}', treating it as plain text", name);
                State::Default(label.clone())
            }
            _ => State::Default(label.clone()),
        }
    }

    fn next_state(&self, current: &State, label: &Label) -> State {
        match current {
            State::Footer => State::Footer,
            State::Author if matches!(label, Label::Paragraph | Label::Author) => State::Author,
            _ if current.label() == *label => current.clone(),
            _ => self.state_for(label),
        }
    }

    /// Folds a page's blocks into segments, in page order.
    pub fn parse(&self, blocks: &[PageBlock]) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut state = State::Default(Label::Paragraph);

        for block in blocks {
            let previous = state;
            state = self.next_state(&previous, &block.label);
            if state.is_ignored() {
                continue;
            }

            let segment_label = state.label();
            let opens_segment = match segments.last() {
                Some(last) => last.label != segment_label || previous.is_ignored(),
                None => true,
            };
            if opens_segment {
                segments.push(Segment {
                    label: segment_label,
                    text: String::new(),
                });
            }

            let separator = match state {
                State::Footer if block.label != Label::Footer => '\n',
                _ => ' ',
            };
            if let Some(last) = segments.last_mut() {
                if !last.text.is_empty() {
                    last.text.push(separator);
                }
                last.text.push_str(block.text.trim());
            }
        }

        segments
    }
}
