//! Per-address annotation table.
//!
//! Every fact about an address (instruction text, raw bytes, labels,
//! cross-references, section markers) is recorded against an
//! `AddressPointer` and merged into one `AddressAnnotations` entry. Entries
//! are created on first touch and never removed.

use std::collections::BTreeMap;

use crate::core::address::AddressPointer;

/// Category holding instruction text and bytes
pub const CODE_CATEGORY: &str = "";
/// Prefix of labels given to plain branch targets
pub const BRANCH_LABEL_PREFIX: &str = "LAB_";
/// Prefix of labels given to call targets
pub const FUNCTION_LABEL_PREFIX: &str = "FUN_";
/// Prefix of the displayed label of a detected stub
pub const THUNK_LABEL_PREFIX: &str = "THUNK_";

/// A named, prioritized list of annotation lines at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub priority: i32,
    pub entries: Vec<String>,
}

impl Category {
    fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            entries: Vec::new(),
        }
    }
}

/// Everything recorded at one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressAnnotations {
    pub address: AddressPointer,
    pub label: Option<String>,
    /// Cross-reference into the same table, resolved at render time
    pub target: Option<AddressPointer>,
    // First-insertion order; priority ordering happens on read
    categories: Vec<Category>,
}

impl AddressAnnotations {
    pub fn new(address: AddressPointer) -> Self {
        Self {
            address,
            label: None,
            target: None,
            categories: Vec::new(),
        }
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Categories by descending priority; ties keep first-insertion order.
    pub fn categories(&self) -> Vec<&Category> {
        let mut ordered: Vec<&Category> = self.categories.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
        ordered
    }

    /// Append `text` to a category, creating it with `priority` if absent.
    /// An existing category keeps the priority it was created with.
    pub fn add(&mut self, text: impl Into<String>, category: &str, priority: i32) {
        let index = match self.categories.iter().position(|c| c.name == category) {
            Some(index) => index,
            None => {
                self.categories.push(Category::new(category, priority));
                self.categories.len() - 1
            }
        };
        self.categories[index].entries.push(text.into());
    }

    /// No instruction recorded here, or the instruction leaves the function.
    pub fn is_function_end(&self) -> bool {
        match self.category(CODE_CATEGORY) {
            None => true,
            Some(code) => code
                .entries
                .iter()
                .any(|e| e == "ret" || e.starts_with("jmp")),
        }
    }

    /// Labeled with anything other than a plain branch label.
    pub fn is_function_start(&self) -> bool {
        self.label
            .as_deref()
            .is_some_and(|label| !label.starts_with(BRANCH_LABEL_PREFIX))
    }
}

/// Aggregates annotations for a whole image, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct AddressWriter {
    entries: BTreeMap<AddressPointer, AddressAnnotations>,
}

impl AddressWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `pointer`, inserting an empty one if absent.
    pub fn annotations_mut(&mut self, pointer: AddressPointer) -> &mut AddressAnnotations {
        self.entries
            .entry(pointer)
            .or_insert_with(|| AddressAnnotations::new(pointer))
    }

    pub fn get(&self, pointer: AddressPointer) -> Option<&AddressAnnotations> {
        self.entries.get(&pointer)
    }

    pub fn label(&self, pointer: AddressPointer) -> Option<&str> {
        self.get(pointer).and_then(|a| a.label.as_deref())
    }

    /// Assign or overwrite the label at `pointer`.
    pub fn set_label(&mut self, pointer: AddressPointer, text: impl Into<String>) {
        self.annotations_mut(pointer).label = Some(text.into());
    }

    /// Point `pointer` at `target`; both entries exist afterwards.
    pub fn set_target(&mut self, pointer: AddressPointer, target: AddressPointer) {
        self.annotations_mut(target);
        self.annotations_mut(pointer).target = Some(target);
    }

    pub fn add_annotation(
        &mut self,
        pointer: AddressPointer,
        text: impl Into<String>,
        category: &str,
        priority: i32,
    ) {
        self.annotations_mut(pointer).add(text, category, priority);
    }

    /// Label to display for an entry. A function start that points at a
    /// labeled entry is shown as a thunk to it.
    pub fn effective_label(&self, entry: &AddressAnnotations) -> Option<String> {
        if entry.is_function_start() {
            let target_label = entry
                .target
                .and_then(|target| self.label(target));
            if let Some(target_label) = target_label {
                return Some(format!("{}{}", THUNK_LABEL_PREFIX, target_label));
            }
        }
        entry.label.clone()
    }

    /// Entries in ascending address order
    pub fn iter(&self) -> impl Iterator<Item = &AddressAnnotations> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest recorded address value
    pub fn max_address(&self) -> Option<u32> {
        self.entries.keys().map(|p| p.address).max()
    }
}
