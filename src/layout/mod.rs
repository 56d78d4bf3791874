// src/layout/mod.rs  -  Layouts (code → action tables), active selection, code resolution
pub mod builtin;
pub mod file;
pub mod keys;

pub use file::{load_layouts, parse_layouts, LayoutSet};
pub use keys::{keystroke, keystroke_for_char, KeyStroke};

use crate::action::Action;
use crate::error::LayoutError;
use crate::morse::CodeBuffer;
use std::collections::HashMap;

/// One code → action binding.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub code:   CodeBuffer,
    /// Display text; for prediction slots the label comes from the predictor.
    pub label:  String,
    pub action: Action,
}

impl LayoutEntry {
    pub fn new(code: CodeBuffer, label: impl Into<String>, action: Action) -> Self {
        Self { code, label: label.into(), action }
    }

    pub fn label(&self, predictions: &[String]) -> String {
        match &self.action {
            Action::PredictionSelect { .. } => self.action.label(predictions),
            _ if self.label.is_empty()      => self.action.label(predictions),
            _                               => self.label.clone(),
        }
    }
}

/// A named code table.  Dictation layouts feed typed characters into the
/// abbreviation / prediction text state.
#[derive(Debug, Clone)]
pub struct Layout {
    name:      String,
    dictation: bool,
    entries:   Vec<LayoutEntry>,
    index:     HashMap<CodeBuffer, usize>,
}

impl Layout {
    pub fn new(name: impl Into<String>, dictation: bool, entries: Vec<LayoutEntry>) -> Result<Self, LayoutError> {
        let name = name.into();
        let mut index = HashMap::with_capacity(entries.len());
        for (i, e) in entries.iter().enumerate() {
            if index.insert(e.code.clone(), i).is_some() {
                return Err(LayoutError::DuplicateCode { layout: name, code: e.code.render() });
            }
        }
        Ok(Self { name, dictation, entries, index })
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn is_dictation(&self) -> bool { self.dictation }
    pub fn entries(&self) -> &[LayoutEntry] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Exact match on the whole code.
    pub fn lookup(&self, code: &CodeBuffer) -> Option<&LayoutEntry> {
        self.index.get(code).map(|&i| &self.entries[i])
    }

    /// Entries still reachable from `prefix`, in table order.
    pub fn candidates(&self, prefix: &CodeBuffer) -> Vec<&LayoutEntry> {
        self.entries.iter().filter(|e| e.code.starts_with(prefix)).collect()
    }

    /// Longest code in the table.
    pub fn max_code_len(&self) -> usize {
        self.entries.iter().map(|e| e.code.len()).max().unwrap_or(0)
    }
}

/// Look a finished code up in `layout`.  Never does prefix matching.
pub fn resolve<'a>(code: &CodeBuffer, layout: &'a Layout) -> Option<&'a Action> {
    layout.lookup(code).map(|e| &e.action)
}

/// All loaded layouts plus the active selection.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    layouts: Vec<Layout>,
    main:    usize,
    active:  usize,
}

impl LayoutStore {
    /// `main` becomes active.  Later layouts with an already used name
    /// replace the earlier one.
    pub fn new(layouts: Vec<Layout>, main: &str) -> Result<Self, LayoutError> {
        if layouts.is_empty() {
            return Err(LayoutError::Empty);
        }
        let mut unique: Vec<Layout> = Vec::with_capacity(layouts.len());
        for layout in layouts {
            if let Some(slot) = unique.iter_mut().find(|l| l.name == layout.name) {
                log::warn!("[layout] layout '{}' defined twice, keeping the last one", layout.name);
                *slot = layout;
            } else {
                unique.push(layout);
            }
        }
        let main = unique
            .iter()
            .position(|l| l.name == main)
            .ok_or_else(|| LayoutError::UnknownLayout(main.to_string()))?;
        let store = Self { layouts: unique, main, active: main };
        store.warn_dangling_targets();
        Ok(store)
    }

    pub fn active(&self) -> &Layout { &self.layouts[self.active] }
    pub fn active_name(&self) -> &str { &self.layouts[self.active].name }
    pub fn main_name(&self) -> &str { &self.layouts[self.main].name }

    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.layouts.iter().find(|l| l.name == name)
    }

    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layouts.iter().map(|l| l.name.as_str())
    }

    /// Switch the active layout.  An unknown name leaves the current one active.
    pub fn set_active(&mut self, name: &str) -> Result<(), LayoutError> {
        let idx = self
            .layouts
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| LayoutError::UnknownLayout(name.to_string()))?;
        self.active = idx;
        log::info!("[layout] active layout set to {name}");
        Ok(())
    }

    /// Resolve against the active layout.
    pub fn resolve(&self, code: &CodeBuffer) -> Option<&Action> {
        resolve(code, self.active())
    }

    fn warn_dangling_targets(&self) {
        for layout in &self.layouts {
            for e in &layout.entries {
                if let Action::ChangeLayout { target } = &e.action {
                    if !self.contains(target) {
                        log::warn!("[layout] '{}' code {} switches to unknown layout '{target}'", layout.name, e.code);
                    }
                }
            }
        }
    }
}
