// src/layout/file.rs  -  JSON layout description loader
//
//   {
//     "mainlayout": "typing",
//     "layouts": {
//       "typing": { "dictation": true,
//                   "items": [ { "code": ".-", "action": "A" },
//                              { "code": "12", "action": "CHANGELAYOUT", "target": "mouse" },
//                              { "code": "..--.", "action": "PREDICTION_SELECT", "target": 0 } ] }
//     }
//   }
//
// Codes may use the legacy digit form (1 = dit, 2 = dah).  `action` names a
// keystroke or pointer command from the key table, or one of CHANGELAYOUT,
// PREDICTION_SELECT, REPEATMODE, KEYSTROKE (key name in `target`).

use super::keys::named_action;
use super::{Layout, LayoutEntry, LayoutStore};
use crate::action::Action;
use crate::error::LayoutError;
use crate::morse::CodeBuffer;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LayoutFile {
    #[serde(rename = "mainlayout", alias = "main")]
    main:    Option<String>,
    layouts: BTreeMap<String, LayoutDef>,
}

#[derive(Debug, Deserialize)]
struct LayoutDef {
    #[serde(default)]
    dictation: bool,
    #[serde(default)]
    items:     Vec<ItemDef>,
}

#[derive(Debug, Deserialize)]
struct ItemDef {
    code:   String,
    #[serde(alias = "type")]
    action: String,
    label:  Option<String>,
    target: Option<Target>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Target {
    Slot(i64),
    Name(String),
}

impl Target {
    fn name(&self) -> String {
        match self {
            Target::Slot(n) => n.to_string(),
            Target::Name(s) => s.clone(),
        }
    }

    fn slot(&self) -> Option<usize> {
        match self {
            Target::Slot(n) => usize::try_from(*n).ok(),
            Target::Name(s) => s.trim().parse().ok(),
        }
    }
}

/// Layouts read from a description, before one is made active.
#[derive(Debug, Clone)]
pub struct LayoutSet {
    pub layouts: Vec<Layout>,
    /// Name of the main layout given by the description, if any.
    pub main:    Option<String>,
}

impl LayoutSet {
    /// Build the store.  `main_override` wins over the description's main
    /// layout; with neither, the first layout is main.
    pub fn into_store(self, main_override: Option<&str>) -> Result<LayoutStore, LayoutError> {
        let main = main_override
            .map(str::to_string)
            .or(self.main)
            .or_else(|| self.layouts.first().map(|l| l.name().to_string()))
            .ok_or(LayoutError::Empty)?;
        LayoutStore::new(self.layouts, &main)
    }
}

pub fn parse_layouts(json: &str) -> Result<LayoutSet> {
    let file: LayoutFile = serde_json::from_str(json).context("layout description is not valid JSON")?;
    if file.layouts.is_empty() {
        return Err(LayoutError::Empty.into());
    }
    let mut layouts = Vec::with_capacity(file.layouts.len());
    for (name, def) in file.layouts {
        layouts.push(build_layout(name, def)?);
    }
    Ok(LayoutSet { layouts, main: file.main })
}

pub fn load_layouts(path: &Path) -> Result<LayoutSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read layout file {}", path.display()))?;
    let set = parse_layouts(&text).with_context(|| format!("Layout file {}", path.display()))?;
    log::info!("[layout] loaded {} layout(s) from {}", set.layouts.len(), path.display());
    Ok(set)
}

fn build_layout(name: String, def: LayoutDef) -> Result<Layout, LayoutError> {
    let mut entries = Vec::with_capacity(def.items.len());
    for item in def.items {
        let code = CodeBuffer::parse(&item.code).ok_or_else(|| LayoutError::InvalidCode {
            layout: name.clone(),
            code:   item.code.clone(),
        })?;
        match build_action(&name, &item.action, item.target.as_ref(), def.dictation)? {
            Some((action, label)) => {
                entries.push(LayoutEntry::new(code, item.label.unwrap_or(label), action));
            }
            None => log::warn!("[layout] '{name}': no action named {} (code {}), entry dropped", item.action, item.code),
        }
    }
    Layout::new(name, def.dictation, entries)
}

/// `Ok(None)` for action names nothing knows about.
fn build_action(
    layout:    &str,
    name:      &str,
    target:    Option<&Target>,
    dictation: bool,
) -> Result<Option<(Action, String)>, LayoutError> {
    let upper = name.trim().to_uppercase();
    let missing = || LayoutError::MissingTarget { layout: layout.to_string(), action: upper.clone() };
    let built = match upper.as_str() {
        "CHANGELAYOUT" => {
            let target = target.map(Target::name).ok_or_else(missing)?;
            let label = target.clone();
            Some((Action::ChangeLayout { target }, label))
        }
        "PREDICTION_SELECT" => {
            let slot = target.and_then(Target::slot).ok_or_else(missing)?;
            Some((Action::PredictionSelect { slot }, String::new()))
        }
        "REPEATMODE" => Some((Action::RepeatToggle, "repeat".to_string())),
        "KEYSTROKE" => {
            let key = target.map(Target::name).ok_or_else(missing)?;
            named_action(&key, dictation)
        }
        _ => named_action(&upper, dictation),
    };
    Ok(built)
}
