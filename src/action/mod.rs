// src/action/mod.rs  -  The closed set of layout actions
pub mod dispatch;
pub mod text;

pub use dispatch::ActionDispatcher;
pub use text::{Abbreviations, Predictor, TypeState};

use crate::error::ActionError;
use crate::layout::KeyStroke;
use crate::output::{ClickMode, MouseButton};

/// What a layout entry does.  Built once when the layout is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Synthesize a key.  `abbreviations` is set for entries of dictation
    /// layouts: typed characters then feed the text state.
    Keystroke { stroke: KeyStroke, abbreviations: bool },
    PointerMove { dx: i32, dy: i32 },
    PointerClick { button: MouseButton, mode: ClickMode },
    ChangeLayout { target: String },
    PredictionSelect { slot: usize },
    RepeatToggle,
}

/// Follow-up the engine applies after a successful perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// Sticky repeat requested for the character being finalised.
    EnableRepeat,
    /// Switch layouts once the current character is finished.
    SwitchLayout(String),
}

impl Action {
    /// Display text.  Prediction slots show the current candidate, or nothing.
    pub fn label(&self, predictions: &[String]) -> String {
        match self {
            Action::Keystroke { stroke, .. }     => stroke.label.clone(),
            Action::PointerMove { dx, dy }       => format!("ms {dx:+},{dy:+}"),
            Action::PointerClick { button, mode } => format!("ms {mode:?} {button:?}").to_lowercase(),
            Action::ChangeLayout { target }      => target.clone(),
            Action::PredictionSelect { slot }    => predictions.get(*slot).cloned().unwrap_or_default(),
            Action::RepeatToggle                 => "repeat".into(),
        }
    }

    pub fn perform(&self, ctx: &mut ActionDispatcher) -> Result<Outcome, ActionError> {
        match self {
            Action::Keystroke { stroke, abbreviations } => ctx.keystroke(stroke, *abbreviations),
            Action::PointerMove { dx, dy }              => ctx.pointer_move(*dx, *dy),
            Action::PointerClick { button, mode }       => ctx.pointer_click(*button, *mode),
            Action::PredictionSelect { slot }           => ctx.prediction_select(*slot),
            Action::ChangeLayout { target }             => Ok(Outcome::SwitchLayout(target.clone())),
            Action::RepeatToggle                        => Ok(Outcome::EnableRepeat),
        }
    }
}
