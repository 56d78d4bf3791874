// src/morse/mod.rs  -  Symbols, timing, classifier, character assembler
pub mod assembler;
pub mod classifier;
pub mod code;
pub mod table;
pub mod timer;
pub mod timing;

pub use assembler::{AssemblerState, CharacterAssembler, RepeatState};
pub use classifier::{Classification, Signal, TimingClassifier};
pub use code::{CodeBuffer, MorseSymbol};
pub use timer::Timer;
pub use timing::{InputMode, TimingConfig};
