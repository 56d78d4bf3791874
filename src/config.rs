// src/config.rs  -  Runtime configuration (CLI + TOML)
use crate::engine::EngineSettings;
use crate::error::ConfigError;
use crate::keyer::KeyBindings;
use crate::morse::timing::{
    DEFAULT_FAST_REPEAT, DEFAULT_LETTER_PAUSE, DEFAULT_MAX_DIT, DEFAULT_STICKY_INTERVAL,
};
use crate::morse::{InputMode, TimingConfig};
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The example config is embedded directly in the binary at compile time.
/// Users can write it out with:  morse-switch --write-config
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml.example");

// ── CLI ───────────────────────────────────────────────────────────────────────
#[derive(Parser, Debug, Default)]
#[command(
    name  = "morse-switch",
    about = "Type, point and click with one, two or three switches using Morse code",
    version,
)]
pub struct Cli {
    /// Config file path (default: ~/.config/morse-switch/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of switches: 1 | 2 | 3
    #[arg(short, long)]
    pub arity: Option<u8>,

    /// One-switch mode: presses shorter than this (ms) are dits
    #[arg(long)]
    pub max_dit_ms: Option<u64>,

    /// Pause (ms) that ends a character in one- and two-switch mode
    #[arg(long)]
    pub letter_pause_ms: Option<u64>,

    /// Re-emit the held switch's symbol periodically (two/three switches)
    #[arg(long, action)]
    pub fast_repeat: bool,

    /// Switch source: auto | keyboard | midi | vband
    #[arg(long)]
    pub source: Option<SourceKind>,

    /// MIDI port name or substring for the MIDI switch adapter
    #[arg(long)]
    pub midi_port: Option<String>,

    /// Key bound to the first (dit) switch, e.g. SPACE
    #[arg(long)]
    pub key_one: Option<String>,

    /// Key bound to the second (dah) switch, e.g. ENTER
    #[arg(long)]
    pub key_two: Option<String>,

    /// Key bound to the third (end of character) switch, e.g. RCTRL
    #[arg(long)]
    pub key_three: Option<String>,

    /// JSON layout description (default: built-in typing + mouse layouts)
    #[arg(short, long)]
    pub layout: Option<PathBuf>,

    /// Layout to start in (overrides the file's main layout)
    #[arg(long)]
    pub main_layout: Option<String>,

    /// Abbreviation file: one `abbr<TAB>expansion` per line
    #[arg(long)]
    pub abbreviations: Option<PathBuf>,

    /// Where synthesized keys go: auto | os | echo | none
    #[arg(short, long)]
    pub output: Option<OutputKind>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, action)]
    pub debug: bool,

    /// List switch sources compiled into this build and exit
    #[arg(long, action)]
    pub list_ports: bool,

    /// Test the configured switches: press each one when prompted
    #[arg(long, action)]
    pub check_switches: bool,

    /// Write the built-in default config.toml to the config path and exit.
    /// Use --config <PATH> to write to a custom location.
    #[arg(long, action)]
    pub write_config: bool,

    /// Print the built-in default config.toml to stdout and exit
    #[arg(long, action)]
    pub print_config: bool,
}

// ── Enums shared across CLI + TOML ────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Look for a switch adapter; fall back to the keyboard if none found
    Auto,
    /// Terminal keyboard (needs the keyboard enhancement protocol)
    Keyboard,
    /// MIDI switch adapter, NoteOn/NoteOff
    #[cfg_attr(not(feature = "switch-midi"), value(skip))]
    Midi,
    /// VBand USB HID paddle
    #[cfg_attr(not(feature = "switch-vband"), value(skip))]
    Vband,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// OS injection when compiled in, otherwise log only
    Auto,
    /// Keystrokes and pointer events injected into the OS
    #[cfg_attr(not(feature = "os-input"), value(skip))]
    Os,
    /// Print typed text to this terminal
    #[cfg_attr(not(feature = "keyboard"), value(skip))]
    Echo,
    /// Log only
    None,
}

// ── TOML file structure ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub general: Option<GeneralCfg>,
    pub input:   Option<InputCfg>,
    pub layout:  Option<LayoutCfg>,
    pub typing:  Option<TypingCfg>,
    pub output:  Option<OutputCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralCfg {
    pub debug: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputCfg {
    pub arity:                     Option<u8>,
    pub max_dit_ms:                Option<u64>,
    pub min_letter_pause_ms:       Option<u64>,
    pub fast_repeat:               Option<bool>,
    pub fast_repeat_interval_ms:   Option<u64>,
    pub sticky_repeat_interval_ms: Option<u64>,
    pub key_one:                   Option<String>,
    pub key_two:                   Option<String>,
    pub key_three:                 Option<String>,
    pub source:                    Option<SourceKind>,
    pub midi_port:                 Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutCfg {
    pub file: Option<PathBuf>,
    pub main: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingCfg {
    pub enabled:       Option<bool>,
    pub abbreviations: Option<PathBuf>,
    /// Abbreviation trigger; empty = check after every character
    pub trigger:       Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputCfg {
    pub backend: Option<OutputKind>,
}

// ── Resolved / merged config ──────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub arity:                     u8,
    pub max_dit_ms:                u64,
    pub min_letter_pause_ms:       u64,
    pub fast_repeat:               bool,
    pub fast_repeat_interval_ms:   u64,
    pub sticky_repeat_interval_ms: u64,
    /// Key names for the primary, secondary and tertiary switch
    pub keys:                      [String; 3],
    pub source:                    SourceKind,
    pub midi_port:                 String,
    pub layout_file:               Option<PathBuf>,
    pub main_layout:               Option<String>,
    pub typing:                    bool,
    pub abbreviations:             Option<PathBuf>,
    pub trigger:                   Option<char>,
    pub output:                    OutputKind,
    pub debug:                     bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            arity:                     2,
            max_dit_ms:                DEFAULT_MAX_DIT.as_millis() as u64,
            min_letter_pause_ms:       DEFAULT_LETTER_PAUSE.as_millis() as u64,
            fast_repeat:               false,
            fast_repeat_interval_ms:   DEFAULT_FAST_REPEAT.as_millis() as u64,
            sticky_repeat_interval_ms: DEFAULT_STICKY_INTERVAL.as_millis() as u64,
            keys:                      ["SPACE".into(), "ENTER".into(), "RCTRL".into()],
            source:                    SourceKind::Auto,
            midi_port:                 String::new(),
            layout_file:               None,
            main_layout:               None,
            typing:                    true,
            abbreviations:             None,
            trigger:                   Some(' '),
            output:                    OutputKind::Auto,
            debug:                     false,
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────────────
impl AppConfig {
    /// Write the embedded default config to disk.
    /// Returns the path it was written to.
    pub fn write_default_config(cli: &Cli) -> Result<PathBuf> {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {:?}", parent))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Writing config to {:?}", path))?;
        Ok(path)
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::default();

        // 1. Load TOML file
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading config {:?}", path))?;
            let fc: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("Parsing config {:?}", path))?;
            cfg.apply_file(&fc);
            log::info!("[config] loaded {}", path.display());
        } else if cli.config.is_some() {
            anyhow::bail!("Config file {} does not exist", path.display());
        } else {
            log::info!("[config] no config file at {}, using defaults", path.display());
        }

        // 2. Apply CLI overrides
        cfg.apply_cli(cli);
        Ok(cfg)
    }

    pub fn apply_file(&mut self, fc: &FileConfig) {
        if let Some(g) = &fc.general {
            if let Some(v) = g.debug { self.debug = v; }
        }
        if let Some(i) = &fc.input {
            if let Some(v) = i.arity                     { self.arity                     = v; }
            if let Some(v) = i.max_dit_ms                { self.max_dit_ms                = v; }
            if let Some(v) = i.min_letter_pause_ms       { self.min_letter_pause_ms       = v; }
            if let Some(v) = i.fast_repeat               { self.fast_repeat               = v; }
            if let Some(v) = i.fast_repeat_interval_ms   { self.fast_repeat_interval_ms   = v; }
            if let Some(v) = i.sticky_repeat_interval_ms { self.sticky_repeat_interval_ms = v; }
            if let Some(v) = &i.key_one                  { self.keys[0]                   = v.clone(); }
            if let Some(v) = &i.key_two                  { self.keys[1]                   = v.clone(); }
            if let Some(v) = &i.key_three                { self.keys[2]                   = v.clone(); }
            if let Some(v) = i.source                    { self.source                    = v; }
            if let Some(v) = &i.midi_port                { self.midi_port                 = v.clone(); }
        }
        if let Some(l) = &fc.layout {
            if let Some(v) = &l.file { self.layout_file = Some(v.clone()); }
            if let Some(v) = &l.main { self.main_layout = Some(v.clone()); }
        }
        if let Some(t) = &fc.typing {
            if let Some(v) = t.enabled        { self.typing        = v; }
            if let Some(v) = &t.abbreviations { self.abbreviations = Some(v.clone()); }
            if let Some(v) = &t.trigger       { self.trigger       = v.chars().next(); }
        }
        if let Some(o) = &fc.output {
            if let Some(v) = o.backend { self.output = v; }
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = cli.arity            { self.arity               = v; }
        if let Some(v) = cli.max_dit_ms       { self.max_dit_ms          = v; }
        if let Some(v) = cli.letter_pause_ms  { self.min_letter_pause_ms = v; }
        if cli.fast_repeat                    { self.fast_repeat         = true; }
        if let Some(v) = cli.source           { self.source              = v; }
        if let Some(v) = &cli.midi_port       { self.midi_port           = v.clone(); }
        if let Some(v) = &cli.key_one         { self.keys[0]             = v.clone(); }
        if let Some(v) = &cli.key_two         { self.keys[1]             = v.clone(); }
        if let Some(v) = &cli.key_three       { self.keys[2]             = v.clone(); }
        if let Some(v) = &cli.layout          { self.layout_file         = Some(v.clone()); }
        if let Some(v) = &cli.main_layout     { self.main_layout         = Some(v.clone()); }
        if let Some(v) = &cli.abbreviations   { self.abbreviations       = Some(v.clone()); }
        if let Some(v) = cli.output           { self.output              = v; }
        if cli.debug                          { self.debug               = true; }
    }

    pub fn input_mode(&self) -> Result<InputMode, ConfigError> {
        InputMode::from_arity(self.arity).ok_or(ConfigError::InvalidArity(self.arity))
    }

    /// Validate the input section and turn it into engine settings.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let mode = self.input_mode()?;
        for (name, ms) in [
            ("max_dit_ms",                self.max_dit_ms),
            ("min_letter_pause_ms",       self.min_letter_pause_ms),
            ("fast_repeat_interval_ms",   self.fast_repeat_interval_ms),
            ("sticky_repeat_interval_ms", self.sticky_repeat_interval_ms),
        ] {
            if ms == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }

        let names = [self.keys[0].as_str(), self.keys[1].as_str(), self.keys[2].as_str()];
        let bindings = KeyBindings::for_mode(mode, names)?;

        let fast_repeat = match (self.fast_repeat, mode) {
            (true, InputMode::OneKey) => {
                log::info!("[config] fast_repeat has no effect with one switch, disabled");
                None
            }
            (true, _) => Some(Duration::from_millis(self.fast_repeat_interval_ms)),
            (false, _) => None,
        };

        let settings = EngineSettings::new(
            mode,
            TimingConfig::from_millis(self.max_dit_ms, self.min_letter_pause_ms),
            bindings,
        )
        .with_fast_repeat(fast_repeat)
        .with_sticky_interval(Duration::from_millis(self.sticky_repeat_interval_ms));
        settings.validate()?;
        Ok(settings)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs_next().join("morse-switch").join("config.toml")
}

fn dirs_next() -> PathBuf {
    if let Ok(v) = std::env::var("XDG_CONFIG_HOME") { return PathBuf::from(v); }
    if let Ok(v) = std::env::var("APPDATA")          { return PathBuf::from(v); }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyer::KeyRole;
    use std::io::Write;

    #[test]
    fn embedded_example_parses_to_defaults() {
        let fc: FileConfig = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        let mut cfg = AppConfig::default();
        cfg.apply_file(&fc);
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn file_then_cli_overrides() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[input]\narity = 1\nmax_dit_ms = 250\nkey_one = \"F9\"\n").unwrap();
        writeln!(f, "[typing]\ntrigger = \"\"").unwrap();
        writeln!(f, "[output]\nbackend = \"none\"").unwrap();
        let cli = Cli {
            config:    Some(f.path().to_path_buf()),
            arity:     Some(3),
            key_three: Some("F10".into()),
            ..Default::default()
        };
        let cfg = AppConfig::load(&cli).unwrap();
        assert_eq!(cfg.arity, 3);
        assert_eq!(cfg.max_dit_ms, 250);
        assert_eq!(cfg.keys, ["F9".to_string(), "ENTER".into(), "F10".into()]);
        assert_eq!(cfg.trigger, None);
        assert_eq!(cfg.output, OutputKind::None);

        let cli = Cli { config: cli.config.clone(), output: Some(OutputKind::Auto), ..Default::default() };
        assert_eq!(AppConfig::load(&cli).unwrap().output, OutputKind::Auto);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = Cli { config: Some("/nonexistent/morse-switch.toml".into()), ..Default::default() };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn broken_toml_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[input\narity = ").unwrap();
        let cli = Cli { config: Some(f.path().to_path_buf()), ..Default::default() };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn engine_settings_validation() {
        let cfg = AppConfig { arity: 4, ..Default::default() };
        assert_eq!(cfg.engine_settings(), Err(ConfigError::InvalidArity(4)));

        let cfg = AppConfig { min_letter_pause_ms: 0, ..Default::default() };
        assert_eq!(cfg.engine_settings(), Err(ConfigError::ZeroDuration("min_letter_pause_ms")));

        let cfg = AppConfig {
            keys: ["right ctrl".into(), "RCTRL".into(), "F1".into()],
            ..Default::default()
        };
        assert_eq!(
            cfg.engine_settings(),
            Err(ConfigError::DuplicateBinding {
                first:  KeyRole::Primary,
                second: KeyRole::Secondary,
                key:    "RCTRL".into(),
            })
        );

        // unused roles may collide
        let cfg = AppConfig {
            arity: 1,
            keys: ["SPACE".into(), "SPACE".into(), String::new()],
            ..Default::default()
        };
        assert!(cfg.engine_settings().is_ok());
    }

    #[test]
    fn fast_repeat_is_off_with_one_switch() {
        let cfg = AppConfig { arity: 1, fast_repeat: true, ..Default::default() };
        assert_eq!(cfg.engine_settings().unwrap().fast_repeat, None);
        let cfg = AppConfig { arity: 2, fast_repeat: true, ..Default::default() };
        assert_eq!(cfg.engine_settings().unwrap().fast_repeat, Some(Duration::from_millis(100)));
    }

    #[test]
    fn write_default_config_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("config.toml");
        let cli = Cli { config: Some(path.clone()), ..Default::default() };
        assert_eq!(AppConfig::write_default_config(&cli).unwrap(), path);
        assert_eq!(std::fs::read_to_string(path).unwrap(), DEFAULT_CONFIG_TOML);
    }
}
