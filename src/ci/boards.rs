//! Board names, Arduino FQBNs and the PlatformIO project file.
//!
//! PlatformIO board ids are the canonical names; the Arduino CLI side is
//! looked up through [`BoardMap`].

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{DoxprepError, Result};

pub const BOARD_MAP_FILE: &str = "platformio_to_arduino_boards.json";
pub const PLATFORM_TOOLS_FILE: &str = "platformio_platform_tools.json";

/// PlatformIO board -> Arduino CLI FQBN.
const DEFAULT_BOARDS: &[(&str, &str)] = &[
    // EnviroDIY
    ("mayfly", "EnviroDIY:avr:envirodiy_mayfly"),
    // Arduino AVR
    ("uno", "arduino:avr:uno"),
    ("megaatmega2560", "arduino:avr:mega"),
    ("leonardo", "arduino:avr:leonardo"),
    // Arduino SAM / SAMD
    ("dueUSB", "arduino:sam:arduino_due_x"),
    ("zeroUSB", "arduino:samd:mzero_bl"),
    ("mkrvidor4000", "arduino:samd:mkrvidor4000"),
    // Arduino megaAVR
    ("nano_every", "arduino:megaavr:nona4809"),
    ("uno_wifi_rev2", "arduino:megaavr:uno2018"),
    // Arduino ESP32, RP2040, Renesas
    ("arduino_nano_esp32", "arduino:esp32:nano_nora"),
    ("pico", "arduino:mbed_rp2040:pico"),
    ("uno_r4_wifi", "arduino:renesas_uno:unor4wifi"),
    // Adafruit
    ("adafruit_feather_m0", "adafruit:samd:adafruit_feather_m0"),
    ("adafruit_feather_m4", "adafruit:samd:adafruit_feather_m4"),
    ("adafruit_grandcentral_m4", "adafruit:samd:adafruit_grandcentral_m4"),
    // Espressif
    ("nodemcuv", "esp8266:esp8266:nodemcuv"),
    ("nodemcuv2", "esp8266:esp8266:nodemcuv2"),
    ("esp32dev", "esp32:esp32:esp32"),
    ("esp32-c6-devkitc-1", "esp32:esp32:esp32c6"),
    ("esp32-c3-devkitm-1", "esp32:esp32:esp32c3"),
    ("esp32-s3-devkitm-1", "esp32:esp32:esp32s3"),
];

#[derive(Deserialize)]
struct BoardEntry {
    fqbn: String,
}

#[derive(Debug, Clone)]
pub struct BoardMap(BTreeMap<String, String>);

impl Default for BoardMap {
    fn default() -> Self {
        Self(
            DEFAULT_BOARDS
                .iter()
                .map(|(board, fqbn)| (board.to_string(), fqbn.to_string()))
                .collect(),
        )
    }
}

impl BoardMap {
    /// Built-in table, overridden by entries of a `{"board": {"fqbn": ..}}` JSON file.
    pub fn with_overrides(json: &str) -> Result<Self> {
        let extra: BTreeMap<String, BoardEntry> = serde_json::from_str(json)?;
        let mut map = Self::default();
        map.0.extend(extra.into_iter().map(|(board, e)| (board, e.fqbn)));
        Ok(map)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::with_overrides(&fs::read_to_string(path)?),
            None => Ok(Self::default()),
        }
    }

    pub fn fqbn(&self, board: &str) -> Result<&str> {
        self.0
            .get(board)
            .map(String::as_str)
            .ok_or_else(|| DoxprepError::UnknownBoard(board.to_string()))
    }

    /// Arduino core of a board, e.g. `arduino:avr` for `uno`.
    pub fn core(&self, board: &str) -> Result<String> {
        let fqbn = self.fqbn(board)?;
        Ok(fqbn.rsplit_once(':').map_or(fqbn, |(core, _)| core).to_string())
    }
}

/// One `[env:<name>]` section of `platformio.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PioEnv {
    pub name: String,
    pub board: Option<String>,
    pub platform: Option<String>,
}

impl PioEnv {
    pub fn board(&self) -> Result<&str> {
        self.required(self.board.as_deref(), "board")
    }

    pub fn platform(&self) -> Result<&str> {
        self.required(self.platform.as_deref(), "platform")
    }

    fn required<'a>(&self, value: Option<&'a str>, key: &str) -> Result<&'a str> {
        value.ok_or_else(|| DoxprepError::MissingEnvironmentKey {
            env: self.name.clone(),
            key: key.to_string(),
        })
    }
}

static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(?P<name>[^\]]+)\]\s*$").unwrap());
static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<key>[A-Za-z0-9_.-]+)\s*=\s*(?P<value>.*?)\s*$").unwrap());

/// Environments declared in a PlatformIO project file.
///
/// Only `board` and `platform` are read; indented continuation lines,
/// comments and other sections are skipped.
#[derive(Debug, Clone, Default)]
pub struct PioProject {
    pub envs: Vec<PioEnv>,
}

impl PioProject {
    pub fn parse(ini: &str) -> Self {
        let mut envs: Vec<PioEnv> = Vec::new();
        let mut in_env = false;
        for line in ini.lines() {
            if line.starts_with([' ', '\t', ';', '#']) {
                continue;
            }
            if let Some(section) = SECTION.captures(line) {
                let name = section["name"].trim();
                in_env = match name.strip_prefix("env:") {
                    Some(env) => {
                        envs.push(PioEnv {
                            name: env.trim().to_string(),
                            board: None,
                            platform: None,
                        });
                        true
                    }
                    None => false,
                };
                continue;
            }
            let (Some(env), Some(kv)) = (envs.last_mut(), KEY_VALUE.captures(line)) else {
                continue;
            };
            if !in_env {
                continue;
            }
            // inline comments need a space before the semicolon
            let value = kv["value"].split(" ;").next().unwrap_or("").trim().to_string();
            match &kv["key"] {
                "board" => env.board = Some(value),
                "platform" => env.platform = Some(value),
                _ => {}
            }
        }
        Self { envs }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn env_for_board(&self, board: &str) -> Option<&PioEnv> {
        self.envs.iter().find(|e| e.board.as_deref() == Some(board))
    }
}

/// Display name and extra tool packages of a PlatformIO platform.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlatformTools {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

pub type PlatformToolTable = BTreeMap<String, PlatformTools>;

pub fn load_platform_tools(path: &Path) -> Result<PlatformToolTable> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INI: &str = r#"
; shared settings
[platformio]
description = EnviroDIY CI

[env]
framework = arduino
lib_deps =
    envirodiy/SDI-12
    board = not_a_board

[env:mayfly]
board = mayfly
platform = atmelavr ; AVR boards

[env:esp32dev]
platform = espressif32
board = esp32dev
"#;

    #[test]
    fn test_builtin_board_map() {
        let map = BoardMap::default();
        assert_eq!(map.fqbn("mayfly").unwrap(), "EnviroDIY:avr:envirodiy_mayfly");
        assert_eq!(map.core("uno").unwrap(), "arduino:avr");
        assert!(matches!(map.fqbn("nope"), Err(DoxprepError::UnknownBoard(_))));
    }

    #[test]
    fn test_board_map_overrides() {
        let map = BoardMap::with_overrides(
            r#"{"uno": {"fqbn": "arduino:avr:uno_mini"}, "custom": {"fqbn": "me:arch:custom"}}"#,
        )
        .unwrap();
        assert_eq!(map.fqbn("uno").unwrap(), "arduino:avr:uno_mini");
        assert_eq!(map.core("custom").unwrap(), "me:arch");
        assert_eq!(map.fqbn("mayfly").unwrap(), "EnviroDIY:avr:envirodiy_mayfly");
    }

    #[test]
    fn test_parse_platformio_ini() {
        let project = PioProject::parse(INI);
        assert_eq!(project.envs.len(), 2);
        assert_eq!(project.envs[0].name, "mayfly");
        assert_eq!(project.envs[0].board().unwrap(), "mayfly");
        assert_eq!(project.envs[0].platform.as_deref(), Some("atmelavr"));
        assert_eq!(project.envs[1].board.as_deref(), Some("esp32dev"));
        assert_eq!(
            project.env_for_board("esp32dev").map(|e| e.name.as_str()),
            Some("esp32dev")
        );
    }

    #[test]
    fn test_missing_env_key() {
        let project = PioProject::parse("[env:bare]\nframework = arduino\n");
        assert!(matches!(
            project.envs[0].platform(),
            Err(DoxprepError::MissingEnvironmentKey { .. })
        ));
    }

    #[test]
    fn test_platform_tools_json() {
        let table: PlatformToolTable = serde_json::from_str(
            r#"{"atmelavr": {"name": "Atmel AVR", "tools": ["tool-avrdude"]}, "ststm32": {"name": "ST STM32"}}"#,
        )
        .unwrap();
        assert_eq!(table["atmelavr"].tools, vec!["tool-avrdude".to_string()]);
        assert!(table["ststm32"].tools.is_empty());
    }
}
