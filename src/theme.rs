use std::fs;
use std::path::Path;

use anyhow::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

const DEFAULT_PRESET: &str = "nord";

pub struct Theme {
    pub name: String,
    pub primary: Color,
    pub accent: Color,
    pub highlight: Color,
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    hexes: ThemeColors,
}

impl Theme {
    /// Reads `path`; an unreadable or missing file falls back to the default
    /// preset, which is then written back.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let data = fs::read_to_string(path)?;
            match serde_json::from_str::<ThemeFile>(&data) {
                Ok(file) => {
                    if let Some(theme) = file.skin.as_deref().and_then(Theme::from_name) {
                        return Ok(theme);
                    }
                    if let Some(colors) = file.colors {
                        return Ok(Theme::from_colors("Custom", colors));
                    }
                }
                Err(err) => tracing::warn!("ignoring {}: {err}", path.display()),
            }
        }
        let theme = Theme::default();
        theme.save(path)?;
        Ok(theme)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = ThemeFile {
            skin: THEME_PRESETS
                .iter()
                .find(|(_, def)| def.name == self.name)
                .map(|(key, _)| key.to_string()),
            colors: Some(self.hexes.clone()),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn from_name(key: &str) -> Option<Self> {
        THEME_PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(key))
            .map(|(_, def)| {
                Theme::from_colors(
                    def.name,
                    ThemeColors {
                        primary: Some(def.primary.into()),
                        accent: Some(def.accent.into()),
                        highlight: Some(def.highlight.into()),
                        background: Some(def.background.into()),
                        surface: Some(def.surface.into()),
                        text: Some(def.text.into()),
                    },
                )
            })
    }

    fn from_colors(name: &str, colors: ThemeColors) -> Self {
        let primary = colors.primary.as_deref().unwrap_or("#5E81AC");
        let accent = colors.accent.as_deref().unwrap_or("#D08770");
        let highlight = colors
            .highlight
            .as_deref()
            .or(colors.accent.as_deref())
            .unwrap_or("#76B3C5");
        let background = colors.background.as_deref().unwrap_or("#3B4252");
        let surface = colors.surface.as_deref().unwrap_or("#4C566A");
        let text = colors.text.as_deref().unwrap_or("#ECEFF4");
        Theme {
            name: name.to_string(),
            primary: color_from_hex(primary).unwrap_or(Color::Blue),
            accent: color_from_hex(accent).unwrap_or(Color::Cyan),
            highlight: color_from_hex(highlight).unwrap_or(Color::Cyan),
            background: color_from_hex(background).unwrap_or(Color::Black),
            surface: color_from_hex(surface).unwrap_or(Color::DarkGray),
            text: color_from_hex(text).unwrap_or(Color::White),
            hexes: ThemeColors {
                primary: Some(normalize_hex(primary)),
                accent: Some(normalize_hex(accent)),
                highlight: Some(normalize_hex(highlight)),
                background: Some(normalize_hex(background)),
                surface: Some(normalize_hex(surface)),
                text: Some(normalize_hex(text)),
            },
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::from_name(DEFAULT_PRESET)
            .unwrap_or_else(|| Theme::from_colors("Nord", ThemeColors::default()))
    }
}

#[derive(Serialize, Deserialize)]
struct ThemeFile {
    skin: Option<String>,
    colors: Option<ThemeColors>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct ThemeColors {
    primary: Option<String>,
    accent: Option<String>,
    #[serde(default)]
    highlight: Option<String>,
    background: Option<String>,
    surface: Option<String>,
    text: Option<String>,
}

struct ThemeDefinition {
    name: &'static str,
    primary: &'static str,
    accent: &'static str,
    highlight: &'static str,
    background: &'static str,
    surface: &'static str,
    text: &'static str,
}

const THEME_PRESETS: &[(&str, ThemeDefinition)] = &[
    (
        "nord",
        ThemeDefinition {
            name: "Nord",
            primary: "#5E81AC",
            accent: "#D08770",
            highlight: "#76B3C5",
            background: "#3B4252",
            surface: "#4C566A",
            text: "#ECEFF4",
        },
    ),
    (
        "midnight",
        ThemeDefinition {
            name: "Midnight",
            primary: "#6FC6D4",
            accent: "#0F1A2B",
            highlight: "#9FE6EC",
            background: "#314A63",
            surface: "#416079",
            text: "#F2F8FF",
        },
    ),
    (
        "slate",
        ThemeDefinition {
            name: "Slate",
            primary: "#5FC0CD",
            accent: "#E0A458",
            highlight: "#92DDE7",
            background: "#243A50",
            surface: "#344F68",
            text: "#F6FCFF",
        },
    ),
];

pub fn color_from_hex(value: &str) -> Option<Color> {
    let normalized = normalize_hex(value);
    let r = u8::from_str_radix(normalized.get(1..3)?, 16).ok()?;
    let g = u8::from_str_radix(normalized.get(3..5)?, 16).ok()?;
    let b = u8::from_str_radix(normalized.get(5..7)?, 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

fn normalize_hex(value: &str) -> String {
    let mut cleaned = value.trim().to_string();
    if !cleaned.starts_with('#') {
        cleaned.insert(0, '#');
    }
    if cleaned.len() != 7 {
        return "#ffffff".into();
    }
    cleaned
}
