use std::fmt;
use std::str::FromStr;

use crate::error::OverlayError;
use crate::typeset::Script;

/// Languages the overlay pipeline can translate between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageCode {
    En,
    Zh,
    Ko,
    Ru,
    Ja,
    Es,
    Fr,
    De,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 8] = [
        LanguageCode::En,
        LanguageCode::Zh,
        LanguageCode::Ko,
        LanguageCode::Ru,
        LanguageCode::Ja,
        LanguageCode::Es,
        LanguageCode::Fr,
        LanguageCode::De,
    ];

    /// Target language whose output files carry no language suffix.
    pub const DEFAULT_TARGET: LanguageCode = LanguageCode::En;

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Zh => "zh",
            LanguageCode::Ko => "ko",
            LanguageCode::Ru => "ru",
            LanguageCode::Ja => "ja",
            LanguageCode::Es => "es",
            LanguageCode::Fr => "fr",
            LanguageCode::De => "de",
        }
    }

    /// Native display name, used in translation prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Zh => "简体中文",
            LanguageCode::Ko => "한국어",
            LanguageCode::Ru => "Русский",
            LanguageCode::Ja => "日本語",
            LanguageCode::Es => "Español",
            LanguageCode::Fr => "Français",
            LanguageCode::De => "Deutsch",
        }
    }

    pub fn script(&self) -> Script {
        match self {
            LanguageCode::Zh => Script::Cjk,
            LanguageCode::Ko => Script::Korean,
            LanguageCode::Ja => Script::Japanese,
            LanguageCode::Ru => Script::Cyrillic,
            LanguageCode::En | LanguageCode::Es | LanguageCode::Fr | LanguageCode::De => {
                Script::Latin
            }
        }
    }

    /// Language assumed for text written in `script`.
    pub fn for_script(script: Script) -> LanguageCode {
        match script {
            Script::Cjk => LanguageCode::Zh,
            Script::Korean => LanguageCode::Ko,
            Script::Japanese => LanguageCode::Ja,
            Script::Cyrillic => LanguageCode::Ru,
            Script::Latin => LanguageCode::En,
        }
    }
}

impl FromStr for LanguageCode {
    type Err = OverlayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        LanguageCode::ALL
            .into_iter()
            .find(|code| code.as_str() == normalized)
            .ok_or_else(|| OverlayError::UnknownLanguage(value.trim().to_string()))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
