/// Writing-system family of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Cjk,
    Korean,
    Japanese,
    Cyrillic,
}

impl Script {
    pub fn as_str(&self) -> &'static str {
        match self {
            Script::Latin => "latin",
            Script::Cjk => "cjk",
            Script::Korean => "korean",
            Script::Japanese => "japanese",
            Script::Cyrillic => "cyrillic",
        }
    }

    /// Scripts wrapped per character rather than per word.
    pub fn uses_character_wrap(&self) -> bool {
        matches!(self, Script::Cjk | Script::Korean | Script::Japanese)
    }
}

fn classify_char(ch: char) -> Option<Script> {
    match ch as u32 {
        0x4E00..=0x9FFF => Some(Script::Cjk),
        0xAC00..=0xD7A3 => Some(Script::Korean),
        0x3040..=0x30FF => Some(Script::Japanese),
        0x0400..=0x04FF => Some(Script::Cyrillic),
        _ => None,
    }
}

/// The first character that falls in a script range decides; anything else is latin.
pub fn detect(text: &str) -> Script {
    text.chars().find_map(classify_char).unwrap_or(Script::Latin)
}

/// Most frequent script in a text sample.
///
/// Kanji share the CJK range with Chinese, so any kana in the sample counts
/// the whole CJK share towards Japanese. Ties go to the non-latin script.
/// Returns `None` when the sample has no alphabetic character at all.
pub fn dominant_script(sample: &str) -> Option<Script> {
    let mut cjk = 0usize;
    let mut korean = 0usize;
    let mut japanese = 0usize;
    let mut cyrillic = 0usize;
    let mut latin = 0usize;

    for ch in sample.chars() {
        match classify_char(ch) {
            Some(Script::Cjk) => cjk += 1,
            Some(Script::Korean) => korean += 1,
            Some(Script::Japanese) => japanese += 1,
            Some(Script::Cyrillic) => cyrillic += 1,
            Some(Script::Latin) => {}
            None if ch.is_alphabetic() => latin += 1,
            None => {}
        }
    }

    if japanese > 0 {
        japanese += cjk;
        cjk = 0;
    }

    let ranked = [
        (Script::Latin, latin),
        (Script::Cjk, cjk),
        (Script::Japanese, japanese),
        (Script::Korean, korean),
        (Script::Cyrillic, cyrillic),
    ];
    let best = ranked
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count);
    best.map(|(script, _)| script)
}
