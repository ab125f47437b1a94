#[cfg(test)]
#[path = "language_test.rs"]
mod tests;

use strum::EnumIter;
use strum::IntoEnumIterator;

/// Languages answers can be written in. The display name is what the model
/// is told to respond in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, strum::Display)]
pub enum Language {
    English,
    Hindi,
    Tamil,
    Telugu,
    Bengali,
}

impl Default for Language {
    fn default() -> Language {
        return Language::English;
    }
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => return "en",
            Language::Hindi => return "hi",
            Language::Tamil => return "ta",
            Language::Telugu => return "te",
            Language::Bengali => return "bn",
        }
    }

    /// Maps a short language code to a language, falling back to English for
    /// anything unknown.
    pub fn resolve(code: &str) -> Language {
        return Language::iter()
            .find(|e| return e.code() == code)
            .unwrap_or_default();
    }
}
