//! Language matching between a free-text book language hint and the
//! languages an ASR variant supports.

use crate::backend::AsrLanguage;

/// Which stage of the cascade produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Code,
    EnglishName,
    NativeName,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageMatch<'a> {
    pub language: &'a AsrLanguage,
    pub kind: MatchKind,
}

type StagePredicate = fn(&AsrLanguage, &str) -> bool;

/// Cascade stages in priority order. `hint` is already trimmed and lowercased.
const STAGES: [(MatchKind, StagePredicate); 4] = [
    (MatchKind::Code, |l, hint| l.code.to_lowercase() == hint),
    (MatchKind::EnglishName, |l, hint| l.english_name.to_lowercase() == hint),
    (MatchKind::NativeName, |l, hint| {
        l.native_name
            .as_deref()
            .is_some_and(|native| native.to_lowercase() == hint)
    }),
    (MatchKind::Substring, |l, hint| {
        let english = l.english_name.to_lowercase();
        !english.is_empty() && (english.contains(hint) || hint.contains(english.as_str()))
    }),
];

/// Match `hint` against `languages`, first stage with a hit wins:
/// code, then English name, then native name, then a substring test in
/// either direction between the English name and the hint.
///
/// Comparison is case-insensitive and the hint is trimmed. Within a stage
/// the first language in list order wins.
pub fn match_language<'a>(languages: &'a [AsrLanguage], hint: &str) -> Option<LanguageMatch<'a>> {
    let hint = hint.trim().to_lowercase();
    if hint.is_empty() {
        return None;
    }

    STAGES.iter().find_map(|(kind, matches)| {
        languages
            .iter()
            .find(|l| matches(*l, &hint))
            .map(|language| LanguageMatch {
                language,
                kind: *kind,
            })
    })
}

/// Choose the language code for a variant.
///
/// A hint match wins. Otherwise the current code is kept, and if it is empty
/// the variant's first (default) language is used. An empty result means the
/// variant advertises no languages.
pub fn resolve_language(languages: &[AsrLanguage], current: &str, hint: Option<&str>) -> String {
    if let Some(m) = hint.and_then(|h| match_language(languages, h)) {
        return m.language.code.clone();
    }

    if !current.is_empty() {
        return current.to_string();
    }

    languages
        .first()
        .map(|l| l.code.clone())
        .unwrap_or_default()
}
