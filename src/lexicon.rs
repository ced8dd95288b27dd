use std::collections::HashMap;
use std::path::Path;

use crate::error::TtsError;

/// Per-locale pronunciation dictionary loaded from the phonetic bundle.
///
/// A bundle is a directory with one `<locale>.json` file per locale, each
/// mapping a lowercase word to a space-separated phoneme string, e.g.
/// `{ "hello": "h ə l oʊ" }`. Keys are case-folded at load time.
#[derive(Debug)]
pub struct LexiconBundle {
    locales: HashMap<String, HashMap<String, Vec<String>>>,
}

impl LexiconBundle {
    /// Load every `<locale>.json` dictionary from the bundle directory.
    pub fn load(bundle_dir: &Path) -> Result<Self, TtsError> {
        if !bundle_dir.is_dir() {
            return Err(TtsError::ResourceMissing(format!(
                "phonetic bundle directory not found at {}",
                bundle_dir.display()
            )));
        }

        let mut locales = HashMap::new();
        for entry in std::fs::read_dir(bundle_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let locale = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };
            let dict = load_dictionary(&path)?;
            log::info!("Loaded {} lexicon entries for locale {locale}", dict.len());
            locales.insert(locale, dict);
        }

        if locales.is_empty() {
            return Err(TtsError::ResourceMissing(format!(
                "no <locale>.json dictionaries found in {}",
                bundle_dir.display()
            )));
        }

        Ok(Self { locales })
    }

    /// Build a bundle from in-memory dictionaries.
    pub fn from_dictionaries(
        locales: HashMap<String, HashMap<String, Vec<String>>>,
    ) -> Result<Self, TtsError> {
        if locales.is_empty() {
            return Err(TtsError::ResourceMissing(
                "phonetic bundle has no locales".to_string(),
            ));
        }
        Ok(Self { locales })
    }

    /// Look up the dictionary for a locale.
    pub fn dictionary(&self, locale: &str) -> Result<&HashMap<String, Vec<String>>, TtsError> {
        self.locales.get(locale).ok_or_else(|| {
            TtsError::ResourceMissing(format!(
                "no lexicon for locale {locale:?} (available: {:?})",
                self.locale_names()
            ))
        })
    }

    /// Locale names in sorted order.
    pub fn locale_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.locales.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Whether the bundle knows this locale.
    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }
}

fn load_dictionary(path: &Path) -> Result<HashMap<String, Vec<String>>, TtsError> {
    let content = std::fs::read_to_string(path)?;
    let raw: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
        TtsError::ResourceMissing(format!("failed to parse lexicon {}: {e}", path.display()))
    })?;

    Ok(raw
        .into_iter()
        .map(|(word, phonemes)| {
            let tokens = phonemes
                .split_whitespace()
                .map(|p| p.to_string())
                .collect::<Vec<_>>();
            (word.to_lowercase(), tokens)
        })
        .collect())
}

/// Tiny English bundle shared by unit tests across the crate.
#[cfg(test)]
pub(crate) fn test_bundle() -> LexiconBundle {
    let mut dict = HashMap::new();
    dict.insert(
        "hello".to_string(),
        vec!["h".into(), "a".into(), "l".into(), "o".into()],
    );
    dict.insert(
        "world".to_string(),
        vec!["w".into(), "o".into(), "r".into(), "l".into(), "d".into()],
    );
    let mut locales = HashMap::new();
    locales.insert("en".to_string(), dict);
    LexiconBundle::from_dictionaries(locales).expect("test bundle")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_entries_are_lowercase_keyed() {
        let bundle = test_bundle();
        let dict = bundle.dictionary("en").unwrap();
        assert_eq!(dict.get("hello").unwrap(), &["h", "a", "l", "o"]);
        assert!(dict.get("xyzzy").is_none());
    }

    #[test]
    fn missing_locale_is_resource_missing() {
        let bundle = test_bundle();
        let err = bundle.dictionary("fr").unwrap_err();
        assert!(matches!(err, TtsError::ResourceMissing(_)));
    }

    #[test]
    fn empty_bundle_is_resource_missing() {
        let err = LexiconBundle::from_dictionaries(HashMap::new()).unwrap_err();
        assert!(matches!(err, TtsError::ResourceMissing(_)));
    }
}
