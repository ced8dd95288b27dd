//! Text normalization and phonemization.
//!
//! Turns raw input text into model-ready token sequences: sentence splitting,
//! abbreviation and numeral expansion, dictionary lookup with a rule-based
//! fallback for unseen words, and chunking long sentences so every produced
//! [`Utterance`] fits the acoustic model's input limit.

use std::collections::{HashMap, VecDeque};

use crate::config::VoiceConfig;
use crate::error::TtsError;
use crate::lexicon::LexiconBundle;

/// One sentence-level unit of text, converted to phoneme ids.
///
/// `phoneme_ids` is the full model input sequence: begin-of-sequence, then
/// phoneme ids interleaved with pad, then end-of-sequence. `sentence_end` is
/// set on the last chunk produced from a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub phoneme_ids: Vec<i64>,
    pub sentence_end: bool,
}

impl Utterance {
    pub fn len(&self) -> usize {
        self.phoneme_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phoneme_ids.is_empty()
    }
}

/// Spoken-form expansions for abbreviations the lexicon would otherwise miss.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("mr", "mister"),
    ("mrs", "missus"),
    ("ms", "miss"),
    ("dr", "doctor"),
    ("st", "saint"),
    ("etc", "et cetera"),
    ("vs", "versus"),
    ("e.g", "for example"),
    ("i.e", "that is"),
];

/// Stateless text normalizer bound to one voice's vocabulary and lexicon.
///
/// Holds only immutable borrows, so repeated calls over the same input yield
/// the same utterance sequence and one normalizer can serve many sessions.
pub struct Normalizer<'a> {
    config: &'a VoiceConfig,
    lexicon: &'a LexiconBundle,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a VoiceConfig, lexicon: &'a LexiconBundle) -> Self {
        Self { config, lexicon }
    }

    /// Lazily convert `text` into a finite sequence of utterances.
    ///
    /// Fails with `ResourceMissing` when the bundle has no dictionary for
    /// `locale`. Empty input yields an empty sequence, not an error.
    pub fn utterances(&self, text: &str, locale: &str) -> Result<Utterances<'a>, TtsError> {
        let dictionary = self.lexicon.dictionary(locale)?;
        Ok(Utterances {
            config: self.config,
            dictionary,
            sentences: split_sentences(text).into(),
            pending: VecDeque::new(),
        })
    }
}

/// Lazy iterator over the utterances of one input text.
///
/// Sentence strings are split eagerly (cheap); phonemization happens one
/// sentence at a time as the iterator is driven.
pub struct Utterances<'a> {
    config: &'a VoiceConfig,
    dictionary: &'a HashMap<String, Vec<String>>,
    sentences: VecDeque<String>,
    pending: VecDeque<Utterance>,
}

impl Iterator for Utterances<'_> {
    type Item = Utterance;

    fn next(&mut self) -> Option<Utterance> {
        loop {
            if let Some(utterance) = self.pending.pop_front() {
                return Some(utterance);
            }
            let sentence = self.sentences.pop_front()?;
            let chunks = phonemize_sentence(&sentence, self.config, self.dictionary);
            self.pending.extend(chunks);
        }
    }
}

/// Split input text on sentence boundaries.
///
/// `.`, `!`, `?`, `;` and line breaks end a sentence, except when `.` sits
/// between two digits (decimal point) or follows a known abbreviation, in
/// which case it stays part of the word. Runs of whitespace collapse to one
/// space; empty sentences are discarded.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        if is_sentence_final(ch) && !is_decimal_point(text, idx, ch) {
            if ch == '.' && is_abbreviation_period(&current) {
                current.push(ch);
                continue;
            }
            flush_sentence(&mut sentences, &mut current);
            continue;
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_sentence(&mut sentences, &mut current);
    sentences
}

fn is_sentence_final(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | ';' | '\n' | '\r' | '…')
}

/// A `.` between two digits is a decimal point, not a boundary.
fn is_decimal_point(text: &str, idx: usize, ch: char) -> bool {
    if ch != '.' {
        return false;
    }
    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch.len_utf8()..].chars().next();
    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

/// A `.` right after a known abbreviation belongs to the word, so "Dr. Who"
/// stays one sentence and "e.g." survives until expansion. The prefix check
/// keeps the first period of dotted abbreviations like "e.g" in place.
fn is_abbreviation_period(current: &str) -> bool {
    let trailing = current
        .rsplit(' ')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if trailing.is_empty() {
        return false;
    }
    ABBREVIATIONS.iter().any(|(abbr, _)| {
        *abbr == trailing || abbr.starts_with(&format!("{trailing}."))
    })
}

fn flush_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Phonemize one sentence, chunking so every utterance fits the model input
/// limit. The last chunk of the sentence carries `sentence_end = true`.
fn phonemize_sentence(
    sentence: &str,
    config: &VoiceConfig,
    dictionary: &HashMap<String, Vec<String>>,
) -> Vec<Utterance> {
    let words = expand_words(sentence, dictionary);
    if words.is_empty() {
        return Vec::new();
    }

    // Core ids without framing; framing and pad interleave double the length,
    // so chunk on 2 + 2*n <= max_input_length.
    let mut core = Vec::new();
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            core.push(config.phoneme_id(crate::config::WORD_SEPARATOR));
        }
        for phoneme in word_phonemes(word, dictionary) {
            core.push(config.phoneme_id(&phoneme));
        }
    }

    let max_core = (config.max_input_length.saturating_sub(2) / 2).max(1);
    let separator = config.phoneme_id(crate::config::WORD_SEPARATOR);
    let chunks = split_core_ids(&core, max_core, separator);
    let last = chunks.len().saturating_sub(1);

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, ids)| Utterance {
            phoneme_ids: frame_ids(&ids, config),
            sentence_end: i == last,
        })
        .collect()
}

/// Expand a sentence into spoken-form lowercase words: punctuation stripped,
/// abbreviations and numerals rewritten, acronyms spelled out.
fn expand_words(sentence: &str, dictionary: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut words = Vec::new();
    for token in sentence.split_whitespace() {
        let stripped = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '.');
        let stripped = stripped.trim_end_matches('.');
        if stripped.is_empty() {
            continue;
        }

        if let Some(expansion) = lookup_abbreviation(stripped) {
            words.extend(expansion.split_whitespace().map(|w| w.to_string()));
        } else if let Some(number_words) = expand_number(stripped) {
            words.extend(number_words);
        } else if is_acronym(stripped, dictionary) {
            words.extend(stripped.chars().map(|c| c.to_lowercase().to_string()));
        } else {
            words.push(stripped.to_lowercase());
        }
    }
    words
}

fn lookup_abbreviation(token: &str) -> Option<&'static str> {
    let lowered = token.to_lowercase();
    ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == lowered)
        .map(|(_, expansion)| *expansion)
}

/// All-caps tokens absent from the lexicon are read letter by letter.
fn is_acronym(token: &str, dictionary: &HashMap<String, Vec<String>>) -> bool {
    token.len() >= 2
        && token.len() <= 6
        && token.chars().all(|c| c.is_ascii_uppercase())
        && !dictionary.contains_key(&token.to_lowercase())
}

/// Rewrite an integer or decimal token as spoken words, or `None` when the
/// token is not numeric. Thousands separators are accepted (`1,000`).
fn expand_number(token: &str) -> Option<Vec<String>> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let cleaned = body.replace(',', "");
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    let mut parts = cleaned.splitn(2, '.');
    let integer: u64 = parts.next()?.parse().ok()?;
    let fraction = parts.next();

    let mut words = Vec::new();
    if negative {
        words.push("minus".to_string());
    }
    words.extend(number_to_words(integer));
    if let Some(digits) = fraction {
        words.push("point".to_string());
        for digit in digits.chars() {
            words.extend(number_to_words(digit.to_digit(10)? as u64));
        }
    }
    Some(words)
}

const ONES: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];

const TENS: &[&str] = &[
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Spell out a non-negative integer in English words.
fn number_to_words(n: u64) -> Vec<String> {
    if n == 0 {
        return vec!["zero".to_string()];
    }

    let mut words = Vec::new();
    let mut remaining = n;
    for (scale, name) in [
        (1_000_000_000_000u64, "trillion"),
        (1_000_000_000, "billion"),
        (1_000_000, "million"),
        (1_000, "thousand"),
    ] {
        if remaining >= scale {
            words.extend(number_to_words(remaining / scale));
            words.push(name.to_string());
            remaining %= scale;
        }
    }

    if remaining >= 100 {
        words.push(ONES[(remaining / 100) as usize].to_string());
        words.push("hundred".to_string());
        remaining %= 100;
    }
    if remaining >= 20 {
        words.push(TENS[(remaining / 10) as usize].to_string());
        remaining %= 10;
        if remaining > 0 {
            words.push(ONES[remaining as usize].to_string());
        }
    } else if remaining > 0 {
        words.push(ONES[remaining as usize].to_string());
    }

    words
}

/// Phonemes for one spoken word: dictionary first, then a letter-to-sound
/// fallback that emits each character as its own token. Tokens the
/// vocabulary does not know still produce an id (the unknown id) later.
fn word_phonemes(word: &str, dictionary: &HashMap<String, Vec<String>>) -> Vec<String> {
    if let Some(phonemes) = dictionary.get(word) {
        return phonemes.clone();
    }

    log::debug!("No lexicon entry for {word:?}, using letter-to-sound fallback");
    word.chars().map(|c| c.to_string()).collect()
}

/// Split core ids into runs of at most `max_core`, preferring to break at a
/// word separator so chunks end on word boundaries.
fn split_core_ids(ids: &[i64], max_core: usize, separator: i64) -> Vec<Vec<i64>> {
    if ids.len() <= max_core {
        return vec![ids.to_vec()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < ids.len() {
        let end = (start + max_core).min(ids.len());
        if end == ids.len() {
            chunks.push(ids[start..end].to_vec());
            break;
        }

        let split = ids[start..end]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &id)| id == separator)
            .map(|(i, _)| start + i)
            .unwrap_or(end);

        chunks.push(ids[start..split].to_vec());
        // Skip the separator itself so the next chunk starts on a word.
        start = if split < end { split + 1 } else { split };
    }

    chunks.retain(|chunk| !chunk.is_empty());
    chunks
}

/// Wrap core ids in the model framing: bos, pad-interleaved ids, eos.
fn frame_ids(core: &[i64], config: &VoiceConfig) -> Vec<i64> {
    let mut framed = Vec::with_capacity(core.len() * 2 + 2);
    framed.push(config.bos_id());
    for &id in core {
        framed.push(id);
        framed.push(config.pad_id());
    }
    framed.pop();
    framed.push(config.eos_id());
    framed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_json;
    use crate::lexicon::test_bundle;

    fn config() -> VoiceConfig {
        VoiceConfig::from_json(&test_config_json()).unwrap()
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("Hello world. How are you? Fine!");
        assert_eq!(sentences, vec!["Hello world", "How are you", "Fine"]);
    }

    #[test]
    fn keeps_decimal_point_inside_sentence() {
        let sentences = split_sentences("Version 2.5 shipped. Done.");
        assert_eq!(sentences, vec!["Version 2.5 shipped", "Done"]);
    }

    #[test]
    fn abbreviation_periods_do_not_end_sentences() {
        let sentences = split_sentences("Dr. Who arrived. See e.g. the report.");
        assert_eq!(sentences, vec!["Dr. Who arrived", "See e.g. the report"]);
    }

    #[test]
    fn abbreviations_survive_the_full_pipeline() {
        let config = config();
        let bundle = test_bundle();
        let normalizer = Normalizer::new(&config, &bundle);

        // One sentence, one utterance; "Dr." expands instead of splitting.
        let utterances: Vec<_> = normalizer.utterances("Dr. Hello", "en").unwrap().collect();
        assert_eq!(utterances.len(), 1);

        let dictionary = normalizer.lexicon.dictionary("en").unwrap();
        let sentences = split_sentences("Dr. Hello");
        assert_eq!(
            expand_words(&sentences[0], dictionary),
            vec!["doctor", "hello"]
        );
    }

    #[test]
    fn collapses_whitespace_runs() {
        let sentences = split_sentences("one\t two   three");
        assert_eq!(sentences, vec!["one two three"]);
    }

    #[test]
    fn empty_text_yields_no_sentences() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("  \n ...  ").is_empty());
    }

    #[test]
    fn expands_numbers_to_words() {
        assert_eq!(
            expand_number("1,234").unwrap(),
            vec!["one", "thousand", "two", "hundred", "thirty", "four"]
        );
        assert_eq!(expand_number("3.14").unwrap(), vec!["three", "point", "one", "four"]);
        assert_eq!(expand_number("-7").unwrap(), vec!["minus", "seven"]);
        assert_eq!(expand_number("0").unwrap(), vec!["zero"]);
        assert!(expand_number("hello").is_none());
    }

    #[test]
    fn expands_abbreviations_and_acronyms() {
        let bundle = test_bundle();
        let config = config();
        let normalizer = Normalizer::new(&config, &bundle);
        let dictionary = normalizer.lexicon.dictionary("en").unwrap();

        let words = expand_words("Dr. Who met NATO", dictionary);
        assert_eq!(words, vec!["doctor", "who", "met", "n", "a", "t", "o"]);
    }

    #[test]
    fn unknown_tokens_map_to_unknown_id_not_dropped() {
        let config = config();
        let bundle = test_bundle();
        let normalizer = Normalizer::new(&config, &bundle);

        // "zq" has no lexicon entry; 'z' and 'q' are not in the test vocab.
        let utterances: Vec<_> = normalizer.utterances("zq", "en").unwrap().collect();
        assert_eq!(utterances.len(), 1);
        let unk = config.unknown_id();
        // bos, z, pad, q, eos
        assert_eq!(
            utterances[0].phoneme_ids,
            vec![config.bos_id(), unk, config.pad_id(), unk, config.eos_id()]
        );
    }

    #[test]
    fn frames_known_words_with_bos_pad_eos() {
        let config = config();
        let bundle = test_bundle();
        let normalizer = Normalizer::new(&config, &bundle);

        let utterances: Vec<_> = normalizer.utterances("Hello.", "en").unwrap().collect();
        assert_eq!(utterances.len(), 1);
        let ids = &utterances[0].phoneme_ids;
        assert_eq!(ids.first(), Some(&config.bos_id()));
        assert_eq!(ids.last(), Some(&config.eos_id()));
        // h a l o interleaved with pad: 1 + 4*2 - 1 + 1 = 9 ids
        assert_eq!(ids.len(), 9);
        assert!(utterances[0].sentence_end);
    }

    #[test]
    fn same_input_yields_same_sequence_on_repeat() {
        let config = config();
        let bundle = test_bundle();
        let normalizer = Normalizer::new(&config, &bundle);

        let first: Vec<_> = normalizer.utterances("Hello world. Hello.", "en").unwrap().collect();
        let second: Vec<_> = normalizer.utterances("Hello world. Hello.", "en").unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn missing_locale_fails_up_front() {
        let config = config();
        let bundle = test_bundle();
        let normalizer = Normalizer::new(&config, &bundle);
        assert!(matches!(
            normalizer.utterances("Hello", "de"),
            Err(TtsError::ResourceMissing(_))
        ));
    }

    #[test]
    fn long_sentences_are_chunked_within_model_limit() {
        let json = test_config_json().replace(
            r#""inference""#,
            r#""max_input_length": 16, "inference""#,
        );
        let config = VoiceConfig::from_json(&json).unwrap();
        let bundle = test_bundle();
        let normalizer = Normalizer::new(&config, &bundle);

        let utterances: Vec<_> = normalizer
            .utterances("hello world hello world hello world", "en")
            .unwrap()
            .collect();
        assert!(utterances.len() > 1);
        for u in &utterances {
            assert!(u.len() <= 16, "chunk of {} exceeds limit", u.len());
        }
        assert!(utterances.last().unwrap().sentence_end);
        assert!(!utterances[0].sentence_end);
    }
}
