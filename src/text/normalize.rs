//! Two-stage conservative cleanup of raw recognized text.
//!
//! Stage one is always applied and idempotent; stage two is language
//! normalization, externally toggled, and restricted to whitespace,
//! punctuation and casing so it can never corrupt recognized speech.

/// Glyphs recognition engines emit for music and other non-speech audio.
const MUSICAL_GLYPHS: &[char] = &['♪', '♫', '♬', '♩', '♭', '♯'];

/// Strips non-speech annotations and collapses whitespace.
///
/// Engines wrap annotations in `[…]`, `(…)`, or `*…*` — these never contain
/// real speech. Truncated annotations (an opener with no closer before the
/// end of the string) are stripped to the end. Musical glyphs are removed.
/// Idempotent: `general_cleanup(general_cleanup(x)) == general_cleanup(x)`.
pub fn general_cleanup(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '[' | '(' | '*' => {
                let close = match ch {
                    '[' => ']',
                    '(' => ')',
                    _ => '*',
                };
                chars.next(); // consume opener
                for inner in chars.by_ref() {
                    if inner == close {
                        break;
                    }
                }
                // A truncated annotation simply drains to the end.
            }
            _ if MUSICAL_GLYPHS.contains(&ch) => {
                chars.next();
            }
            _ => {
                result.push(ch);
                chars.next();
            }
        }
    }

    collapse_whitespace(&result)
}

/// Collapse whitespace runs to single spaces and trim the ends.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Language-specific normalization: noise rejection, special-token removal,
/// capitalization, punctuation tidy-up.
///
/// Returns None when the input classifies as noise. Only whitespace,
/// punctuation and casing are touched — semantic content is never added or
/// removed beyond the configured special tokens.
pub fn language_normalize(text: &str, special_tokens: &[String]) -> Option<String> {
    // Noise classification: nothing letter-like survives, or the whole
    // string is one non-alphanumeric character.
    if !text.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let mut char_iter = text.chars();
    if let (Some(only), None) = (char_iter.next(), char_iter.next()) {
        if !only.is_alphanumeric() {
            return None;
        }
    }

    // Special-token removal, then re-normalize whitespace.
    let mut stripped = text.to_string();
    for token in special_tokens {
        if !token.is_empty() {
            stripped = stripped.replace(token.as_str(), " ");
        }
    }
    let stripped = collapse_whitespace(&stripped);
    if stripped.is_empty() || !stripped.chars().any(|c| c.is_alphabetic()) {
        return None;
    }

    let tidied = tidy_punctuation(&stripped);
    Some(capitalize_first(&tidied))
}

/// Uppercase the first letter only; everything else is left alone.
fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn is_tidied_punct(ch: char) -> bool {
    matches!(ch, '.' | ',' | '!' | '?' | ';' | ':')
}

/// Conservative punctuation tidy-up: no space before punctuation, a single
/// space after it, repeated punctuation collapsed to one.
fn tidy_punctuation(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if is_tidied_punct(ch) {
            // Attach to the preceding word
            while result.ends_with(' ') {
                result.pop();
            }
            result.push(ch);
            // Collapse any run of the same punctuation (with optional
            // intervening spaces) into the single mark just pushed.
            i += 1;
            while i < chars.len() && (chars[i] == ch || chars[i] == ' ') {
                if chars[i] == ' ' {
                    // Peek past spaces: only swallow them when more of the
                    // same punctuation follows.
                    let mut j = i;
                    while j < chars.len() && chars[j] == ' ' {
                        j += 1;
                    }
                    if j < chars.len() && chars[j] == ch {
                        i = j;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            // A single space after, unless at the end or before more text
            // that starts with punctuation.
            if i < chars.len() && !is_tidied_punct(chars[i]) {
                result.push(' ');
                // Skip any existing spaces
                while i < chars.len() && chars[i] == ' ' {
                    i += 1;
                }
            }
        } else {
            result.push(ch);
            i += 1;
        }
    }

    collapse_whitespace(&result)
}

/// The two-stage transcript normalizer.
///
/// General cleanup always runs; segments that come out empty are discarded
/// before the optional language stage.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    language_stage: bool,
    special_tokens: Vec<String>,
}

impl TextNormalizer {
    /// Creates a normalizer with the language stage toggled as given.
    pub fn new(language_stage: bool, special_tokens: Vec<String>) -> Self {
        Self {
            language_stage,
            special_tokens,
        }
    }

    /// Normalize one raw recognition result.
    ///
    /// Returns None when the segment should be discarded.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let cleaned = general_cleanup(raw);
        if cleaned.is_empty() {
            return None;
        }
        if !self.language_stage {
            return Some(cleaned);
        }
        language_normalize(&cleaned, &self.special_tokens)
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(
            true,
            crate::defaults::SPECIAL_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_strips_bracketed_annotations() {
        assert_eq!(
            general_cleanup("Hello [BLANK_AUDIO] world [INAUDIBLE] test"),
            "Hello world test"
        );
        assert_eq!(general_cleanup("(coughs) right (laughs)"), "right");
        assert_eq!(general_cleanup("*sighs* okay then"), "okay then");
    }

    #[test]
    fn test_cleanup_strips_truncated_annotations() {
        assert_eq!(general_cleanup("we should [BLANK_AUD"), "we should");
        assert_eq!(general_cleanup("fine (unfinis"), "fine");
        assert_eq!(general_cleanup("sure *trailing"), "sure");
    }

    #[test]
    fn test_cleanup_strips_musical_glyphs() {
        assert_eq!(general_cleanup("♪ ♪ ♪"), "");
        assert_eq!(general_cleanup("so ♪ anyway ♫"), "so anyway");
    }

    #[test]
    fn test_cleanup_collapses_whitespace() {
        assert_eq!(general_cleanup("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let inputs = [
            "Hello [NOISE] world",
            "  spaced   out  ",
            "*music* ♪ la la (hums)",
            "unmatched ] closer ) kept",
            "truncated [anno",
            "",
            "plain sentence with no markers.",
        ];
        for input in inputs {
            let once = general_cleanup(input);
            let twice = general_cleanup(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_cleanup_keeps_unmatched_closers() {
        // Closing delimiters without openers are not annotation syntax
        assert_eq!(general_cleanup("a ] b"), "a ] b");
    }

    fn tokens() -> Vec<String> {
        vec!["<unk>".to_string(), "<|endoftext|>".to_string()]
    }

    #[test]
    fn test_noise_rejection_no_letters() {
        assert_eq!(language_normalize("1234 5678", &tokens()), None);
        assert_eq!(language_normalize("...", &tokens()), None);
        assert_eq!(language_normalize("-", &tokens()), None);
    }

    #[test]
    fn test_noise_rejection_single_nonalnum_char() {
        assert_eq!(language_normalize("?", &tokens()), None);
        // A single letter is fine
        assert_eq!(language_normalize("i", &tokens()), Some("I".to_string()));
    }

    #[test]
    fn test_special_token_removal() {
        assert_eq!(
            language_normalize("well <unk> that happened", &tokens()),
            Some("Well that happened".to_string())
        );
        // Text that is nothing but tokens classifies as noise
        assert_eq!(language_normalize("<unk> <unk>", &tokens()), None);
    }

    #[test]
    fn test_capitalizes_first_letter_only() {
        assert_eq!(
            language_normalize("the quick brown FOX", &tokens()),
            Some("The quick brown FOX".to_string())
        );
    }

    #[test]
    fn test_punctuation_no_space_before_single_after() {
        assert_eq!(
            language_normalize("well , yes .we know", &tokens()),
            Some("Well, yes. we know".to_string())
        );
    }

    #[test]
    fn test_repeated_punctuation_collapsed() {
        assert_eq!(
            language_normalize("really??  sure!!", &tokens()),
            Some("Really? sure!".to_string())
        );
        assert_eq!(
            language_normalize("wait... what", &tokens()),
            Some("Wait. what".to_string())
        );
    }

    #[test]
    fn test_language_stage_preserves_words() {
        // The stage must never invent or remove semantic content
        let input = "seven words exactly in this short sentence";
        let output = language_normalize(input, &tokens()).unwrap();
        let input_words: Vec<&str> = input.split_whitespace().collect();
        let output_lower = output.to_lowercase();
        let output_words: Vec<&str> = output_lower.split_whitespace().collect();
        assert_eq!(input_words, output_words);
    }

    #[test]
    fn test_normalizer_discards_empty_after_cleanup() {
        let normalizer = TextNormalizer::default();
        assert_eq!(normalizer.normalize("[BLANK_AUDIO]"), None);
        assert_eq!(normalizer.normalize("(music)"), None);
        assert_eq!(normalizer.normalize(""), None);
        assert_eq!(normalizer.normalize("   "), None);
    }

    #[test]
    fn test_normalizer_without_language_stage() {
        let normalizer = TextNormalizer::new(false, vec![]);
        // Cleanup applies, but no casing or punctuation changes
        assert_eq!(
            normalizer.normalize("so [NOISE] it goes ,right"),
            Some("so it goes ,right".to_string())
        );
        // Noise strings survive when the language stage is off
        assert_eq!(normalizer.normalize("1234"), Some("1234".to_string()));
    }

    #[test]
    fn test_normalizer_full_pipeline() {
        let normalizer = TextNormalizer::default();
        assert_eq!(
            normalizer.normalize("  [BLANK_AUDIO] okay , let's begin !! "),
            Some("Okay, let's begin!".to_string())
        );
    }
}
