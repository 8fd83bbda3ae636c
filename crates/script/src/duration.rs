//! TTS-duration estimate shared by `bot.elapsed()` and the orchestrator's
//! thinking-filler timer: a rough model of how long a speaker will take to
//! read a string aloud, without ever calling out to the speaker itself.
//!
//! Model (spec §4.5 "TTS-duration model"):
//! `seconds = chineseChars/256*60 + englishWords/150*60 + Σpunctuation_pauses
//!            + 1.0*(paragraphs-1)`, floored at 1.0 second.

/// Seconds a speaker is expected to need to read `text` aloud.
pub fn estimate_tts_seconds(text: &str) -> f64 {
    let chinese_chars = text.chars().filter(|c| is_chinese(*c)).count() as f64;
    let english_words = text
        .split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_ascii_alphabetic()))
        .count() as f64;
    let paragraphs = text.split("\n\n").count() as f64;

    let mut seconds = chinese_chars / 256.0 * 60.0 + english_words / 150.0 * 60.0;
    for c in text.chars() {
        seconds += punctuation_pause(c);
    }
    if paragraphs > 1.0 {
        seconds += paragraphs - 1.0;
    }

    seconds.max(1.0)
}

fn is_chinese(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF)
}

fn punctuation_pause(c: char) -> f64 {
    match c {
        '.' | '?' | '!' | '\u{3002}' | '\u{FF1F}' | '\u{FF01}' => 0.8,
        ';' | ':' | '\u{FF1B}' | '\u{FF1A}' => 0.5,
        ',' | '\u{FF0C}' => 0.3,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_floors_at_one_second() {
        assert_eq!(estimate_tts_seconds(""), 1.0);
    }

    #[test]
    fn single_word_floors_at_one_second() {
        assert_eq!(estimate_tts_seconds("hi"), 1.0);
    }

    #[test]
    fn long_text_scales_with_length() {
        let short = estimate_tts_seconds("a short sentence here.");
        let long = estimate_tts_seconds(&"word ".repeat(400));
        assert!(long > short);
    }

    #[test]
    fn punctuation_pauses_match_spec_weights() {
        let period = estimate_tts_seconds(&format!("{}.", "word ".repeat(200)));
        let comma = estimate_tts_seconds(&format!("{},", "word ".repeat(200)));
        let plain = estimate_tts_seconds(&"word ".repeat(200));
        assert!(period > comma);
        assert!(comma > plain);
    }

    #[test]
    fn paragraph_breaks_add_a_second_each() {
        let one = estimate_tts_seconds("hello world this is a test of paragraph timing");
        let two = estimate_tts_seconds("hello world this is a test of paragraph timing\n\nmore text here to pad it out");
        assert!(two > one);
    }

    #[test]
    fn chinese_characters_are_counted_separately_from_english_words() {
        let chinese = estimate_tts_seconds(&"你".repeat(300));
        let english = estimate_tts_seconds(&"word ".repeat(300));
        assert!(chinese > 1.0);
        assert!(english > 1.0);
    }
}
