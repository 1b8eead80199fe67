//! Rough Arabic to Latin transliteration, used when the verse API does not
//! supply one.

const SHADDA: char = '\u{0651}';
const ALIF: char = 'ا';
const LAM: char = 'ل';

fn latin(c: char) -> Option<&'static str> {
    let mapped = match c {
        // harakat and tanween
        '\u{064E}' => "a",
        '\u{064F}' => "u",
        '\u{0650}' => "i",
        '\u{064B}' => "an",
        '\u{064C}' => "un",
        '\u{064D}' => "in",
        '\u{0652}' => "",
        SHADDA => "",

        'ا' | 'أ' => "a",
        'إ' => "i",
        'آ' => "aa",
        'ب' => "b",
        'ت' => "t",
        'ة' => "h/t",
        'ث' => "th",
        'ج' => "j",
        'ح' => "h",
        'خ' => "kh",
        'د' => "d",
        'ذ' => "dh",
        'ر' => "r",
        'ز' => "z",
        'س' => "s",
        'ش' => "sh",
        'ص' => "s",
        'ض' => "d",
        'ط' => "t",
        'ظ' => "z",
        'ع' => "`",
        'غ' => "gh",
        'ف' => "f",
        'ق' => "q",
        'ك' => "k",
        'ل' => "l",
        'م' => "m",
        'ن' => "n",
        'ه' => "h",
        'و' => "w/u",
        'ي' => "y/i",
        'ى' => "a",

        '١' => "1",
        '٢' => "2",
        '٣' => "3",
        '٤' => "4",
        '٥' => "5",
        '٦' => "6",
        '٧' => "7",
        '٨' => "8",
        '٩' => "9",
        '٠' => "0",

        '؟' => "?",
        '،' => ",",
        '؛' => ";",
        '(' => "(",
        ')' => ")",
        '۝' => "",
        _ => return None,
    };
    Some(mapped)
}

pub fn transliterate(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // shadda doubles the consonant it sits on
        if chars.get(i + 1) == Some(&SHADDA) {
            let doubled = match latin(c) {
                Some(m) if !m.is_empty() => m.to_string(),
                _ => c.to_string(),
            };
            result.push_str(&doubled);
            result.push_str(&doubled);
            i += 2;
            continue;
        }

        match latin(c) {
            Some(m) if !m.is_empty() => {
                if c == LAM && i > 0 && chars[i - 1] == ALIF {
                    if result.ends_with('a') {
                        result.pop();
                        result.push_str("al-");
                    } else {
                        result.push('l');
                    }
                } else {
                    result.push_str(m);
                }
            }
            _ => {}
        }
        i += 1;
    }

    result
        .replace("w/ua", "wa")
        .replace("y/ii", "yi")
        .replace("w/u", "w")
        .replace("y/i", "y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_word() {
        // qul
        assert_eq!(transliterate("ق\u{064F}ل\u{0652}"), "qul");
    }

    #[test]
    fn test_shadda_doubles_consonant() {
        // rabbi
        assert_eq!(transliterate("ر\u{064E}ب\u{0651}\u{0650}"), "rabbi");
    }

    #[test]
    fn test_shadda_on_unmapped_char_keeps_char() {
        assert_eq!(transliterate("x\u{0651}"), "xx");
    }

    #[test]
    fn test_alif_lam_becomes_article() {
        // al-hamdu
        assert_eq!(transliterate("الح\u{064E}م\u{0652}د\u{064F}"), "al-hamdu");
    }

    #[test]
    fn test_waw_and_ya_markers_cleaned() {
        assert_eq!(transliterate("و\u{064E}"), "wa");
        assert_eq!(transliterate("ي\u{0650}"), "yi");
        assert_eq!(transliterate("ي\u{064E}و\u{0652}م\u{0650}"), "yawmi");
    }

    #[test]
    fn test_digits_and_punctuation() {
        assert_eq!(transliterate("١٢٣؟"), "123?");
        assert_eq!(transliterate("۝"), "");
    }

    #[test]
    fn test_unknown_chars_dropped() {
        assert_eq!(transliterate("abc"), "");
        assert_eq!(transliterate(""), "");
    }
}
