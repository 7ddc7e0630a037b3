// Unicode script and orientation classification used by line breaking and shaping.
// Tables are block-level ranges; they cover the scripts map labels commonly use.

type Ranges = &'static [(u32, u32)];

const IDEOGRAPHIC_BREAKING: Ranges = &[
    (0x2E80, 0x2FDF),   // CJK radicals, Kangxi radicals
    (0x2FF0, 0x303F),   // ideographic description, CJK symbols and punctuation
    (0x3040, 0x309F),   // Hiragana
    (0x30A0, 0x30FF),   // Katakana
    (0x3100, 0x312F),   // Bopomofo
    (0x31A0, 0x31FF),   // Bopomofo extended, CJK strokes, Katakana phonetic extensions
    (0x3200, 0x33FF),   // enclosed CJK, CJK compatibility
    (0x3400, 0x4DBF),   // CJK extension A
    (0x4E00, 0x9FFF),   // CJK unified ideographs
    (0xA000, 0xA4CF),   // Yi
    (0xF900, 0xFAFF),   // CJK compatibility ideographs
    (0xFE10, 0xFE1F),   // vertical forms
    (0xFE30, 0xFE4F),   // CJK compatibility forms
    (0xFF00, 0xFFEF),   // halfwidth and fullwidth forms
    (0x1B000, 0x1B16F), // kana supplement and extensions
    (0x20000, 0x3134F), // CJK extensions B..G
];

const UPRIGHT_VERTICAL: Ranges = &[
    (0x02EA, 0x02EB),
    (0x1100, 0x11FF),   // Hangul Jamo
    (0x1400, 0x167F),   // Unified Canadian Aboriginal Syllabics
    (0x18B0, 0x18FF),
    (0x2E80, 0x2FDF),
    (0x2FF0, 0x3007),
    (0x3012, 0x3013),
    (0x3020, 0x302F),
    (0x3031, 0x309F),
    (0x30A0, 0x30FB),
    (0x30FD, 0x30FF),
    (0x3100, 0x9FFF),
    (0xA000, 0xA4CF),   // Yi
    (0xA960, 0xA97F),   // Hangul Jamo extended A
    (0xAC00, 0xD7FF),   // Hangul syllables and Jamo extended B
    (0xF900, 0xFAFF),
    (0xFE10, 0xFE1F),
    (0xFE30, 0xFE48),
    (0xFF00, 0xFF07),
    (0xFF0A, 0xFF0C),
    (0xFF0E, 0xFF19),
    (0xFF1F, 0xFF3A),
    (0xFF3C, 0xFF3C),
    (0xFF3E, 0xFF3E),
    (0xFF40, 0xFF5A),
    (0xFFE0, 0xFFE2),
    (0xFFE4, 0xFFE7),
    (0x1B000, 0x1B16F),
    (0x1F200, 0x1F2FF), // enclosed ideographic supplement
    (0x20000, 0x3134F),
];

const NEUTRAL_VERTICAL: Ranges = &[
    (0x00A7, 0x00A7),
    (0x00A9, 0x00A9),
    (0x00AE, 0x00AE),
    (0x00B1, 0x00B1),
    (0x00BC, 0x00BE),
    (0x00D7, 0x00D7),
    (0x00F7, 0x00F7),
    (0x2016, 0x2016),
    (0x2020, 0x2021),
    (0x2030, 0x2031),
    (0x203B, 0x203C),
    (0x2042, 0x2042),
    (0x2047, 0x2049),
    (0x2051, 0x2051),
    (0x2100, 0x218F),   // letterlike symbols, number forms
    (0x221E, 0x221E),
    (0x2234, 0x2235),
    (0x2300, 0x2307),
    (0x230C, 0x231F),
    (0x2324, 0x2328),
    (0x232B, 0x232B),
    (0x237D, 0x239A),
    (0x23BE, 0x23CD),
    (0x23CF, 0x23CF),
    (0x23D1, 0x23DB),
    (0x23E2, 0x23FF),
    (0x2400, 0x24FF),   // control pictures, OCR, enclosed alphanumerics
    (0x25A0, 0x25FF),   // geometric shapes
    (0x2600, 0x27BF),   // miscellaneous symbols, dingbats
    (0x2B12, 0x2B2F),
    (0x2B50, 0x2B59),
    (0x2BB8, 0x2BEB),
    (0x2BF0, 0x2BFF),
    (0x3008, 0x3011),
    (0x3014, 0x301F),
    (0x3030, 0x3030),
    (0x30FC, 0x30FC),
    (0xE000, 0xF8FF),   // private use area, also used for inline images
    (0xFE49, 0xFE4F),
    (0xFF08, 0xFF09),
    (0xFF0D, 0xFF0D),
    (0xFF1A, 0xFF1E),
    (0xFF3B, 0xFF3B),
    (0xFF3D, 0xFF3D),
    (0xFF3F, 0xFF3F),
    (0xFF5B, 0xFF60),
    (0xFFE3, 0xFFE3),
    (0xFFE8, 0xFFEF),
    (0xFFFC, 0xFFFD),
];

const ARABIC: Ranges = &[
    (0x0600, 0x06FF),
    (0x0750, 0x077F),
    (0x0870, 0x08FF),
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
    (0x10EC0, 0x10EFF),
    (0x1EE00, 0x1EEFF),
];

const CURSIVE: Ranges = &[
    (0x0600, 0x06FF),   // Arabic
    (0x0700, 0x074F),   // Syriac
    (0x0750, 0x077F),
    (0x0860, 0x086F),   // Syriac supplement
    (0x0870, 0x08FF),
    (0x1800, 0x18AF),   // Mongolian
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
    (0x10F70, 0x10FAF), // Old Uyghur
    (0x11660, 0x1167F), // Mongolian supplement
    (0x1BC00, 0x1BC9F), // Duployan
    (0x1EE00, 0x1EEFF),
];

const RTL: Ranges = &[
    (0x0590, 0x05FF),   // Hebrew
    (0x0600, 0x07BF),   // Arabic, Syriac, Arabic supplement, Thaana
    (0x07C0, 0x07FF),   // NKo
    (0x0800, 0x08FF),   // Samaritan, Mandaic, Arabic extended
    (0xFB1D, 0xFB4F),   // Hebrew presentation forms
    (0xFB50, 0xFDFF),
    (0xFE70, 0xFEFF),
    (0x10800, 0x10FFF), // historic RTL scripts
    (0x1E800, 0x1EFFF), // Mende Kikakui, Adlam, Arabic mathematical symbols
];

/// Scripts whose glyph order or shape depends on context beyond simple bidi reordering.
const COMPLEX_SHAPING: Ranges = &[
    (0x0900, 0x0DFF),   // Devanagari .. Sinhala
    (0x0F00, 0x0FFF),   // Tibetan
    (0x1000, 0x109F),   // Myanmar
    (0x1780, 0x17FF),   // Khmer
    (0x1A20, 0x1AAF),   // Tai Tham
    (0x1B00, 0x1B7F),   // Balinese
    (0x1B80, 0x1BBF),   // Sundanese
    (0x1BC0, 0x1BFF),   // Batak
    (0xA800, 0xA82F),   // Syloti Nagri
    (0xA980, 0xA9DF),   // Javanese
    (0x11000, 0x1107F), // Brahmi
];

/// Ranges are sorted and disjoint.
fn in_ranges(ranges: Ranges, code_point: u32) -> bool {
    ranges
        .binary_search_by(|&(start, end)| {
            if end < code_point {
                std::cmp::Ordering::Less
            } else if start > code_point {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

pub fn char_is_whitespace(c: char) -> bool {
    c.is_whitespace()
}

pub fn char_allows_ideographic_breaking(c: char) -> bool {
    in_ranges(IDEOGRAPHIC_BREAKING, u32::from(c))
}

pub fn char_has_upright_vertical_orientation(c: char) -> bool {
    in_ranges(UPRIGHT_VERTICAL, u32::from(c))
}

pub fn char_has_neutral_vertical_orientation(c: char) -> bool {
    in_ranges(NEUTRAL_VERTICAL, u32::from(c))
}

/// Drawn rotated on a vertical line even between upright neighbours.
pub fn char_has_rotated_vertical_orientation(c: char) -> bool {
    !(char_has_upright_vertical_orientation(c) || char_has_neutral_vertical_orientation(c))
}

pub fn char_in_complex_shaping_script(c: char) -> bool {
    in_ranges(ARABIC, u32::from(c))
}

pub fn char_allows_letter_spacing(c: char) -> bool {
    !in_ranges(CURSIVE, u32::from(c))
}

pub fn char_in_rtl_script(c: char) -> bool {
    in_ranges(RTL, u32::from(c))
}

pub fn char_in_supported_script(c: char, can_render_rtl: bool) -> bool {
    if !can_render_rtl && char_in_rtl_script(c) {
        return false;
    }
    !in_ranges(COMPLEX_SHAPING, u32::from(c))
}

pub fn allows_ideographic_breaking(text: &str) -> bool {
    text.chars().all(char_allows_ideographic_breaking)
}

pub fn allows_vertical_writing_mode(text: &str) -> bool {
    text.chars().any(char_has_upright_vertical_orientation)
}

pub fn allows_letter_spacing(text: &str) -> bool {
    text.chars().all(char_allows_letter_spacing)
}

pub fn string_contains_rtl_text(text: &str) -> bool {
    text.chars().any(char_in_rtl_script)
}

pub fn is_string_in_supported_script(text: &str, can_render_rtl: bool) -> bool {
    text.chars().all(|c| char_in_supported_script(c, can_render_rtl))
}

fn vertical_punctuation(c: char) -> Option<char> {
    let mapped = match c {
        '!' => '︕',
        '#' => '＃',
        '$' => '＄',
        '%' => '％',
        '&' => '＆',
        '(' => '︵',
        ')' => '︶',
        '*' => '＊',
        '+' => '＋',
        ',' => '︐',
        '-' => '︲',
        '.' => '・',
        '/' => '／',
        ':' => '︓',
        ';' => '︔',
        '<' => '︿',
        '=' => '＝',
        '>' => '﹀',
        '?' => '︖',
        '@' => '＠',
        '[' => '﹇',
        '\\' => '＼',
        ']' => '﹈',
        '^' => '＾',
        '_' => '︳',
        '`' => '｀',
        '{' => '︷',
        '|' => '―',
        '}' => '︸',
        '~' => '～',
        '¢' => '￠',
        '£' => '￡',
        '¥' => '￥',
        '¦' => '￤',
        '¬' => '￢',
        '¯' => '￣',
        '–' => '︲',
        '—' => '︱',
        '‘' => '﹃',
        '’' => '﹄',
        '“' => '﹁',
        '”' => '﹂',
        '…' => '︙',
        '‧' => '・',
        '₩' => '￦',
        '、' => '︑',
        '。' => '︒',
        '〈' => '︿',
        '〉' => '﹀',
        '《' => '︽',
        '》' => '︾',
        '「' => '﹁',
        '」' => '﹂',
        '『' => '﹃',
        '』' => '﹄',
        '【' => '︻',
        '】' => '︼',
        '〔' => '︹',
        '〕' => '︺',
        '〖' => '︗',
        '〗' => '︘',
        '！' => '︕',
        '（' => '︵',
        '）' => '︶',
        '，' => '︐',
        '－' => '︲',
        '．' => '・',
        '：' => '︓',
        '；' => '︔',
        '＜' => '︿',
        '＞' => '﹀',
        '？' => '︖',
        '［' => '﹇',
        '］' => '﹈',
        '＿' => '︳',
        '｛' => '︷',
        '｜' => '―',
        '｝' => '︸',
        '｟' => '︵',
        '｠' => '︶',
        '｡' => '︒',
        '｢' => '﹁',
        '｣' => '﹂',
        _ => return None,
    };
    Some(mapped)
}

/// Swaps punctuation for its vertical presentation form, unless a neighbour is a
/// rotated character (the run is then drawn sideways and keeps the original form).
pub fn verticalize_punctuation(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());

    for (i, &c) in chars.iter().enumerate() {
        let next = chars.get(i + 1).copied();
        let prev = if i > 0 { chars.get(i - 1).copied() } else { None };

        let next_ok = next.is_none_or(|n| {
            !char_has_rotated_vertical_orientation(n) || vertical_punctuation(n).is_some()
        });
        let prev_ok = prev.is_none_or(|p| {
            !char_has_rotated_vertical_orientation(p) || vertical_punctuation(p).is_some()
        });

        match vertical_punctuation(c) {
            Some(vertical) if next_ok && prev_ok => output.push(vertical),
            _ => output.push(c),
        }
    }

    output
}
