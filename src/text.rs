use crate::font::FontRegistry;
use crate::layout::FontRole;
use crate::types::Pt;

const SHRINK_STEP: f32 = 0.5;

const CP1252_HIGH: [(u8, char); 27] = [
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

pub(crate) fn winansi_byte(ch: char) -> Option<u8> {
    match ch {
        '\u{0020}'..='\u{007E}' | '\u{00A0}'..='\u{00FF}' => Some(ch as u32 as u8),
        _ => CP1252_HIGH
            .iter()
            .find(|(_, mapped)| *mapped == ch)
            .map(|(code, _)| *code),
    }
}

pub(crate) fn winansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => CP1252_HIGH
            .iter()
            .find(|(mapped, _)| *mapped == code)
            .map(|(_, ch)| *ch),
    }
}

pub(crate) fn encode_winansi(input: &str) -> Vec<u8> {
    input
        .chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => b' ',
            _ => winansi_byte(ch).unwrap_or(b'?'),
        })
        .collect()
}

pub(crate) fn fit_font_size(
    fonts: &FontRegistry,
    role: FontRole,
    text: &str,
    max_width: Pt,
    min_size: f32,
    max_size: f32,
) -> f32 {
    let mut size = max_size.max(min_size);
    while size > min_size {
        if fonts.measure_text_width(role, Pt::from_f32(size), text) <= max_width {
            return size;
        }
        size = (size - SHRINK_STEP).max(min_size);
    }
    min_size
}

// A single word wider than `max_width` is broken by characters.
pub(crate) fn wrap_lines(
    fonts: &FontRegistry,
    role: FontRole,
    font_size: Pt,
    text: &str,
    max_width: Pt,
) -> Vec<String> {
    let measure = |s: &str| fonts.measure_text_width(role, font_size, s);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                current.push(ch);
                if measure(&current) > max_width && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        lines.push(current);
    }
    while lines.last().is_some_and(|line| line.is_empty()) && lines.len() > 1 {
        lines.pop();
    }
    lines
}
