//! The internal assessment block the continuation chain appends after the
//! last fixed question, and the semicolon list produced by field extraction.

use crate::memory::{Sender, Turn};
use crate::models::application::ScreeningAssessment;

pub const ASSESSMENT_OPEN: &str = "[[ASSESSMENT]]";
pub const ASSESSMENT_CLOSE: &str = "[[/ASSESSMENT]]";

/// Separates applicant-visible text from the first assessment block.
pub fn split_assessment(text: &str) -> (String, Option<ScreeningAssessment>) {
    let Some(open) = text.find(ASSESSMENT_OPEN) else {
        return (text.trim_end().to_string(), None);
    };
    let body_start = open + ASSESSMENT_OPEN.len();
    let (body, tail) = match text[body_start..].find(ASSESSMENT_CLOSE) {
        Some(close) => (
            &text[body_start..body_start + close],
            &text[body_start + close + ASSESSMENT_CLOSE.len()..],
        ),
        None => (&text[body_start..], ""),
    };

    let mut visible = text[..open].trim_end().to_string();
    let tail = tail.trim();
    if !tail.is_empty() {
        visible.push_str("\n\n");
        visible.push_str(tail);
    }
    (visible, parse_block(body))
}

/// Visible text only. An unterminated block at the end (a stream cut short,
/// or one still arriving) is removed as well.
pub fn strip_assessment(text: &str) -> String {
    let mut visible = text.to_string();
    while let Some(open) = visible.find(ASSESSMENT_OPEN) {
        let after = open + ASSESSMENT_OPEN.len();
        match visible[after..].find(ASSESSMENT_CLOSE) {
            Some(close) => {
                visible.replace_range(open..after + close + ASSESSMENT_CLOSE.len(), "");
            }
            None => visible.truncate(open),
        }
    }
    visible.trim_end().to_string()
}

/// Every well-formed block the assistant emitted in a session, in order.
pub fn collect_assessments(history: &[Turn]) -> Vec<ScreeningAssessment> {
    history
        .iter()
        .filter(|turn| turn.sender == Sender::Assistant)
        .filter_map(|turn| split_assessment(&turn.text).1)
        .collect()
}

#[derive(Clone, Copy)]
enum Field {
    Question,
    Answer,
    Assessment,
}

/// Parses the inside of a block. Fields may span several lines; a block
/// without a usable score is rejected.
pub fn parse_block(body: &str) -> Option<ScreeningAssessment> {
    let mut question = String::new();
    let mut answer = String::new();
    let mut assessment = String::new();
    let mut score = None;
    let mut current: Option<Field> = None;

    for line in body.lines() {
        let line = line.trim();
        if let Some(value) = strip_label(line, "question:") {
            question = value.to_string();
            current = Some(Field::Question);
        } else if let Some(value) = strip_label(line, "answer:") {
            answer = value.to_string();
            current = Some(Field::Answer);
        } else if let Some(value) = strip_label(line, "assessment:") {
            assessment = value.to_string();
            current = Some(Field::Assessment);
        } else if let Some(value) = strip_label(line, "score:") {
            score = parse_score(value);
            current = None;
        } else if !line.is_empty() {
            let target = match current {
                Some(Field::Question) => &mut question,
                Some(Field::Answer) => &mut answer,
                Some(Field::Assessment) => &mut assessment,
                None => continue,
            };
            target.push(' ');
            target.push_str(line);
        }
    }

    Some(ScreeningAssessment {
        question,
        answer,
        assessment,
        score: score?,
    })
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    head.eq_ignore_ascii_case(label)
        .then(|| line[label.len()..].trim())
}

/// `8/10`, `8`, `8.5 / 10` → clamped integer in 1..=10.
fn parse_score(raw: &str) -> Option<u8> {
    let number = raw.split('/').next()?.trim();
    let value: f32 = number.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(1.0, 10.0) as u8)
}

/// Parses `Name => Ada; Email => a@b.c; Question => Answer; ...` into ordered pairs.
/// A segment without `=>` belongs to the previous answer (answers may contain `;`).
pub fn parse_answer_pairs(text: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for segment in text.split(';') {
        match segment.split_once("=>") {
            Some((key, value)) => {
                let key = key.trim();
                if !key.is_empty() {
                    pairs.push((key.to_string(), value.trim().to_string()));
                }
            }
            None => {
                let extra = segment.trim();
                if let (Some((_, value)), false) = (pairs.last_mut(), extra.is_empty()) {
                    value.push_str("; ");
                    value.push_str(extra);
                }
            }
        }
    }

    pairs
}
