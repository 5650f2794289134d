//! The single scoring policy: advanced-screening average when present,
//! answer heuristics otherwise, then one spam check over the answers.

use crate::models::application::{AiFlag, ExtractedApplicationData, ScreeningAssessment};
use crate::models::opportunity::FIXED_QUESTION_COUNT;

const POINTS_PER_ANSWER: u32 = 10;
const COMPLETENESS_POINTS: u32 = 20;
const DETAILED_ANSWER_CHARS: usize = 50;
const DETAILED_ANSWER_BONUS: u32 = 3;

const SPAM_TOKENS: &[&str] = &["test", "spam", "asdf", "qwerty", "lorem ipsum", "xxx", "n/a"];
const MIN_ANSWER_CHARS: usize = 2;
/// More than this many spam-looking answers marks the application as spam.
const SPAM_HIT_LIMIT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub ai_score: u8,
    pub ai_flag: AiFlag,
}

pub fn score_application(data: &ExtractedApplicationData) -> Score {
    let ai_score = if data.advanced_screening.is_empty() {
        heuristic_score(&data.answers)
    } else {
        screening_score(&data.advanced_screening)
    };
    Score {
        ai_score,
        ai_flag: flag_for(ai_score, &data.answers),
    }
}

/// Mean of the 1–10 sub-scores rescaled to 0–100.
pub fn screening_score(assessments: &[ScreeningAssessment]) -> u8 {
    if assessments.is_empty() {
        return 0;
    }
    let total: u32 = assessments.iter().map(|a| u32::from(a.score.min(10))).sum();
    let mean = total as f64 / assessments.len() as f64;
    (mean * 10.0).round().clamp(0.0, 100.0) as u8
}

/// Fallback when no screening assessment exists.
pub fn heuristic_score(answers: &[String]) -> u8 {
    let answered: Vec<&str> = answers
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    if answered.is_empty() {
        return 0;
    }

    let base = answered.len() as u32 * POINTS_PER_ANSWER;
    let completeness =
        (answered.len().min(FIXED_QUESTION_COUNT) as u32 * COMPLETENESS_POINTS) / FIXED_QUESTION_COUNT as u32;
    let detail = answered
        .iter()
        .filter(|a| a.chars().count() > DETAILED_ANSWER_CHARS)
        .count() as u32
        * DETAILED_ANSWER_BONUS;

    (base + completeness + detail).min(100) as u8
}

pub fn flag_for(ai_score: u8, answers: &[String]) -> AiFlag {
    if spam_hits(answers) > SPAM_HIT_LIMIT {
        return AiFlag::Spam;
    }
    match ai_score {
        80.. => AiFlag::Great,
        60..=79 => AiFlag::HighLevel,
        0..=9 => AiFlag::Spam,
        _ => AiFlag::Normal,
    }
}

/// Answers that are near-empty or consist of a throwaway token, case-insensitively.
fn spam_hits(answers: &[String]) -> usize {
    answers
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| a.chars().count() < MIN_ANSWER_CHARS || SPAM_TOKENS.contains(&a.as_str()))
        .count()
}
