// Instruction templates for every chain.
// Placeholders are `{name}`; `fill` substitutes them in a single pass so text
// coming from applicants or opportunities is never re-scanned for placeholders.

use crate::memory::{Sender, Turn};

/// Continuation chain. Replace `{title}`, `{description}`, `{more_context}`,
/// `{questions}`, `{context}`, `{assessment_format}`.
pub const CONTINUATION_SYSTEM_TEMPLATE: &str = r#"You are a friendly recruiting assistant interviewing an applicant for the opportunity below.

OPPORTUNITY
Title: {title}
Description: {description}
Additional context: {more_context}

RELEVANT JOB INFORMATION
{context}

INTERVIEW ORDER (strict, one item per message, never skip, never reorder):
1. Ask for the applicant's full name.
2. Ask for the applicant's email address.
3. Ask the fixed questions below, one at a time, in exactly this order:
{questions}

RULES
- Ask exactly one thing per message and wait for the answer.
- If the applicant asks about the job, answer briefly from the job information above, then repeat the pending question.
- NEVER ask for a resume, CV or any file before all fixed questions have been answered.
- After the applicant answers the LAST fixed question, reply in two parts:
  (a) a short natural reply that thanks them and asks them to upload their resume (CV),
  (b) then, on new lines, an internal assessment block in exactly this format:
{assessment_format}
  The block is for the hiring team only; never mention it in the visible reply.
- When the applicant says their resume has been uploaded, thank them and offer an optional profile picture upload. Ask whether they want to upload a profile picture and tell them to answer yes or skip.
- After the picture is uploaded or skipped, tell them they can finish the application now or keep asking questions about the opportunity.
- Do not invent facts about the opportunity. If you do not know, say so."#;

/// Rendered into the continuation prompt so the model emits a parseable block.
pub const ASSESSMENT_FORMAT: &str = "[[ASSESSMENT]]
Question: <the last fixed question>
Answer: <the applicant's answer>
Assessment: <one or two sentences evaluating the answer>
Score: <integer 1-10>/10
[[/ASSESSMENT]]";

/// CV-upload classifier. Replace `{text}`.
pub const CV_CLASSIFIER_TEMPLATE: &str = r#"Read the assistant message below and decide whether it asks the applicant to provide or upload a resume or CV.

MESSAGE:
"""
{text}
"""

Answer with exactly one word: yes or no."#;

/// Farewell chain system prompt. Replace `{goodbye}`.
pub const FAREWELL_SYSTEM_TEMPLATE: &str = r#"You are a recruiting assistant closing an application conversation.
Write a short, warm closing message for the applicant, using their name if they gave it.
Base it on this goodbye message from the hiring team and keep its meaning intact:
"{goodbye}"
Do not ask any further questions."#;

/// Field extraction. Replace `{transcript}`, `{questions}`.
pub const FIELD_EXTRACTION_TEMPLATE: &str = r#"Below is a transcript of an application interview.

TRANSCRIPT
{transcript}

FIXED QUESTIONS
{questions}

List the applicant's name, email and their answer to each fixed question as a single line of
semicolon-separated pairs in this exact format:
Name => <name>; Email => <email>; <question 1> => <answer>; <question 2> => <answer>; ...
Copy each question text exactly as listed. Use an empty answer when a question was not answered."#;

/// Structured extraction for the finalizer. Replace `{transcript}`, `{questions}`.
pub const APPLICATION_EXTRACTION_TEMPLATE: &str = r#"Below is a transcript of an application interview.

TRANSCRIPT
{transcript}

FIXED QUESTIONS (in order)
{questions}

Return a JSON object with this EXACT schema:
{
  "name": "",
  "email": "",
  "phone": "",
  "education": "",
  "experience": "",
  "portfolioUrl": "",
  "travelWillingness": "",
  "answers": ["<answer to question 1>", "<answer to question 2>"],
  "advancedScreening": [
    {"question": "", "answer": "", "assessment": "", "score": 1}
  ]
}

Rules:
- "answers" has one entry per fixed question, in the listed order; use "" when unanswered.
- "advancedScreening" copies any assessment of the last fixed question; use [] when none.
- "experience" is the applicant's own description of their work history, verbatim where possible."#;

/// Screening-question lister. Replace `{transcript}`.
pub const SCREENING_QUESTIONS_TEMPLATE: &str = r#"Below is a transcript of an application interview.

TRANSCRIPT
{transcript}

List every question the APPLICANT asked after uploading their resume, one per line, prefixed with "- ".
If they asked none, answer "No questions asked.""#;

/// Email lookup. Replace `{transcript}`.
pub const EMAIL_LOOKUP_TEMPLATE: &str = r#"Below is a transcript of an application interview.

TRANSCRIPT
{transcript}

What is the applicant's email address? Return the email address only."#;

/// Experience summary. Replace `{experience}`.
pub const EXPERIENCE_SUMMARY_TEMPLATE: &str = r#"Summarize the applicant's work experience below in at most four sentences for a hiring manager.

EXPERIENCE
{experience}"#;

/// Narrative assessment. Replace `{title}`, `{description}`, `{application}`.
pub const COMPREHENSIVE_ASSESSMENT_TEMPLATE: &str = r#"You are helping a hiring manager review an application.

OPPORTUNITY
Title: {title}
Description: {description}

APPLICATION (JSON)
{application}

Write a concise assessment (one to two paragraphs) of how well the applicant fits the opportunity:
strengths, gaps, and anything worth probing in an interview."#;

/// Substitutes `{key}` placeholders in one pass. Unknown placeholders are left as-is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (close, *value))
        });
        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Plain-text transcript for chains that read the whole conversation at once.
pub fn render_transcript(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| match turn.sender {
            Sender::User => format!("Applicant: {}", turn.text),
            Sender::Assistant => format!("Assistant: {}", turn.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered question list, `1. ...` per line.
pub fn numbered(questions: &[String]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
