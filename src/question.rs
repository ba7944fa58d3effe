//! Application questions and their derived properties.
//!
//! A [`Question`] is fixed for the whole run. Its [`QuestionType`] is either
//! given explicitly or inferred once, at construction, by weighted keyword
//! scoring over the question text.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Motivation,
    Experience,
    ProblemSolving,
    Values,
    Skills,
    Leadership,
    Growth,
    Other,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::Motivation => "motivation",
            QuestionType::Experience => "experience",
            QuestionType::ProblemSolving => "problem_solving",
            QuestionType::Values => "values",
            QuestionType::Skills => "skills",
            QuestionType::Leadership => "leadership",
            QuestionType::Growth => "growth",
            QuestionType::Other => "other",
        };
        f.write_str(s)
    }
}

impl QuestionType {
    /// Weighted keyword classification of a question text.
    ///
    /// The highest-scoring type wins; equal scores resolve to the type listed
    /// first below. No keyword hit yields [`QuestionType::Other`].
    pub fn infer(text: &str) -> Self {
        let lower = text.to_lowercase();

        let keyword_types: &[(&str, QuestionType, u32)] = &[
            ("motivat", QuestionType::Motivation, 10),
            ("why do you want", QuestionType::Motivation, 10),
            ("why are you applying", QuestionType::Motivation, 10),
            ("why us", QuestionType::Motivation, 10),
            ("why this company", QuestionType::Motivation, 10),
            ("why our company", QuestionType::Motivation, 10),
            ("apply", QuestionType::Motivation, 5),
            ("join", QuestionType::Motivation, 3),
            ("동기", QuestionType::Motivation, 10),
            ("지원", QuestionType::Motivation, 8),
            ("이유", QuestionType::Motivation, 6),
            ("선택한", QuestionType::Motivation, 5),
            ("왜", QuestionType::Motivation, 4),
            ("experience", QuestionType::Experience, 8),
            ("project", QuestionType::Experience, 7),
            ("achiev", QuestionType::Experience, 6),
            ("accomplish", QuestionType::Experience, 6),
            ("경험", QuestionType::Experience, 8),
            ("프로젝트", QuestionType::Experience, 7),
            ("업무", QuestionType::Experience, 6),
            ("성과", QuestionType::Experience, 6),
            ("사례", QuestionType::Experience, 3),
            ("problem", QuestionType::ProblemSolving, 10),
            ("challeng", QuestionType::ProblemSolving, 8),
            ("difficult", QuestionType::ProblemSolving, 8),
            ("overc", QuestionType::ProblemSolving, 7),
            ("failure", QuestionType::ProblemSolving, 6),
            ("문제", QuestionType::ProblemSolving, 10),
            ("어려움", QuestionType::ProblemSolving, 8),
            ("극복", QuestionType::ProblemSolving, 8),
            ("해결", QuestionType::ProblemSolving, 7),
            ("갈등", QuestionType::ProblemSolving, 7),
            ("실패", QuestionType::ProblemSolving, 6),
            ("도전", QuestionType::ProblemSolving, 6),
            ("value", QuestionType::Values, 10),
            ("belief", QuestionType::Values, 8),
            ("principle", QuestionType::Values, 8),
            ("philosophy", QuestionType::Values, 8),
            ("가치관", QuestionType::Values, 10),
            ("원칙", QuestionType::Values, 8),
            ("신념", QuestionType::Values, 8),
            ("철학", QuestionType::Values, 8),
            ("skill", QuestionType::Skills, 10),
            ("technical", QuestionType::Skills, 7),
            ("expertise", QuestionType::Skills, 7),
            ("strength", QuestionType::Skills, 5),
            ("역량", QuestionType::Skills, 10),
            ("기술", QuestionType::Skills, 8),
            ("전문성", QuestionType::Skills, 8),
            ("강점", QuestionType::Skills, 7),
            ("장점", QuestionType::Skills, 6),
            ("특기", QuestionType::Skills, 6),
            ("lead", QuestionType::Leadership, 10),
            ("team", QuestionType::Leadership, 6),
            ("collaborat", QuestionType::Leadership, 6),
            ("리더십", QuestionType::Leadership, 10),
            ("이끌", QuestionType::Leadership, 8),
            ("팀워크", QuestionType::Leadership, 6),
            ("협업", QuestionType::Leadership, 6),
            ("grow", QuestionType::Growth, 10),
            ("learn", QuestionType::Growth, 7),
            ("develop yourself", QuestionType::Growth, 7),
            ("future", QuestionType::Growth, 5),
            ("성장", QuestionType::Growth, 10),
            ("포부", QuestionType::Growth, 8),
            ("학습", QuestionType::Growth, 7),
            ("미래", QuestionType::Growth, 6),
            ("목표", QuestionType::Growth, 5),
            ("계획", QuestionType::Growth, 5),
        ];

        let mut scores: HashMap<QuestionType, u32> = HashMap::new();
        for &(keyword, kind, weight) in keyword_types {
            if lower.contains(keyword) {
                *scores.entry(kind).or_insert(0) += weight;
            }
        }

        let order = [
            QuestionType::Motivation,
            QuestionType::Experience,
            QuestionType::ProblemSolving,
            QuestionType::Values,
            QuestionType::Skills,
            QuestionType::Leadership,
            QuestionType::Growth,
        ];
        let mut best = (QuestionType::Other, 0);
        for kind in order {
            let score = scores.get(&kind).copied().unwrap_or(0);
            if score > best.1 {
                best = (kind, score);
            }
        }
        best.0
    }

    /// Terms appended to a retrieval query for questions of this type.
    ///
    /// `hangul` selects the Korean term set.
    pub fn expansion_keywords(self, hangul: bool) -> &'static [&'static str] {
        if hangul {
            return match self {
                QuestionType::Motivation => &["동기", "이유", "목표", "비전", "열정"],
                QuestionType::Experience => &["경험", "프로젝트", "업무", "성과", "역할"],
                QuestionType::ProblemSolving => &["문제해결", "도전", "어려움", "극복", "개선"],
                QuestionType::Values => &["가치관", "원칙", "신념", "철학", "중요"],
                QuestionType::Skills => &["기술", "능력", "역량", "전문성", "스킬"],
                QuestionType::Leadership => &["리더십", "팀워크", "협업", "관리", "이끌기"],
                QuestionType::Growth => &["성장", "발전", "학습", "개발", "향상"],
                QuestionType::Other => &[],
            };
        }
        match self {
            QuestionType::Motivation => &["motivation", "goal", "vision", "passion"],
            QuestionType::Experience => &["experience", "project", "role", "result"],
            QuestionType::ProblemSolving => &["problem", "challenge", "solved", "improved"],
            QuestionType::Values => &["values", "principle", "responsibility"],
            QuestionType::Skills => &["skills", "technology", "expertise"],
            QuestionType::Leadership => &["led", "team", "collaboration", "mentored"],
            QuestionType::Growth => &["learned", "growth", "improvement"],
            QuestionType::Other => &[],
        }
    }
}

/// How much room a character limit leaves, used to shape writing guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthBand {
    /// ≤ 300 characters: one message, one supporting fact.
    VeryTight,
    /// ≤ 600: one or two experiences, action and result only.
    Tight,
    /// ≤ 1000: two or three experiences with a full situation-action-result arc.
    Moderate,
    /// ≤ 1500: three or four experiences, room for narrative.
    Roomy,
    /// Anything longer, or no limit at all.
    Open,
}

impl LengthBand {
    pub fn for_limit(limit: Option<u32>) -> Self {
        match limit {
            Some(n) if n <= 300 => LengthBand::VeryTight,
            Some(n) if n <= 600 => LengthBand::Tight,
            Some(n) if n <= 1000 => LengthBand::Moderate,
            Some(n) if n <= 1500 => LengthBand::Roomy,
            _ => LengthBand::Open,
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            LengthBand::VeryTight => {
                "Pick the single most impactful experience; one core message plus one concrete figure."
            }
            LengthBand::Tight => {
                "Use one or two experiences; focus on actions and measurable results."
            }
            LengthBand::Moderate => {
                "Use two or three experiences with situation, action and result for each."
            }
            LengthBand::Roomy => {
                "Use three or four experiences and connect them into one narrative."
            }
            LengthBand::Open => "No hard limit; stay focused and concrete.",
        }
    }
}

/// Whether `text` contains any Hangul syllable or jamo.
pub fn has_hangul(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
    })
}

/// Character count as applications measure it: every Unicode scalar, spaces included.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Raw question as it appears in run input.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionInput {
    #[serde(alias = "question")]
    pub text: String,
    #[serde(default, rename = "type")]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub char_limit: Option<u32>,
    #[serde(default)]
    pub char_limit_note: Option<String>,
}

/// An immutable application question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    text: String,
    #[serde(rename = "type")]
    question_type: QuestionType,
    char_limit: Option<u32>,
    char_limit_note: String,
}

impl Question {
    /// Explicit type wins over inference; a zero limit means no limit.
    pub fn new(text: impl Into<String>, explicit: Option<QuestionType>, char_limit: Option<u32>) -> Self {
        let text = text.into();
        let question_type = explicit.unwrap_or_else(|| QuestionType::infer(&text));
        let char_limit = char_limit.filter(|n| *n > 0);
        let char_limit_note = char_limit
            .map(|n| format!("within {n} characters including spaces"))
            .unwrap_or_default();
        Self {
            text,
            question_type,
            char_limit,
            char_limit_note,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        let note = note.into();
        if !note.trim().is_empty() {
            self.char_limit_note = note;
        }
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn char_limit(&self) -> Option<u32> {
        self.char_limit
    }

    pub fn char_limit_note(&self) -> &str {
        &self.char_limit_note
    }

    pub fn length_band(&self) -> LengthBand {
        LengthBand::for_limit(self.char_limit)
    }

    /// Question text followed by the type's expansion keywords, in the
    /// question's own script.
    pub fn retrieval_query(&self) -> String {
        let mut query = self.text.clone();
        for kw in self.question_type.expansion_keywords(has_hangul(&self.text)) {
            query.push(' ');
            query.push_str(kw);
        }
        query
    }

    /// `Some(count)` when `text` is over this question's limit.
    pub fn exceeds_limit(&self, text: &str) -> Option<usize> {
        let count = char_count(text);
        match self.char_limit {
            Some(limit) if count > limit as usize => Some(count),
            _ => None,
        }
    }
}

impl From<QuestionInput> for Question {
    fn from(raw: QuestionInput) -> Self {
        let q = Question::new(raw.text, raw.question_type, raw.char_limit);
        match raw.char_limit_note {
            Some(note) => q.with_note(note),
            None => q,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_motivation() {
        assert_eq!(
            QuestionType::infer("Why do you want to join our company?"),
            QuestionType::Motivation
        );
    }

    #[test]
    fn infer_problem_solving() {
        assert_eq!(
            QuestionType::infer("Describe a difficult problem you overcame."),
            QuestionType::ProblemSolving
        );
    }

    #[test]
    fn infer_experience() {
        assert_eq!(
            QuestionType::infer("Tell us about a project you are proud of"),
            QuestionType::Experience
        );
    }

    #[test]
    fn infer_leadership() {
        assert_eq!(
            QuestionType::infer("When did you lead others?"),
            QuestionType::Leadership
        );
    }

    #[test]
    fn infer_why_us_is_motivation() {
        assert_eq!(QuestionType::infer("Why us?"), QuestionType::Motivation);
        assert_eq!(
            QuestionType::infer("Why this company and not another?"),
            QuestionType::Motivation
        );
    }

    #[test]
    fn infer_korean_questions() {
        let cases = [
            ("지원 동기를 작성해 주세요", QuestionType::Motivation),
            ("가장 자랑스러운 프로젝트 경험을 소개해 주세요", QuestionType::Experience),
            ("어려움을 극복한 사례를 설명해 주세요", QuestionType::ProblemSolving),
            ("본인의 가치관과 원칙을 서술하시오", QuestionType::Values),
            ("본인의 기술 역량과 강점을 작성해 주세요", QuestionType::Skills),
            ("팀을 이끌었던 리더십 경험을 작성해 주세요", QuestionType::Leadership),
            ("입사 후 성장 계획과 목표를 작성해 주세요", QuestionType::Growth),
        ];
        for (text, expected) in cases {
            assert_eq!(QuestionType::infer(text), expected, "{text}");
        }
    }

    #[test]
    fn korean_query_expands_with_korean_terms() {
        let q = Question::new("지원 동기를 작성해 주세요", None, Some(500));
        assert_eq!(q.question_type(), QuestionType::Motivation);
        assert_eq!(
            q.retrieval_query(),
            "지원 동기를 작성해 주세요 동기 이유 목표 비전 열정"
        );
    }

    #[test]
    fn hangul_detection() {
        assert!(has_hangul("Rust 경험"));
        assert!(!has_hangul("Rust experience"));
    }

    #[test]
    fn infer_no_keywords_defaults_to_other() {
        assert_eq!(QuestionType::infer("Anything else?"), QuestionType::Other);
    }

    #[test]
    fn explicit_type_wins() {
        let q = Question::new("Why do you want to join?", Some(QuestionType::Values), None);
        assert_eq!(q.question_type(), QuestionType::Values);
    }

    #[test]
    fn zero_limit_means_no_limit() {
        let q = Question::new("Tell us about yourself", None, Some(0));
        assert_eq!(q.char_limit(), None);
        assert_eq!(q.length_band(), LengthBand::Open);
        assert!(q.char_limit_note().is_empty());
    }

    #[test]
    fn length_bands() {
        assert_eq!(LengthBand::for_limit(Some(300)), LengthBand::VeryTight);
        assert_eq!(LengthBand::for_limit(Some(301)), LengthBand::Tight);
        assert_eq!(LengthBand::for_limit(Some(1000)), LengthBand::Moderate);
        assert_eq!(LengthBand::for_limit(Some(1500)), LengthBand::Roomy);
        assert_eq!(LengthBand::for_limit(Some(1501)), LengthBand::Open);
    }

    #[test]
    fn char_count_counts_scalars_with_spaces() {
        assert_eq!(char_count("a b"), 3);
        assert_eq!(char_count("지원 동기"), 5);
    }

    #[test]
    fn exceeds_limit_reports_count() {
        let q = Question::new("Why us?", None, Some(5));
        assert_eq!(q.exceeds_limit("12345"), None);
        assert_eq!(q.exceeds_limit("123456"), Some(6));
    }

    #[test]
    fn retrieval_query_appends_type_keywords() {
        let q = Question::new("Which skills fit this role?", None, None);
        assert_eq!(q.question_type(), QuestionType::Skills);
        assert_eq!(
            q.retrieval_query(),
            "Which skills fit this role? skills technology expertise"
        );
    }

    #[test]
    fn question_input_accepts_question_alias() {
        let raw: QuestionInput = serde_json::from_str(
            r#"{"question": "Why us?", "char_limit": 800, "char_limit_note": "800 incl. spaces"}"#,
        )
        .unwrap();
        let q = Question::from(raw);
        assert_eq!(q.text(), "Why us?");
        assert_eq!(q.char_limit(), Some(800));
        assert_eq!(q.char_limit_note(), "800 incl. spaces");
    }
}
