//! Parsing of the judge model's line-structured verdict. Pure and
//! deterministic; exhaustively unit-tested and never mixed with I/O.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const DEFAULT_REASONING: &str = "The judge did not explain the scoring.";

const MIN_SCORE: i64 = 1;
const MAX_SCORE: i64 = 5;

/// One persona's four scored dimensions, each in `[1,5]`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PersonaScores {
    pub logic: u8,
    pub sentiment: u8,
    pub adherence: u8,
    pub rebuttal: u8,
}

impl PersonaScores {
    pub fn total(&self) -> u32 {
        self.logic as u32 + self.sentiment as u32 + self.adherence as u32 + self.rebuttal as u32
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Rubric {
    pub pro: PersonaScores,
    pub con: PersonaScores,
}

impl Rubric {
    /// Render the canonical line template the judge is asked for. Parsing
    /// the result yields this rubric back.
    pub fn to_canonical_string(&self, reasoning: &str) -> String {
        format!(
            "Reasoning: {reasoning}\n\
             Rapper1_Logic: {}\nRapper2_Logic: {}\n\
             Rapper1_Sentiment: {}\nRapper2_Sentiment: {}\n\
             Rapper1_Adherence: {}\nRapper2_Adherence: {}\n\
             Rapper1_Rebuttal: {}\nRapper2_Rebuttal: {}",
            self.pro.logic,
            self.con.logic,
            self.pro.sentiment,
            self.con.sentiment,
            self.pro.adherence,
            self.con.adherence,
            self.pro.rebuttal,
            self.con.rebuttal,
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum Winner {
    /// A real persona won; outcome gets recorded against the store.
    Persona(String),
    Draw,
    /// The judge answered but one or more scores were missing or invalid.
    StatsError,
    /// The judge response could not be parsed at all.
    ErrorParsing,
    /// The judge call itself failed.
    ErrorJudging,
}

impl Winner {
    pub fn label(&self) -> &str {
        match self {
            Winner::Persona(name) => name,
            Winner::Draw => "Draw",
            Winner::StatsError => "StatsError",
            Winner::ErrorParsing => "ErrorParsing",
            Winner::ErrorJudging => "ErrorJudging",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub winner: Winner,
    pub reasoning: String,
    pub rubric: Option<Rubric>,
}

impl Judgment {
    pub fn judging_failed(detail: &str) -> Self {
        Self {
            winner: Winner::ErrorJudging,
            reasoning: format!("Judging failed: {detail}"),
            rubric: None,
        }
    }
}

/// Parse the judge's raw response.
///
/// Lines are trimmed and collected as case-insensitive `Key: Value` pairs;
/// anything without a colon is ignored. All eight score keys must parse as
/// integers (clamped to `[1,5]`) for a winner or draw to be declared;
/// otherwise the verdict is `StatsError` with whatever reasoning survived.
pub fn parse_judgment(raw: &str, pro_name: &str, con_name: &str) -> Judgment {
    if raw.trim().is_empty() {
        return Judgment {
            winner: Winner::ErrorParsing,
            reasoning: DEFAULT_REASONING.to_string(),
            rubric: None,
        };
    }

    let mut pairs: HashMap<String, String> = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if let Some(colon) = line.find(':') {
            let key = line[..colon].trim().to_ascii_lowercase();
            let value = line[colon + 1..].trim().to_string();
            pairs.entry(key).or_insert(value);
        }
    }

    let reasoning = pairs
        .get("reasoning")
        .filter(|r| !r.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_REASONING.to_string());

    let score = |key: &str| -> Option<u8> {
        pairs
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|n| n.clamp(MIN_SCORE, MAX_SCORE) as u8)
    };

    let scores = (
        score("rapper1_logic"),
        score("rapper1_sentiment"),
        score("rapper1_adherence"),
        score("rapper1_rebuttal"),
        score("rapper2_logic"),
        score("rapper2_sentiment"),
        score("rapper2_adherence"),
        score("rapper2_rebuttal"),
    );

    let (
        Some(p_logic),
        Some(p_sentiment),
        Some(p_adherence),
        Some(p_rebuttal),
        Some(c_logic),
        Some(c_sentiment),
        Some(c_adherence),
        Some(c_rebuttal),
    ) = scores
    else {
        return Judgment {
            winner: Winner::StatsError,
            reasoning,
            rubric: None,
        };
    };

    let rubric = Rubric {
        pro: PersonaScores {
            logic: p_logic,
            sentiment: p_sentiment,
            adherence: p_adherence,
            rebuttal: p_rebuttal,
        },
        con: PersonaScores {
            logic: c_logic,
            sentiment: c_sentiment,
            adherence: c_adherence,
            rebuttal: c_rebuttal,
        },
    };

    let winner = match rubric.pro.total().cmp(&rubric.con.total()) {
        std::cmp::Ordering::Greater => Winner::Persona(pro_name.to_string()),
        std::cmp::Ordering::Less => Winner::Persona(con_name.to_string()),
        std::cmp::Ordering::Equal => Winner::Draw,
    };

    Judgment {
        winner,
        reasoning,
        rubric: Some(rubric),
    }
}
