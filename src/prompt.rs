//! Prompt assembly for debate turns and judging. Pure and deterministic;
//! nothing in here performs I/O.

use crate::llm::ChatMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub title: String,
    pub description: Option<String>,
}

impl Topic {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
        }
    }
}

/// Turns 1-2 are round 1, 3-4 round 2, 5-6 round 3.
pub fn round_for_turn(turn: u32) -> u32 {
    turn.div_ceil(2)
}

fn round_tone(round: u32) -> &'static str {
    match round {
        1 => "Stay focused and competitive, but keep it respectful — this is the opening round.",
        2 => "Escalate. Be aggressive and dismissive of your opponent's argument.",
        _ => "Lose all restraint. Be irrational, insulting and absurd; profanity is permitted.",
    }
}

/// System prompt for one debate turn.
pub fn turn_system_prompt(
    active: &str,
    opponent: &str,
    topic: &Topic,
    is_pro: bool,
    current_turn: u32,
    max_chars: usize,
) -> String {
    let stance = if is_pro { "FOR" } else { "AGAINST" };
    let round = round_for_turn(current_turn);
    let description = topic
        .description
        .as_deref()
        .map(|d| format!(" {d}"))
        .unwrap_or_default();

    format!(
        r#"You are {active}, a legendary rapper in a head-to-head rap debate against {opponent}.

The topic: "{title}".{description}
You are arguing {stance} the topic. Never switch sides.

Deliver one spoken rap verse. Your verse must directly counter the last sentence of {opponent}'s most recent turn — pick it apart before making your own point.

This is round {round} of 3. {tone}

Keep your verse under {max_chars} characters. Plain spoken text only, no stage directions. Stay in character as {active} at all times."#,
        title = topic.title,
        tone = round_tone(round),
    )
}

/// Map debate history to chat roles for the active persona.
///
/// The model is always prompted as if it *is* the active persona: entries it
/// spoke become `assistant`, the opponent's become `user`. History index `i`
/// belongs to the pro persona iff `i` is even, so the sequence always ends on
/// a `user` message (the opponent's latest turn), except before turn 1 where
/// there is no history at all.
pub fn turn_messages(history: &[String], is_pro: bool) -> Vec<ChatMessage> {
    history
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let spoken_by_pro = i % 2 == 0;
            if spoken_by_pro == is_pro {
                ChatMessage::assistant(text.clone())
            } else {
                ChatMessage::user(text.clone())
            }
        })
        .collect()
}

/// System prompt for the judge call, demanding the fixed line format the
/// parser understands.
pub fn judge_system_prompt(pro: &str, con: &str, topic: &Topic) -> String {
    format!(
        r#"You are the impartial judge of a rap debate between {pro} (arguing FOR) and {con} (arguing AGAINST) on the topic "{title}".

Score each rapper from 1 to 5 on four dimensions: Logic (strength of argument), Sentiment (crowd appeal), Adherence (staying on topic), and Rebuttal (countering the opponent). Rapper1 is {pro}. Rapper2 is {con}.

Respond in exactly this format, one item per line, nothing else:
Reasoning: <one short paragraph explaining your scoring>
Rapper1_Logic: <1-5>
Rapper2_Logic: <1-5>
Rapper1_Sentiment: <1-5>
Rapper2_Sentiment: <1-5>
Rapper1_Adherence: <1-5>
Rapper2_Adherence: <1-5>
Rapper1_Rebuttal: <1-5>
Rapper2_Rebuttal: <1-5>"#,
        title = topic.title,
    )
}

/// The full transcript as a single user message, one labeled line per turn.
pub fn judge_user_message(history: &[String], pro: &str, con: &str) -> String {
    let mut lines = vec!["Here is the full debate transcript:".to_string()];
    for (i, text) in history.iter().enumerate() {
        let speaker = if i % 2 == 0 { pro } else { con };
        lines.push(format!("Turn {} ({speaker}): {text}", i + 1));
    }
    lines.join("\n\n")
}

/// Normalize model output so a spoken verse reads naturally in the UI and
/// through TTS: strip markdown headings, list markers and emphasis, then
/// collapse everything to a single paragraph.
pub fn normalize_spoken_text(text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for raw_line in text.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        while let Some(rest) = line.strip_prefix('#') {
            line = rest.trim_start();
        }

        if let Some(rest) = line.strip_prefix("- ") {
            line = rest.trim_start();
        } else if let Some(rest) = line.strip_prefix("* ") {
            line = rest.trim_start();
        } else if let Some(rest) = line.strip_prefix("• ") {
            line = rest.trim_start();
        }

        if let Some(dot_pos) = line.find(". ") {
            if !line[..dot_pos].is_empty() && line[..dot_pos].chars().all(|c| c.is_ascii_digit()) {
                line = line[dot_pos + 2..].trim_start();
            }
        }

        let cleaned = line.replace("**", "").replace("__", "").replace('`', "");
        if !cleaned.is_empty() {
            parts.push(cleaned);
        }
    }

    let compact = parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if compact.is_empty() {
        text.trim().to_string()
    } else {
        compact
    }
}
