//! Verdict categories and the terminal verdict artifact

use crate::message::AgentRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fixed marker that introduces the final verdict line
pub const FINAL_VERDICT_MARKER: &str = "FINAL VERDICT";

/// Categorical judgment carried by a verdict or a specialist assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictCategory {
    Strong,
    Mixed,
    Poor,
}

impl VerdictCategory {
    pub const ALL: [VerdictCategory; 3] = [
        VerdictCategory::Strong,
        VerdictCategory::Mixed,
        VerdictCategory::Poor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VerdictCategory::Strong => "STRONG",
            VerdictCategory::Mixed => "MIXED",
            VerdictCategory::Poor => "POOR",
        }
    }

    /// Signed weight used when combining assessments
    pub fn score(self) -> i32 {
        match self {
            VerdictCategory::Strong => 1,
            VerdictCategory::Mixed => 0,
            VerdictCategory::Poor => -1,
        }
    }

    /// Category for a net score: positive is strong, negative is poor
    pub fn from_score(score: i32) -> Self {
        match score.signum() {
            1 => VerdictCategory::Strong,
            -1 => VerdictCategory::Poor,
            _ => VerdictCategory::Mixed,
        }
    }

    /// Last upper-case category word in free text
    ///
    /// Matches `STRONG`, `MIXED`, `POOR` and the aliases `GOOD`, `NEUTRAL`.
    /// Lower-case words are ignored so prose such as "good news" does not
    /// count as a judgment.
    pub fn find_in(text: &str) -> Option<Self> {
        text.split(|c: char| !c.is_ascii_alphabetic())
            .filter(|word| !word.is_empty() && word.chars().all(|c| c.is_ascii_uppercase()))
            .filter_map(|word| word.parse().ok())
            .last()
    }

    /// Category named right after the final verdict marker
    pub fn from_marker(text: &str) -> Option<Self> {
        let start = text.rfind(FINAL_VERDICT_MARKER)? + FINAL_VERDICT_MARKER.len();
        let rest = text[start..].trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        let word: String = rest.chars().take_while(char::is_ascii_alphabetic).collect();
        word.parse().ok()
    }
}

impl FromStr for VerdictCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRONG" | "GOOD" => Ok(VerdictCategory::Strong),
            "MIXED" | "NEUTRAL" => Ok(VerdictCategory::Mixed),
            "POOR" => Ok(VerdictCategory::Poor),
            other => Err(format!("unknown verdict category: {other}")),
        }
    }
}

impl fmt::Display for VerdictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final synthesized judgment of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub run_id: Uuid,
    pub ticker: String,
    pub category: VerdictCategory,

    /// Orchestrator synthesis, always containing the marker line
    pub text: String,

    /// Specialists whose data fetches failed during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<AgentRole>,

    /// Turns taken to reach the verdict
    pub turns: usize,

    pub produced_at: DateTime<Utc>,
}

impl Verdict {
    /// Build a verdict, normalizing the text so it ends with the marker line
    /// for `category` and mentions every degraded specialist.
    ///
    /// Text that already does both is kept as written. A marker naming a
    /// different category is replaced.
    pub fn new(
        run_id: Uuid,
        ticker: impl Into<String>,
        category: VerdictCategory,
        text: &str,
        degraded: Vec<AgentRole>,
        turns: usize,
    ) -> Self {
        let mut text = text.trim().to_string();

        let unreported: Vec<&str> = degraded
            .iter()
            .map(|role| data_label(*role))
            .filter(|label| !reports_unavailable(&text, label))
            .collect();
        let marker_matches = VerdictCategory::from_marker(&text) == Some(category);

        if !marker_matches || !unreported.is_empty() {
            let mut body = text
                .lines()
                .filter(|line| !line.contains(FINAL_VERDICT_MARKER))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();

            if !unreported.is_empty() {
                if !body.is_empty() {
                    body.push_str("\n\n");
                }
                body.push_str(&format!(
                    "Note: {} data was unavailable for this run.",
                    unreported.join(" and ")
                ));
            }
            if !body.is_empty() {
                body.push_str("\n\n");
            }
            body.push_str(&Self::marker_line(category));
            text = body;
        }

        Self {
            run_id,
            ticker: ticker.into(),
            category,
            text,
            degraded,
            turns,
            produced_at: Utc::now(),
        }
    }

    /// Canonical marker line for a category
    pub fn marker_line(category: VerdictCategory) -> String {
        format!("{FINAL_VERDICT_MARKER}: {category} performance")
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Whether some sentence of `text` says `label` data is unavailable
fn reports_unavailable(text: &str, label: &str) -> bool {
    text.to_ascii_lowercase()
        .split(['.', '!', '\n'])
        .any(|sentence| sentence.contains(label) && sentence.contains("unavailable"))
}

fn data_label(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Sentiment => "sentiment",
        AgentRole::Technical => "technical",
        AgentRole::Orchestrator => "orchestrator",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_aliases() {
        assert_eq!("poor".parse::<VerdictCategory>(), Ok(VerdictCategory::Poor));
        assert_eq!("GOOD".parse::<VerdictCategory>(), Ok(VerdictCategory::Strong));
        assert_eq!("Neutral".parse::<VerdictCategory>(), Ok(VerdictCategory::Mixed));
        assert!("bullish".parse::<VerdictCategory>().is_err());
    }

    #[test]
    fn test_find_in_uses_last_upper_case_word() {
        let text = "Earlier I thought STRONG, but on balance the company performance is POOR.";
        assert_eq!(VerdictCategory::find_in(text), Some(VerdictCategory::Poor));
        assert_eq!(VerdictCategory::find_in("good news, poor margins"), None);
    }

    #[test]
    fn test_from_marker() {
        let text = "Summary...\nFINAL VERDICT: Poor performance";
        assert_eq!(VerdictCategory::from_marker(text), Some(VerdictCategory::Poor));
        assert_eq!(
            VerdictCategory::from_marker("FINAL VERDICT:MIXED"),
            Some(VerdictCategory::Mixed)
        );
        assert_eq!(VerdictCategory::from_marker("no marker, STRONG"), None);
    }

    #[test]
    fn test_score_round_trip() {
        assert_eq!(VerdictCategory::from_score(2), VerdictCategory::Strong);
        assert_eq!(VerdictCategory::from_score(0), VerdictCategory::Mixed);
        assert_eq!(
            VerdictCategory::from_score(VerdictCategory::Poor.score()),
            VerdictCategory::Poor
        );
    }

    #[test]
    fn test_verdict_appends_marker_and_degradation_note() {
        let verdict = Verdict::new(
            Uuid::new_v4(),
            "AAPL",
            VerdictCategory::Mixed,
            "Sentiment is balanced.",
            vec![AgentRole::Technical],
            7,
        );

        assert!(verdict.text.contains("technical data was unavailable"));
        assert!(verdict.text.ends_with("FINAL VERDICT: MIXED performance"));
        assert!(verdict.is_degraded());
    }

    #[test]
    fn test_verdict_notes_each_unreported_specialist() {
        let verdict = Verdict::new(
            Uuid::new_v4(),
            "AAPL",
            VerdictCategory::Poor,
            "Sentiment data was unavailable. Technicals show a death cross.",
            vec![AgentRole::Sentiment, AgentRole::Technical],
            7,
        );

        assert!(verdict.text.contains("Sentiment data was unavailable"));
        assert!(verdict.text.contains("Note: technical data was unavailable"));
        assert!(!verdict.text.contains("Note: sentiment"));
        assert!(verdict.text.ends_with("FINAL VERDICT: POOR performance"));
    }

    #[test]
    fn test_verdict_marker_follows_category() {
        let verdict = Verdict::new(
            Uuid::new_v4(),
            "AAPL",
            VerdictCategory::Poor,
            "Both bullish.\nFINAL VERDICT: STRONG performance",
            Vec::new(),
            7,
        );

        assert_eq!(
            VerdictCategory::from_marker(&verdict.text),
            Some(VerdictCategory::Poor)
        );
        assert_eq!(verdict.text, "Both bullish.\n\nFINAL VERDICT: POOR performance");
    }

    #[test]
    fn test_verdict_keeps_existing_marker() {
        let text = "Technical data was unavailable.\nFINAL VERDICT: POOR performance";
        let verdict = Verdict::new(
            Uuid::new_v4(),
            "AAPL",
            VerdictCategory::Poor,
            text,
            vec![AgentRole::Technical],
            7,
        );
        assert_eq!(verdict.text, text);
    }
}
