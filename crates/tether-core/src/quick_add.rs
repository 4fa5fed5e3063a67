//! Quick-add text parsing.
//!
//! Turns one line of natural text ("Can you share the deck tomorrow 10?")
//! into a follow-up kind, an action verb, and a due time. This is an
//! ordered-rule heuristic, not linguistic analysis: rules run top to
//! bottom, the first hit wins, and behavior is defined entirely by the
//! rule list.

use chrono::{DateTime, Local, Weekday};
use regex::Regex;

use crate::dates::{next_weekday_at, to_24_hour, today_at, tomorrow_at};
use crate::followup::FollowUpKind;

/// Phrases meaning the user asked somebody else for something.
const REQUEST_MARKERS: [&str; 6] = [
    "can you",
    "could you",
    "please",
    "pls",
    "when can you",
    "share the",
];

/// Phrases meaning the user committed to act themselves.
const COMMITMENT_MARKERS: [&str; 5] = ["i'll", "i will", "i can", "got it", "i shall"];

/// Action verbs, scanned in order; the first whole-word hit wins.
const VERBS: [&str; 12] = [
    "send",
    "share",
    "invoice",
    "deck",
    "call",
    "pay",
    "submit",
    "status",
    "update",
    "follow up",
    "remind",
    "ping",
];

/// Verb used when nothing from the vocabulary appears.
const DEFAULT_VERB: &str = "follow up";

/// Wall-clock hour for "tonight".
const TONIGHT_HOUR: u32 = 21;

/// Wall-clock hour for "kal shaam" / "tomorrow evening".
const TOMORROW_EVENING_HOUR: u32 = 19;

/// What a quick-add line parsed into.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIntent {
    pub kind: FollowUpKind,
    pub verb: &'static str,
    pub due_at: DateTime<Local>,
}

/// Parser for the quick-add box.
///
/// Compiles its patterns once; construct a single instance and reuse it.
pub struct QuickAddParser {
    verb_patterns: Vec<(&'static str, Regex)>,
    eod: Regex,
    eow: Regex,
    next_weekday: Regex,
}

impl QuickAddParser {
    /// Creates a parser with the built-in vocabulary.
    pub fn new() -> Self {
        let verb_patterns = VERBS
            .iter()
            .map(|verb| {
                let pattern = Regex::new(&format!(r"\b{}\b", verb)).expect("Invalid verb pattern");
                (*verb, pattern)
            })
            .collect();

        Self {
            verb_patterns,
            // Whole words only: "eods" is not end-of-day.
            eod: Regex::new(r"\beod\b").expect("Invalid eod pattern"),
            eow: Regex::new(r"\beow\b").expect("Invalid eow pattern"),
            next_weekday: Regex::new(
                r"\bnext\s+(monday|mon|tuesday|tues|tue|wednesday|wed|thursday|thurs|thur|thu|friday|fri|saturday|sat|sunday|sun)\b",
            )
            .expect("Invalid weekday pattern"),
        }
    }

    /// Parses a quick-add line against `now`'s local calendar.
    ///
    /// `eod_hour` and `morning_hour` are the caller's notions of "end of
    /// day" and "morning". Returns `None` when no due-time rule matches;
    /// the caller picks its own default in that case.
    pub fn parse(
        &self,
        text: &str,
        now: DateTime<Local>,
        eod_hour: u32,
        morning_hour: u32,
    ) -> Option<ParsedIntent> {
        let text = text.to_lowercase();
        let kind = explicit_kind(&text).unwrap_or(FollowUpKind::DoIt);
        let verb = self.find_verb(&text);
        let due_at = self.resolve_due_time(&text, now, eod_hour, morning_hour)?;
        Some(ParsedIntent { kind, verb, due_at })
    }

    fn find_verb(&self, text: &str) -> &'static str {
        for (verb, pattern) in &self.verb_patterns {
            if pattern.is_match(text) {
                return verb;
            }
        }
        DEFAULT_VERB
    }

    /// Applies the due-time rules in order. The order is load-bearing:
    /// "eod tomorrow" must resolve through eod, to today.
    fn resolve_due_time(
        &self,
        text: &str,
        now: DateTime<Local>,
        eod_hour: u32,
        morning_hour: u32,
    ) -> Option<DateTime<Local>> {
        if self.eod.is_match(text) || text.contains("end of day") {
            return Some(today_at(now, eod_hour, 0));
        }

        if self.eow.is_match(text) || text.contains("end of week") {
            return Some(next_weekday_at(now, Weekday::Fri, eod_hour, 0));
        }

        if text.contains("tonight") {
            return Some(today_at(now, TONIGHT_HOUR, 0));
        }

        if text.contains("tomorrow")
            || text.contains("tmrw")
            || text.contains("tmr")
            || text.contains("kal ")
        {
            let (hour, minute) = if let Some(time) = extract_time_token(text) {
                time
            } else if text.contains("kal subah") || text.contains("tomorrow morning") {
                (morning_hour, 0)
            } else if text.contains("kal shaam") || text.contains("tomorrow evening") {
                (TOMORROW_EVENING_HOUR, 0)
            } else {
                (morning_hour, 0)
            };
            return Some(tomorrow_at(now, hour, minute));
        }

        if let Some(weekday) = self.find_next_weekday(text) {
            let (hour, minute) = extract_time_token(text).unwrap_or((morning_hour, 0));
            return Some(next_weekday_at(now, weekday, hour, minute));
        }

        if let Some((hour_12, minute, is_pm)) = extract_meridiem_time(text) {
            return Some(today_at(now, to_24_hour(hour_12, is_pm), minute));
        }

        None
    }

    fn find_next_weekday(&self, text: &str) -> Option<Weekday> {
        let captures = self.next_weekday.captures(text)?;
        weekday_from_name(captures.get(1)?.as_str())
    }
}

impl Default for QuickAddParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind from explicit phrasing; requests are checked before commitments.
fn explicit_kind(text: &str) -> Option<FollowUpKind> {
    if REQUEST_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Some(FollowUpKind::WaitingOn);
    }
    if COMMITMENT_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Some(FollowUpKind::DoIt);
    }
    None
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    // The weekday pattern only captures names of three letters or more.
    match &name[..3] {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Scans whitespace-separated tokens for a bare hour ("10") or an
/// hour:minute pair ("9:30"). Surrounding punctuation is trimmed so
/// "10?" still counts; tokens with embedded letters ("5pm", "b2b") are
/// not numeric and are skipped. First valid token wins.
fn extract_time_token(text: &str) -> Option<(u32, u32)> {
    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| c.is_ascii_punctuation() && c != ':');
        let token = token.trim_matches(':');
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit() || c == ':') {
            continue;
        }

        if let Some((hour, minute)) = token.split_once(':') {
            if let (Ok(hour), Ok(minute)) = (hour.parse::<u32>(), minute.parse::<u32>()) {
                if hour <= 23 && minute <= 59 {
                    return Some((hour, minute));
                }
            }
        } else if let Ok(hour) = token.parse::<u32>() {
            if hour <= 23 {
                return Some((hour, 0));
            }
        }
    }
    None
}

/// Finds an "<h>[:mm] am/pm" reading: strips whitespace, locates the first
/// "am"/"pm" substring, then walks back over digits and ':' to isolate the
/// number. A marker with no digits in front (the "am" in "amount") or an
/// hour outside 1-12 yields nothing.
fn extract_meridiem_time(text: &str) -> Option<(u32, u32, bool)> {
    let squashed: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    let (index, is_pm) = match (squashed.find("am"), squashed.find("pm")) {
        (Some(am), Some(pm)) if am < pm => (am, false),
        (Some(_), Some(pm)) => (pm, true),
        (Some(am), None) => (am, false),
        (None, Some(pm)) => (pm, true),
        (None, None) => return None,
    };

    let digits: Vec<char> = squashed[..index]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == ':')
        .collect();
    let prefix: String = digits.into_iter().rev().collect();
    let prefix = prefix.trim_matches(':');
    if prefix.is_empty() {
        return None;
    }

    let (hour_12, minute) = match prefix.split_once(':') {
        Some((hour, minute)) => (hour.parse::<u32>().ok()?, minute.parse::<u32>().ok()?),
        None => (prefix.parse::<u32>().ok()?, 0),
    };
    if !(1..=12).contains(&hour_12) || minute > 59 {
        return None;
    }
    Some((hour_12, minute, is_pm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    const EOD_HOUR: u32 = 18;
    const MORNING_HOUR: u32 = 9;

    // 2026-06-01 is a Monday.
    fn monday_morning() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, 1, 10, 30, 0).unwrap()
    }

    fn parse(text: &str) -> Option<ParsedIntent> {
        QuickAddParser::new().parse(text, monday_morning(), EOD_HOUR, MORNING_HOUR)
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // ==================== Kind Classification Tests ====================

    #[test]
    fn request_phrasing_means_waiting_on() {
        for text in [
            "can you send it tonight",
            "could you call me tonight",
            "please submit tonight",
            "pls ping me tonight",
            "when can you share it? tonight",
        ] {
            let parsed = parse(text).unwrap();
            assert_eq!(parsed.kind, FollowUpKind::WaitingOn, "{}", text);
        }
    }

    #[test]
    fn commitment_phrasing_means_do_it() {
        for text in [
            "i'll send it tonight",
            "i will pay tonight",
            "got it, tonight",
            "i shall call tonight",
        ] {
            let parsed = parse(text).unwrap();
            assert_eq!(parsed.kind, FollowUpKind::DoIt, "{}", text);
        }
    }

    #[test]
    fn unmarked_text_defaults_to_do_it() {
        let parsed = parse("ping sam tonight").unwrap();
        assert_eq!(parsed.kind, FollowUpKind::DoIt);
    }

    #[test]
    fn request_marker_wins_over_commitment_marker() {
        let parsed = parse("i'll do it, but can you confirm tonight").unwrap();
        assert_eq!(parsed.kind, FollowUpKind::WaitingOn);
    }

    // ==================== Verb Tests ====================

    #[test]
    fn earlier_vocabulary_entry_wins() {
        // Both "share" and "deck" appear; "share" is scanned first.
        let parsed = parse("share the deck tonight").unwrap();
        assert_eq!(parsed.verb, "share");
    }

    #[test]
    fn verb_matches_whole_words_only() {
        // "payment" must not count as "pay" when "ping" appears as a word.
        let parsed = parse("kal subah ping me for the payment").unwrap();
        assert_eq!(parsed.verb, "ping");
    }

    #[test]
    fn missing_verb_falls_back_to_follow_up() {
        let parsed = parse("talk to them tonight").unwrap();
        assert_eq!(parsed.verb, "follow up");
    }

    // ==================== Due-Time Rule Tests ====================

    #[test]
    fn eod_resolves_to_today_at_eod_hour() {
        let parsed = parse("I'll send the invoice by EOD").unwrap();
        assert_eq!(parsed.kind, FollowUpKind::DoIt);
        assert_eq!(parsed.verb, "send");
        assert_eq!(parsed.due_at, local(2026, 6, 1, 18, 0));
    }

    #[test]
    fn eod_beats_tomorrow() {
        // Precedence, not position: eod wins even written after tomorrow.
        let parsed = parse("tomorrow eod").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 1, 18, 0));
    }

    #[test]
    fn eod_requires_a_whole_word() {
        assert!(parse("finish the eods report").is_none());
    }

    #[test]
    fn end_of_day_phrase_counts_as_eod() {
        let parsed = parse("submit by end of day").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 1, 18, 0));
    }

    #[test]
    fn eow_resolves_to_next_friday() {
        let parsed = parse("wrap this up eow").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 5, 18, 0));
        assert_eq!(parsed.due_at.weekday(), Weekday::Fri);
    }

    #[test]
    fn eow_on_a_friday_rolls_a_week() {
        let friday = local(2026, 6, 5, 10, 0);
        let parsed = QuickAddParser::new()
            .parse("send it by end of week", friday, EOD_HOUR, MORNING_HOUR)
            .unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 12, 18, 0));
    }

    #[test]
    fn tonight_is_nine_pm() {
        let parsed = parse("call mom tonight").unwrap();
        assert_eq!(parsed.verb, "call");
        assert_eq!(parsed.due_at, local(2026, 6, 1, 21, 0));
    }

    #[test]
    fn tomorrow_defaults_to_morning_hour() {
        let parsed = parse("submit the report tmrw").unwrap();
        assert_eq!(parsed.verb, "submit");
        assert_eq!(parsed.due_at, local(2026, 6, 2, 9, 0));
    }

    #[test]
    fn tomorrow_with_numeric_time() {
        let parsed = parse("Can you share the deck tomorrow 10?").unwrap();
        assert_eq!(parsed.kind, FollowUpKind::WaitingOn);
        assert_eq!(parsed.verb, "share");
        assert_eq!(parsed.due_at, local(2026, 6, 2, 10, 0));
    }

    #[test]
    fn tomorrow_with_hour_minute_time() {
        let parsed = parse("status update tomorrow 14:45").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 2, 14, 45));
    }

    #[test]
    fn explicit_time_beats_morning_marker() {
        let parsed = parse("tomorrow morning 11 works").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 2, 11, 0));
    }

    #[test]
    fn kal_subah_is_tomorrow_morning() {
        let parsed = parse("kal subah ping me for the payment").unwrap();
        assert_eq!(parsed.kind, FollowUpKind::DoIt);
        assert_eq!(parsed.due_at, local(2026, 6, 2, 9, 0));
    }

    #[test]
    fn kal_shaam_is_tomorrow_evening() {
        let parsed = parse("kal shaam update the doc").unwrap();
        assert_eq!(parsed.verb, "update");
        assert_eq!(parsed.due_at, local(2026, 6, 2, 19, 0));
    }

    #[test]
    fn tomorrow_evening_phrase() {
        let parsed = parse("call them tomorrow evening").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 2, 19, 0));
    }

    #[test]
    fn next_weekday_with_time() {
        let parsed = parse("pay rent next friday 17:30").unwrap();
        assert_eq!(parsed.verb, "pay");
        assert_eq!(parsed.due_at, local(2026, 6, 5, 17, 30));
    }

    #[test]
    fn next_weekday_abbreviations() {
        let parsed = parse("follow up next tue").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 2, 9, 0));

        let parsed = parse("remind me next thurs").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 4, 9, 0));
    }

    #[test]
    fn next_monday_from_monday_is_a_week_out() {
        let parsed = parse("send it next monday").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 8, 9, 0));
    }

    #[test]
    fn bare_meridiem_time_is_today() {
        let parsed = parse("remind me at 5pm").unwrap();
        assert_eq!(parsed.verb, "remind");
        assert_eq!(parsed.due_at, local(2026, 6, 1, 17, 0));
    }

    #[test]
    fn meridiem_with_minutes() {
        let parsed = parse("call at 5:30 pm").unwrap();
        assert_eq!(parsed.due_at, local(2026, 6, 1, 17, 30));
    }

    #[test]
    fn twelve_am_is_midnight_today() {
        let parsed = parse("submit by 12am").unwrap();
        assert_eq!(parsed.due_at.hour(), 0);
        assert_eq!(parsed.due_at.date_naive(), monday_morning().date_naive());
    }

    #[test]
    fn meridiem_without_leading_digits_fails() {
        // The "am" inside "amount" has no number in front of it.
        assert!(parse("send the amount").is_none());
    }

    #[test]
    fn no_due_signal_returns_none() {
        assert!(parse("send the invoice").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn uppercase_input_is_normalized() {
        let parsed = parse("CALL SAM TONIGHT").unwrap();
        assert_eq!(parsed.verb, "call");
        assert_eq!(parsed.due_at, local(2026, 6, 1, 21, 0));
    }

    // ==================== Token Extraction Tests ====================

    #[test]
    fn time_tokens_trim_punctuation() {
        assert_eq!(extract_time_token("tomorrow 10?"), Some((10, 0)));
        assert_eq!(extract_time_token("around (9:15) then"), Some((9, 15)));
    }

    #[test]
    fn time_tokens_reject_out_of_range_values() {
        assert_eq!(extract_time_token("in 2025 maybe"), None);
        assert_eq!(extract_time_token("at 9:75"), None);
    }

    #[test]
    fn time_tokens_skip_words_with_letters() {
        assert_eq!(extract_time_token("the b2b sync 8"), Some((8, 0)));
        assert_eq!(extract_time_token("tomorrow 5pm"), None);
    }

    #[test]
    fn first_valid_time_token_wins() {
        assert_eq!(extract_time_token("between 99 and 10 or 11"), Some((10, 0)));
    }

    #[test]
    fn meridiem_extraction_prefers_first_marker() {
        assert_eq!(extract_meridiem_time("9am or 5pm"), Some((9, 0, false)));
        assert_eq!(extract_meridiem_time("5:30pm sharp"), Some((5, 30, true)));
    }

    #[test]
    fn meridiem_extraction_rejects_invalid_hours() {
        assert_eq!(extract_meridiem_time("15pm"), None);
        assert_eq!(extract_meridiem_time("0am"), None);
    }
}
