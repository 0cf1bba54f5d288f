//! Regex heuristics deciding what to remember and what counts as a
//! question about remembered things.

use std::sync::LazyLock;

use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static MEMORY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b\w+\s+should\s+\w+",
        r"\b\w+\s+will\s+\w+",
        r"\b\w+\s+needs\s+to\s+\w+",
        r"\b\w+\s+has\s+to\s+\w+",
        r"\b\w+\s+(at|on|by)\s+\d",
        r"\b\w+\s+is\s+\w+",
        r"\b\w+\s+likes\s+\w+",
        r"\b\w+\s+works\s+(at|in)\s+\w+",
        r"\b\w+'s\s+\w+",
        r"\bremember\s+",
        r"\bnote\s+",
        r"\b\d{1,2}:\d{2}\s*(am|pm)?",
        r"\b\d{1,2}\s*(am|pm)\b",
        r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)",
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)",
    ])
});

static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"what\s+time\s+",
        r"when\s+(should|will|does|did)",
        r"where\s+(is|does|should|will)",
        r"who\s+(is|does|should|will)",
        r"how\s+(much|many|often)",
        r"what\s+(is|does|should)",
        r"tell\s+me\s+about",
        r"do\s+you\s+know",
        r"what\s+do\s+you\s+remember",
    ])
});

static SCHEDULE_STATEMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(\w+) should go at (.+)").ok());
static SCHEDULE_QUESTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^when should (\w+) go").ok());
static PERSON_QUESTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^who is (\w+)").ok());
static CLOCK_TIME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s*(pm|am)").ok());

pub fn is_statement_worth_remembering(text: &str) -> bool {
    if text.trim().chars().count() < 5 {
        return false;
    }
    let lower = text.to_lowercase();
    MEMORY_PATTERNS.iter().any(|re| re.is_match(&lower))
}

/// Schedule and person questions qualify without a question mark; the
/// broader keyword patterns need one.
pub fn is_question_seeking_memory(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.starts_with("when should") || lower.contains("what time") {
        return true;
    }
    if parse_person_question(text).is_some() {
        return true;
    }
    if !text.contains('?') {
        return false;
    }
    QUESTION_PATTERNS.iter().any(|re| re.is_match(&lower))
}

/// `"Tommy should go at 2pm"` → `("tommy", "2pm")`.
pub fn parse_schedule_statement(text: &str) -> Option<(String, String)> {
    let caps = SCHEDULE_STATEMENT.as_ref()?.captures(text)?;
    let name = caps.get(1)?.as_str().trim().to_lowercase();
    let time = caps.get(2)?.as_str().trim().to_string();
    Some((name, time))
}

/// `"When should Tommy go?"` → `"tommy"`.
pub fn parse_schedule_question(text: &str) -> Option<String> {
    let caps = SCHEDULE_QUESTION.as_ref()?.captures(text)?;
    Some(caps.get(1)?.as_str().trim().to_lowercase())
}

/// `"Who is Jeanne?"` → `"jeanne"`.
pub fn parse_person_question(text: &str) -> Option<String> {
    let caps = PERSON_QUESTION.as_ref()?.captures(text)?;
    Some(caps.get(1)?.as_str().trim().to_lowercase())
}

/// First `"<h> am|pm"` in the text, rendered `"2 pm"`.
pub fn extract_clock_time(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let caps = CLOCK_TIME.as_ref()?.captures(&lower)?;
    Some(format!("{} {}", caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// `"tommy"` → `"Tommy"`.
pub fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_statements_are_worth_remembering() {
        assert!(is_statement_worth_remembering("Tommy should go at 2pm"));
        assert!(is_statement_worth_remembering("Alice likes green tea"));
        assert!(is_statement_worth_remembering("Bob works at the bakery"));
        assert!(is_statement_worth_remembering("meeting on Friday"));
        assert!(is_statement_worth_remembering("standup 9:30"));
    }

    #[test]
    fn short_or_plain_text_is_not_remembered() {
        assert!(!is_statement_worth_remembering("hi"));
        assert!(!is_statement_worth_remembering("    ok    "));
        assert!(!is_statement_worth_remembering("hello there"));
    }

    #[test]
    fn schedule_and_person_questions_need_no_question_mark() {
        assert!(is_question_seeking_memory("When should Tommy go"));
        assert!(is_question_seeking_memory("remind me what time it starts"));
        assert!(is_question_seeking_memory("who is jeanne"));
    }

    #[test]
    fn keyword_questions_require_question_mark() {
        assert!(is_question_seeking_memory("Do you know where Alice works?"));
        assert!(!is_question_seeking_memory("do you know where Alice works"));
        assert!(!is_question_seeking_memory("Nice weather?"));
    }

    #[test]
    fn parses_schedule_statement_case_insensitively() {
        assert_eq!(
            parse_schedule_statement("TOMMY Should Go At 2pm"),
            Some(("tommy".to_string(), "2pm".to_string()))
        );
        assert_eq!(parse_schedule_statement("Tommy might go at 2pm"), None);
    }

    #[test]
    fn parses_questions() {
        assert_eq!(parse_schedule_question("When should Tommy go?"), Some("tommy".to_string()));
        assert_eq!(parse_person_question("Who is Jeanne?"), Some("jeanne".to_string()));
        assert_eq!(parse_person_question("Tell me who is Jeanne"), None);
    }

    #[test]
    fn extracts_clock_time() {
        assert_eq!(extract_clock_time("Tommy should go at 2PM"), Some("2 pm".to_string()));
        assert_eq!(extract_clock_time("Tommy should go at 11 am"), Some("11 am".to_string()));
        assert_eq!(extract_clock_time("Tommy should go soon"), None);
    }

    #[test]
    fn title_cases_single_words() {
        assert_eq!(title_case("tommy"), "Tommy");
        assert_eq!(title_case("JEANNE"), "Jeanne");
        assert_eq!(title_case(""), "");
    }
}
