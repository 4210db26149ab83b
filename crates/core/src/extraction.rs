//! Rule-based extraction of business details from customer speech.
//!
//! Every field owns an ordered list of patterns. The first pattern that
//! matches wins; a field with no match stays `None`. Nothing is inferred from
//! context, so the output only ever contains what the customer actually said.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::conversation::{customer_text, ConversationTurn, ExtractedBusinessData};

const NAME_WORDS: &str = r"([A-Z][A-Za-z0-9&'.-]*(?:[ \t]+(?:&[ \t]+)?[A-Z][A-Za-z0-9&'.-]*)*)";
const PERSON: &str = r"([A-Z][a-z'-]+(?:[ \t]+[A-Z][a-z'-]+)?)";
const AMOUNT: &str = r"(\$?\d[\d,]*(?:\.\d+)?(?:[ \t]*(?:k|m|thousand|million|billion)\b)?)";

const MAX_FREE_TEXT_CHARS: usize = 120;

static BUSINESS_NAME: OnceLock<Vec<Regex>> = OnceLock::new();
static CONTACT_NAME: OnceLock<Vec<Regex>> = OnceLock::new();
static OWNER_NAME: OnceLock<Vec<Regex>> = OnceLock::new();
static LOCATION: OnceLock<Vec<Regex>> = OnceLock::new();
static INDUSTRY: OnceLock<Vec<Regex>> = OnceLock::new();
static EMAIL: OnceLock<Vec<Regex>> = OnceLock::new();
static WEBSITE: OnceLock<Vec<Regex>> = OnceLock::new();
static PHONE: OnceLock<Vec<Regex>> = OnceLock::new();
static COMPANY_SIZE: OnceLock<Vec<Regex>> = OnceLock::new();
static REVENUE: OnceLock<Vec<Regex>> = OnceLock::new();
static BUDGET: OnceLock<Vec<Regex>> = OnceLock::new();
static TIMELINE: OnceLock<Vec<Regex>> = OnceLock::new();
static PAIN_POINTS: OnceLock<Vec<Regex>> = OnceLock::new();
static INTERESTS: OnceLock<Vec<Regex>> = OnceLock::new();
static DEFERS_DECISION: OnceLock<Vec<Regex>> = OnceLock::new();
static MAKES_DECISION: OnceLock<Vec<Regex>> = OnceLock::new();

fn business_name_patterns() -> Vec<String> {
    [
        r"(?i:my company is|our company is|my business is|our business is)",
        r"(?i:company is called|business is called|company name is|business name is)",
        r"(?i:i'm calling from|i am calling from|calling from|i own|i run|we run)",
    ]
    .iter()
    .map(|lead| format!(r"{lead}[ \t]+{NAME_WORDS}"))
    .collect()
}

fn contact_name_patterns() -> Vec<String> {
    [r"(?i:my name is|my name's)", r"(?i:this is|i'm|i am|call me)"]
        .iter()
        .map(|lead| format!(r"\b{lead}[ \t]+{PERSON}"))
        .collect()
}

fn owner_name_patterns() -> Vec<String> {
    [r"(?i:the owner is|owner's name is|owned by)", r"(?i:my boss is|the boss is)"]
        .iter()
        .map(|lead| format!(r"\b{lead}[ \t]+{PERSON}"))
        .collect()
}

fn location_patterns() -> Vec<String> {
    vec![
        r"\b(\d{1,6}(?:[ \t]+[A-Z][A-Za-z0-9.']*)+[ \t]+(?i:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|way|court|ct)\b\.?(?:,[ \t]*[A-Z][A-Za-z]+(?:[ \t]+[A-Z][A-Za-z]+)*)?(?:,[ \t]*[A-Z]{2})?)".to_string(),
        r"\b(?i:located in|based in|we're in|we are in|i'm in|i am in|i live in|we're out of|address is)[ \t]+((?:(?:St|Ft|Mt)\.|[A-Z][A-Za-z'-]*)(?:[ \t]+(?:(?:St|Ft|Mt)\.|[A-Z][A-Za-z'-]*))*(?:,[ \t]*[A-Z][A-Za-z]+)?)".to_string(),
    ]
}

fn industry_patterns() -> Vec<String> {
    vec![
        r"\b(?i:we're in the|we are in the|we work in the|i work in the)[ \t]+([A-Za-z][A-Za-z &-]*?)[ \t]+(?i:industry|business|sector|space|field)\b".to_string(),
        r"\b(?i:our industry is|my industry is|industry is)[ \t]+([A-Za-z][A-Za-z &-]*)".to_string(),
    ]
}

fn email_patterns() -> Vec<String> {
    vec![r"([A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,})".to_string()]
}

fn website_patterns() -> Vec<String> {
    vec![
        r"(?i)\b((?:https?://)?(?:www\.)?[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|net|org|io|co|biz|us|info)(?:/[^\s,]*)?)".to_string(),
    ]
}

fn phone_patterns() -> Vec<String> {
    vec![
        r"(\+?1?[ .-]?\(?\d{3}\)?[ .-]?\d{3}[ .-]?\d{4})\b".to_string(),
        r"(\+\d{1,3}[ .-]?\d{2,4}[ .-]?\d{3,4}[ .-]?\d{3,4})\b".to_string(),
    ]
}

fn company_size_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(\d+(?:[ \t]*(?:-|to)[ \t]*\d+)?)[ \t]+(?:employees|people|staff|workers|team members)\b".to_string(),
        r"(?i)\b(small|medium|mid-sized|large)[ \t]+(?:business|company|firm|team)\b".to_string(),
    ]
}

fn revenue_patterns() -> Vec<String> {
    vec![
        format!(r"(?i)\b(?:revenue|sales|turnover)[ \t]+(?:is[ \t]+|of[ \t]+)?(?:around[ \t]+|about[ \t]+)?{AMOUNT}"),
        format!(r"(?i){AMOUNT}[ \t]+(?:in|of)[ \t]+(?:annual[ \t]+)?(?:revenue|sales)\b"),
    ]
}

fn budget_patterns() -> Vec<String> {
    vec![
        format!(r"(?i)\bbudget[ \t]+(?:is[ \t]+)?(?:of[ \t]+)?(?:around[ \t]+|about[ \t]+|roughly[ \t]+)?{AMOUNT}"),
        format!(r"(?i)\b(?:spend|pay)[ \t]+(?:up[ \t]+to|around|about|at[ \t]+most)[ \t]+{AMOUNT}"),
    ]
}

fn timeline_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(asap|as soon as possible|right away|immediately|right now)\b".to_string(),
        r"(?i)\b((?:within|in)[ \t]+(?:a|one|two|three|\d+)[ \t]+(?:hours?|days?|weeks?|months?))\b".to_string(),
        r"(?i)\b(today|tonight|tomorrow|this week|next week|this weekend|this month|next month)\b".to_string(),
    ]
}

fn pain_point_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(?:the problem is|the issue is|our problem is|our issue is|struggling with|frustrated with|having trouble with|problem with|issue with)[ \t]+([^.!?\n]+)".to_string(),
    ]
}

fn interest_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(?:interested in|looking for|would like|i need|we need)[ \t]+([^.!?,\n]+)".to_string(),
    ]
}

fn defers_decision_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(?:need to|have to|got to)[ \t]+(?:check|talk|speak|ask)[ \t]+(?:with|to)[ \t]+(?:my|the)[ \t]+(?:boss|manager|owner|partner|wife|husband)\b".to_string(),
        r"(?i)\b(?:not my decision|not up to me|i don't make the decisions)\b".to_string(),
    ]
}

fn makes_decision_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(?:i'm the owner|i am the owner|i make the decisions|i'm the decision maker|i am the decision maker|i decide|it's my call)\b".to_string(),
    ]
}

fn compiled(cell: &'static OnceLock<Vec<Regex>>, patterns: fn() -> Vec<String>) -> &'static [Regex] {
    cell.get_or_init(|| patterns().iter().filter_map(|pattern| Regex::new(pattern).ok()).collect())
}

fn first_capture(rules: &[Regex], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        rule.captures(text)
            .and_then(|captures| captures.get(1))
            .map(|capture| clean(capture.as_str()))
            .filter(|value| !value.is_empty())
    })
}

fn all_captures(rules: &[Regex], text: &str) -> Vec<String> {
    let mut values = Vec::new();
    for rule in rules {
        for captures in rule.captures_iter(text) {
            let Some(capture) = captures.get(1) else { continue };
            let value = truncate(&clean(capture.as_str()), MAX_FREE_TEXT_CHARS);
            if !value.is_empty() && !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

fn clean(value: &str) -> String {
    value
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
        .trim()
        .to_string()
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BusinessDataExtractor;

impl BusinessDataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts from the customer-spoken turns only.
    pub fn extract_from_turns(&self, turns: &[ConversationTurn]) -> ExtractedBusinessData {
        self.extract(&customer_text(turns))
    }

    pub fn extract(&self, text: &str) -> ExtractedBusinessData {
        if text.trim().is_empty() {
            return ExtractedBusinessData::default();
        }

        let emails = compiled(&EMAIL, email_patterns);
        let email = first_capture(emails, text);
        let without_emails = emails
            .iter()
            .fold(text.to_string(), |acc, rule| rule.replace_all(&acc, " ").into_owned());

        let decision_maker = if compiled(&DEFERS_DECISION, defers_decision_patterns)
            .iter()
            .any(|rule| rule.is_match(text))
        {
            Some(false)
        } else if compiled(&MAKES_DECISION, makes_decision_patterns)
            .iter()
            .any(|rule| rule.is_match(text))
        {
            Some(true)
        } else {
            None
        };

        ExtractedBusinessData {
            business_name: first_capture(compiled(&BUSINESS_NAME, business_name_patterns), text),
            contact_name: first_capture(compiled(&CONTACT_NAME, contact_name_patterns), text),
            owner_name: first_capture(compiled(&OWNER_NAME, owner_name_patterns), text),
            location: first_capture(compiled(&LOCATION, location_patterns), text),
            industry: first_capture(compiled(&INDUSTRY, industry_patterns), text)
                .map(|industry| industry.to_lowercase()),
            email,
            website: first_capture(compiled(&WEBSITE, website_patterns), &without_emails),
            phone: first_capture(compiled(&PHONE, phone_patterns), &without_emails),
            company_size: first_capture(compiled(&COMPANY_SIZE, company_size_patterns), text),
            revenue: first_capture(compiled(&REVENUE, revenue_patterns), text),
            budget_range: first_capture(compiled(&BUDGET, budget_patterns), text),
            timeline: first_capture(compiled(&TIMELINE, timeline_patterns), text)
                .map(|timeline| timeline.to_lowercase()),
            pain_points: all_captures(compiled(&PAIN_POINTS, pain_point_patterns), text),
            interests: all_captures(compiled(&INTERESTS, interest_patterns), text),
            decision_maker,
        }
    }
}
