//! Rewrite course and lesson mentions in answers as markdown links.

use super::Source;
use crate::catalog::Course;
use crate::error::{Result, SyllabusError};
use regex::{Captures, Regex};
use std::ops::Range;

/// Characters scanned before a lesson mention for an open link label.
const LINK_LOOKBACK_CHARS: usize = 50;

/// Links course titles and "Lesson N" mentions using catalog metadata.
///
/// Both passes skip text that is already part of a markdown link, so
/// annotating an annotated answer changes nothing.
pub struct LinkAnnotator {
    courses: Vec<Course>,
    course_pattern: Option<Regex>,
    lesson_pattern: Regex,
    markdown_link: Regex,
}

impl LinkAnnotator {
    pub fn new(courses: Vec<Course>) -> Result<Self> {
        let mut titles: Vec<&str> = courses
            .iter()
            .map(|c| c.title.as_str())
            .filter(|t| !t.is_empty())
            .collect();
        // Longest first so a short title never claims part of a longer one.
        titles.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        titles.dedup();

        let course_pattern = if titles.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = titles
                .iter()
                .map(|t| {
                    let escaped = regex::escape(t);
                    format!("\"{}\"|{}", escaped, escaped)
                })
                .collect();
            let pattern = Regex::new(&alternatives.join("|"))
                .map_err(|e| SyllabusError::InvalidInput(format!("Bad course title pattern: {}", e)))?;
            Some(pattern)
        };

        Ok(Self {
            courses,
            course_pattern,
            lesson_pattern: Regex::new(r"\b([Ll]esson)\s+(\d+)\b").expect("Invalid regex"),
            // Labels may hold one level of brackets, as course titles can.
            markdown_link: Regex::new(r"\[(?:[^\[\]]|\[[^\[\]]*\])*\]\([^)]*\)")
                .expect("Invalid regex"),
        })
    }

    /// Apply the course pass, then the lesson pass.
    pub fn annotate(&self, text: &str, sources: &[Source]) -> String {
        let linked = self.link_courses(text);
        self.link_lessons(&linked, sources)
    }

    fn course(&self, title: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.title == title)
    }

    /// Replace course title mentions (bare or quoted) with links.
    pub fn link_courses(&self, text: &str) -> String {
        let Some(pattern) = &self.course_pattern else {
            return text.to_string();
        };

        let existing: Vec<Range<usize>> =
            self.markdown_link.find_iter(text).map(|m| m.range()).collect();

        pattern
            .replace_all(text, |caps: &Captures| {
                let m = &caps[0];
                let Some(whole) = caps.get(0) else {
                    return String::new();
                };
                let span = whole.range();

                let inside_link = existing
                    .iter()
                    .any(|r| r.start < span.end && span.start < r.end);
                if inside_link || !at_word_edges(text, &span) {
                    return m.to_string();
                }

                let title = m.trim_matches('"');
                match self.course(title).and_then(|c| c.course_link.as_deref()) {
                    Some(link) => format!("[{}]({})", title, link),
                    None => m.to_string(),
                }
            })
            .into_owned()
    }

    /// Replace "Lesson N" mentions with links into the primary course.
    pub fn link_lessons(&self, text: &str, sources: &[Source]) -> String {
        let Some(primary) = primary_course(sources) else {
            return text.to_string();
        };
        let Some(course) = self.course(&primary) else {
            return text.to_string();
        };

        self.lesson_pattern
            .replace_all(text, |caps: &Captures| {
                let original = caps[0].to_string();
                let Some(whole) = caps.get(0) else {
                    return original;
                };
                if inside_link_label(&text[..whole.start()]) {
                    return original;
                }

                let word = &caps[1];
                let link = caps[2]
                    .parse::<u32>()
                    .ok()
                    .and_then(|n| course.lesson_link(n).map(|l| (n, l)));
                match link {
                    Some((n, link)) => format!("[{} {}]({})", word, n, link),
                    None => original,
                }
            })
            .into_owned()
    }
}

/// True when the span is not glued to surrounding letters or digits.
fn at_word_edges(text: &str, span: &Range<usize>) -> bool {
    let before = text[..span.start].chars().next_back();
    let after = text[span.end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

/// Whether the text just before a match has an unclosed `[` label.
fn inside_link_label(preceding: &str) -> bool {
    let start = preceding
        .char_indices()
        .rev()
        .nth(LINK_LOOKBACK_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window = &preceding[start..];

    match window.rfind('[') {
        Some(open) => !window[open..].contains("]("),
        None => false,
    }
}

/// Most frequent course title among the sources; ties go to the first seen.
pub fn primary_course(sources: &[Source]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for source in sources {
        let title = source.course_title();
        if title.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| *t == title) {
            Some((_, n)) => *n += 1,
            None => counts.push((title, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (title, n) in counts {
        if best.is_none_or(|(_, b)| n > b) {
            best = Some((title, n));
        }
    }
    best.map(|(t, _)| t.to_string())
}
