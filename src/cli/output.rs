//! CLI output formatting utilities.

use crate::rag::{SearchHit, Source};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a course summary line.
    pub fn course_info(title: &str, instructor: Option<&str>, lessons: usize, link: Option<&str>) {
        let by = instructor.map(|i| format!(" by {}", i)).unwrap_or_default();
        println!(
            "  {} {}{} ({} lessons)",
            style("*").cyan(),
            style(title).bold(),
            by,
            lessons
        );
        if let Some(l) = link {
            println!("    {}", style(l).dim());
        }
    }

    /// Print a citation.
    pub fn source(source: &Source) {
        match &source.link {
            Some(link) => println!(
                "  {} {} ({}) {}",
                style("*").cyan(),
                source.text,
                source.score,
                style(link).dim()
            ),
            None => println!("  {} {} ({})", style("*").cyan(), source.text, source.score),
        }
    }

    /// Print a content search hit.
    pub fn search_hit(hit: &SearchHit, score: u32) {
        let location = match hit.metadata.lesson_number {
            Some(n) => format!("Lesson {}", n),
            None => "Course".to_string(),
        };
        println!(
            "\n{} {} @ {} (score: {})",
            style(">>").green(),
            style(&hit.metadata.course_title).bold(),
            style(location).cyan(),
            score
        );
        println!("   {}", content_preview(&hit.document, 200));
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten and truncate content on a char boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
