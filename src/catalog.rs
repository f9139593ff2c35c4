//! Course catalog data model.
//!
//! Courses, lessons and content chunks are produced once at ingestion time
//! and are read-only afterwards. A course file on disk is the pre-chunked
//! output of the document processing step: course metadata plus the text
//! chunks that belong to it.

use crate::error::{Result, SyllabusError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number, unique within its course.
    pub lesson_number: u32,
    /// Lesson title.
    pub title: String,
    /// Link to the lesson, if published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

/// A course in the catalog. The title is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Create a course without lessons.
    pub fn new(title: impl Into<String>, course_link: Option<String>) -> Self {
        Self {
            title: title.into(),
            course_link,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    /// Add a lesson (builder style).
    pub fn with_lesson(
        mut self,
        lesson_number: u32,
        title: impl Into<String>,
        lesson_link: Option<String>,
    ) -> Self {
        self.lessons.push(Lesson {
            lesson_number,
            title: title.into(),
            lesson_link,
        });
        self
    }

    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }

    /// Link of a lesson, if the lesson exists and has one.
    pub fn lesson_link(&self, lesson_number: u32) -> Option<&str> {
        self.lesson(lesson_number)
            .and_then(|l| l.lesson_link.as_deref())
    }

    /// Lessons in lesson-number order.
    pub fn sorted_lessons(&self) -> Vec<&Lesson> {
        let mut lessons: Vec<&Lesson> = self.lessons.iter().collect();
        lessons.sort_by_key(|l| l.lesson_number);
        lessons
    }

    /// Check that lesson numbers are positive and unique.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SyllabusError::InvalidInput(
                "Course title must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for lesson in &self.lessons {
            if lesson.lesson_number == 0 {
                return Err(SyllabusError::InvalidInput(format!(
                    "Course '{}' has a lesson numbered 0",
                    self.title
                )));
            }
            if !seen.insert(lesson.lesson_number) {
                return Err(SyllabusError::InvalidInput(format!(
                    "Course '{}' has duplicate lesson {}",
                    self.title, lesson.lesson_number
                )));
            }
        }
        Ok(())
    }
}

/// A unit of course content indexed for similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_number: Option<u32>,
    /// Position of this chunk within its course.
    pub chunk_index: u32,
}

/// A chunk as it appears in a course file, before indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkInput {
    #[serde(default)]
    pub lesson_number: Option<u32>,
    pub content: String,
}

/// A pre-chunked course file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDocument {
    #[serde(flatten)]
    pub course: Course,
    #[serde(default)]
    pub chunks: Vec<ChunkInput>,
}

impl CourseDocument {
    /// Materialize the chunks with their course title and sequence index.
    pub fn course_chunks(&self) -> Vec<CourseChunk> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(i, c)| CourseChunk {
                content: c.content.clone(),
                course_title: self.course.title.clone(),
                lesson_number: c.lesson_number,
                chunk_index: i as u32,
            })
            .collect()
    }
}

/// Load and validate a course file.
pub fn load_course_document(path: &Path) -> Result<CourseDocument> {
    let content = std::fs::read_to_string(path)?;
    let doc: CourseDocument = serde_json::from_str(&content)?;
    doc.course.validate()?;
    Ok(doc)
}

/// List course files (`*.json`) in a directory, sorted by name.
pub fn discover_course_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SyllabusError::InvalidInput(format!(
            "Folder {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if path.is_file() && is_json {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_lookup_and_order() {
        let course = Course::new("Python", Some("https://example.com/py".to_string()))
            .with_lesson(2, "Types", Some("https://example.com/py/2".to_string()))
            .with_lesson(1, "Intro", None);

        assert_eq!(course.lesson_link(2), Some("https://example.com/py/2"));
        assert_eq!(course.lesson_link(1), None);
        assert_eq!(course.lesson_link(9), None);

        let numbers: Vec<u32> = course.sorted_lessons().iter().map(|l| l.lesson_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_validate_rejects_duplicate_lessons() {
        let course = Course::new("Python", None)
            .with_lesson(1, "A", None)
            .with_lesson(1, "B", None);
        assert!(course.validate().is_err());

        let zero = Course::new("Python", None).with_lesson(0, "A", None);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_course_document_parse_assigns_chunk_indices() {
        let json = r#"{
            "title": "Introduction to Python",
            "course_link": "https://example.com/python",
            "instructor": "Jane Doe",
            "lessons": [{"lesson_number": 1, "title": "Getting Started"}],
            "chunks": [
                {"lesson_number": 1, "content": "first"},
                {"content": "second"}
            ]
        }"#;

        let doc: CourseDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.course.instructor.as_deref(), Some("Jane Doe"));

        let chunks = doc.course_chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].lesson_number, None);
        assert_eq!(chunks[1].course_title, "Introduction to Python");
    }

    #[test]
    fn test_discover_course_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.JSON"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let files = discover_course_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);

        assert!(discover_course_files(&dir.path().join("missing")).is_err());
    }
}
