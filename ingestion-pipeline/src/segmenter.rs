use common::error::AppError;
use regex::Regex;

const START_MARKER: &str =
    r"(?m)^\*{3}[ \t]*START OF (?:THIS|THE) PROJECT GUTENBERG EBOOK.+\*{3}[ \t]*\r?$";
const END_MARKER: &str =
    r"(?m)^\*{3}[ \t]*END OF (?:THIS|THE) PROJECT GUTENBERG EBOOK.+\*{3}[ \t]*\r?$";
const PARAGRAPH_BREAK: &str = r"\n(?:[ \t\r]*\n)+";
const LINE_BREAK: &str = r"[ \t]*\r?\n[ \t]*";

/// Cuts the body out of a book and splits it into cleaned paragraphs.
#[derive(Debug, Clone)]
pub struct ParagraphSegmenter {
    start: Regex,
    end: Regex,
    paragraph_break: Regex,
    line_break: Regex,
}

impl ParagraphSegmenter {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            start: Regex::new(START_MARKER)?,
            end: Regex::new(END_MARKER)?,
            paragraph_break: Regex::new(PARAGRAPH_BREAK)?,
            line_break: Regex::new(LINE_BREAK)?,
        })
    }

    /// Text strictly between the start marker line and the end marker line.
    pub fn body<'a>(&self, text: &'a str, file: &str) -> Result<&'a str, AppError> {
        let start = self
            .start
            .find(text)
            .ok_or_else(|| AppError::MalformedBookBoundary(file.to_owned()))?;
        let rest = text.get(start.end()..).unwrap_or_default();
        let end = self
            .end
            .find(rest)
            .ok_or_else(|| AppError::MalformedBookBoundary(file.to_owned()))?;

        Ok(rest.get(..end.start()).unwrap_or_default())
    }

    pub fn segment(&self, text: &str, file: &str) -> Result<Vec<String>, AppError> {
        let body = self.body(text, file)?;

        Ok(self
            .paragraph_break
            .split(body)
            .filter_map(|candidate| self.clean(candidate))
            .collect())
    }

    fn clean(&self, candidate: &str) -> Option<String> {
        let joined = self.line_break.replace_all(candidate.trim(), " ");
        let cleaned = joined.replace('_', "");
        let cleaned = cleaned.trim();
        (!cleaned.is_empty()).then(|| cleaned.to_owned())
    }
}
