use common::{
    error::AppError,
    storage::types::parsed_book::{MISSING_URL, UNKNOWN_AUTHOR},
};
use regex::Regex;
use tracing::warn;

/// Header fields recognised in a book file, in `Label: value` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Title,
    Author,
    UrlOriginal,
    UrlYoutube,
    UrlIvoox,
}

impl MetadataField {
    pub const ALL: [Self; 5] = [
        Self::Title,
        Self::Author,
        Self::UrlOriginal,
        Self::UrlYoutube,
        Self::UrlIvoox,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Author => "Author",
            Self::UrlOriginal => "Url Original",
            Self::UrlYoutube => "Url Youtube",
            Self::UrlIvoox => "Url Ivoox",
        }
    }

    /// Fallback for optional fields; `None` marks the field as required.
    pub fn default_value(self) -> Option<&'static str> {
        match self {
            Self::Title => None,
            Self::Author => Some(UNKNOWN_AUTHOR),
            Self::UrlOriginal | Self::UrlYoutube | Self::UrlIvoox => Some(MISSING_URL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub url_original: String,
    pub url_youtube: String,
    pub url_ivoox: String,
}

/// Pulls header fields out of raw book text. Patterns are compiled once.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    patterns: Vec<(MetadataField, Regex)>,
}

impl MetadataExtractor {
    pub fn new() -> Result<Self, AppError> {
        let patterns = MetadataField::ALL
            .into_iter()
            .map(|field| {
                let pattern = format!(
                    r"(?m)^{}:(?:[ \t]+(.*?))?[ \t]*\r?$",
                    regex::escape(field.label())
                );
                Regex::new(&pattern).map(|regex| (field, regex))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Value on the first `Label: value` line for `field`, trimmed. A blank
    /// first line means absent; later lines are never consulted.
    pub fn find(&self, text: &str, field: MetadataField) -> Option<String> {
        let (_, regex) = self.patterns.iter().find(|(f, _)| *f == field)?;
        let value = regex.captures(text)?.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_owned())
    }

    /// Required fields fail with `MetadataMissing`; optional ones fall back
    /// to their default with a warning.
    pub fn field(&self, text: &str, field: MetadataField, file: &str) -> Result<String, AppError> {
        if let Some(value) = self.find(text, field) {
            return Ok(value);
        }

        match field.default_value() {
            Some(default) => {
                warn!(file, field = field.label(), default, "metadata field missing, using default");
                Ok(default.to_owned())
            }
            None => Err(AppError::MetadataMissing {
                field: field.label().to_owned(),
                file: file.to_owned(),
            }),
        }
    }

    pub fn extract(&self, text: &str, file: &str) -> Result<BookMetadata, AppError> {
        Ok(BookMetadata {
            title: self.field(text, MetadataField::Title, file)?,
            author: self.field(text, MetadataField::Author, file)?,
            url_original: self.field(text, MetadataField::UrlOriginal, file)?,
            url_youtube: self.field(text, MetadataField::UrlYoutube, file)?,
            url_ivoox: self.field(text, MetadataField::UrlIvoox, file)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "The Project Gutenberg eBook of Moby Dick\r\n\
        \r\n\
        Title: Moby Dick; Or, The Whale\r\n\
        Author: Herman Melville\r\n\
        Url Youtube:   https://youtu.be/abc  \r\n\
        Url Original: https://www.gutenberg.org/ebooks/2701\r\n";

    #[test]
    fn extracts_present_fields_and_defaults_the_rest() {
        let extractor = MetadataExtractor::new().expect("patterns compile");
        let meta = extractor.extract(HEADER, "moby.txt").expect("metadata");

        assert_eq!(meta.title, "Moby Dick; Or, The Whale");
        assert_eq!(meta.author, "Herman Melville");
        assert_eq!(meta.url_youtube, "https://youtu.be/abc");
        assert_eq!(meta.url_original, "https://www.gutenberg.org/ebooks/2701");
        assert_eq!(meta.url_ivoox, MISSING_URL);
    }

    #[test]
    fn blank_author_counts_as_absent() {
        let extractor = MetadataExtractor::new().expect("patterns compile");
        let meta = extractor
            .extract("Title: Walden\nAuthor:   \n", "walden.txt")
            .expect("metadata");
        assert_eq!(meta.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn labels_are_anchored_and_case_sensitive() {
        let extractor = MetadataExtractor::new().expect("patterns compile");
        assert_eq!(extractor.find("  Title: Indented\n", MetadataField::Title), None);
        assert_eq!(extractor.find("title: lower\n", MetadataField::Title), None);
        assert_eq!(
            extractor.find("Subtitle: no\nTitle: Yes\n", MetadataField::Title),
            Some("Yes".into())
        );
    }

    #[test]
    fn missing_title_is_an_error() {
        let extractor = MetadataExtractor::new().expect("patterns compile");
        let err = extractor
            .extract("Author: Nobody\nTitle:\n", "untitled.txt")
            .expect_err("title required");
        assert!(matches!(
            err,
            AppError::MetadataMissing { ref field, ref file } if field == "Title" && file == "untitled.txt"
        ));
    }

    #[test]
    fn blank_header_does_not_borrow_from_body() {
        let extractor = MetadataExtractor::new().expect("patterns compile");
        let text = "Title: Letters\nAuthor:\n\n\
            *** START OF THE PROJECT GUTENBERG EBOOK LETTERS ***\n\n\
            Author: Signed by the editor\n\n\
            *** END OF THE PROJECT GUTENBERG EBOOK LETTERS ***\n";

        assert_eq!(extractor.find(text, MetadataField::Author), None);
        let meta = extractor.extract(text, "letters.txt").expect("metadata");
        assert_eq!(meta.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn value_needs_a_space_after_the_colon() {
        let extractor = MetadataExtractor::new().expect("patterns compile");
        assert_eq!(extractor.find("Title:Glued\n", MetadataField::Title), None);
        assert_eq!(
            extractor.find("Title:Glued\nTitle:\tTabbed\n", MetadataField::Title),
            Some("Tabbed".into())
        );
    }
}
