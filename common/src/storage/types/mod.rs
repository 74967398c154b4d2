pub mod bulk;
pub mod ingestion_report;
pub mod paragraph_document;
pub mod parsed_book;
pub mod query_result;
