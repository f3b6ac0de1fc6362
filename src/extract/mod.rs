pub mod html;
pub mod strategy;

pub use html::{Extraction, HtmlExtractor};
