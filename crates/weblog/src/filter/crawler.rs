use woothee::parser::Parser;

use crate::parser::traits::CrawlerClassifier;

/// Flags user agents woothee puts in its `crawler` category.
pub struct WootheeCrawlerClassifier {
    parser: Parser,
}

impl WootheeCrawlerClassifier {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }
}

impl Default for WootheeCrawlerClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerClassifier for WootheeCrawlerClassifier {
    fn is_crawler(&self, agent: &str) -> bool {
        self.parser
            .parse(agent)
            .is_some_and(|result| result.category == "crawler")
    }
}
