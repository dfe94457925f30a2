//! Filter — exclusion rules applied to well-formed lines before they are
//! classified: ignored IP ranges, crawlers and referring sites.

pub mod crawler;
pub mod ip;
pub mod referrer;

use crate::conf::{ConfigError, ParserConfig};
use crate::parser::traits::{CrawlerClassifier, IpExclusion, NoExclusion, ReferrerExclusion};

pub use crawler::WootheeCrawlerClassifier;
pub use ip::IpRangeFilter;
pub use referrer::ReferrerFilter;

/// The exclusion collaborators of a pipeline.
pub struct Filters {
    pub ip: Box<dyn IpExclusion>,
    pub crawler: Box<dyn CrawlerClassifier>,
    pub referrer: Box<dyn ReferrerExclusion>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            ip: Box::new(NoExclusion),
            crawler: Box::new(NoExclusion),
            referrer: Box::new(NoExclusion),
        }
    }
}

impl Filters {
    /// Build the default filters from `ignore_ips` and `ignore_referers`.
    /// The crawler classifier is always installed; the pipeline consults it
    /// only when `ignore_crawlers` is set.
    pub fn from_config(config: &ParserConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ip: Box::new(IpRangeFilter::new(&config.ignore_ips)?),
            crawler: Box::new(WootheeCrawlerClassifier::new()),
            referrer: Box::new(ReferrerFilter::new(&config.ignore_referers)?),
        })
    }
}
