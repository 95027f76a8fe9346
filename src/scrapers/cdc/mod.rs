pub mod crawler;
pub mod normalizer;
pub mod parser;

pub use crawler::CdcCrawler;
pub use normalizer::CdcNormalizer;
pub use parser::CdcTableParser;
