// Module structure for the weblog access-log analyzer.

// Core
pub mod conf;
pub mod parser;
pub mod pipeline;

// Collaborators
pub mod filter;
pub mod stats;

// Process lifecycle
pub mod runtime;
