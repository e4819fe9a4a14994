//! Maturity assessment: reads an exported assessment spreadsheet, scores it,
//! and turns the gaps into timed recommendations.

pub mod analyzer;
pub mod handlers;
pub mod opportunities;
pub mod parser;
pub mod prompts;
pub mod recommendations;
pub mod records;
pub mod sheet;
