//! # rpipeline-rules
//!
//! Rule documents for the rpipeline message interpreter.
//!
//! A rule is a condition plus an ordered list of statements. This crate reads
//! the serialized syntax tree of such rules from YAML and provides the
//! keyed store interface rule text is kept in. Binding function names to
//! implementations and evaluating rules is done by `rpipeline-eval`.
//!
//! ## Quick Start
//!
//! ```rust
//! use rpipeline_rules::{ExprNode, parse_rule_yaml};
//!
//! let yaml = r#"
//! title: Tag Year
//! when: {eq: [{field: source}, "web-01"]}
//! then:
//!   - call: set_field
//!     args: {field: year, value: 2010}
//! "#;
//!
//! let collection = parse_rule_yaml(yaml).unwrap();
//! assert_eq!(collection.rules.len(), 1);
//! assert!(matches!(collection.rules[0].statements[0], ExprNode::Call { .. }));
//! ```

pub mod ast;
pub mod error;
pub mod parser;
pub mod store;

pub use ast::{ComparisonOp, ExprNode, Literal, RuleCollection, RuleDocument};
pub use error::{Result, RuleParseError};
pub use parser::{
    parse_expr, parse_rule_directory, parse_rule_document, parse_rule_file, parse_rule_path,
    parse_rule_yaml,
};
pub use store::{DirectoryRuleStore, MemoryRuleStore, RuleSource, RuleSourceStore};
