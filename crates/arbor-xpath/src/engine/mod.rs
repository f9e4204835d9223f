//! Evaluation machinery: runtime contexts, lazy sequences, expression nodes
//! and the built-in function library.

pub mod atomize;
pub mod casting;
pub mod conversion;
pub mod deep_equal;
pub mod doc_order;
pub mod evaluate;
pub mod expr;
pub mod functions;
pub mod runtime;
pub mod sequence;
pub mod suspend;
