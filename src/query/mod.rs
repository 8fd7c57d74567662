//! TaQL query processing
//!
//! The raw parse tree ([`nodes::TaqlNode`]) comes from the external
//! grammar layer. The tree handler visits it once, accumulating clause
//! state in a stack of query contexts, and executes the outermost context
//! into a table or a bare value.

pub mod context;
pub mod expr;
pub mod handler;
pub mod nodes;
pub mod result;

pub use context::{CommandKind, QueryContext, SelectItem};
pub use expr::{ExprNode, Function, SetElement};
pub use handler::TreeHandler;
pub use nodes::{BinaryOp, IndexRange, RenDropKind, TaqlNode, UnaryOp};
pub use result::NodeResult;
