//! ECMAScript front half and semantic core.
//!
//! [`lexer`] turns source text into tokens, choosing between the regular
//! expression and division goals from the previous token. [`runtime`] holds
//! the value/object model, coercions and the scope chain a parser or
//! evaluator drives. The two halves share only the value types in [`types`].

pub mod error;
pub mod lexer;
pub mod runtime;
pub mod types;

pub use error::{ErrorKind, JsError};
pub use lexer::{LexGoal, Lexer, Token, TokenKind};
pub use runtime::{Realm, RealmOptions};
pub use types::{JsObject, JsString, JsSymbol, JsValue};
