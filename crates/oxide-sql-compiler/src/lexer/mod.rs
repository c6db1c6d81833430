//! SQL Lexer and rewindable token source
//!
//! The lexer turns statement text into positioned tokens; the token source
//! wraps them with the save/rewind cursor the speculative parser relies on.

mod source;
mod token;
mod tokenizer;

pub use source::TokenSource;
pub use token::{Keyword, Span, Token, TokenKind};
pub use tokenizer::Lexer;
