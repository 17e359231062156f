//! IMAP protocol parser.
//!
//! A sans-I/O parser for the server responses a backup client meets:
//! status responses, LIST, SEARCH and FETCH with the Gmail `X-GM-*` items.
//!
//! - **Lexer**: tokenizes raw bytes into IMAP tokens
//! - **Response parser**: builds structured responses from tokens
//!
//! # Example
//!
//! ```
//! use mailkeep_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let input = b"* OK Gimap ready for requests\r\n";
//! let response = ResponseParser::parse(input).unwrap();
//!
//! match response {
//!     Response::Untagged(UntaggedResponse::Ok { text, .. }) => {
//!         assert!(text.contains("Gimap"));
//!     }
//!     _ => panic!("Expected untagged OK"),
//! }
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
