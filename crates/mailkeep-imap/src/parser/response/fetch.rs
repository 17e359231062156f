//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::{parse_flag_list, parse_label_list};
use super::types::FetchItem;

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => {
                let upper = name.to_ascii_uppercase();
                match upper.as_str() {
                    "FLAGS" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Flags(parse_flag_list(lexer)?));
                    }
                    "UID" => {
                        lexer.expect_space()?;
                        let n = lexer.read_number()?;
                        let uid = Uid::new(n).ok_or_else(|| {
                            lexer.error(&format!("invalid UID value: {n} (UID cannot be 0)"))
                        })?;
                        items.push(FetchItem::Uid(uid));
                    }
                    "RFC822.SIZE" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Rfc822Size(lexer.read_number()?));
                    }
                    "INTERNALDATE" => {
                        lexer.expect_space()?;
                        match lexer.next_token()? {
                            Token::QuotedString(date) => items.push(FetchItem::InternalDate(date)),
                            token => {
                                return Err(lexer.error(&format!(
                                    "Expected INTERNALDATE string, got {token:?}"
                                )));
                            }
                        }
                    }
                    "X-GM-MSGID" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::GmailMsgId(lexer.read_number64()?));
                    }
                    "X-GM-THRID" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::GmailThreadId(lexer.read_number64()?));
                    }
                    "X-GM-LABELS" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::GmailLabels(parse_label_list(lexer)?));
                    }
                    "BODY" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                        let (section, origin) = parse_body_section_and_origin(lexer);
                        lexer.expect_space()?;
                        let data = lexer.read_nstring_bytes()?;
                        items.push(FetchItem::Body {
                            section,
                            origin,
                            data,
                        });
                    }
                    _ => skip_fetch_item(lexer)?,
                }
            }
            token => {
                return Err(lexer.error(&format!("Unexpected token in FETCH: {token:?}")));
            }
        }
    }

    Ok(items)
}

/// Parses the optional `[section]` and `<origin>` after `BODY`.
fn parse_body_section_and_origin(lexer: &mut Lexer<'_>) -> (Option<String>, Option<u32>) {
    let mut section = None;
    let mut origin = None;

    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let raw = lexer.read_until(|b| b == b']');
        if lexer.peek() == Some(b']') {
            lexer.advance();
        }
        if !raw.is_empty() {
            section = Some(String::from_utf8_lossy(raw).into_owned());
        }
    }

    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let raw = lexer.read_until(|b| b == b'>');
        if lexer.peek() == Some(b'>') {
            lexer.advance();
        }
        origin = std::str::from_utf8(raw).ok().and_then(|s| s.parse().ok());
    }

    (section, origin)
}

/// Skips the value of an unrecognized fetch item.
///
/// Works on tokens so that literals and quoted strings containing
/// parentheses are consumed whole.
pub fn skip_fetch_item(lexer: &mut Lexer<'_>) -> Result<()> {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }

    let mut depth = 0usize;

    loop {
        match lexer.peek() {
            Some(b')') if depth == 0 => break,
            Some(b' ') if depth == 0 => break,
            None => break,
            _ => {}
        }
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Eof => break,
            _ => {}
        }
    }

    Ok(())
}
