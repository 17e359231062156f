//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, Uid,
    UidValidity,
};
use crate::Result;

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let upper = atom.to_ascii_uppercase();

    let code = match upper.as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "UNAVAILABLE" => ResponseCode::Unavailable,
        "LIMIT" => ResponseCode::Limit,
        "THROTTLED" => ResponseCode::Throttled,
        "ALREADYEXISTS" => ResponseCode::AlreadyExists,
        "NONEXISTENT" => ResponseCode::Nonexistent,
        "UIDNEXT" => {
            lexer.expect_space()?;
            ResponseCode::UidNext(read_uid(lexer)?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(read_uid_validity(lexer)?)
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uidvalidity = read_uid_validity(lexer)?;
            lexer.expect_space()?;
            let uid = read_uid(lexer)?;
            ResponseCode::AppendUid { uidvalidity, uid }
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            let flags = parse_flag_list(lexer)?;
            ResponseCode::PermanentFlags(flags.into_iter().collect())
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Skip whatever argument an unknown code carries.
    while lexer.peek() != Some(b']') && !lexer.is_eof() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

fn read_uid(lexer: &mut Lexer<'_>) -> Result<Uid> {
    let n = lexer.read_number()?;
    Uid::new(n).ok_or_else(|| lexer.error("Invalid UID 0"))
}

fn read_uid_validity(lexer: &mut Lexer<'_>) -> Result<UidValidity> {
    let n = lexer.read_number()?;
    UidValidity::new(n).ok_or_else(|| lexer.error("Invalid UIDVALIDITY 0"))
}

/// Parses capability data.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }

    Ok(caps)
}

/// Parses a flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected token in flag list: {token:?}")));
            }
        }
    }

    Ok(flags)
}

/// Parses an `X-GM-LABELS` list.
///
/// Gmail sends system labels as atoms (`\Inbox`), user labels as atoms or
/// quoted strings, and does not quote names like `[Imap]/Trash` even though
/// brackets are not atom characters. Unquoted entries are therefore taken
/// verbatim up to the next space or closing parenthesis.
pub fn parse_label_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(Token::LParen)?;

    let mut labels = Vec::new();

    loop {
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                break;
            }
            Some(b' ') => {
                lexer.advance();
            }
            Some(b'"' | b'{') => labels.push(lexer.read_astring()?),
            Some(_) => {
                let raw = lexer.read_until(|b| matches!(b, b' ' | b')' | b'\r'));
                labels.push(String::from_utf8_lossy(raw).into_owned());
            }
            None => return Err(lexer.error("Unterminated label list")),
        }
    }

    Ok(labels)
}

/// Parses a LIST response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected token in LIST attributes: {token:?}")));
            }
        }
    }

    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => {
            return Err(lexer.error(&format!("Expected delimiter, got {token:?}")));
        }
    };

    lexer.expect_space()?;

    let mailbox_name = lexer.read_astring()?;

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(mailbox_name),
    })
}

/// Parses a SEARCH response.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if lexer.peek() == Some(b'\r') {
            break;
        }
        nums.push(lexer.read_number()?);
    }

    Ok(nums)
}

/// Reads text until CRLF.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();

    let end = remaining
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(remaining.len());

    lexer.skip(end);

    if lexer.peek() == Some(b'\r') {
        lexer.skip(2);
    }

    String::from_utf8_lossy(&remaining[..end]).to_string()
}
