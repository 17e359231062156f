//! Extraction of the few header fields kept in metadata.

/// Header fields requested alongside metadata.
pub const HEADER_FIELDS: &str = "HEADER.FIELDS (MESSAGE-ID SUBJECT X-GMAIL-RECEIVED)";

/// Identity headers of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHeaders {
    /// `Subject`.
    pub subject: Option<String>,
    /// `Message-ID`.
    pub message_id: Option<String>,
    /// `X-Gmail-Received`.
    pub x_gmail_received: Option<String>,
}

impl IdentityHeaders {
    /// Parses a raw header block, unfolding continuation lines.
    ///
    /// Encoded words are kept as they appear on the wire. The first
    /// occurrence of a field wins.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut headers = Self::default();

        for (name, value) in unfold(&text) {
            let slot = match name.to_ascii_lowercase().as_str() {
                "subject" => &mut headers.subject,
                "message-id" => &mut headers.message_id,
                "x-gmail-received" => &mut headers.x_gmail_received,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        headers
    }
}

fn unfold(text: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = fields.last_mut() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            fields.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    fields
}
