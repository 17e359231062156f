//! Client conversations against scripted Gmail servers.

use std::time::Duration;

use tokio_test::io::Builder;

use mailkeep_imap::{
    Capability, Client, Error, FetchAttribute, FetchItem, Flag, MailboxAttribute, SearchCriteria,
    StoreAction, Uid, UidSet,
};
use mailkeep_oauth::Token;

const GREETING: &[u8] = b"* OK Gimap ready for requests from 203.0.113.9 a1mb12345\r\n";

fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

#[tokio::test]
async fn login_list_and_select() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user@gmail.com secret\r\n")
        .read(b"* CAPABILITY IMAP4rev1 UNSELECT IDLE NAMESPACE QUOTA ID XLIST CHILDREN X-GM-EXT-1 UIDPLUS\r\n")
        .read(b"A0000 OK user@gmail.com authenticated (Success)\r\n")
        .write(b"A0001 LIST \"\" \"*\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n")
        .read(b"* LIST (\\HasChildren \\Noselect) \"/\" \"[Gmail]\"\r\n")
        .read(b"* LIST (\\All \\HasNoChildren) \"/\" \"[Gmail]/All Mail\"\r\n")
        .read(b"A0001 OK Success\r\n")
        .write(b"A0002 SELECT \"[Gmail]/All Mail\"\r\n")
        .read(b"* FLAGS (\\Answered \\Flagged \\Draft \\Deleted \\Seen $NotPhishing $Phishing)\r\n")
        .read(b"* OK [UIDVALIDITY 11] UIDs valid.\r\n")
        .read(b"* 1523 EXISTS\r\n")
        .read(b"* 0 RECENT\r\n")
        .read(b"* OK [UIDNEXT 40212] Predicted next UID.\r\n")
        .read(b"A0002 OK [READ-WRITE] [Gmail]/All Mail selected. (Success)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let mut client = client.login("user@gmail.com", "secret").await.unwrap();
    assert!(client.supports_gmail_ext());
    assert!(client.has_capability(&Capability::UidPlus));

    let folders = client.list("", "*").await.unwrap();
    assert_eq!(folders.len(), 3);
    assert!(!folders[1].is_selectable());
    assert!(folders[2].attributes.contains(&MailboxAttribute::All));

    let client = client.select("[Gmail]/All Mail").await.unwrap();
    let selected = client.selected();
    assert_eq!(selected.mailbox(), "[Gmail]/All Mail");
    assert_eq!(selected.status().exists, 1523);
    assert_eq!(selected.status().uid_validity.map(|v| v.get()), Some(11));
    assert!(!selected.status().read_only);
}

#[tokio::test]
async fn login_failure_is_auth_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user@gmail.com wrong\r\n")
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("user@gmail.com", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref text) if text.contains("Invalid credentials")));
    assert!(err.is_auth());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn login_throttling_stays_transient() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 LOGIN user@gmail.com secret\r\n")
        .read(b"A0000 NO [ALERT] Too many simultaneous connections. (Failure)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("user@gmail.com", "secret").await.unwrap_err();
    assert!(matches!(err, Error::No { .. }));
    assert!(err.is_transient());
    assert!(!err.is_auth());
}

#[tokio::test]
async fn xoauth2_unavailable_stays_transient() {
    let token = Token::new("ya29.token", "Bearer");
    let initial = mailkeep_oauth::sasl::xoauth2_response("user@gmail.com", "ya29.token");
    let command = format!("A0000 AUTHENTICATE XOAUTH2 {initial}\r\n");

    let mock = Builder::new()
        .read(GREETING)
        .write(command.as_bytes())
        .read(b"A0000 NO [UNAVAILABLE] Temporary System Error (Failure)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client
        .authenticate_xoauth2("user@gmail.com", &token)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(!err.is_auth());
}

#[tokio::test]
async fn xoauth2_success_updates_capabilities() {
    let token = Token::new("ya29.token", "Bearer");
    let initial = mailkeep_oauth::sasl::xoauth2_response("user@gmail.com", "ya29.token");
    let command = format!("A0000 AUTHENTICATE XOAUTH2 {initial}\r\n");

    let mock = Builder::new()
        .read(GREETING)
        .write(command.as_bytes())
        .read(b"A0000 OK [CAPABILITY IMAP4rev1 X-GM-EXT-1 UIDPLUS] user@gmail.com authenticated (Success)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client
        .authenticate_xoauth2("user@gmail.com", &token)
        .await
        .unwrap();
    assert!(client.supports_gmail_ext());
    assert!(client.has_capability(&Capability::UidPlus));
}

#[tokio::test]
async fn xoauth2_rejection_answers_challenge() {
    let token = Token::new("ya29.expired", "Bearer");
    let initial = mailkeep_oauth::sasl::xoauth2_response("user@gmail.com", "ya29.expired");
    let command = format!("A0000 AUTHENTICATE XOAUTH2 {initial}\r\n");

    // {"status":"400","schemes":"Bearer","scope":"https://mail.google.com/"}
    let challenge = b"+ eyJzdGF0dXMiOiI0MDAiLCJzY2hlbWVzIjoiQmVhcmVyIiwic2NvcGUiOiJodHRwczovL21haWwuZ29vZ2xlLmNvbS8ifQ==\r\n";

    let mock = Builder::new()
        .read(GREETING)
        .write(command.as_bytes())
        .read(challenge)
        .write(b"\r\n")
        .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials (Failure)\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client
        .authenticate_xoauth2("user@gmail.com", &token)
        .await
        .unwrap_err();

    match err {
        Error::Auth(text) => {
            assert!(text.contains("Invalid credentials"));
            assert!(text.contains("status 400"));
        }
        other => panic!("Expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn bye_greeting_is_rejected() {
    let mock = Builder::new()
        .read(b"* BYE Too many simultaneous connections\r\n")
        .build();

    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(_)));
    assert!(err.is_transient());
}

async fn selected_client(
    mock: tokio_test::io::Mock,
) -> Client<tokio_test::io::Mock, mailkeep_imap::Selected> {
    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("user@gmail.com", "secret").await.unwrap();
    client.select("[Gmail]/All Mail").await.unwrap()
}

fn session_prefix(builder: &mut Builder) -> &mut Builder {
    builder
        .read(GREETING)
        .write(b"A0000 LOGIN user@gmail.com secret\r\n")
        .read(b"A0000 OK authenticated (Success)\r\n")
        .write(b"A0001 SELECT \"[Gmail]/All Mail\"\r\n")
        .read(b"* 3 EXISTS\r\n")
        .read(b"A0001 OK [READ-WRITE] selected. (Success)\r\n")
}

#[tokio::test]
async fn gmail_search_and_fetch() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 UID SEARCH X-GM-RAW \"in:anywhere newer_than:10d\"\r\n")
        .read(b"* SEARCH 101 102 105\r\n")
        .read(b"A0002 OK SEARCH completed (Success)\r\n")
        .write(b"A0003 UID FETCH 101:102,105 (UID X-GM-MSGID X-GM-THRID X-GM-LABELS FLAGS INTERNALDATE BODY.PEEK[])\r\n")
        .read(b"* 1 FETCH (X-GM-THRID 1700000000000000001 X-GM-MSGID 1700000000000000001 X-GM-LABELS (\\Inbox \"Project X\") UID 101 FLAGS (\\Seen) INTERNALDATE \"05-Mar-2024 10:11:12 +0000\" BODY[] {17}\r\n")
        .read(b"Subject: hi\r\n\r\nyo)\r\n")
        .read(b"* 2 FETCH (X-GM-THRID 1700000000000000001 X-GM-MSGID 1700000000000000002 X-GM-LABELS () UID 102 FLAGS () INTERNALDATE \"06-Mar-2024 08:00:00 +0100\" BODY[] NIL)\r\n")
        .read(b"A0003 OK Success\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;

    let uids = client
        .uid_search(SearchCriteria::GmailRaw("in:anywhere newer_than:10d".to_string()))
        .await
        .unwrap();
    assert_eq!(uids, vec![uid(101), uid(102), uid(105)]);

    let set = UidSet::from_uids(&uids).unwrap();
    let fetched = client
        .uid_fetch(
            &set,
            vec![
                FetchAttribute::Uid,
                FetchAttribute::GmailMsgId,
                FetchAttribute::GmailThreadId,
                FetchAttribute::GmailLabels,
                FetchAttribute::Flags,
                FetchAttribute::InternalDate,
                FetchAttribute::Body {
                    section: None,
                    peek: true,
                },
            ],
        )
        .await
        .unwrap();

    // UID 105 was silently skipped by the server.
    assert_eq!(fetched.len(), 2);

    let (_, first) = &fetched[0];
    assert!(first.contains(&FetchItem::GmailMsgId(1_700_000_000_000_000_001)));
    assert!(first.contains(&FetchItem::GmailLabels(vec![
        "\\Inbox".to_string(),
        "Project X".to_string()
    ])));
    assert!(first.iter().any(|item| matches!(
        item,
        FetchItem::Body { data: Some(data), .. } if data == b"Subject: hi\r\n\r\nyo"
    )));

    let (_, second) = &fetched[1];
    assert!(second.iter().any(|item| matches!(item, FetchItem::Body { data: None, .. })));
}

#[tokio::test]
async fn append_returns_appenduid() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 APPEND \"[Gmail]/All Mail\" (\\Seen) \"05-Mar-2024 10:11:12 +0000\" {5}\r\n")
        .read(b"+ go ahead\r\n")
        .write(b"hello")
        .write(b"\r\n")
        .read(b"A0002 OK [APPENDUID 11 40212] (Success)\r\n")
        .write(b"A0003 UID STORE 40212 +X-GM-LABELS.SILENT (\\Inbox Work)\r\n")
        .read(b"A0003 OK Success\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;

    let appended = client
        .append(
            "[Gmail]/All Mail",
            &[Flag::Seen, Flag::Recent],
            Some("05-Mar-2024 10:11:12 +0000"),
            b"hello",
        )
        .await
        .unwrap();
    assert_eq!(appended, Some(uid(40212)));

    client
        .uid_store(
            &UidSet::single(uid(40212)),
            StoreAction::AddLabels(vec!["\\Inbox".to_string(), "Work".to_string()]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn append_refused_before_literal() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 APPEND \"[Gmail]/All Mail\" {5}\r\n")
        .read(b"A0002 NO [LIMIT] Message too large. (Failure)\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;
    let err = client
        .append("[Gmail]/All Mail", &[], None, b"hello")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::No { .. }));
}

#[tokio::test]
async fn append_parse_rejection() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 APPEND \"[Gmail]/All Mail\" {5}\r\n")
        .read(b"+ go ahead\r\n")
        .write(b"hello")
        .write(b"\r\n")
        .read(b"A0002 NO [PARSE] Unable to parse message (Failure)\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;
    let err = client
        .append("[Gmail]/All Mail", &[], None, b"hello")
        .await
        .unwrap_err();
    assert!(err.is_parse_rejection());
}

#[tokio::test]
async fn throttled_fetch_is_transient() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 UID FETCH 7 X-GM-MSGID\r\n")
        .read(b"A0002 NO [THROTTLED] Account exceeded bandwidth limits (Failure)\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;
    let err = client
        .uid_fetch(&UidSet::single(uid(7)), vec![FetchAttribute::GmailMsgId])
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn dropped_connection_mid_command() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 CAPABILITY\r\n")
        .read(b"* BYE System error\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;
    let err = client.capability().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)));
    assert!(err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn stalled_server_times_out() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0000 CAPABILITY\r\n")
        .wait(Duration::from_secs(120))
        .build();

    let mut client = Client::from_stream_with_timeout(mock, Duration::from_secs(30))
        .await
        .unwrap();
    let err = client.capability().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}

#[tokio::test]
async fn existing_label_while_selected() {
    let mut builder = Builder::new();
    session_prefix(&mut builder)
        .write(b"A0002 CREATE \"Project X\"\r\n")
        .read(b"A0002 NO [ALREADYEXISTS] Duplicate folder name Project X (Failure)\r\n")
        .write(b"A0003 LOGOUT\r\n")
        .read(b"* BYE LOGOUT Requested\r\n")
        .read(b"A0003 OK 73 good day (Success)\r\n");
    let mock = builder.build();

    let mut client = selected_client(mock).await;
    let err = client.create("Project X").await.unwrap_err();
    assert!(err.is_already_exists());
    client.logout().await.unwrap();
}
