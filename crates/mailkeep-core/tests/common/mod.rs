//! In-memory mailbox for engine scenarios.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashSet};

use mailkeep_core::headers::IdentityHeaders;
use mailkeep_core::remote::Uid;
use mailkeep_core::{
    Archive, ArchiveOptions, Error, FetchFields, FetchedMessage, Folder, GmailId, MessageRecord,
    Metadata, Reconnect, RemoteStore, Result, SearchFilter, StopSignal, StoreSettings,
};
use tempfile::TempDir;

pub const EMAIL: &str = "me@gmail.com";
pub const JAN_2021: i64 = 1_609_459_200;
pub const FEB_2021: i64 = 1_612_137_600;

/// A message as the fake server holds it.
#[derive(Debug, Clone)]
pub struct FakeMessage {
    pub gmail_id: GmailId,
    pub labels: Vec<String>,
    pub flags: Vec<String>,
    pub internal_date: i64,
    pub body: Vec<u8>,
}

impl FakeMessage {
    pub fn new(gmail_id: GmailId, internal_date: i64, labels: &[&str]) -> Self {
        Self {
            gmail_id,
            labels: labels.iter().map(ToString::to_string).collect(),
            flags: vec!["\\Seen".to_string()],
            internal_date,
            body: format!("Subject: message {gmail_id}\r\n\r\nbody {gmail_id}\r\n").into_bytes(),
        }
    }
}

/// Appended message as recorded by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub body: Vec<u8>,
    pub flags: Vec<String>,
    pub internal_date: i64,
}

#[derive(Default)]
pub struct FakeRemote {
    pub all_mail: BTreeMap<u32, FakeMessage>,
    pub chats: Option<BTreeMap<u32, FakeMessage>>,
    pub selected: Folder,
    pub next_uid: u32,

    pub searches: Vec<SearchFilter>,
    pub body_fetches: usize,
    pub created_labels: Vec<String>,
    pub appended: Vec<Appended>,
    pub label_sets: Vec<(Uid, Vec<String>)>,
    pub reconnects: u32,

    /// UIDs whose metadata fetch is refused.
    pub refuse_metadata: HashSet<u32>,
    /// UIDs whose body fetch is refused.
    pub refuse_body: HashSet<u32>,
    /// Refuse every gmail-id fetch.
    pub refuse_gmail_ids: bool,
    /// Bodies the server cannot parse.
    pub unparseable: HashSet<Vec<u8>>,
    /// Bodies stored without an APPENDUID.
    pub no_append_uid: HashSet<Vec<u8>>,
    /// Number of upcoming appends that drop the connection.
    pub dropped_appends: usize,
    /// Number of upcoming label stores that drop the connection.
    pub dropped_label_stores: usize,
    /// Refuse every append once this many succeeded.
    pub fail_appends_after: Option<usize>,
    /// Raise the stop signal once this many appends succeeded.
    pub stop_after: Option<(usize, StopSignal)>,
}

impl FakeRemote {
    pub fn with_messages(messages: Vec<FakeMessage>) -> Self {
        let mut remote = Self::default();
        for message in messages {
            remote.add(message);
        }
        remote
    }

    pub fn add(&mut self, message: FakeMessage) -> u32 {
        self.next_uid += 1;
        self.all_mail.insert(self.next_uid, message);
        self.next_uid
    }

    pub fn add_chat(&mut self, message: FakeMessage) {
        self.next_uid += 1;
        self.chats
            .get_or_insert_with(BTreeMap::new)
            .insert(self.next_uid, message);
    }

    pub fn message_mut(&mut self, gmail_id: GmailId) -> &mut FakeMessage {
        self.all_mail
            .values_mut()
            .find(|message| message.gmail_id == gmail_id)
            .unwrap()
    }

    fn folder(&self) -> &BTreeMap<u32, FakeMessage> {
        match self.selected {
            Folder::AllMail => &self.all_mail,
            Folder::Chats => self.chats.as_ref().unwrap(),
        }
    }
}

fn refused(text: &str) -> Error {
    Error::Imap(mailkeep_imap::Error::No {
        code: None,
        text: text.to_string(),
    })
}

fn dropped() -> Error {
    Error::Imap(mailkeep_imap::Error::ConnectionLost("connection reset".to_string()))
}

fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

impl Reconnect for FakeRemote {
    async fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        Ok(())
    }
}

impl RemoteStore for FakeRemote {
    fn email(&self) -> &str {
        EMAIL
    }

    fn has_chats(&self) -> bool {
        self.chats.is_some()
    }

    fn reconnections(&self) -> u32 {
        self.reconnects
    }

    async fn select_folder(&mut self, folder: Folder) -> Result<()> {
        if folder == Folder::Chats && self.chats.is_none() {
            return Err(Error::Config("no chats".into()));
        }
        self.selected = folder;
        Ok(())
    }

    async fn search(&mut self, filter: &SearchFilter) -> Result<Vec<Uid>> {
        self.searches.push(filter.clone());
        let matches = |message: &FakeMessage| match filter {
            SearchFilter::All | SearchFilter::Imap(_) => true,
            SearchFilter::GmailRaw(label) => message.labels.contains(label),
            SearchFilter::Since(day) => {
                message.internal_date >= day.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
            }
        };
        Ok(self
            .folder()
            .iter()
            .filter(|(_, message)| matches(message))
            .map(|(n, _)| uid(*n))
            .collect())
    }

    async fn fetch(&mut self, uids: &[Uid], fields: FetchFields) -> Result<Vec<FetchedMessage>> {
        let wanted: Vec<u32> = uids.iter().map(|u| u.get()).collect();
        match fields {
            FetchFields::GmailId if self.refuse_gmail_ids => {
                return Err(refused("Some messages could not be FETCHed (Failure)"));
            }
            FetchFields::Metadata if wanted.iter().any(|n| self.refuse_metadata.contains(n)) => {
                return Err(refused("Some messages could not be FETCHed (Failure)"));
            }
            FetchFields::Full if wanted.iter().any(|n| self.refuse_body.contains(n)) => {
                return Err(refused("Some messages could not be FETCHed (Failure)"));
            }
            FetchFields::Full => self.body_fetches += 1,
            _ => {}
        }

        let folder = self.folder();
        Ok(wanted
            .into_iter()
            .filter_map(|n| folder.get(&n).map(|message| (n, message)))
            .map(|(n, message)| FetchedMessage {
                uid: uid(n),
                gmail_id: message.gmail_id,
                thread_id: message.gmail_id,
                labels: message.labels.clone(),
                flags: message.flags.clone(),
                internal_date: Some(message.internal_date),
                headers: IdentityHeaders {
                    subject: Some(format!("message {}", message.gmail_id)),
                    ..IdentityHeaders::default()
                },
                body: (fields == FetchFields::Full).then(|| message.body.clone()),
            })
            .collect())
    }

    async fn append(
        &mut self,
        _folder: Folder,
        body: &[u8],
        flags: &[String],
        internal_date: i64,
    ) -> Result<Uid> {
        if self.dropped_appends > 0 {
            self.dropped_appends -= 1;
            return Err(dropped());
        }
        if self.fail_appends_after.is_some_and(|n| self.appended.len() >= n) {
            return Err(refused("[TRYCREATE] Folder doesn't exist"));
        }
        if self.unparseable.contains(body) {
            return Err(Error::PushRejected("Unable to parse message".into()));
        }

        self.appended.push(Appended {
            body: body.to_vec(),
            flags: flags.to_vec(),
            internal_date,
        });
        let gmail_id = 900_000 + self.appended.len() as u64;
        let n = self.add(FakeMessage {
            gmail_id,
            labels: Vec::new(),
            flags: flags.to_vec(),
            internal_date,
            body: body.to_vec(),
        });

        if let Some((after, stop)) = &self.stop_after {
            if self.appended.len() >= *after {
                stop.stop();
            }
        }
        if self.no_append_uid.contains(body) {
            return Err(Error::MissingAppendUid);
        }
        Ok(uid(n))
    }

    async fn create_label(&mut self, name: &str) -> Result<()> {
        self.created_labels.push(name.to_string());
        Ok(())
    }

    async fn delete_label(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn set_labels(&mut self, uid: Uid, labels: &[String]) -> Result<()> {
        if self.dropped_label_stores > 0 {
            self.dropped_label_stores -= 1;
            return Err(dropped());
        }
        self.label_sets.push((uid, labels.to_vec()));
        if let Some(message) = self.all_mail.get_mut(&uid.get()) {
            message.labels = labels.to_vec();
        }
        Ok(())
    }
}

pub fn record(gmail_id: GmailId, internal_date: i64, labels: &[&str]) -> MessageRecord {
    let message = FakeMessage::new(gmail_id, internal_date, labels);
    MessageRecord {
        metadata: Metadata {
            gmail_id,
            thread_id: gmail_id,
            labels: message.labels,
            flags: vec!["\\Seen".to_string(), "\\Recent".to_string()],
            internal_date,
            subject: Some(format!("message {gmail_id}")),
            message_id: None,
            x_gmail_received: None,
        },
        body: message.body,
    }
}

pub async fn open_archive(dir: &TempDir) -> Archive {
    let mut archive = Archive::open(dir.path(), ArchiveOptions::default())
        .await
        .unwrap();
    archive
        .initialize(EMAIL, StoreSettings::default())
        .await
        .unwrap();
    archive
}
