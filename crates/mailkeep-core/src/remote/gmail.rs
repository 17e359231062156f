//! [`RemoteStore`] over a Gmail IMAP session.

use std::collections::HashSet;

use mailkeep_imap::{
    Client, Config, FetchItem, Flag, ImapStream, ListResponse, NotAuthenticated, Selected,
    StoreAction, Uid, UidSet,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::labels;
use super::retry::{Reconnect, RetryPolicy};
use super::{FetchFields, FetchedMessage, Folder, RemoteStore, SearchFilter, format_internal_date, parse_internal_date};
use crate::credential::{Credential, NoRefresh, TokenRefresher};
use crate::headers::IdentityHeaders;
use crate::{Error, Result};

const ALL_MAIL: [&str; 2] = ["[Gmail]/All Mail", "[Google Mail]/All Mail"];
const CHATS: [&str; 2] = ["[Gmail]/Chats", "[Google Mail]/Chats"];

/// Opens unauthenticated IMAP connections.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// Transport of the connections.
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Connects and reads the greeting.
    async fn connect(&self) -> mailkeep_imap::Result<Client<Self::Stream, NotAuthenticated>>;
}

/// Connects over TLS as described by an IMAP [`Config`].
#[derive(Debug, Clone)]
pub struct TlsConnector {
    config: Config,
}

impl TlsConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Connector for TlsConnector {
    type Stream = ImapStream;

    async fn connect(&self) -> mailkeep_imap::Result<Client<ImapStream, NotAuthenticated>> {
        Client::connect(&self.config).await
    }
}

/// Server names of the folders the engines use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folders {
    /// The folder holding every message.
    pub all_mail: String,
    /// The chats folder, when the account exposes one.
    pub chats: Option<String>,
    /// Every folder the server listed, decoded.
    pub names: Vec<String>,
}

/// Finds the All Mail and Chats folders in a `LIST` answer.
///
/// Both the `[Gmail]` and the `[Google Mail]` spellings are recognized.
/// Without an All Mail folder the account cannot be backed up, and the
/// error lists what the server offered.
pub fn discover_folders(list: &[ListResponse]) -> Result<Folders> {
    let find = |candidates: &[&str]| {
        list.iter()
            .map(|item| item.mailbox.as_str())
            .find(|name| candidates.iter().any(|c| c.eq_ignore_ascii_case(name)))
            .map(ToString::to_string)
    };
    let names: Vec<String> = list
        .iter()
        .map(|item| labels::decode(item.mailbox.as_str()))
        .collect();

    let Some(all_mail) = find(&ALL_MAIL) else {
        return Err(Error::Config(format!(
            "no All Mail folder found; the server lists: {}",
            names.join(", ")
        )));
    };
    let chats = find(&CHATS);
    if chats.is_none() {
        warn!("no Chats folder, chat transcripts are unavailable");
    }

    Ok(Folders {
        all_mail,
        chats,
        names,
    })
}

/// A Gmail mailbox reached over IMAP.
///
/// The session is opened eagerly and re-opened by [`Reconnect`]. Every
/// remote operation runs under the configured [`RetryPolicy`].
pub struct GmailRemote<C: Connector, T = NoRefresh> {
    connector: C,
    email: String,
    credential: Credential,
    refresher: T,
    retry: RetryPolicy,
    session: Option<Client<C::Stream, Selected>>,
    folders: Folders,
    known_labels: HashSet<String>,
    selected: Folder,
    sessions: u32,
}

impl<C: Connector, T> std::fmt::Debug for GmailRemote<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailRemote")
            .field("email", &self.email)
            .field("credential", &self.credential)
            .field("folders", &self.folders)
            .field("selected", &self.selected)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: Connector, T: TokenRefresher> GmailRemote<C, T> {
    /// Connects, authenticates and selects All Mail.
    ///
    /// # Errors
    ///
    /// [`Error::Auth`] when the credentials are refused, [`Error::Config`]
    /// when the server is not Gmail or lacks an All Mail folder.
    pub async fn connect(
        connector: C,
        email: impl Into<String>,
        credential: Credential,
        refresher: T,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let mut remote = Self {
            connector,
            email: email.into(),
            credential,
            refresher,
            retry,
            session: None,
            folders: Folders::default(),
            known_labels: HashSet::new(),
            selected: Folder::AllMail,
            sessions: 0,
        };
        remote.open_session().await?;
        Ok(remote)
    }

    /// Folders found at the last login.
    #[must_use]
    pub const fn folders(&self) -> &Folders {
        &self.folders
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the LOGOUT could not be sent.
    pub async fn logout(mut self) -> Result<()> {
        if let Some(client) = self.session.take() {
            client.logout().await?;
        }
        Ok(())
    }

    async fn open_session(&mut self) -> Result<()> {
        let client = self.connector.connect().await?;

        let authenticated = match &mut self.credential {
            Credential::Password(password) => client.login(&self.email, password).await,
            Credential::Bearer(token) => {
                if self.sessions > 0 || token.is_expired() {
                    *token = self.refresher.refresh(&self.email, token).await?;
                }
                client.authenticate_xoauth2(&self.email, token).await
            }
        };
        let mut client = authenticated.map_err(|err| auth_error(&self.email, err))?;

        if !client.supports_gmail_ext() {
            client.capability().await?;
        }
        if !client.supports_gmail_ext() {
            return Err(Error::Config(
                "server does not advertise X-GM-EXT-1, not a Gmail IMAP server".to_string(),
            ));
        }

        let folders = discover_folders(&client.list("", "*").await?)?;
        self.known_labels.extend(folders.names.iter().cloned());
        self.folders = folders;

        let mailbox = self.mailbox(self.selected)?;
        self.session = Some(client.select(&mailbox).await?);
        self.sessions += 1;
        debug!(email = %self.email, %mailbox, "session ready");
        Ok(())
    }

    fn mailbox(&self, folder: Folder) -> Result<String> {
        match folder {
            Folder::AllMail => Ok(self.folders.all_mail.clone()),
            Folder::Chats => self
                .folders
                .chats
                .clone()
                .ok_or_else(|| Error::Config("the account has no Chats folder".to_string())),
        }
    }

    fn client(&mut self) -> Result<&mut Client<C::Stream, Selected>> {
        self.session
            .as_mut()
            .ok_or_else(|| mailkeep_imap::Error::ConnectionLost("no open session".to_string()).into())
    }
}

fn auth_error(email: &str, err: mailkeep_imap::Error) -> Error {
    if err.is_auth() {
        Error::Auth {
            email: email.to_string(),
            reason: err.to_string(),
        }
    } else {
        err.into()
    }
}

/// Builds a message from the items of one FETCH response.
///
/// Responses without a UID or gmail id are unsolicited updates and yield
/// nothing.
fn fetched_message(items: Vec<FetchItem>) -> Option<FetchedMessage> {
    let mut uid = None;
    let mut gmail_id = None;
    let mut thread_id = 0;
    let mut names = Vec::new();
    let mut flags = Vec::new();
    let mut internal_date = None;
    let mut headers = IdentityHeaders::default();
    let mut body = None;

    for item in items {
        match item {
            FetchItem::Uid(value) => uid = Some(value),
            FetchItem::GmailMsgId(id) => gmail_id = Some(id),
            FetchItem::GmailThreadId(id) => thread_id = id,
            FetchItem::GmailLabels(raw) => {
                names = raw.iter().map(|label| labels::decode(label)).collect();
            }
            FetchItem::Flags(list) => {
                flags = list.iter().map(|flag| flag.as_str().to_string()).collect();
            }
            FetchItem::InternalDate(raw) => internal_date = parse_internal_date(&raw),
            FetchItem::Body {
                section: Some(section),
                data,
                ..
            } if section.starts_with("HEADER") => {
                headers = IdentityHeaders::parse(data.as_deref().unwrap_or_default());
            }
            FetchItem::Body {
                section: None,
                data,
                ..
            } => body = Some(data.unwrap_or_default()),
            _ => {}
        }
    }

    let (Some(uid), Some(gmail_id)) = (uid, gmail_id) else {
        debug!("skipping fetch response without identity");
        return None;
    };
    Some(FetchedMessage {
        uid,
        gmail_id,
        thread_id,
        labels: names,
        flags,
        internal_date,
        headers,
        body,
    })
}

impl<C: Connector, T: TokenRefresher> Reconnect for GmailRemote<C, T> {
    async fn reconnect(&mut self) -> Result<()> {
        self.session = None;
        warn!(email = %self.email, after = self.sessions, "reconnecting");
        self.open_session().await
    }
}

impl<C: Connector, T: TokenRefresher> RemoteStore for GmailRemote<C, T> {
    fn email(&self) -> &str {
        &self.email
    }

    fn has_chats(&self) -> bool {
        self.folders.chats.is_some()
    }

    fn reconnections(&self) -> u32 {
        self.sessions.saturating_sub(1)
    }

    async fn select_folder(&mut self, folder: Folder) -> Result<()> {
        let mailbox = self.mailbox(folder)?;
        self.selected = folder;
        let policy = self.retry;
        policy
            .run("select", self, async |remote: &mut Self| {
                let client = remote.session.take().ok_or_else(|| {
                    Error::from(mailkeep_imap::Error::ConnectionLost("no open session".to_string()))
                })?;
                remote.session = Some(client.select(&mailbox).await?);
                Ok(())
            })
            .await
    }

    async fn search(&mut self, filter: &SearchFilter) -> Result<Vec<Uid>> {
        let criteria = filter.criteria();
        let policy = self.retry;
        policy
            .run("search", self, async |remote: &mut Self| {
                Ok(remote.client()?.uid_search(criteria.clone()).await?)
            })
            .await
    }

    async fn fetch(&mut self, uids: &[Uid], fields: FetchFields) -> Result<Vec<FetchedMessage>> {
        let Some(set) = UidSet::from_uids(uids) else {
            return Ok(Vec::new());
        };
        let attributes = fields.attributes();
        let policy = self.retry;
        let rows = policy
            .run("fetch", self, async |remote: &mut Self| {
                Ok(remote.client()?.uid_fetch(&set, attributes.clone()).await?)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(_, items)| fetched_message(items))
            .collect())
    }

    async fn append(
        &mut self,
        folder: Folder,
        body: &[u8],
        flags: &[String],
        internal_date: i64,
    ) -> Result<Uid> {
        let mailbox = self.mailbox(folder)?;
        let date = format_internal_date(internal_date);
        let flags: Vec<Flag> = flags.iter().map(|flag| Flag::parse(flag)).collect();
        let policy = self.retry;
        policy
            .run("append", self, async |remote: &mut Self| {
                match remote.client()?.append(&mailbox, &flags, Some(&date), body).await {
                    Ok(Some(uid)) => Ok(uid),
                    Ok(None) => Err(Error::MissingAppendUid),
                    Err(err) if err.is_parse_rejection() => Err(Error::PushRejected(err.to_string())),
                    Err(err) => Err(err.into()),
                }
            })
            .await
    }

    async fn create_label(&mut self, name: &str) -> Result<()> {
        for prefix in labels::hierarchy(name) {
            if labels::is_reserved(&prefix) || self.known_labels.contains(&prefix) {
                continue;
            }
            let wire = labels::encode(&prefix);
            let policy = self.retry;
            let created = policy
                .run("create", self, async |remote: &mut Self| {
                    Ok(remote.client()?.create(&wire).await?)
                })
                .await;
            match created {
                Ok(()) => info!(label = %prefix, "label created"),
                Err(Error::Imap(err)) if err.is_already_exists() => {
                    debug!(label = %prefix, "label already exists");
                }
                Err(err) => return Err(err),
            }
            self.known_labels.insert(prefix);
        }
        Ok(())
    }

    async fn delete_label(&mut self, name: &str) -> Result<()> {
        if labels::is_reserved(name) {
            return Err(Error::Config(format!("refusing to delete reserved label {name}")));
        }
        let wire = labels::encode(name);
        let policy = self.retry;
        policy
            .run("delete", self, async |remote: &mut Self| {
                Ok(remote.client()?.delete(&wire).await?)
            })
            .await?;
        self.known_labels.remove(name);
        info!(label = %name, "label deleted");
        Ok(())
    }

    async fn set_labels(&mut self, uid: Uid, names: &[String]) -> Result<()> {
        let set = UidSet::single(uid);
        let wire: Vec<String> = names.iter().map(|name| labels::encode(name)).collect();
        let policy = self.retry;
        policy
            .run("store", self, async |remote: &mut Self| {
                Ok(remote
                    .client()?
                    .uid_store(&set, StoreAction::SetLabels(wire.clone()))
                    .await?)
            })
            .await
    }
}
