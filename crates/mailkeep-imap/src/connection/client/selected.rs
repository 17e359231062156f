//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::{Command, FetchAttribute, SearchCriteria, StoreAction};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{SeqNum, Uid, UidSet};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox and its SELECT snapshot.
    #[must_use]
    pub const fn selected(&self) -> &Selected {
        &self.state
    }

    /// Searches by UID.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let completion = self.execute(&Command::UidSearch { criteria }).await?;

        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .filter_map(Uid::new)
            .collect())
    }

    /// Fetches message data by UID.
    ///
    /// Messages the server silently skips are simply absent from the result.
    pub async fn uid_fetch(
        &mut self,
        uids: &UidSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let completion = self
            .execute(&Command::UidFetch {
                uids: uids.clone(),
                items,
            })
            .await?;

        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
                _ => None,
            })
            .collect())
    }

    /// Changes flags or labels by UID without echoing the result.
    pub async fn uid_store(&mut self, uids: &UidSet, action: StoreAction) -> Result<()> {
        self.execute(&Command::UidStore {
            uids: uids.clone(),
            action,
            silent: true,
        })
        .await?;
        Ok(())
    }
}
