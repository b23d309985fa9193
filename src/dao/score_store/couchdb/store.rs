use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::{
        models::{MatchStatus, ScoreWrite},
        score_store::{ScoreStore, roster_from_rows, validate_status_change, validate_write},
        storage::{StorageError, StorageResult},
    },
    scoring::{HoleScore, MatchRoster, ScoreGrid},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchMatchDocument, CouchScoreDocument, END_SUFFIX, match_doc_id,
        match_scores_prefix, parse_score_doc_id, score_doc_id,
    },
};

/// Score store persisting one document per match and one per scored cell.
#[derive(Clone)]
pub struct CouchScoreStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchScoreStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .username
                .zip(config.password)
                .map(|(user, pass)| (Arc::from(user), Arc::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            // Already gone: clearing is idempotent.
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn load_match(&self, match_id: Uuid) -> StorageResult<CouchMatchDocument> {
        self.get_document::<CouchMatchDocument>(&match_doc_id(match_id))
            .await?
            .ok_or_else(|| StorageError::not_found(format!("match `{match_id}`")))
    }

    async fn load_scores(&self, match_id: Uuid) -> StorageResult<Vec<HoleScore>> {
        let docs = self
            .list_documents::<CouchScoreDocument>(&match_scores_prefix(match_id))
            .await?;

        docs.into_iter()
            .map(|doc| -> StorageResult<HoleScore> {
                let (doc_match, doc_player, doc_hole) = parse_score_doc_id(&doc.id)?;
                if doc_match != doc.body.match_id
                    || doc_player != doc.body.player_id
                    || doc_hole != doc.body.hole
                {
                    return Err(CouchDaoError::InvalidDocId {
                        doc_id: doc.id,
                        kind: "key does not match document body",
                    }
                    .into());
                }
                Ok(doc.into())
            })
            .collect()
    }

    async fn store_score(&self, write: ScoreWrite) -> StorageResult<()> {
        let match_doc = self.load_match(write.match_id).await?;
        let roster = roster_from_rows(write.match_id, &match_doc.body.players)?;
        validate_write(match_doc.body.status, &roster, &write)?;

        let doc_id = score_doc_id(write.match_id, write.player_id, write.hole);
        let existing = self.get_document::<CouchScoreDocument>(&doc_id).await?;

        match (write.score, existing) {
            (Some(score), existing) => {
                if existing.as_ref().map(|doc| doc.body.score) == Some(score) {
                    return Ok(());
                }
                let rev = existing.and_then(|doc| doc.rev);
                let doc = CouchScoreDocument::new(
                    write.match_id,
                    write.player_id,
                    write.hole,
                    score,
                    rev,
                );
                self.put_document(&doc_id, &doc).await?;
            }
            (None, Some(existing)) => {
                if let Some(rev) = existing.rev {
                    self.delete_document(&doc_id, &rev).await?;
                }
            }
            (None, None) => {}
        }

        debug!(
            match_id = %write.match_id,
            player_id = %write.player_id,
            hole = %write.hole,
            score = ?write.score,
            "score document written"
        );
        Ok(())
    }

    async fn store_status(&self, match_id: Uuid, status: MatchStatus) -> StorageResult<()> {
        let mut match_doc = self.load_match(match_id).await?;
        let roster = roster_from_rows(match_id, &match_doc.body.players)?;
        let grid: ScoreGrid = self.load_scores(match_id).await?.into_iter().collect();
        validate_status_change(match_doc.body.status, status, &roster, &grid)?;

        if match_doc.body.status == status {
            return Ok(());
        }

        match_doc.body.status = status;
        let doc_id = match_doc.id.clone();
        // The `_rev` read above makes a concurrent status change surface as 409.
        self.put_document(&doc_id, &match_doc)
            .await
            .map_err(Into::into)
    }
}

impl ScoreStore for CouchScoreStore {
    fn fetch_scores(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<HoleScore>>> {
        let store = self.clone();
        Box::pin(async move { store.load_scores(match_id).await })
    }

    fn write_score(&self, write: ScoreWrite) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.store_score(write).await })
    }

    fn fetch_roster(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<MatchRoster>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store.load_match(match_id).await?;
            roster_from_rows(match_id, &doc.body.players)
        })
    }

    fn fetch_match_status(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<MatchStatus>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.load_match(match_id).await?.body.status) })
    }

    fn set_match_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.store_status(match_id, status).await })
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<Uuid>> {
        // No change feed wired up; watchers fall back to polling.
        None
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
