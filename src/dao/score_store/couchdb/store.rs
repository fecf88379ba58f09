use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::dao::{
    models::{NewScoreEntity, ScoreEntity, ScoreId},
    score_store::ScoreStore,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        CouchScoreDocument, CreatedResponse, FIND_PAGE_SIZE, FindRequest, FindResponse,
        IndexRequest,
    },
};

const FIND_PATH: &str = "_find";
const INDEX_PATH: &str = "_index";

#[derive(Clone)]
pub struct CouchScoreStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchScoreStore {
    /// Establish a connection to CouchDB, creating the database and its indexes when missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        store.ensure_indexes().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
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
                    debug!(database = %database, "created CouchDB database");
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

    async fn ensure_indexes(&self) -> CouchResult<()> {
        let indexes = [
            IndexRequest::json("score_rank_idx", vec!["score"]),
            IndexRequest::json("user_score_idx", vec!["user_id", "score"]),
        ];

        for index in &indexes {
            let _: serde_json::Value = self.post_json(INDEX_PATH, index).await?;
        }
        Ok(())
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> CouchResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn insert_document(&self, document: &CouchScoreDocument) -> CouchResult<ScoreId> {
        let url = self.database_url();
        let response = self
            .authorize(self.client.post(&url))
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            });
        }

        let created = response
            .json::<CreatedResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse { path: url, source })?;
        Ok(ScoreId::new(created.id))
    }

    async fn find_page(&self, request: &FindRequest) -> CouchResult<FindResponse> {
        let page: FindResponse = self.post_json(FIND_PATH, request).await?;
        if let Some(warning) = page.warning.as_deref() {
            warn!(warning, "CouchDB query warning");
        }
        Ok(page)
    }

    /// Run a query to exhaustion, following bookmarks page by page.
    async fn find_all(&self, request: FindRequest) -> CouchResult<Vec<CouchScoreDocument>> {
        let mut documents = Vec::new();
        let mut request = request;

        loop {
            let page = self.find_page(&request).await?;
            let page_len = page.docs.len();
            documents.extend(page.docs);

            match page.bookmark {
                Some(bookmark) if page_len == request.limit => {
                    request = request.after(bookmark);
                }
                _ => break,
            }
        }

        Ok(documents)
    }
}

fn into_entities(documents: Vec<CouchScoreDocument>) -> Vec<ScoreEntity> {
    documents
        .into_iter()
        .filter_map(CouchScoreDocument::into_entity)
        .collect()
}

impl ScoreStore for CouchScoreStore {
    fn insert_score(&self, score: NewScoreEntity) -> BoxFuture<'static, StorageResult<ScoreId>> {
        let store = self.clone();
        Box::pin(async move {
            let document = CouchScoreDocument::from(score);
            store.insert_document(&document).await.map_err(Into::into)
        })
    }

    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let page = store.find_page(&FindRequest::top(limit)).await?;
            Ok(into_entities(page.docs))
        })
    }

    fn user_scores(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store
                .find_all(FindRequest::for_user(&user_id, FIND_PAGE_SIZE))
                .await?;
            Ok(into_entities(documents))
        })
    }

    fn user_best(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let page = store.find_page(&FindRequest::for_user(&user_id, 1)).await?;
            Ok(into_entities(page.docs).into_iter().next())
        })
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
        Box::pin(async move {
            store.ensure_database().await?;
            store.ensure_indexes().await.map_err(Into::into)
        })
    }
}
