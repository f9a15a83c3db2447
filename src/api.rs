use crate::error::{AppError, AppResult};
use crate::graph::{Edge, Graph, Node};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Wire shape of the saved pipeline definition, shared by the load GET and
/// the save POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphPayload {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes().to_vec(),
            edges: graph.edges().to_vec(),
        }
    }

    pub fn into_graph(self) -> Graph {
        Graph::from_parts(self.nodes, self.edges)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub dag_id: String,
    /// Node ids only; the executor resolves them against the saved
    /// definition.
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
}

impl ExecuteRequest {
    pub fn from_graph(dag_id: &str, graph: &Graph) -> Self {
        Self {
            dag_id: dag_id.to_string(),
            nodes: graph.nodes().iter().map(|n| n.id.clone()).collect(),
            edges: graph.edges().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: String,
}

/// Loading and saving the pipeline definition.
#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn fetch_graph(&self) -> AppResult<GraphPayload>;
    async fn save_graph(&self, payload: &GraphPayload) -> AppResult<()>;
}

/// Run control against the executor service. `channel_url` derives the
/// address of the per-run message channel from the service base url.
#[async_trait]
pub trait ExecutionApi: Send + Sync {
    async fn execute(&self, request: &ExecuteRequest) -> AppResult<ExecuteResponse>;
    async fn pause(&self, execution_id: &str) -> AppResult<()>;
    async fn resume(&self, execution_id: &str) -> AppResult<()>;
    async fn stop(&self, execution_id: &str) -> AppResult<()>;
    fn channel_url(&self, execution_id: &str) -> AppResult<Url>;
}

/// HTTP implementation of both API seams against the pipeline service.
pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_empty(&self, path: &str) -> AppResult<()> {
        let url = self.api_url(path);
        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "POST {path} returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphApi for HttpApi {
    async fn fetch_graph(&self) -> AppResult<GraphPayload> {
        let url = self.api_url("/api/dag");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "GET /api/dag returned {}",
                response.status()
            )));
        }
        let payload = response.json::<GraphPayload>().await?;
        eprintln!(
            "[api] loaded pipeline definition ({} nodes, {} edges)",
            payload.nodes.len(),
            payload.edges.len()
        );
        Ok(payload)
    }

    async fn save_graph(&self, payload: &GraphPayload) -> AppResult<()> {
        let url = self.api_url("/api/dag");
        let response = self.client.post(&url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "POST /api/dag returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionApi for HttpApi {
    async fn execute(&self, request: &ExecuteRequest) -> AppResult<ExecuteResponse> {
        let url = self.api_url("/api/execute");
        eprintln!(
            "[api] submitting {} for execution ({} nodes)",
            request.dag_id,
            request.nodes.len()
        );
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Api(format!(
                "POST /api/execute returned {}",
                response.status()
            )));
        }
        Ok(response.json::<ExecuteResponse>().await?)
    }

    async fn pause(&self, execution_id: &str) -> AppResult<()> {
        self.post_empty(&format!("/api/executions/{execution_id}/pause")).await
    }

    async fn resume(&self, execution_id: &str) -> AppResult<()> {
        self.post_empty(&format!("/api/executions/{execution_id}/resume")).await
    }

    async fn stop(&self, execution_id: &str) -> AppResult<()> {
        self.post_empty(&format!("/api/executions/{execution_id}/stop")).await
    }

    fn channel_url(&self, execution_id: &str) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Channel(format!("Invalid base url '{}': {e}", self.base_url)))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|_| {
            AppError::Channel(format!(
                "Cannot derive channel scheme from '{}'",
                self.base_url
            ))
        })?;
        url.set_path(&format!("/ws/executions/{execution_id}"));
        Ok(url)
    }
}
