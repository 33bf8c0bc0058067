//! HTTPS implementation of [`GraphApi`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    AccessToken, BatchItemResponse, BatchRequest, BatchResponse, BatchStep, Channel, ChatMessage,
    ConversationMember, ErrorBody, EventExtension, GraphApi, GraphConnector, GraphError,
    ODataCollection, TeamRequest, TeamsAsyncOperation,
};
use crate::config::Config;
use crate::models::{CalendarEvent, User};

/// Fields read from calendar events.
const EVENT_FIELDS: &str =
    "id,subject,bodyPreview,onlineMeeting,end,start,isOnlineMeeting,onlineMeetingProvider";

/// Shared Graph HTTP client.
///
/// Holds the connection pool and base URLs; cloning is cheap.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    beta_url: String,
}

impl GraphClient {
    /// Creates a client from configuration.
    pub fn new(config: &Config) -> Result<Self, GraphError> {
        let http = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self {
            http,
            base_url: config.graph_url.trim_end_matches('/').to_string(),
            beta_url: config.graph_beta_url.trim_end_matches('/').to_string(),
        })
    }
}

impl GraphConnector for GraphClient {
    fn connect(&self, token: &AccessToken) -> Arc<dyn GraphApi> {
        Arc::new(AuthorizedGraph {
            client: self.clone(),
            token: token.clone(),
        })
    }
}

/// [`GraphClient`] bound to one caller's token.
pub struct AuthorizedGraph {
    client: GraphClient,
    token: AccessToken,
}

impl AuthorizedGraph {
    fn v1(&self, path: &str) -> String {
        format!("{}/{}", self.client.base_url, path.trim_start_matches('/'))
    }

    fn beta(&self, path: &str) -> String {
        format!("{}/{}", self.client.beta_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GraphError> {
        let response = request.bearer_auth(self.token.as_str()).send().await?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, GraphError> {
        let response = self.send(self.client.http.get(url)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B, T>(&self, url: String, body: &B) -> Result<T, GraphError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(self.client.http.post(url).json(body)).await?;
        Ok(response.json().await?)
    }
}

async fn status_error(response: Response) -> GraphError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => GraphError::Status {
            status,
            code: body.error.code,
            message: body.error.message,
        },
        Err(_) => GraphError::Status {
            status,
            code: String::new(),
            message: text,
        },
    }
}

#[async_trait]
impl GraphApi for AuthorizedGraph {
    async fn me(&self) -> Result<User, GraphError> {
        let url = format!("{}?$select=id,displayName", self.v1("me"));
        self.get_json(url).await
    }

    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, GraphError> {
        let request = self.client.http.get(self.v1("me/calendarview")).query(&[
            ("startdatetime", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("enddatetime", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("$select", EVENT_FIELDS.to_string()),
        ]);
        let response = self.send(request).await?;
        let events: ODataCollection<CalendarEvent> = response.json().await?;
        Ok(events.value)
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarEvent, GraphError> {
        let request = self
            .client
            .http
            .get(self.v1(&format!("me/calendar/events/{event_id}")))
            .query(&[("$select", EVENT_FIELDS)]);
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn list_chat_members(&self, chat_id: &str) -> Result<Vec<User>, GraphError> {
        let members: ODataCollection<ConversationMember> = self
            .get_json(self.beta(&format!("me/chats/{chat_id}/members")))
            .await?;

        Ok(members
            .value
            .into_iter()
            .filter_map(|m| {
                let id = m.user_id.filter(|id| !id.is_empty())?;
                Some(User::new(id, m.display_name.unwrap_or_default()))
            })
            .collect())
    }

    async fn get_extension(
        &self,
        event_id: &str,
        name: &str,
    ) -> Result<EventExtension, GraphError> {
        self.get_json(self.v1(&format!("me/events/{event_id}/extensions/{name}")))
            .await
    }

    async fn create_extension(
        &self,
        event_id: &str,
        extension: &EventExtension,
    ) -> Result<EventExtension, GraphError> {
        self.post_json(self.v1(&format!("me/events/{event_id}/extensions")), extension)
            .await
    }

    async fn update_extension(
        &self,
        event_id: &str,
        name: &str,
        extension: &EventExtension,
    ) -> Result<(), GraphError> {
        let url = self.v1(&format!("me/events/{event_id}/extensions/{name}"));
        self.send(self.client.http.patch(url).json(extension)).await?;
        Ok(())
    }

    async fn create_team(&self, team: &TeamRequest) -> Result<String, GraphError> {
        let response = self
            .send(self.client.http.post(self.beta("teams")).json(team))
            .await?;

        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(GraphError::MissingField("Location header"))
    }

    async fn get_operation(&self, location: &str) -> Result<TeamsAsyncOperation, GraphError> {
        let url = if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            self.beta(location)
        };
        self.get_json(url).await
    }

    async fn list_channels(&self, team_id: &str) -> Result<Vec<Channel>, GraphError> {
        let channels: ODataCollection<Channel> = self
            .get_json(self.v1(&format!("teams/{team_id}/channels")))
            .await?;
        Ok(channels.value)
    }

    async fn batch(&self, steps: &[BatchStep]) -> Result<Vec<BatchItemResponse>, GraphError> {
        let body = BatchRequest {
            requests: steps.to_vec(),
        };
        let response: BatchResponse = self.post_json(self.beta("$batch"), &body).await?;
        Ok(response.responses)
    }

    async fn archive_team(&self, team_id: &str) -> Result<(), GraphError> {
        let url = self.v1(&format!("teams/{team_id}/archive"));
        self.send(self.client.http.post(url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn send_chat_message(
        &self,
        chat_id: &str,
        message: &ChatMessage,
    ) -> Result<(), GraphError> {
        let url = self.beta(&format!("chats/{chat_id}/messages"));
        self.send(self.client.http.post(url).json(message)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use crate::graph::ChannelRequest;

    /// Serve a mock Graph on an ephemeral port and return a client bound to it.
    async fn mock_graph(app: Router) -> Arc<dyn GraphApi> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut config = Config::from_env();
        config.graph_url = format!("http://{}/v1.0", addr);
        config.graph_beta_url = format!("http://{}/beta", addr);

        GraphClient::new(&config)
            .unwrap()
            .connect(&AccessToken::new("token-123"))
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn test_me_sends_bearer_token() {
        let app = Router::new().route(
            "/v1.0/me",
            get(|headers: HeaderMap| async move {
                match bearer(&headers).as_deref() {
                    Some("Bearer token-123") => {
                        Json(json!({ "id": "u1", "displayName": "Ada" })).into_response()
                    }
                    _ => StatusCode::UNAUTHORIZED.into_response(),
                }
            }),
        );
        let graph = mock_graph(app).await;

        let me = graph.me().await.unwrap();
        assert_eq!(me, User::new("u1", "Ada"));
        assert_eq!(me.display_name, "Ada");
    }

    #[tokio::test]
    async fn test_error_body_is_decoded() {
        let app = Router::new().route(
            "/v1.0/me/events/{event_id}/extensions/{name}",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": { "code": "ErrorItemNotFound", "message": "missing" } })),
                )
            }),
        );
        let graph = mock_graph(app).await;

        let err = graph
            .get_extension("evt-1", "com.moderatorTest")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        match err {
            GraphError::Status { code, message, .. } => {
                assert_eq!(code, "ErrorItemNotFound");
                assert_eq!(message, "missing");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_team_returns_operation_location() {
        let app = Router::new()
            .route(
                "/beta/teams",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["channels"].as_array().unwrap().len(), 2);
                    (
                        StatusCode::ACCEPTED,
                        [(header::LOCATION, "/teams('t1')/operations('op1')")],
                    )
                }),
            )
            .route(
                "/beta/teams('t1')/operations('op1')",
                get(|| async { Json(json!({ "status": "succeeded", "targetResourceId": "t1" })) }),
            );
        let graph = mock_graph(app).await;

        let team = TeamRequest {
            template: "tpl".to_string(),
            visibility: "private".to_string(),
            display_name: "Sync Breakouts".to_string(),
            description: "d".to_string(),
            channels: vec![
                ChannelRequest {
                    display_name: "Group 1".to_string(),
                },
                ChannelRequest {
                    display_name: "Group 2".to_string(),
                },
            ],
        };

        let location = graph.create_team(&team).await.unwrap();
        assert_eq!(location, "/teams('t1')/operations('op1')");

        let op = graph.get_operation(&location).await.unwrap();
        assert_eq!(op.target_resource_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_create_team_without_location_fails() {
        let app = Router::new().route("/beta/teams", post(|| async { StatusCode::ACCEPTED }));
        let graph = mock_graph(app).await;

        let team = TeamRequest {
            template: "tpl".to_string(),
            visibility: "private".to_string(),
            display_name: "x".to_string(),
            description: "d".to_string(),
            channels: vec![],
        };
        let err = graph.create_team(&team).await.unwrap_err();
        assert!(matches!(err, GraphError::MissingField(_)));
    }

    #[tokio::test]
    async fn test_batch_round_trip() {
        let app = Router::new().route(
            "/beta/$batch",
            post(|Json(body): Json<BatchRequest>| async move {
                let responses: Vec<Value> = body
                    .requests
                    .iter()
                    .rev()
                    .map(|r| json!({ "id": r.id, "status": 204 }))
                    .collect();
                Json(json!({ "responses": responses }))
            }),
        );
        let graph = mock_graph(app).await;

        let steps = vec![
            BatchStep::post(0, "/groups/t1/members/$ref", json!({})),
            BatchStep::post(1, "/groups/t1/members/$ref", json!({})),
        ];
        let responses = graph.batch(&steps).await.unwrap();
        let ids: Vec<_> = responses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "0"]);
    }

    #[tokio::test]
    async fn test_chat_members_map_to_users() {
        let app = Router::new().route(
            "/beta/me/chats/{chat_id}/members",
            get(|Path(chat_id): Path<String>| async move {
                assert_eq!(chat_id, "19:meeting_x@thread.v2");
                Json(json!({ "value": [
                    { "id": "m-1", "userId": "u1", "displayName": "Ada" },
                    { "id": "m-2", "displayName": "Guest without directory id" },
                    { "id": "m-3", "userId": "u3", "displayName": "Cy" }
                ]}))
            }),
        );
        let graph = mock_graph(app).await;

        let members = graph
            .list_chat_members("19%3ameeting_x%40thread.v2")
            .await
            .unwrap();
        let ids: Vec<_> = members.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u3"]);
    }
}
