// HTTP backend: PostgREST tables, GoTrue auth and object storage of the
// hosted service. Realtime goes through `realtime::open_channel`.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{realtime, Backend, ChannelFilter, RealtimeSubscription};
use crate::client::config::BackendConfig;
use crate::common::error::{ChatError, ChatResult};
use crate::common::models::*;

const PROFILE_COLUMNS: &str = "id,display_name,avatar_url,color";
const USER_COLUMNS: &str = "id,display_name,avatar_url,color,friend_code";
const SENDER_EMBED: &str = "*,sender:users!messages_sender_id_fkey(id,display_name,avatar_url,color)";

pub struct RestBackend {
    http: Client,
    config: BackendConfig,
    socket_url: String,
    auth: RwLock<Option<AuthSession>>,
}

#[derive(Deserialize)]
struct MembershipRow {
    role: Role,
    groups: Option<Group>,
}

#[derive(Deserialize)]
struct MemberRow {
    role: Role,
    joined_at: DateTime<Utc>,
    user: Option<SenderProfile>,
}

#[derive(Deserialize)]
struct MessageWithSender {
    #[serde(flatten)]
    row: MessageRow,
    sender: Option<SenderProfile>,
}

#[derive(Deserialize)]
struct ContactRow {
    sender_id: UserId,
    sender: Option<SenderProfile>,
    receiver: Option<SenderProfile>,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct GoTrueSession {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<GoTrueUser>,
}

fn with_sender(item: MessageWithSender) -> ChatMessage {
    let sender = item.sender.unwrap_or_else(|| SenderProfile::unknown(item.row.sender_id));
    ChatMessage { row: item.row, sender }
}

/// Maps a non-2xx response to `ChatError`, keeping the backend's own message.
async fn check(resp: Response) -> ChatResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let message = ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
        .to_string();
    let unique_violation = body.get("code").and_then(Value::as_str) == Some("23505");
    if status == StatusCode::CONFLICT || unique_violation {
        return Err(ChatError::Conflict(message));
    }
    if status == StatusCode::UNAUTHORIZED {
        log::warn!("[REST] unauthorized: {}", message);
    }
    Err(ChatError::Backend { status: status.as_u16(), message })
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> ChatResult<Self> {
        config.validate()?;
        let socket_url = realtime::socket_url(config.base_url(), &config.anon_key)?;
        Ok(Self {
            http: Client::new(),
            config,
            socket_url,
            auth: RwLock::new(None),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url(), table)
    }

    async fn access_token(&self) -> String {
        self.auth
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    async fn request(&self, method: Method, url: String) -> RequestBuilder {
        let token = self.access_token().await;
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: Vec<(&str, String)>) -> ChatResult<Vec<T>> {
        let resp = self.request(Method::GET, self.rest_url(table)).await.query(&query).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn select_one<T: DeserializeOwned>(&self, table: &str, mut query: Vec<(&str, String)>) -> ChatResult<Option<T>> {
        query.push(("limit", "1".to_string()));
        Ok(self.select::<T>(table, query).await?.into_iter().next())
    }

    async fn insert<T: DeserializeOwned>(&self, table: &str, body: Value) -> ChatResult<Vec<T>> {
        let resp = self
            .request(Method::POST, self.rest_url(table))
            .await
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn mutate(&self, method: Method, table: &str, query: Vec<(&str, String)>, body: Option<Value>) -> ChatResult<()> {
        let mut req = self.request(method, self.rest_url(table)).await.query(&query);
        if let Some(body) = body {
            req = req.json(&body);
        }
        check(req.send().await?).await?;
        Ok(())
    }

    async fn auth_request(&self, path: &str, email: &str, password: &str) -> ChatResult<GoTrueSession> {
        let url = format!("{}/auth/v1/{}", self.config.base_url(), path);
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn adopt(&self, session: GoTrueSession) -> ChatResult<AuthSession> {
        let (Some(access_token), Some(user)) = (session.access_token, session.user) else {
            return Err(ChatError::validation("Please confirm your email address before signing in"));
        };
        let auth = AuthSession { access_token, user_id: user.id, email: user.email };
        *self.auth.write().await = Some(auth.clone());
        Ok(auth)
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ChatResult<AuthSession> {
        let session = self.auth_request("token?grant_type=password", email, password).await?;
        let auth = self.adopt(session).await?;
        log::info!("[AUTH] signed in as {}", auth.user_id);
        Ok(auth)
    }

    async fn sign_up(&self, email: &str, password: &str) -> ChatResult<AuthSession> {
        let session = self.auth_request("signup", email, password).await?;
        self.adopt(session).await
    }

    async fn restore(&self, session: &AuthSession) -> ChatResult<()> {
        *self.auth.write().await = Some(session.clone());
        Ok(())
    }

    async fn sign_out(&self) -> ChatResult<()> {
        let url = format!("{}/auth/v1/logout", self.config.base_url());
        let result = match self.request(Method::POST, url).await.send().await {
            Ok(resp) => check(resp).await.map(|_| ()),
            Err(e) => Err(e.into()),
        };
        *self.auth.write().await = None;
        result
    }

    async fn insert_user(&self, user: &User) -> ChatResult<User> {
        let rows: Vec<User> = self.insert("users", serde_json::to_value(user)?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ChatError::NotFound("user profile was not created".to_string()))
    }

    async fn fetch_user(&self, user_id: UserId) -> ChatResult<User> {
        self.select_one("users", vec![("select", USER_COLUMNS.to_string()), ("id", eq(user_id))])
            .await?
            .ok_or_else(|| ChatError::NotFound("User not found".to_string()))
    }

    async fn fetch_sender(&self, user_id: UserId) -> ChatResult<SenderProfile> {
        self.select_one("users", vec![("select", PROFILE_COLUMNS.to_string()), ("id", eq(user_id))])
            .await?
            .ok_or_else(|| ChatError::NotFound("User not found".to_string()))
    }

    async fn find_user_by_friend_code(&self, code: &str) -> ChatResult<Option<SenderProfile>> {
        self.select_one("users", vec![("select", PROFILE_COLUMNS.to_string()), ("friend_code", eq(code))])
            .await
    }

    async fn load_credentials(&self, user_id: UserId) -> ChatResult<StoredCredentials> {
        let select = "gemini_api_key,openai_api_key,gemini_endpoint,openai_endpoint".to_string();
        Ok(self
            .select_one("users", vec![("select", select), ("id", eq(user_id))])
            .await?
            .unwrap_or_default())
    }

    async fn update_credentials(&self, user_id: UserId, creds: &StoredCredentials) -> ChatResult<()> {
        let url = self.rest_url("rpc/update_user_api_keys");
        let resp = self
            .request(Method::POST, url)
            .await
            .json(&json!({
                "user_id": user_id,
                "gemini_key": creds.gemini_api_key,
                "openai_key": creds.openai_api_key,
            }))
            .send()
            .await?;
        check(resp).await?;
        self.mutate(
            Method::PATCH,
            "users",
            vec![("id", eq(user_id))],
            Some(json!({
                "gemini_endpoint": creds.gemini_endpoint,
                "openai_endpoint": creds.openai_endpoint,
            })),
        )
        .await
    }

    async fn list_memberships(&self, user_id: UserId) -> ChatResult<Vec<GroupWithRole>> {
        let rows: Vec<MembershipRow> = self
            .select(
                "group_members",
                vec![
                    ("select", "group_id,role,groups(id,name,description,group_code,avatar_url,color,created_by)".to_string()),
                    ("user_id", eq(user_id)),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.groups.map(|group| GroupWithRole { group, user_role: r.role }))
            .collect())
    }

    async fn list_group_members(&self, group_id: GroupId) -> ChatResult<Vec<MemberProfile>> {
        let rows: Vec<MemberRow> = self
            .select(
                "group_members",
                vec![
                    ("select", format!("role,joined_at,user:users({})", PROFILE_COLUMNS)),
                    ("group_id", eq(group_id)),
                    ("order", "joined_at.asc".to_string()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.user.map(|profile| MemberProfile { profile, role: r.role, joined_at: r.joined_at }))
            .collect())
    }

    async fn find_membership(&self, group_id: GroupId, user_id: UserId) -> ChatResult<Option<GroupMember>> {
        self.select_one(
            "group_members",
            vec![
                ("select", "group_id,user_id,role,joined_at,last_read_at".to_string()),
                ("group_id", eq(group_id)),
                ("user_id", eq(user_id)),
            ],
        )
        .await
    }

    async fn insert_group(&self, group: &NewGroup) -> ChatResult<Group> {
        let rows: Vec<Group> = self
            .insert(
                "groups",
                json!({
                    "name": group.name,
                    "description": group.description,
                    "group_code": group.group_code,
                    "color": group.color,
                    "created_by": group.created_by,
                }),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ChatError::NotFound("group was not created".to_string()))
    }

    async fn insert_member(&self, group_id: GroupId, user_id: UserId, role: Role) -> ChatResult<()> {
        let _: Vec<Value> = self
            .insert("group_members", json!({ "group_id": group_id, "user_id": user_id, "role": role }))
            .await?;
        Ok(())
    }

    async fn delete_member(&self, group_id: GroupId, user_id: UserId) -> ChatResult<()> {
        self.mutate(
            Method::DELETE,
            "group_members",
            vec![("group_id", eq(group_id)), ("user_id", eq(user_id))],
            None,
        )
        .await
    }

    async fn delete_group(&self, group_id: GroupId) -> ChatResult<()> {
        self.mutate(Method::DELETE, "groups", vec![("id", eq(group_id))], None).await
    }

    async fn update_last_read(&self, group_id: GroupId, user_id: UserId, at: DateTime<Utc>) -> ChatResult<()> {
        self.mutate(
            Method::PATCH,
            "group_members",
            vec![("group_id", eq(group_id)), ("user_id", eq(user_id))],
            Some(json!({ "last_read_at": at })),
        )
        .await
    }

    async fn group_history(&self, group_id: GroupId) -> ChatResult<Vec<ChatMessage>> {
        let rows: Vec<MessageWithSender> = self
            .select(
                "messages",
                vec![
                    ("select", SENDER_EMBED.to_string()),
                    ("group_id", eq(group_id)),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(with_sender).collect())
    }

    async fn direct_history(&self, a: UserId, b: UserId) -> ChatResult<Vec<ChatMessage>> {
        let pair = format!(
            "(and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a}))",
            a = a,
            b = b
        );
        let rows: Vec<MessageWithSender> = self
            .select(
                "messages",
                vec![
                    ("select", SENDER_EMBED.to_string()),
                    ("or", pair),
                    ("group_id", "is.null".to_string()),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(with_sender).collect())
    }

    async fn direct_contacts(&self, user_id: UserId) -> ChatResult<Vec<SenderProfile>> {
        let rows: Vec<ContactRow> = self
            .select(
                "messages",
                vec![
                    (
                        "select",
                        format!(
                            "sender_id,receiver_id,sender:users!messages_sender_id_fkey({cols}),receiver:users!messages_receiver_id_fkey({cols})",
                            cols = PROFILE_COLUMNS
                        ),
                    ),
                    ("or", format!("(sender_id.eq.{u},receiver_id.eq.{u})", u = user_id)),
                    ("receiver_id", "not.is.null".to_string()),
                    ("order", "created_at.desc".to_string()),
                    ("limit", "200".to_string()),
                ],
            )
            .await?;
        let mut contacts: Vec<SenderProfile> = Vec::new();
        for row in rows {
            let other = if row.sender_id == user_id { row.receiver } else { row.sender };
            if let Some(profile) = other {
                if !contacts.iter().any(|c| c.id == profile.id) {
                    contacts.push(profile);
                }
            }
        }
        Ok(contacts)
    }

    async fn insert_message(&self, message: &NewMessage) -> ChatResult<MessageRow> {
        let rows: Vec<MessageRow> = self.insert("messages", serde_json::to_value(message)?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ChatError::NotFound("message was not stored".to_string()))
    }

    async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ChatResult<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.config.base_url(), self.config.bucket, path);
        let resp = self
            .request(Method::POST, url)
            .await
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.config.base_url(), self.config.bucket, path)
    }

    async fn subscribe(&self, filter: ChannelFilter) -> ChatResult<RealtimeSubscription> {
        let token = self.access_token().await;
        realtime::open_channel(&self.socket_url, &token, filter).await
    }
}
