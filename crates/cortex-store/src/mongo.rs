use crate::error::{Result, StoreError};
use crate::models::{EntityKind, Message, MessageContent, MessagePatch, NewMessage, Thread, ToolCall};
use crate::store::{Bound, MessageStore, PageQuery, SortDirection, TimeWindow};
use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use cortex_llm::TokenUsage;
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

/// MongoDB-backed [`MessageStore`].
pub struct MongoStore {
    threads: Collection<ThreadDoc>,
    messages: Collection<MessageDoc>,
    counters: Collection<CounterDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ThreadDoc {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    vlab_id: Option<String>,
    project_id: Option<String>,
    title: String,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageDoc {
    #[serde(rename = "_id")]
    id: String,
    thread_id: String,
    entity: EntityKind,
    content: MessageContent,
    is_complete: bool,
    created_at: bson::DateTime,
    seq: i64,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
    #[serde(default)]
    usage: Option<Vec<TokenUsage>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterDoc {
    #[serde(rename = "_id")]
    thread_id: String,
    value: i64,
}

impl From<Thread> for ThreadDoc {
    fn from(t: Thread) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            vlab_id: t.vlab_id,
            project_id: t.project_id,
            title: t.title,
            created_at: bson::DateTime::from_millis(t.created_at.timestamp_millis()),
            updated_at: bson::DateTime::from_millis(t.updated_at.timestamp_millis()),
        }
    }
}

impl From<ThreadDoc> for Thread {
    fn from(d: ThreadDoc) -> Self {
        Self {
            id: d.id,
            user_id: d.user_id,
            vlab_id: d.vlab_id,
            project_id: d.project_id,
            title: d.title,
            created_at: d.created_at.to_chrono(),
            updated_at: d.updated_at.to_chrono(),
        }
    }
}

impl From<MessageDoc> for Message {
    fn from(d: MessageDoc) -> Self {
        Self {
            id: d.id,
            thread_id: d.thread_id,
            entity: d.entity,
            content: d.content,
            is_complete: d.is_complete,
            created_at: d.created_at.to_chrono(),
            seq: d.seq as u64,
            tool_calls: d.tool_calls,
            usage: d.usage,
        }
    }
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::new(&client, db_name))
    }

    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            threads: db.collection("threads"),
            messages: db.collection("messages"),
            counters: db.collection("counters"),
        }
    }

    async fn next_seq(&self, thread_id: &str) -> Result<i64> {
        let counter = self
            .counters
            .find_one_and_update(
                doc! { "_id": thread_id },
                doc! { "$inc": { "value": 1_i64 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| StoreError::Internal("counter upsert returned nothing".to_string()))?;
        Ok(counter.value)
    }
}

fn window_filter(thread_id: &str, window: TimeWindow) -> bson::Document {
    let mut filter = doc! { "thread_id": thread_id };
    let mut created = bson::Document::new();
    match window.lower {
        Bound::Inclusive(ts) => {
            created.insert("$gte", bson::DateTime::from_millis(ts.timestamp_millis()));
        }
        Bound::Exclusive(ts) => {
            created.insert("$gt", bson::DateTime::from_millis(ts.timestamp_millis()));
        }
        Bound::Unbounded => {}
    }
    match window.upper {
        Bound::Inclusive(ts) => {
            created.insert("$lte", bson::DateTime::from_millis(ts.timestamp_millis()));
        }
        Bound::Exclusive(ts) => {
            created.insert("$lt", bson::DateTime::from_millis(ts.timestamp_millis()));
        }
        Bound::Unbounded => {}
    }
    if !created.is_empty() {
        filter.insert("created_at", created);
    }
    filter
}

#[async_trait]
impl MessageStore for MongoStore {
    async fn create_thread(&self, thread: Thread) -> Result<Thread> {
        self.threads.insert_one(ThreadDoc::from(thread.clone())).await?;
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let doc = self.threads.find_one(doc! { "_id": thread_id }).await?;
        Ok(doc.map(Into::into))
    }

    async fn list_threads(&self, user_id: &str, limit: usize) -> Result<Vec<Thread>> {
        let docs: Vec<ThreadDoc> = self
            .threads
            .find(doc! { "user_id": user_id })
            .sort(doc! { "updated_at": -1 })
            .limit(limit as i64)
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn rename_thread(&self, thread_id: &str, title: &str) -> Result<()> {
        let result = self
            .threads
            .update_one(
                doc! { "_id": thread_id },
                doc! { "$set": { "title": title, "updated_at": bson::DateTime::now() } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let result = self.threads.delete_one(doc! { "_id": thread_id }).await?;
        if result.deleted_count == 0 {
            return Err(StoreError::ThreadNotFound(thread_id.to_string()));
        }
        // Cascade: messages carry their tool calls with them.
        self.messages.delete_many(doc! { "thread_id": thread_id }).await?;
        self.counters.delete_one(doc! { "_id": thread_id }).await?;
        Ok(())
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message> {
        if self.get_thread(&message.thread_id).await?.is_none() {
            return Err(StoreError::ThreadNotFound(message.thread_id));
        }

        let seq = self.next_seq(&message.thread_id).await?;
        let now = Utc::now();
        let doc = MessageDoc {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: message.thread_id.clone(),
            entity: message.entity,
            content: message.content,
            is_complete: message.is_complete,
            created_at: bson::DateTime::from_millis(now.timestamp_millis()),
            seq,
            tool_calls: message.tool_calls,
            usage: message.usage,
        };
        self.messages.insert_one(&doc).await?;

        self.threads
            .update_one(
                doc! { "_id": &message.thread_id },
                doc! { "$set": { "updated_at": doc.created_at } },
            )
            .await?;

        Ok(doc.into())
    }

    async fn update_message(&self, message_id: &str, patch: MessagePatch) -> Result<()> {
        let mut set = bson::Document::new();
        if let Some(entity) = patch.entity {
            set.insert(
                "entity",
                bson::to_bson(&entity).map_err(StoreError::BsonSerialization)?,
            );
        }
        if let Some(content) = patch.content {
            set.insert(
                "content",
                bson::to_bson(&content).map_err(StoreError::BsonSerialization)?,
            );
        }
        if let Some(is_complete) = patch.is_complete {
            set.insert("is_complete", is_complete);
        }
        if let Some(tool_calls) = patch.tool_calls {
            set.insert(
                "tool_calls",
                bson::to_bson(&tool_calls).map_err(StoreError::BsonSerialization)?,
            );
        }
        if let Some(usage) = patch.usage {
            set.insert(
                "usage",
                bson::to_bson(&usage).map_err(StoreError::BsonSerialization)?,
            );
        }
        if set.is_empty() {
            return Ok(());
        }

        let result = self
            .messages
            .update_one(doc! { "_id": message_id }, doc! { "$set": set })
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::MessageNotFound(message_id.to_string()));
        }
        Ok(())
    }

    async fn get_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let docs: Vec<MessageDoc> = self
            .messages
            .find(doc! { "thread_id": thread_id })
            .sort(doc! { "created_at": 1, "seq": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn page_messages(&self, thread_id: &str, query: PageQuery) -> Result<Vec<Message>> {
        let mut filter = doc! { "thread_id": thread_id };

        if let Some(entities) = &query.entities {
            let kinds = bson::to_bson(entities).map_err(StoreError::BsonSerialization)?;
            filter.insert("entity", doc! { "$in": kinds });
        }
        if let Some(cursor) = query.cursor {
            let ts = bson::DateTime::from_millis(cursor.timestamp_millis());
            let op = match query.sort {
                SortDirection::Desc => "$lt",
                SortDirection::Asc => "$gt",
            };
            filter.insert("created_at", doc! { op: ts });
        }

        let order = match query.sort {
            SortDirection::Desc => -1,
            SortDirection::Asc => 1,
        };
        let docs: Vec<MessageDoc> = self
            .messages
            .find(filter)
            .sort(doc! { "created_at": order, "seq": order })
            .limit(query.limit as i64)
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn messages_in_window(
        &self,
        thread_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<Message>> {
        let docs: Vec<MessageDoc> = self
            .messages
            .find(window_filter(thread_id, window))
            .sort(doc! { "created_at": 1, "seq": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn find_tool_call(
        &self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<(Message, ToolCall)>> {
        let doc = self
            .messages
            .find_one(doc! { "thread_id": thread_id, "tool_calls.id": tool_call_id })
            .await?;
        Ok(doc.map(Message::from).and_then(|m| {
            m.tool_call(tool_call_id).cloned().map(|tc| (m.clone(), tc))
        }))
    }

    async fn set_tool_call_validation(
        &self,
        thread_id: &str,
        tool_call_id: &str,
        validated: bool,
        arguments: Option<String>,
    ) -> Result<()> {
        let mut set = doc! { "tool_calls.$.validated": validated };
        if let Some(arguments) = arguments {
            set.insert("tool_calls.$.arguments", arguments);
        }
        let result = self
            .messages
            .update_one(
                doc! { "thread_id": thread_id, "tool_calls.id": tool_call_id },
                doc! { "$set": set },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::ToolCallNotFound(tool_call_id.to_string()));
        }
        Ok(())
    }

    async fn find_tool_result(
        &self,
        thread_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<Message>> {
        let doc = self
            .messages
            .find_one(doc! {
                "thread_id": thread_id,
                "entity": "TOOL",
                "content.tool_call_id": tool_call_id,
            })
            .await?;
        Ok(doc.map(Into::into))
    }
}
