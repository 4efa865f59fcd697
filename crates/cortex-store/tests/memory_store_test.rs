use cortex_store::{
    Bound, EntityKind, MemoryStore, MessageContent, MessagePatch, MessageStore, NewMessage,
    PageQuery, SortDirection, Thread, TimeWindow, ToolCall,
};

async fn seeded_thread(store: &MemoryStore) -> String {
    let thread = store
        .create_thread(Thread::new("user-1", None, None, None))
        .await
        .unwrap();
    thread.id
}

fn text(thread_id: &str, entity: EntityKind, text: &str) -> NewMessage {
    NewMessage::new(thread_id, entity, MessageContent::text(text))
}

#[tokio::test]
async fn append_assigns_monotonic_sequence() {
    let store = MemoryStore::new();
    let thread_id = seeded_thread(&store).await;

    let a = store
        .append_message(text(&thread_id, EntityKind::User, "first"))
        .await
        .unwrap();
    let b = store
        .append_message(text(&thread_id, EntityKind::AiMessage, "second"))
        .await
        .unwrap();

    assert!(b.seq > a.seq);
    assert!(b.created_at >= a.created_at);

    let messages = store.get_messages(&thread_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, a.id);
    assert_eq!(messages[1].id, b.id);
}

#[tokio::test]
async fn delete_thread_cascades() {
    let store = MemoryStore::new();
    let thread_id = seeded_thread(&store).await;
    store
        .append_message(
            text(&thread_id, EntityKind::AiTool, "").with_tool_calls(vec![ToolCall {
                id: "call_1".to_string(),
                name: "lookup".to_string(),
                arguments: "{}".to_string(),
                requires_approval: false,
                validated: None,
            }]),
        )
        .await
        .unwrap();

    store.delete_thread(&thread_id).await.unwrap();

    assert!(store.get_thread(&thread_id).await.unwrap().is_none());
    assert!(store.get_messages(&thread_id).await.unwrap().is_empty());
    assert!(store
        .find_tool_call(&thread_id, "call_1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn page_query_filters_entities_and_honors_cursor() {
    let store = MemoryStore::new();
    let thread_id = seeded_thread(&store).await;

    for (entity, body) in [
        (EntityKind::User, "u1"),
        (EntityKind::AiTool, "t1"),
        (EntityKind::AiMessage, "a1"),
        (EntityKind::User, "u2"),
        (EntityKind::AiMessage, "a2"),
    ] {
        store
            .append_message(text(&thread_id, entity, body))
            .await
            .unwrap();
    }

    let page = store
        .page_messages(
            &thread_id,
            PageQuery {
                entities: Some(vec![EntityKind::User, EntityKind::AiMessage]),
                cursor: None,
                limit: 3,
                sort: SortDirection::Desc,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.len(), 3);
    assert!(page.iter().all(|m| m.entity != EntityKind::AiTool));
    // newest first
    assert_eq!(page[0].content.as_text(), Some("a2"));

    let cursor = page[2].created_at;
    let next = store
        .page_messages(
            &thread_id,
            PageQuery {
                entities: Some(vec![EntityKind::User, EntityKind::AiMessage]),
                cursor: Some(cursor),
                limit: 3,
                sort: SortDirection::Desc,
            },
        )
        .await
        .unwrap();
    assert!(next.iter().all(|m| m.created_at < cursor));
}

#[tokio::test]
async fn window_bounds_are_inclusive_or_exclusive_as_requested() {
    let store = MemoryStore::new();
    let thread_id = seeded_thread(&store).await;

    let first = store
        .append_message(text(&thread_id, EntityKind::User, "u1"))
        .await
        .unwrap();
    store
        .append_message(text(&thread_id, EntityKind::AiMessage, "a1"))
        .await
        .unwrap();

    let inclusive = store
        .messages_in_window(
            &thread_id,
            TimeWindow {
                lower: Bound::Inclusive(first.created_at),
                upper: Bound::Unbounded,
            },
        )
        .await
        .unwrap();
    assert_eq!(inclusive.len(), 2);

    let exclusive = store
        .messages_in_window(
            &thread_id,
            TimeWindow {
                lower: Bound::Exclusive(first.created_at),
                upper: Bound::Unbounded,
            },
        )
        .await
        .unwrap();
    assert!(exclusive.iter().all(|m| m.created_at > first.created_at));
}

#[tokio::test]
async fn tool_call_validation_and_result_lookup() {
    let store = MemoryStore::new();
    let thread_id = seeded_thread(&store).await;

    store
        .append_message(
            text(&thread_id, EntityKind::AiTool, "").with_tool_calls(vec![ToolCall {
                id: "call_7".to_string(),
                name: "simulate".to_string(),
                arguments: r#"{"steps":10}"#.to_string(),
                requires_approval: true,
                validated: None,
            }]),
        )
        .await
        .unwrap();

    store
        .set_tool_call_validation(&thread_id, "call_7", true, Some(r#"{"steps":5}"#.to_string()))
        .await
        .unwrap();

    let (_, call) = store
        .find_tool_call(&thread_id, "call_7")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(call.validated, Some(true));
    assert_eq!(call.arguments, r#"{"steps":5}"#);

    assert!(store
        .find_tool_result(&thread_id, "call_7")
        .await
        .unwrap()
        .is_none());

    store
        .append_message(NewMessage::new(
            &thread_id,
            EntityKind::Tool,
            MessageContent::ToolResult {
                tool_call_id: "call_7".to_string(),
                tool_name: "simulate".to_string(),
                content: "done".to_string(),
                is_error: false,
            },
        ))
        .await
        .unwrap();

    let result = store
        .find_tool_result(&thread_id, "call_7")
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_complete);
}

#[tokio::test]
async fn update_message_patches_completion_flag() {
    let store = MemoryStore::new();
    let thread_id = seeded_thread(&store).await;

    let msg = store
        .append_message(text(&thread_id, EntityKind::AiMessage, "partial").incomplete())
        .await
        .unwrap();
    assert!(!msg.is_complete);

    store
        .update_message(
            &msg.id,
            MessagePatch {
                content: Some(MessageContent::text("partial, then finished")),
                is_complete: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let messages = store.get_messages(&thread_id).await.unwrap();
    assert!(messages[0].is_complete);
    assert_eq!(messages[0].content.as_text(), Some("partial, then finished"));
}
