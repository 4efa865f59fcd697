use chrono::{DateTime, Utc};
use cortex_agent::{PageParams, Projector, TurnPart, TurnRole};
use cortex_store::{
    EntityKind, MemoryStore, MessageContent, MessageStore, NewMessage, Thread, ToolCall,
};
use std::sync::Arc;
use std::time::Duration;

async fn seed_thread(store: &Arc<MemoryStore>) -> String {
    let thread = store
        .create_thread(Thread::new("user-1", None, None, None))
        .await
        .unwrap();
    thread.id
}

async fn append(store: &Arc<MemoryStore>, message: NewMessage) {
    store.append_message(message).await.unwrap();
    // distinct timestamps keep the cursor math unambiguous on coarse clocks
    tokio::time::sleep(Duration::from_millis(2)).await;
}

/// Two full turns, the first one with tool activity:
///   USER q1, AI_TOOL shell(call_1), TOOL result, AI_MESSAGE a1,
///   USER q2, AI_MESSAGE a2
async fn seed_two_turns(store: &Arc<MemoryStore>, thread_id: &str) {
    append(
        store,
        NewMessage::new(thread_id, EntityKind::User, MessageContent::text("q1")),
    )
    .await;
    append(
        store,
        NewMessage::new(thread_id, EntityKind::AiTool, MessageContent::text("")).with_tool_calls(
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "search".to_string(),
                arguments: "{}".to_string(),
                requires_approval: false,
                validated: None,
            }],
        ),
    )
    .await;
    append(
        store,
        NewMessage::new(
            thread_id,
            EntityKind::Tool,
            MessageContent::ToolResult {
                tool_call_id: "call_1".to_string(),
                tool_name: "search".to_string(),
                content: "two hits".to_string(),
                is_error: false,
            },
        ),
    )
    .await;
    append(
        store,
        NewMessage::new(thread_id, EntityKind::AiMessage, MessageContent::text("a1")),
    )
    .await;
    append(
        store,
        NewMessage::new(thread_id, EntityKind::User, MessageContent::text("q2")),
    )
    .await;
    append(
        store,
        NewMessage::new(thread_id, EntityKind::AiMessage, MessageContent::text("a2")),
    )
    .await;
}

fn text_of(part: &TurnPart) -> &str {
    match part {
        TurnPart::Text { text } => text,
        other => panic!("expected text part, got {:?}", other),
    }
}

#[tokio::test]
async fn client_pages_group_whole_turns() {
    let store = Arc::new(MemoryStore::new());
    let thread_id = seed_thread(&store).await;
    seed_two_turns(&store, &thread_id).await;
    let projector = Projector::new(store.clone());

    // newest page: assistant a2, user q2
    let page = projector.client_turns(&thread_id, 2, None).await.unwrap();
    assert!(page.has_more);
    assert_eq!(page.results.len(), 2);
    assert_eq!(page.results[0].role, TurnRole::Assistant);
    assert_eq!(text_of(&page.results[0].parts[0]), "a2");
    assert_eq!(page.results[1].role, TurnRole::User);
    assert_eq!(text_of(&page.results[1].parts[0]), "q2");

    // older page: the first turn travels whole, tool activity included
    let cursor: DateTime<Utc> = page.next_cursor.as_deref().unwrap().parse().unwrap();
    let page = projector
        .client_turns(&thread_id, 2, Some(cursor))
        .await
        .unwrap();
    assert!(!page.has_more);
    assert!(page.next_cursor.is_none());
    assert_eq!(page.results.len(), 2);

    let assistant = &page.results[0];
    assert_eq!(assistant.role, TurnRole::Assistant);
    assert_eq!(assistant.parts.len(), 2);
    match &assistant.parts[0] {
        TurnPart::ToolInvocation {
            tool_name, result, ..
        } => {
            assert_eq!(tool_name, "search");
            assert_eq!(result.as_deref(), Some("two hits"));
        }
        other => panic!("expected invocation part, got {:?}", other),
    }
    assert_eq!(text_of(&assistant.parts[1]), "a1");
    assert_eq!(page.results[1].role, TurnRole::User);
    assert_eq!(text_of(&page.results[1].parts[0]), "q1");
}

#[tokio::test]
async fn paging_one_by_one_never_splits_or_repeats_a_turn() {
    let store = Arc::new(MemoryStore::new());
    let thread_id = seed_thread(&store).await;
    seed_two_turns(&store, &thread_id).await;
    let projector = Projector::new(store.clone());

    let mut collected: Vec<(TurnRole, Vec<String>)> = Vec::new();
    let mut cursor: Option<DateTime<Utc>> = None;
    let mut pages = 0;

    loop {
        let page = projector
            .client_turns(&thread_id, 1, cursor)
            .await
            .unwrap();
        pages += 1;
        assert!(pages <= 10, "pagination did not terminate");

        for turn in &page.results {
            let parts: Vec<String> = turn
                .parts
                .iter()
                .map(|p| match p {
                    TurnPart::Text { text } => format!("text:{}", text),
                    TurnPart::ToolInvocation { tool_call_id, .. } => {
                        format!("call:{}", tool_call_id)
                    }
                })
                .collect();
            collected.push((turn.role, parts));
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next.parse().unwrap()),
            None => break,
        }
    }

    // newest-first across pages; every turn exactly once and whole
    let expected = vec![
        (TurnRole::Assistant, vec!["text:a2".to_string()]),
        (TurnRole::User, vec!["text:q2".to_string()]),
        (
            TurnRole::Assistant,
            vec!["call:call_1".to_string(), "text:a1".to_string()],
        ),
        (TurnRole::User, vec!["text:q1".to_string()]),
    ];
    assert_eq!(collected, expected);
}

#[tokio::test]
async fn page_size_one_keeps_tool_chain_with_its_closing_text() {
    // USER, AI_TOOL, TOOL, AI_MESSAGE with page_size 1: the whole assistant
    // exchange comes back as one turn, never as page-worthy fragments.
    let store = Arc::new(MemoryStore::new());
    let thread_id = seed_thread(&store).await;
    append(
        &store,
        NewMessage::new(&thread_id, EntityKind::User, MessageContent::text("q")),
    )
    .await;
    append(
        &store,
        NewMessage::new(&thread_id, EntityKind::AiTool, MessageContent::text(""))
            .with_tool_calls(vec![ToolCall {
                id: "call_a".to_string(),
                name: "lookup".to_string(),
                arguments: "{}".to_string(),
                requires_approval: false,
                validated: None,
            }]),
    )
    .await;
    append(
        &store,
        NewMessage::new(
            &thread_id,
            EntityKind::Tool,
            MessageContent::ToolResult {
                tool_call_id: "call_a".to_string(),
                tool_name: "lookup".to_string(),
                content: "found".to_string(),
                is_error: false,
            },
        ),
    )
    .await;
    append(
        &store,
        NewMessage::new(&thread_id, EntityKind::AiMessage, MessageContent::text("done")),
    )
    .await;

    let projector = Projector::new(store.clone());
    let page = projector.client_turns(&thread_id, 1, None).await.unwrap();

    assert_eq!(page.results.len(), 1);
    let turn = &page.results[0];
    assert_eq!(turn.role, TurnRole::Assistant);
    assert_eq!(turn.parts.len(), 2);
    assert!(matches!(turn.parts[0], TurnPart::ToolInvocation { .. }));
    assert_eq!(text_of(&turn.parts[1]), "done");
}

#[tokio::test]
async fn pending_gated_call_shows_only_on_latest_page() {
    let store = Arc::new(MemoryStore::new());
    let thread_id = seed_thread(&store).await;
    append(
        &store,
        NewMessage::new(&thread_id, EntityKind::User, MessageContent::text("deploy")),
    )
    .await;
    append(
        &store,
        NewMessage::new(&thread_id, EntityKind::AiTool, MessageContent::text(""))
            .with_tool_calls(vec![ToolCall {
                id: "call_g".to_string(),
                name: "deploy".to_string(),
                arguments: "{}".to_string(),
                requires_approval: true,
                validated: None,
            }]),
    )
    .await;
    let projector = Projector::new(store.clone());

    let page = projector.client_turns(&thread_id, 5, None).await.unwrap();
    assert!(!page.has_more);
    assert_eq!(page.results.len(), 2);
    let assistant = &page.results[0];
    assert_eq!(assistant.role, TurnRole::Assistant);
    assert!(matches!(
        assistant.parts[0],
        TurnPart::ToolInvocation { .. }
    ));
}

#[tokio::test]
async fn raw_listing_pages_by_entity_filter() {
    let store = Arc::new(MemoryStore::new());
    let thread_id = seed_thread(&store).await;
    seed_two_turns(&store, &thread_id).await;
    let projector = Projector::new(store.clone());

    let page = projector
        .list(
            &thread_id,
            PageParams {
                page_size: 2,
                entities: Some(vec![EntityKind::User]),
                ..PageParams::default()
            },
        )
        .await
        .unwrap();

    assert!(!page.has_more);
    assert_eq!(page.results.len(), 2);
    // default sort is newest first
    assert_eq!(page.results[0].content.as_text(), Some("q2"));
    assert_eq!(page.results[1].content.as_text(), Some("q1"));

    let page = projector
        .list(
            &thread_id,
            PageParams {
                page_size: 3,
                ..PageParams::default()
            },
        )
        .await
        .unwrap();
    assert!(page.has_more);
    assert_eq!(page.results.len(), 3);
    assert!(page.next_cursor.is_some());
}
