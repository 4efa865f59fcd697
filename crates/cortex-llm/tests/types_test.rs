use cortex_llm::{Message, Tool, ToolCall, ToolChoice};
use serde_json::json;

#[test]
fn message_roles() {
    assert_eq!(Message::system("be helpful").role(), "system");
    assert_eq!(Message::user("hi").role(), "user");
    assert_eq!(Message::assistant("hello").role(), "assistant");
    assert_eq!(Message::tool_result("call_1", "42").role(), "tool");
}

#[test]
fn user_message_serializes_with_role_tag() {
    let msg = Message::user("Hello");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("Hello"));
}

#[test]
fn assistant_with_tools_keeps_call_ids() {
    let call = ToolCall::new("call_9", "resolve_entity", "{\"id\":3}");
    let msg = Message::assistant_with_tools(None, vec![call]);
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["tool_calls"][0]["id"], "call_9");
    assert_eq!(json["tool_calls"][0]["function"]["name"], "resolve_entity");
    // no content key when the model emitted none
    assert!(json.get("content").is_none());
}

#[test]
fn message_roundtrip() {
    let json = r#"{"role":"user","content":"Test"}"#;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(msg.role(), "user");
}

#[test]
fn tool_definition_shape() {
    let tool = Tool::new(
        "get_morphology",
        "Fetch a morphology by id",
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" } }
        }),
    );
    assert_eq!(tool.tool_type, "function");
    assert_eq!(tool.function.name, "get_morphology");
}

#[test]
fn tool_call_argument_parsing() {
    let call = ToolCall::new("call_1", "search", r#"{"query":"pyramidal"}"#);
    let args = call.arguments_value().unwrap();
    assert_eq!(args["query"], "pyramidal");
}

#[test]
fn tool_choice_serializes_to_plain_strings() {
    assert_eq!(serde_json::to_string(&ToolChoice::Auto).unwrap(), "\"auto\"");
    assert_eq!(serde_json::to_string(&ToolChoice::None).unwrap(), "\"none\"");
    assert_eq!(
        serde_json::to_string(&ToolChoice::Required).unwrap(),
        "\"required\""
    );
}
