use crate::error::GatewayError;
use crate::provider::openai_compat::request_parts;
use crate::types::ChatCompletionRequest;

use super::types::LocalChatRequest;

pub(crate) fn build_local_body(
    request: &ChatCompletionRequest,
    model: &str,
    stream: bool,
) -> Result<LocalChatRequest, GatewayError> {
    let parts = request_parts(request)?;
    Ok(LocalChatRequest {
        model: model.to_string(),
        messages: parts.messages,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_tokens,
        stop: request.stop.clone(),
        tools: parts.tools,
        tool_choice: parts.tool_choice,
        stream,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::types::{ChatMessage, ToolCall, ToolChoice, ToolDefinition};

    #[test]
    fn fields_map_one_to_one() {
        let mut request = ChatCompletionRequest::new(
            "qwen2.5-coder:7b",
            vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        );
        request.temperature = Some(0.2);
        request.max_tokens = Some(256);
        request.stop = vec!["</s>".to_string()];
        request.tools = vec![ToolDefinition {
            name: "read_file".to_string(),
            description: Some("Read a file".to_string()),
            parameters: Value::Null,
        }];
        request.tool_choice = Some(ToolChoice::Function {
            name: "read_file".to_string(),
        });

        let body = build_local_body(&request, "qwen2.5-coder:7b", true).expect("body");
        let value = serde_json::to_value(&body).expect("json");

        assert_eq!(value["model"], json!("qwen2.5-coder:7b"));
        assert_eq!(value["stream"], json!(true));
        assert_eq!(value["max_tokens"], json!(256));
        assert_eq!(value["stop"], json!(["</s>"]));
        assert_eq!(value["messages"][0]["role"], json!("system"));
        assert_eq!(value["messages"][1]["content"], json!("hi"));
        assert_eq!(value["tools"][0]["type"], json!("function"));
        assert_eq!(
            value["tools"][0]["function"]["parameters"],
            json!({ "type": "object", "properties": {} })
        );
        assert_eq!(value["tool_choice"]["function"]["name"], json!("read_file"));
        assert!(value.get("top_p").is_none());
    }

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_text() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "read_file".to_string(),
            arguments: json!({ "path": "src/lib.rs" }),
        }];
        let request = ChatCompletionRequest::new(
            "qwen",
            vec![
                ChatMessage::user("open lib.rs"),
                assistant,
                ChatMessage::tool_result("call_1", "pub mod x;"),
            ],
        );
        let value = serde_json::to_value(build_local_body(&request, "qwen", false).expect("body"))
            .expect("json");

        assert_eq!(value["messages"][1]["content"], Value::Null);
        assert_eq!(
            value["messages"][1]["tool_calls"][0]["function"]["arguments"],
            json!(r#"{"path":"src/lib.rs"}"#)
        );
        assert_eq!(value["messages"][2]["tool_call_id"], json!("call_1"));
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let request = ChatCompletionRequest::new("qwen", Vec::new());
        let err = build_local_body(&request, "qwen", false).expect_err("empty");
        assert!(matches!(err, GatewayError::Validation { .. }));
    }
}
