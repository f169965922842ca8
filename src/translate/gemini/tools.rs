use super::types::{
    FunctionCallingConfig, FunctionCallingMode, FunctionDeclaration, GeminiFunctionCall, GeminiTool,
    GeminiToolConfig,
};
use crate::translate::openai_types::{ChatTool, ChatToolCall, ToolChoice, ToolChoiceMode};
use crate::translate::shared::{arguments_string, new_call_id};

/// All function tools as one Gemini tool entry. Parameter schemas pass through untouched.
pub fn declarations(tools: &[ChatTool]) -> Option<Vec<GeminiTool>> {
    let function_declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .filter(|t| {
            let keep = t.tool_type == "function";
            if !keep {
                tracing::debug!(tool_type = %t.tool_type, "skipping non-function tool");
            }
            keep
        })
        .map(|t| FunctionDeclaration {
            name: t.function.name.clone(),
            description: t.function.description.clone(),
            parameters_json_schema: t.function.parameters.clone(),
        })
        .collect();

    if function_declarations.is_empty() {
        return None;
    }
    Some(vec![GeminiTool {
        function_declarations,
    }])
}

pub fn tool_config(choice: Option<&ToolChoice>) -> Option<GeminiToolConfig> {
    let choice = choice?;

    let (mode, allowed) = match choice {
        ToolChoice::Mode(ToolChoiceMode::None) => (FunctionCallingMode::None, None),
        ToolChoice::Mode(ToolChoiceMode::Auto) => (FunctionCallingMode::Auto, None),
        ToolChoice::Mode(ToolChoiceMode::Required) => (FunctionCallingMode::Any, None),
        ToolChoice::Function(_) => match choice.forced_name() {
            Some(name) => (FunctionCallingMode::Any, Some(vec![name.to_string()])),
            None => {
                tracing::debug!("tool_choice object names no function, leaving unset");
                return None;
            }
        },
    };

    Some(GeminiToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names: allowed,
        },
    })
}

/// Universal tool call for an emitted function call. Gemini rarely supplies an id.
pub fn tool_call_from_gemini(call: &GeminiFunctionCall) -> ChatToolCall {
    let id = call
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(new_call_id);
    ChatToolCall::new(id, call.name.clone(), arguments_string(call.args.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::ChatFunction;

    #[test]
    fn test_schema_passes_through_unmodified() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"q": {"anyOf": [{"type": "string"}, {"type": "null"}]}},
            "additionalProperties": false
        });
        let tools = vec![ChatTool {
            tool_type: "function".to_string(),
            function: ChatFunction {
                name: "lookup".to_string(),
                description: Some("Look something up".to_string()),
                parameters: Some(schema.clone()),
            },
        }];
        let decls = declarations(&tools).unwrap();
        assert_eq!(decls[0].function_declarations[0].parameters_json_schema, Some(schema));
    }

    #[test]
    fn test_non_function_tools_are_skipped() {
        let tools = vec![ChatTool {
            tool_type: "web_search".to_string(),
            function: ChatFunction {
                name: "search".to_string(),
                description: None,
                parameters: None,
            },
        }];
        assert!(declarations(&tools).is_none());
    }

    #[test]
    fn test_tool_choice_mapping() {
        assert!(tool_config(None).is_none());

        let none = tool_config(Some(&ToolChoice::Mode(ToolChoiceMode::None))).unwrap();
        assert_eq!(none.function_calling_config.mode, FunctionCallingMode::None);

        let required = tool_config(Some(&ToolChoice::Mode(ToolChoiceMode::Required))).unwrap();
        assert_eq!(required.function_calling_config.mode, FunctionCallingMode::Any);
        assert!(required.function_calling_config.allowed_function_names.is_none());

        let forced = tool_config(Some(&ToolChoice::forced("lookup"))).unwrap();
        assert_eq!(forced.function_calling_config.mode, FunctionCallingMode::Any);
        assert_eq!(
            forced.function_calling_config.allowed_function_names,
            Some(vec!["lookup".to_string()])
        );
    }

    #[test]
    fn test_emitted_call_gets_id_and_string_arguments() {
        let call = GeminiFunctionCall {
            id: None,
            name: "lookup".to_string(),
            args: None,
        };
        let tc = tool_call_from_gemini(&call);
        assert!(tc.id.starts_with("call_"));
        assert_eq!(tc.function.arguments, "{}");

        let call = GeminiFunctionCall {
            id: Some("fc_1".to_string()),
            name: "lookup".to_string(),
            args: Some(serde_json::json!({"q": "x"})),
        };
        let tc = tool_call_from_gemini(&call);
        assert_eq!(tc.id, "fc_1");
        assert_eq!(tc.function.arguments, "{\"q\":\"x\"}");
    }
}
