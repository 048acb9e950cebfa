use super::ToolDefinition;
use serde_json::json;
use tsdef_core::constants::TOOL_FIND_DEFINITION;

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_FIND_DEFINITION.into(),
        description: "Use /ts-def to trigger this tool. Finds the definition of a TypeScript symbol, \
                      following imports into other files and installed packages. Provide the current \
                      file path, the full line containing the symbol and the symbol name; returns each \
                      definition's file, location and a line-numbered code snippet."
            .into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path to the current TypeScript file (e.g. '/repo/src/index.ts')"
                },
                "line_content": {
                    "type": "string",
                    "description": "The entire line containing the symbol. The first line of the file equal to it is used."
                },
                "symbol": {
                    "type": "string",
                    "description": "The symbol to look up; its first occurrence in line_content is used"
                },
                "column_number": {
                    "type": "integer",
                    "description": "1-based column of the symbol in line_content, used when symbol is not given"
                }
            },
            "required": ["file_path", "line_content"],
            "anyOf": [
                { "required": ["symbol"] },
                { "required": ["column_number"] }
            ]
        }),
    }
}
