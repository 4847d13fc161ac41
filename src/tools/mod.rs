//! MCP tool definitions
//!
//! Parameter types double as the input schemas advertised in `list_tools`.
//! Routing lives in `server.rs`.

use std::sync::Arc;

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for tools that take a device and one command
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CommandParams {
    /// Device name as it appears in the testbed
    pub device_name: String,

    /// Command to run on the device
    pub command: String,
}

/// Parameters for `configure_device`
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ConfigureParams {
    /// Device name as it appears in the testbed
    pub device_name: String,

    /// Configuration block, one command per line, applied in `configure terminal`
    pub config_commands: String,
}

/// Parameters for tools that only need a device
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DeviceParams {
    /// Device name as it appears in the testbed
    pub device_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    RunShowCommand,
    ConfigureDevice,
    ShowRunningConfig,
    ShowLogging,
    PingFromNetworkDevice,
    RunLinuxCommand,
}

impl ToolName {
    pub const ALL: [ToolName; 6] = [
        ToolName::RunShowCommand,
        ToolName::ConfigureDevice,
        ToolName::ShowRunningConfig,
        ToolName::ShowLogging,
        ToolName::PingFromNetworkDevice,
        ToolName::RunLinuxCommand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::RunShowCommand => "run_show_command",
            ToolName::ConfigureDevice => "configure_device",
            ToolName::ShowRunningConfig => "show_running_config",
            ToolName::ShowLogging => "show_logging",
            ToolName::PingFromNetworkDevice => "ping_from_network_device",
            ToolName::RunLinuxCommand => "run_linux_command",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolName::RunShowCommand => {
                "Execute a Cisco IOS/NX-OS 'show' command on a specified device. \
                 Pipes, redirection and output modifiers are refused. \
                 Returns TOON + token savings."
            }
            ToolName::ConfigureDevice => {
                "Apply configuration commands to a Cisco IOS/NX-OS device. \
                 Anything containing 'erase' is refused. Returns TOON + token savings."
            }
            ToolName::ShowRunningConfig => {
                "Retrieve the running configuration from a Cisco IOS/NX-OS device. \
                 Returns TOON + token savings."
            }
            ToolName::ShowLogging => {
                "Retrieve recent system logs from a Cisco IOS/NX-OS device. \
                 Returns TOON + token savings."
            }
            ToolName::PingFromNetworkDevice => {
                "Execute a ping command from a Cisco IOS/NX-OS device. \
                 Returns TOON + token savings."
            }
            ToolName::RunLinuxCommand => {
                "Execute a Linux command on a specified device. \
                 Returns TOON + token savings."
            }
        }
    }

    fn input_schema(self) -> JsonObject {
        match self {
            ToolName::RunShowCommand
            | ToolName::PingFromNetworkDevice
            | ToolName::RunLinuxCommand => schema_object::<CommandParams>(),
            ToolName::ConfigureDevice => schema_object::<ConfigureParams>(),
            ToolName::ShowRunningConfig | ToolName::ShowLogging => schema_object::<DeviceParams>(),
        }
    }

    /// Tool entry for `list_tools`
    pub fn definition(self) -> Tool {
        Tool::new(self.as_str(), self.description(), Arc::new(self.input_schema()))
    }
}

fn schema_object<T: JsonSchema>() -> JsonObject {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(Value::Object(object)) => object,
        _ => JsonObject::default(),
    }
}

/// Decode tool arguments into a parameter type
pub fn parse_params<T: DeserializeOwned>(args: JsonObject) -> Result<T, String> {
    serde_json::from_value(Value::Object(args)).map_err(|e| format!("Invalid arguments: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_command_params_deserialize() {
        let params: CommandParams =
            parse_params(object(json!({"device_name": "R1", "command": "show version"}))).unwrap();
        assert_eq!(params.device_name, "R1");
        assert_eq!(params.command, "show version");
    }

    #[test]
    fn test_missing_field_is_reported() {
        let err = parse_params::<ConfigureParams>(object(json!({"device_name": "R1"}))).unwrap_err();
        assert!(err.contains("config_commands"));
    }

    #[test]
    fn test_tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::from_name(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::from_name("exec"), None);
    }

    #[test]
    fn test_schemas_list_required_fields() {
        let schema = ToolName::ConfigureDevice.input_schema();
        assert_eq!(schema.get("type"), Some(&json!("object")));
        assert_eq!(
            schema.get("required"),
            Some(&json!(["config_commands", "device_name"]))
        );

        let schema = ToolName::ShowLogging.input_schema();
        assert!(schema["properties"].get("device_name").is_some());
        assert!(schema["properties"].get("command").is_none());
    }

    #[test]
    fn test_definition() {
        let tool = ToolName::RunShowCommand.definition();
        assert_eq!(tool.name.as_ref(), "run_show_command");
        assert!(tool.description.is_some());
    }
}
