use super::errors::BridgeError;
use std::fmt;

/// Separator between the segments of a plugin-scoped op name
pub const SEPARATOR: char = '|';

/// Namespace segment that marks a plugin-scoped op
pub const PLUGIN_NAMESPACE: &str = "Plugin";

/// Prefix of the task namespace, which is reserved and currently ignored
pub const TASK_PREFIX: &str = "PWEG_task_";

const PLUGIN_PREFIX: &str = "Plugin|";

/// Where an op name routes to
///
/// Display format mirrors the wire form:
/// - `Plugin|<plugin>|<op>` for plugin-scoped ops
/// - the bare name for global and reserved ops
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Op handled by a registered plugin
    Plugin { plugin: String, op: String },
    /// Op in the reserved task namespace
    Reserved(String),
    /// Op looked up in the global op registry
    Global(String),
}

impl Route {
    /// Parse a wire op name
    ///
    /// Anything starting with `Plugin|` must have exactly three non-empty
    /// segments; other shapes are rejected as malformed rather than routed.
    pub fn parse(name: &str) -> Result<Self, BridgeError> {
        if let Some(rest) = name.strip_prefix(PLUGIN_PREFIX) {
            let mut segments = rest.split(SEPARATOR);
            return match (segments.next(), segments.next(), segments.next()) {
                (Some(plugin), Some(op), None) if !plugin.is_empty() && !op.is_empty() => {
                    Ok(Route::Plugin {
                        plugin: plugin.to_string(),
                        op: op.to_string(),
                    })
                }
                _ => Err(BridgeError::MalformedRoute(name.to_string())),
            };
        }

        if name.starts_with(TASK_PREFIX) {
            return Ok(Route::Reserved(name.to_string()));
        }

        Ok(Route::Global(name.to_string()))
    }

    /// Build a validated plugin-scoped route
    pub fn plugin(plugin: &str, op: &str) -> Result<Self, BridgeError> {
        validate_plugin_name(plugin)?;
        validate_segment(op)?;
        Ok(Route::Plugin {
            plugin: plugin.to_string(),
            op: op.to_string(),
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Plugin { plugin, op } => {
                write!(f, "{PLUGIN_NAMESPACE}{SEPARATOR}{plugin}{SEPARATOR}{op}")
            }
            Route::Reserved(name) | Route::Global(name) => f.write_str(name),
        }
    }
}

/// Plugin names become the middle segment of plugin-scoped ops
pub fn validate_plugin_name(name: &str) -> Result<(), BridgeError> {
    if name.is_empty() || name.contains(SEPARATOR) {
        return Err(BridgeError::InvalidPluginName(name.to_string()));
    }
    Ok(())
}

/// Validate a name for the global op registry
///
/// Global names may not shadow the plugin or task namespaces, otherwise the
/// handler could never be reached.
pub fn validate_global_op(name: &str) -> Result<(), BridgeError> {
    if name.starts_with(PLUGIN_PREFIX) || name.starts_with(TASK_PREFIX) {
        return Err(BridgeError::ReservedOpName(name.to_string()));
    }
    validate_segment(name)
}

fn validate_segment(op: &str) -> Result<(), BridgeError> {
    if op.is_empty() || op.contains(SEPARATOR) {
        return Err(BridgeError::InvalidOpName(op.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_route() {
        let route = Route::parse("Plugin|Roundtrip|roundtrip_from_python").unwrap();
        assert_eq!(
            route,
            Route::Plugin {
                plugin: "Roundtrip".to_string(),
                op: "roundtrip_from_python".to_string(),
            }
        );
        assert_eq!(route.to_string(), "Plugin|Roundtrip|roundtrip_from_python");
    }

    #[test]
    fn test_parse_rejects_wrong_segment_count() {
        for name in ["Plugin|OnlyName", "Plugin|A|b|c", "Plugin||op", "Plugin|A|"] {
            assert!(
                matches!(Route::parse(name), Err(BridgeError::MalformedRoute(_))),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_reserved_and_global() {
        assert_eq!(
            Route::parse("PWEG_task_progress").unwrap(),
            Route::Reserved("PWEG_task_progress".to_string())
        );
        assert_eq!(
            Route::parse("refresh_list").unwrap(),
            Route::Global("refresh_list".to_string())
        );
        // Only the exact prefix selects the plugin namespace
        assert_eq!(
            Route::parse("Plugins_loaded").unwrap(),
            Route::Global("Plugins_loaded".to_string())
        );
    }

    #[test]
    fn test_validation() {
        assert!(validate_plugin_name("MyPlugin").is_ok());
        assert!(validate_plugin_name("").is_err());
        assert!(validate_plugin_name("My|Plugin").is_err());

        assert!(validate_global_op("refresh").is_ok());
        assert!(matches!(
            validate_global_op("Plugin|A|b"),
            Err(BridgeError::ReservedOpName(_))
        ));
        assert!(matches!(
            validate_global_op("PWEG_task_start"),
            Err(BridgeError::ReservedOpName(_))
        ));
        assert!(matches!(
            validate_global_op("a|b"),
            Err(BridgeError::InvalidOpName(_))
        ));

        assert!(Route::plugin("A", "op").is_ok());
        assert!(Route::plugin("A", "").is_err());
    }
}
