//! Merge Node
//!
//! Combines any number of inputs, either as one longer list or as a single
//! item joined with a separator.

use serde::{Deserialize, Serialize};
use textflow_engine::{
    CookContext, NodeCategory, NodeDescriptor, NodeEngineError, NodeLogic, NodeMetadata,
    Parameter, PortDataType, PortMetadata, Result, TextList,
};

/// How inputs are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Append the input lists one after another
    Concatenate,
    /// Join every item of every input into one item
    Join,
}

impl MergeMode {
    pub const ALL: [&'static str; 2] = ["concatenate", "join"];

    /// Parse a menu selection
    pub fn from_menu(selected: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(selected.to_string()))
            .map_err(|_| NodeEngineError::failed(format!("unknown merge mode '{}'", selected)))
    }
}

/// Merge Node
///
/// # Inputs
/// - `texts` (multiple) - Lists to merge, in slot order
///
/// # Outputs
/// - `text` - The merged list
pub struct MergeNode;

impl MergeNode {
    pub const NODE_TYPE: &'static str = "merge";
    /// Port ID for inputs (accepts multiple connections)
    pub const PORT_TEXTS: &'static str = "texts";
    pub const PORT_TEXT: &'static str = "text";
    pub const PARAM_MODE: &'static str = "mode";
    pub const PARAM_SEPARATOR: &'static str = "separator";
}

impl NodeDescriptor for MergeNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NODE_TYPE, NodeCategory::Processing, "Merge")
            .with_description("Combines several inputs into one list")
            .with_input(
                PortMetadata::optional(Self::PORT_TEXTS, "Texts", PortDataType::Text).multiple(),
            )
            .with_output(PortMetadata::optional(Self::PORT_TEXT, "Text", PortDataType::Text))
            .content_hashed()
    }
}

impl NodeLogic for MergeNode {
    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::menu(Self::PARAM_MODE, &MergeMode::ALL).with_label("Mode"),
            Parameter::string(Self::PARAM_SEPARATOR, "\n").with_label("Separator"),
        ]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let mode = MergeMode::from_menu(&ctx.param_str(Self::PARAM_MODE)?)?;
        let inputs = ctx.inputs()?;
        if inputs.is_empty() {
            ctx.warn("No inputs to merge");
        }
        let items = inputs.concat();
        let merged = match mode {
            MergeMode::Concatenate => items,
            MergeMode::Join => {
                let separator = crate::unescape(&ctx.param_str(Self::PARAM_SEPARATOR)?);
                vec![items.join(&separator)]
            }
        };
        Ok(vec![merged])
    }
}

inventory::submit!(textflow_engine::NodeKindFn {
    descriptor: MergeNode::descriptor,
    factory: || Box::new(MergeNode),
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::text;
    use textflow_engine::{ParameterValue, Session};

    fn merged(session: &mut Session) -> textflow_engine::NodeId {
        let a = text(session, "a", "one");
        let b = text(session, "b", "two");
        let merge = session.create(MergeNode::NODE_TYPE, None, "/").unwrap();
        session.set_next_input(merge, a, 0).unwrap();
        session.set_next_input(merge, b, 0).unwrap();
        merge
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(MergeMode::from_menu("join").unwrap(), MergeMode::Join);
        assert!(MergeMode::from_menu("zip").is_err());
    }

    #[test]
    fn test_concatenate() {
        let mut session = Session::new();
        let merge = merged(&mut session);
        assert_eq!(session.node(merge).unwrap().inputs().len(), 2);
        assert_eq!(session.eval(merge).unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_join_with_separator() {
        let mut session = Session::new();
        let merge = merged(&mut session);
        session
            .set_parameter(merge, "mode", ParameterValue::Menu("join".into()))
            .unwrap();
        session
            .set_parameter(merge, "separator", ParameterValue::String(", ".into()))
            .unwrap();
        assert_eq!(session.eval(merge).unwrap(), vec!["one, two"]);
    }

    #[test]
    fn test_no_inputs_warns() {
        let mut session = Session::new();
        let merge = session.create(MergeNode::NODE_TYPE, None, "/").unwrap();
        assert!(session.eval(merge).unwrap().is_empty());
        assert_eq!(session.node(merge).unwrap().warnings().len(), 1);
    }

    #[test]
    fn test_rejects_unknown_menu_item() {
        let mut session = Session::new();
        let merge = session.create(MergeNode::NODE_TYPE, None, "/").unwrap();
        assert!(session
            .set_parameter(merge, "mode", ParameterValue::Menu("zip".into()))
            .is_err());
    }
}
