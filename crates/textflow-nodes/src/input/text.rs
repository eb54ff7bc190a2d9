//! Text Node
//!
//! The literal text source of a pipeline. Its `text` parameter goes through
//! expression expansion, so globals, loop markers and backtick segments
//! all work here.

use textflow_engine::{
    CookContext, NodeCategory, NodeDescriptor, NodeLogic, NodeMetadata, Parameter, PortDataType,
    PortMetadata, Result, TextList,
};

/// Text Node
///
/// # Inputs
/// - `text` (optional) - Items passed through ahead of the parameter
///
/// # Outputs
/// - `text` - Input items followed by the evaluated `text` parameter
///   (left out when blank)
pub struct TextNode;

impl TextNode {
    pub const NODE_TYPE: &'static str = "text";
    /// Port ID for input and output
    pub const PORT_TEXT: &'static str = "text";
    pub const PARAM_TEXT: &'static str = "text";
}

impl NodeDescriptor for TextNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NODE_TYPE, NodeCategory::Input, "Text")
            .with_description("Appends its text to the incoming items")
            .with_input(PortMetadata::optional(Self::PORT_TEXT, "Text", PortDataType::Text))
            .with_output(PortMetadata::optional(Self::PORT_TEXT, "Text", PortDataType::Text))
            .single_input()
            .content_hashed()
    }
}

impl NodeLogic for TextNode {
    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::string(Self::PARAM_TEXT, "").with_label("Text")]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let mut items = ctx.first_input().unwrap_or_default();
        let text = ctx.param_str(Self::PARAM_TEXT)?;
        if !text.trim().is_empty() {
            items.push(text);
        }
        log::debug!("TextNode {}: {} item(s)", ctx.node_id(), items.len());
        Ok(vec![items])
    }
}

inventory::submit!(textflow_engine::NodeKindFn {
    descriptor: TextNode::descriptor,
    factory: || Box::new(TextNode),
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{init_logging, text};
    use textflow_engine::{CookState, ParameterValue, Session};

    #[test]
    fn test_descriptor() {
        let meta = TextNode::descriptor();
        assert_eq!(meta.node_type, "text");
        assert!(meta.single_input);
        assert!(meta.content_hashed);
        assert_eq!(meta.input_names().get(&0).map(String::as_str), Some("text"));
    }

    #[test]
    fn test_expands_expressions() {
        init_logging();
        let mut session = Session::new();
        session.set_global("WHO", "world").unwrap();
        let a = text(&mut session, "a", "hello $WHO, `2 * 21`");
        assert_eq!(session.eval(a).unwrap(), vec!["hello world, 42"]);
    }

    #[test]
    fn test_blank_text_passes_input_through() {
        let mut session = Session::new();
        let a = text(&mut session, "a", "one");
        let b = text(&mut session, "b", "   ");
        session.set_input(b, 0, a, 0).unwrap();
        assert_eq!(session.eval(b).unwrap(), vec!["one"]);
    }

    #[test]
    fn test_identical_edit_skips_downstream() {
        let mut session = Session::new();
        let a = text(&mut session, "a", "same");
        let b = text(&mut session, "b", "tail");
        session.set_input(b, 0, a, 0).unwrap();
        session.eval(b).unwrap();

        // A global nobody reads dirties everything but changes nothing
        session.set_global("UNUSED", "1").unwrap();
        assert_eq!(session.node(b).unwrap().state(), CookState::Uncooked);
        session.eval(b).unwrap();
        assert_eq!(session.node(a).unwrap().cook_count(), 1);
        assert_eq!(session.node(b).unwrap().cook_count(), 1);

        session
            .set_parameter(a, "text", ParameterValue::String("changed".into()))
            .unwrap();
        assert_eq!(session.eval(b).unwrap(), vec!["changed", "tail"]);
        assert_eq!(session.node(b).unwrap().cook_count(), 2);
    }
}
