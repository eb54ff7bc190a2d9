//! Split Node
//!
//! Breaks every input item apart on a delimiter.

use textflow_engine::{
    CookContext, NodeCategory, NodeDescriptor, NodeEngineError, NodeLogic, NodeMetadata,
    Parameter, PortDataType, PortMetadata, Result, TextList,
};

/// Split Node
///
/// # Inputs
/// - `text` - Items to split
///
/// # Outputs
/// - `text` - The pieces of every item, in order
pub struct SplitNode;

impl SplitNode {
    pub const NODE_TYPE: &'static str = "split";
    pub const PORT_TEXT: &'static str = "text";
    pub const PARAM_DELIMITER: &'static str = "delimiter";
    pub const PARAM_FILTER_EMPTY: &'static str = "filter_empty";
}

impl NodeDescriptor for SplitNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NODE_TYPE, NodeCategory::Processing, "Split")
            .with_description("Splits every item on a delimiter")
            .with_input(PortMetadata::required(Self::PORT_TEXT, "Text", PortDataType::Text))
            .with_output(PortMetadata::optional(Self::PORT_TEXT, "Text", PortDataType::Text))
            .single_input()
            .content_hashed()
    }
}

impl NodeLogic for SplitNode {
    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::string(Self::PARAM_DELIMITER, "\\n").with_label("Delimiter"),
            Parameter::toggle(Self::PARAM_FILTER_EMPTY, true).with_label("Drop Empty Pieces"),
        ]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let delimiter = crate::unescape(&ctx.param_str(Self::PARAM_DELIMITER)?);
        if delimiter.is_empty() {
            return Err(NodeEngineError::failed("split delimiter must not be empty"));
        }
        let filter_empty = ctx.param_bool(Self::PARAM_FILTER_EMPTY)?;
        let Some(items) = ctx.first_input() else {
            ctx.warn("Nothing connected to split");
            return Ok(vec![Vec::new()]);
        };

        let pieces = items
            .iter()
            .flat_map(|item| item.split(delimiter.as_str()))
            .filter(|piece| !filter_empty || !piece.trim().is_empty())
            .map(str::to_string)
            .collect();
        Ok(vec![pieces])
    }
}

inventory::submit!(textflow_engine::NodeKindFn {
    descriptor: SplitNode::descriptor,
    factory: || Box::new(SplitNode),
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::text;
    use textflow_engine::{CookState, ParameterValue, Session};

    #[test]
    fn test_split_lines() {
        let mut session = Session::new();
        let a = text(&mut session, "a", "one\n\ntwo\nthree");
        let split = session.create(SplitNode::NODE_TYPE, None, "/").unwrap();
        session.set_input(split, 0, a, 0).unwrap();
        assert_eq!(session.eval(split).unwrap(), vec!["one", "two", "three"]);

        session
            .set_parameter(split, "filter_empty", ParameterValue::Toggle(false))
            .unwrap();
        assert_eq!(session.eval(split).unwrap(), vec!["one", "", "two", "three"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut session = Session::new();
        let a = text(&mut session, "a", "a;b;c");
        let split = session.create(SplitNode::NODE_TYPE, None, "/").unwrap();
        session.set_input(split, 0, a, 0).unwrap();
        session
            .set_parameter(split, "delimiter", ParameterValue::String(";".into()))
            .unwrap();
        assert_eq!(session.eval(split).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_delimiter_is_an_error() {
        let mut session = Session::new();
        let split = session.create(SplitNode::NODE_TYPE, None, "/").unwrap();
        session
            .set_parameter(split, "delimiter", ParameterValue::String(String::new()))
            .unwrap();
        session.cook(split, false).unwrap();
        let node = session.node(split).unwrap();
        assert_eq!(node.state(), CookState::Uncooked);
        assert!(node.errors()[0].contains("delimiter"));
    }

    #[test]
    fn test_unconnected_warns() {
        let mut session = Session::new();
        let split = session.create(SplitNode::NODE_TYPE, None, "/").unwrap();
        assert!(session.eval(split).unwrap().is_empty());
        assert_eq!(session.node(split).unwrap().warnings().len(), 1);
    }
}
