//! Read File Node
//!
//! Reads a file into a single item. Files can change behind the engine's
//! back, so the node cooks on every request.

use std::path::Path;

use textflow_engine::{
    CookContext, NodeCategory, NodeDescriptor, NodeEngineError, NodeLogic, NodeMetadata,
    Parameter, PortDataType, PortMetadata, Result, TextList,
};

/// Read File Node
///
/// # Outputs
/// - `content` - The file's content as one item
pub struct ReadFileNode;

impl ReadFileNode {
    pub const NODE_TYPE: &'static str = "read_file";
    pub const PORT_CONTENT: &'static str = "content";
    pub const PARAM_PATH: &'static str = "path";
}

impl NodeDescriptor for ReadFileNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NODE_TYPE, NodeCategory::Input, "Read File")
            .with_description("Reads a file into one item")
            .with_output(PortMetadata::optional(
                Self::PORT_CONTENT,
                "Content",
                PortDataType::Text,
            ))
            .time_dependent()
    }
}

impl NodeLogic for ReadFileNode {
    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::string(Self::PARAM_PATH, "").with_label("Path")]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let path = ctx.param_str(Self::PARAM_PATH)?;
        let path = path.trim();
        if path.is_empty() {
            return Err(NodeEngineError::failed("no file path given"));
        }

        let content = std::fs::read_to_string(Path::new(path)).map_err(|e| {
            NodeEngineError::failed(format!("Failed to read file '{}': {}", path, e))
        })?;
        log::debug!(
            "ReadFileNode {}: read {} chars from '{}'",
            ctx.node_id(),
            content.len(),
            path
        );
        Ok(vec![vec![content]])
    }
}

inventory::submit!(textflow_engine::NodeKindFn {
    descriptor: ReadFileNode::descriptor,
    factory: || Box::new(ReadFileNode),
});

#[cfg(test)]
mod tests {
    use super::*;
    use textflow_engine::{CookState, ParameterValue, Session};

    fn reader(session: &mut Session, path: &str) -> textflow_engine::NodeId {
        let node = session.create(ReadFileNode::NODE_TYPE, None, "/").unwrap();
        session
            .set_parameter(node, "path", ParameterValue::String(path.to_string()))
            .unwrap();
        node
    }

    #[test]
    fn test_reads_file_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "first").unwrap();

        let mut session = Session::new();
        let node = reader(&mut session, path.to_str().unwrap());
        assert_eq!(session.eval(node).unwrap(), vec!["first"]);

        std::fs::write(&path, "second").unwrap();
        assert!(session.needs_to_cook(node).unwrap());
        assert_eq!(session.eval(node).unwrap(), vec!["second"]);
    }

    #[test]
    fn test_path_from_global() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "noted").unwrap();

        let mut session = Session::new();
        session
            .set_global("DIR", dir.path().to_str().unwrap())
            .unwrap();
        let node = reader(&mut session, "$DIR/notes.txt");
        assert_eq!(session.eval(node).unwrap(), vec!["noted"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        let node = reader(&mut session, dir.path().join("nope.txt").to_str().unwrap());
        session.cook(node, false).unwrap();

        let node = session.node(node).unwrap();
        assert_eq!(node.state(), CookState::Uncooked);
        assert!(node.errors()[0].contains("Failed to read file"));
    }
}
