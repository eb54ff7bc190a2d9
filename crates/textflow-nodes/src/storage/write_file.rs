//! Write File Node
//!
//! Writes its input to a file and passes the input on unchanged, so it
//! can sit in the middle of a pipeline.

use std::io::Write;
use std::path::Path;

use textflow_engine::{
    CookContext, NodeCategory, NodeDescriptor, NodeEngineError, NodeLogic, NodeMetadata,
    Parameter, PortDataType, PortMetadata, Result, TextList,
};

/// Write File Node
///
/// # Inputs
/// - `text` - Items to write, joined with `separator`
///
/// # Outputs
/// - `text` - The input, unchanged
pub struct WriteFileNode;

impl WriteFileNode {
    pub const NODE_TYPE: &'static str = "write_file";
    pub const PORT_TEXT: &'static str = "text";
    pub const PARAM_PATH: &'static str = "path";
    pub const PARAM_SEPARATOR: &'static str = "separator";
    pub const PARAM_APPEND: &'static str = "append";
}

impl NodeDescriptor for WriteFileNode {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(Self::NODE_TYPE, NodeCategory::Output, "Write File")
            .with_description("Writes the joined input to a file and passes it through")
            .with_input(PortMetadata::required(Self::PORT_TEXT, "Text", PortDataType::Text))
            .with_output(PortMetadata::optional(Self::PORT_TEXT, "Text", PortDataType::Text))
            .single_input()
    }
}

impl NodeLogic for WriteFileNode {
    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::string(Self::PARAM_PATH, "").with_label("Path"),
            Parameter::string(Self::PARAM_SEPARATOR, "\\n").with_label("Separator"),
            Parameter::toggle(Self::PARAM_APPEND, false).with_label("Append"),
        ]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let path = ctx.param_str(Self::PARAM_PATH)?;
        let path = Path::new(path.trim());
        if path.as_os_str().is_empty() {
            return Err(NodeEngineError::failed("no file path given"));
        }
        let separator = crate::unescape(&ctx.param_str(Self::PARAM_SEPARATOR)?);
        let append = ctx.param_bool(Self::PARAM_APPEND)?;
        let items = ctx.first_input().unwrap_or_default();
        if items.is_empty() {
            ctx.warn("Writing an empty file");
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        file.write_all(items.join(&separator).as_bytes())?;
        log::info!("Wrote {} item(s) to {}", items.len(), path.display());
        Ok(vec![items])
    }
}

inventory::submit!(textflow_engine::NodeKindFn {
    descriptor: WriteFileNode::descriptor,
    factory: || Box::new(WriteFileNode),
});
