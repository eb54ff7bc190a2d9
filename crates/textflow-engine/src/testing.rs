//! Small node kinds and helpers for the engine's own tests

use std::sync::Arc;

use crate::constants::paths::ROOT;
use crate::descriptor::{NodeMetadata, PortMetadata};
use crate::engine::CookContext;
use crate::error::Result;
use crate::node::{NodeDescriptor, NodeLogic};
use crate::parameter::{Parameter, ParameterValue};
use crate::registry::NodeKindRegistry;
use crate::session::Session;
use crate::types::{NodeCategory, NodeId, PortDataType, TextList};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// First input followed by the `text` parameter (when not blank)
pub struct Echo;

impl NodeDescriptor for Echo {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new("echo", NodeCategory::Processing, "Echo")
            .with_input(PortMetadata::optional("text", "Text", PortDataType::Text))
            .with_output(PortMetadata::optional("text", "Text", PortDataType::Text))
            .content_hashed()
    }
}

impl NodeLogic for Echo {
    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::string("text", ""),
            Parameter::button("shout", "$NAME.upper()"),
        ]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let mut items = ctx.first_input().unwrap_or_default();
        let text = ctx.param_str("text")?;
        if !text.trim().is_empty() {
            items.push(text);
        }
        Ok(vec![items])
    }
}

/// Concatenates any number of inputs
struct Join;

impl NodeLogic for Join {
    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        Ok(vec![ctx.inputs()?.concat()])
    }
}

/// Pass-through with single-input and single-output flags
struct Single;

impl NodeLogic for Single {
    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        Ok(vec![ctx.first_input().unwrap_or_default()])
    }
}

/// Time-dependent counter
#[derive(Default)]
struct Ticker {
    count: u64,
}

impl NodeLogic for Ticker {
    fn cook(&mut self, _ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        self.count += 1;
        Ok(vec![vec![self.count.to_string()]])
    }
}

/// Splits comma lists; first item on slot 0, the rest on slot 1
struct HeadTail;

impl NodeLogic for HeadTail {
    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let items: Vec<String> = ctx
            .first_input()
            .unwrap_or_default()
            .iter()
            .flat_map(|s| s.split(','))
            .map(str::to_string)
            .collect();
        let (head, tail) = items.split_at(items.len().min(1));
        Ok(vec![head.to_vec(), tail.to_vec()])
    }
}

fn text_port(id: &str) -> PortMetadata {
    PortMetadata::optional(id, id, PortDataType::Text)
}

pub fn registry() -> Arc<NodeKindRegistry> {
    let mut registry = NodeKindRegistry::with_builtins();
    registry.register(Echo::descriptor(), || Box::new(Echo));
    registry.register(
        NodeMetadata::new("join", NodeCategory::Processing, "Join")
            .with_input(text_port("texts").multiple())
            .with_output(text_port("text")),
        || Box::new(Join),
    );
    registry.register(
        NodeMetadata::new("single", NodeCategory::Processing, "Single")
            .with_input(text_port("text"))
            .with_input(text_port("other"))
            .with_output(text_port("text"))
            .single_input()
            .single_output(),
        || Box::new(Single),
    );
    registry.register(
        NodeMetadata::new("ticker", NodeCategory::Input, "Ticker")
            .with_output(text_port("count"))
            .time_dependent(),
        || Box::new(Ticker::default()),
    );
    registry.register(
        NodeMetadata::new("head_tail", NodeCategory::Processing, "Head/Tail")
            .with_input(text_port("text"))
            .with_output(text_port("head"))
            .with_output(text_port("tail")),
        || Box::new(HeadTail),
    );
    Arc::new(registry)
}

pub fn session() -> Session {
    Session::with_registry(registry())
}

/// Create a top-level echo node with its `text` parameter set
pub fn text(session: &mut Session, name: &str, text: &str) -> NodeId {
    let id = session.create("echo", Some(name), ROOT).unwrap();
    if !text.is_empty() {
        session
            .set_parameter(id, "text", ParameterValue::String(text.to_string()))
            .unwrap();
    }
    id
}

/// Create an echo node under `parent`
pub fn text_in(session: &mut Session, parent: &str, name: &str, text: &str) -> NodeId {
    let id = session.create("echo", Some(name), parent).unwrap();
    session
        .set_parameter(id, "text", ParameterValue::String(text.to_string()))
        .unwrap();
    id
}
