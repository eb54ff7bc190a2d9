//! The loop construct
//!
//! A Looper owns two internal children created with it:
//!
//! - `loop_in` exposes the data flowing into the Looper to the loop body
//!   (or, with feedback on, what the body produced so far).
//! - `loop_out` collects the body's result on every iteration.
//!
//! Users wire their own body nodes between the two. Cooking the Looper
//! publishes each loop index to the session's loop context, re-cooks the
//! body through `loop_out` and finally outputs the last collected value.

use std::time::{Duration, Instant};

use crate::constants::looper::{INPUT_NAME, OUTPUT_NAME};
use crate::constants::node_types;
use crate::descriptor::{NodeMetadata, PortMetadata};
use crate::engine::CookContext;
use crate::error::{NodeEngineError, Result};
use crate::events::GraphEvent;
use crate::loop_context::LoopFrame;
use crate::node::{NodeDescriptor, NodeLogic};
use crate::parameter::{Parameter, ParameterValue};
use crate::session::Session;
use crate::types::{NodeCategory, NodeId, PortDataType, TextList};

/// Parameter names of the Looper
pub mod params {
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
    pub const STEP: &str = "step";
    pub const USE_INPUT_LEN: &str = "use_input_len";
    pub const FEEDBACK: &str = "feedback";
    pub const USE_TEST: &str = "use_test";
    pub const TEST_NUMBER: &str = "test_number";
    pub const TIMEOUT: &str = "timeout";
    pub const MAX_DATA_SIZE: &str = "max_data_size";
}

/// Inclusive stepped range of loop indices
fn loop_range(min: i64, max: i64, step: i64) -> Result<impl Iterator<Item = i64>> {
    if step == 0 {
        return Err(NodeEngineError::failed("loop step must not be zero"));
    }
    if (max > min && step < 0) || (max < min && step > 0) {
        return Err(NodeEngineError::failed(format!(
            "loop step {} does not lead from {} to {}",
            step, min, max
        )));
    }
    let mut next = Some(min);
    Ok(std::iter::from_fn(move || {
        let current = next?;
        let done = if step > 0 { current > max } else { current < max };
        if done {
            return None;
        }
        next = current.checked_add(step);
        Some(current)
    }))
}

fn text_port(id: &str, label: &str) -> PortMetadata {
    PortMetadata::optional(id, label, PortDataType::Text)
}

/// Repeats its internal sub-graph over a range of indices
pub struct Looper;

impl NodeDescriptor for Looper {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(node_types::LOOPER, NodeCategory::Control, "Looper")
            .with_description("Cooks its loop body once per index and outputs the collected result")
            .with_input(text_port("input", "Input"))
            .with_output(text_port("output", "Output"))
            .single_input()
    }
}

impl Looper {
    fn children(session: &Session, looper: NodeId) -> Result<(NodeId, NodeId)> {
        let find = |name: &str| {
            session.child_named(looper, name).ok_or_else(|| {
                NodeEngineError::failed(format!("loop body is missing its '{}' node", name))
            })
        };
        Ok((find(INPUT_NAME)?, find(OUTPUT_NAME)?))
    }
}

impl NodeLogic for Looper {
    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::int(params::MIN, 1).with_label("Min"),
            Parameter::int(params::MAX, 3).with_label("Max"),
            Parameter::int(params::STEP, 1).with_label("Step"),
            Parameter::toggle(params::USE_INPUT_LEN, false).with_label("Use Input Length"),
            Parameter::toggle(params::FEEDBACK, false).with_label("Feedback"),
            Parameter::toggle(params::USE_TEST, false).with_label("Single Test Iteration"),
            Parameter::int(params::TEST_NUMBER, 1).with_label("Test Iteration"),
            Parameter::float(params::TIMEOUT, crate::constants::defaults::LOOP_TIMEOUT_SECS)
                .with_label("Timeout (s)"),
            Parameter::int(params::MAX_DATA_SIZE, crate::constants::defaults::LOOP_DATA_LIMIT)
                .with_label("Max Data Size"),
        ]
    }

    fn on_created(&mut self, session: &mut Session, node: NodeId) -> Result<()> {
        let timeout = session.config().loop_timeout_secs;
        let limit = session.config().loop_data_limit;
        let this = session.node_mut(node)?;
        this.set_raw_parameter(params::TIMEOUT, ParameterValue::Float(timeout))?;
        this.set_raw_parameter(params::MAX_DATA_SIZE, ParameterValue::Int(limit))?;

        session.create_internal(node, node_types::LOOP_INPUT, INPUT_NAME)?;
        session.create_internal(node, node_types::LOOP_OUTPUT, OUTPUT_NAME)?;
        Ok(())
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let min = ctx.param_int(params::MIN)?;
        let mut max = ctx.param_int(params::MAX)?;
        let step = ctx.param_int(params::STEP)?;
        if ctx.param_bool(params::USE_INPUT_LEN)? {
            max = ctx.first_input().map(|items| items.len() as i64).unwrap_or(0);
        }
        let feedback = ctx.param_bool(params::FEEDBACK)?;
        let use_test = ctx.param_bool(params::USE_TEST)?;
        let test_number = ctx.param_int(params::TEST_NUMBER)?;
        let timeout = Duration::try_from_secs_f64(ctx.param_float(params::TIMEOUT)?.max(0.0))
            .unwrap_or(Duration::MAX);
        let data_limit = ctx.param_int(params::MAX_DATA_SIZE)?;

        let id = ctx.node_id();
        let path = ctx.path()?;
        let (loop_in, loop_out) = Looper::children(ctx.session(), id)?;

        let indices: Box<dyn Iterator<Item = i64>> = if use_test {
            Box::new(std::iter::once(test_number))
        } else {
            Box::new(loop_range(min, max, step)?)
        };

        let session = ctx.session_mut();
        session.loop_context.clear(&path);
        for child in [loop_in, loop_out] {
            session
                .node_mut(child)?
                .set_raw_parameter(params::FEEDBACK, ParameterValue::Toggle(feedback))?;
        }
        session.node_mut(loop_out)?.output.clear();

        let start = Instant::now();
        let mut result = TextList::new();
        let mut warnings = Vec::new();
        let mut iterations = 0usize;
        for (iteration, index) in indices.enumerate() {
            if start.elapsed() >= timeout {
                warnings.push(format!(
                    "Loop timed out after {} iteration(s) ({:.1}s)",
                    iterations,
                    timeout.as_secs_f64()
                ));
                break;
            }
            let session = ctx.session_mut();
            session.loop_context.set(&path, LoopFrame { index, iteration });
            session.emit(GraphEvent::LoopIteration {
                path: path.clone(),
                index,
            });
            session.invalidate_descendants(id);
            let cooked = session
                .cook(loop_out, true)
                .and_then(|()| session.node(loop_out).map(|n| n.output_slot(0).to_vec()));
            let captured = match cooked {
                Ok(captured) => captured,
                Err(e) => {
                    session.loop_context.clear(&path);
                    session.invalidate_descendants(id);
                    return Err(e);
                }
            };
            iterations += 1;

            if captured.iter().all(|item| item.trim().is_empty()) {
                warnings.push(format!("Iteration {} produced no output", index));
            }
            let size: usize = captured.iter().map(String::len).sum();
            result = captured;
            if data_limit > 0 && size as i64 > data_limit {
                warnings.push(format!(
                    "Loop stopped after iteration {}: {} characters exceed the limit of {}",
                    index, size, data_limit
                ));
                break;
            }
        }

        let session = ctx.session_mut();
        session.loop_context.clear(&path);
        session.invalidate_descendants(id);
        log::debug!("{} ran {} iteration(s)", path, iterations);
        for warning in warnings {
            ctx.warn(warning);
        }
        Ok(vec![result])
    }
}

/// Feeds the loop body
///
/// Outputs the Looper's input, or with feedback on (after the first
/// iteration) what `loop_out` has collected so far.
pub struct LoopInput;

impl NodeDescriptor for LoopInput {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(node_types::LOOP_INPUT, NodeCategory::Control, "Loop Input")
            .with_description("Data entering the loop body")
            .with_output(text_port("output", "Output"))
            .time_dependent()
    }
}

impl NodeLogic for LoopInput {
    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::toggle(params::FEEDBACK, false).with_label("Feedback")]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let feedback = ctx.param_bool(params::FEEDBACK)?;
        let session = ctx.session();
        let Some(owner) = ctx.node()?.parent() else {
            return Err(NodeEngineError::failed("loop input outside a Looper"));
        };
        let owner_path = session.node(owner)?.path();
        let iteration = session
            .loop_context()
            .frame(owner_path)
            .map(|f| f.iteration)
            .unwrap_or(0);

        if feedback && iteration > 0 {
            if let Some(loop_out) = session.child_named(owner, OUTPUT_NAME) {
                return Ok(vec![session.node(loop_out)?.output_slot(0).to_vec()]);
            }
        }
        Ok(vec![session.input_data(owner, 0)?])
    }
}

/// Collects the loop body's result
///
/// Appends its input to what it holds, or replaces it when feedback is
/// on (the body already started from the previous result).
pub struct LoopOutput;

impl NodeDescriptor for LoopOutput {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::new(node_types::LOOP_OUTPUT, NodeCategory::Control, "Loop Output")
            .with_description("Collects the loop body's result")
            .with_input(text_port("input", "Input"))
            .single_input()
            .time_dependent()
    }
}

impl NodeLogic for LoopOutput {
    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::toggle(params::FEEDBACK, false).with_label("Feedback")]
    }

    fn cook(&mut self, ctx: &mut CookContext<'_>) -> Result<Vec<TextList>> {
        let feedback = ctx.param_bool(params::FEEDBACK)?;
        let input = ctx.first_input().unwrap_or_default();
        if feedback {
            return Ok(vec![input]);
        }
        let mut collected = ctx.node()?.output_slot(0).to_vec();
        collected.extend(input);
        Ok(vec![collected])
    }
}

inventory::submit!(crate::NodeKindFn {
    descriptor: Looper::descriptor,
    factory: || Box::new(Looper),
});

inventory::submit!(crate::NodeKindFn {
    descriptor: LoopInput::descriptor,
    factory: || Box::new(LoopInput),
});

inventory::submit!(crate::NodeKindFn {
    descriptor: LoopOutput::descriptor,
    factory: || Box::new(LoopOutput),
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::paths::ROOT;
    use crate::events::VecEventSink;
    use crate::testing::{self, text, text_in};
    use crate::types::CookState;
    use std::sync::Arc;

    /// Looper at /looper1 with loop_in -> body -> loop_out
    fn looper_with_body(session: &mut Session, body_text: &str) -> (NodeId, NodeId) {
        let looper = session.create(node_types::LOOPER, None, ROOT).unwrap();
        let body = text_in(session, "/looper1", "body", body_text);
        let loop_in = session.find("/looper1/loop_in").unwrap();
        let loop_out = session.find("/looper1/loop_out").unwrap();
        session.set_input(body, 0, loop_in, 0).unwrap();
        session.set_input(loop_out, 0, body, 0).unwrap();
        (looper, body)
    }

    fn set_int(session: &mut Session, id: NodeId, name: &str, value: i64) {
        session
            .set_parameter(id, name, ParameterValue::Int(value))
            .unwrap();
    }

    #[test]
    fn test_loop_range() {
        assert_eq!(loop_range(1, 3, 1).unwrap().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(loop_range(5, 1, -2).unwrap().collect::<Vec<_>>(), vec![5, 3, 1]);
        assert_eq!(loop_range(2, 2, 1).unwrap().collect::<Vec<_>>(), vec![2]);
        assert!(loop_range(1, 3, 0).is_err());
        assert!(loop_range(1, 3, -1).is_err());
    }

    #[test]
    fn test_internal_children_created() {
        let mut session = testing::session();
        let looper = session.create(node_types::LOOPER, None, ROOT).unwrap();

        let children = session.node(looper).unwrap().children().to_vec();
        assert_eq!(children.len(), 2);
        for child in &children {
            assert!(session.node(*child).unwrap().is_internal());
        }
        assert_eq!(
            session.node(children[0]).unwrap().path(),
            "/looper1/loop_in"
        );
        // One undo entry for the whole creation
        assert_eq!(session.undo_manager().len(), 1);
    }

    #[test]
    fn test_internal_children_are_protected() {
        let mut session = testing::session();
        let looper = session.create(node_types::LOOPER, None, ROOT).unwrap();
        let loop_in = session.find("/looper1/loop_in").unwrap();

        assert!(matches!(session.destroy(loop_in), Err(NodeEngineError::InternalNode(_))));
        assert!(matches!(
            session.rename(loop_in, "x"),
            Err(NodeEngineError::InternalNode(_))
        ));
        assert!(matches!(
            session.set_parent(loop_in, ROOT),
            Err(NodeEngineError::InternalNode(_))
        ));

        session.destroy(looper).unwrap();
        assert!(session.is_empty());
    }

    #[test]
    fn test_loop_accumulates_each_iteration() {
        let mut session = testing::session();
        let (looper, _) = looper_with_body(&mut session, "item $$");

        assert_eq!(
            session.eval(looper).unwrap(),
            vec!["item 0", "item 1", "item 2"]
        );
        assert!(session.loop_context().is_empty());
        assert_eq!(session.node(looper).unwrap().state(), CookState::Unchanged);
    }

    #[test]
    fn test_loop_markers_index_the_input() {
        let mut session = testing::session();
        let source = text(&mut session, "source", "");
        let (looper, body) = looper_with_body(&mut session, "[[i]]!");
        let split = session.create("head_tail", None, ROOT).unwrap();
        session.set_input(split, 0, source, 0).unwrap();
        session
            .set_parameter(source, "text", ParameterValue::String("a,b,c".into()))
            .unwrap();
        let join = session.create("join", None, ROOT).unwrap();
        session.set_next_input(join, split, 0).unwrap();
        session.set_next_input(join, split, 1).unwrap();
        session.set_input(looper, 0, join, 0).unwrap();
        session
            .set_parameter(looper, params::USE_INPUT_LEN, ParameterValue::Toggle(true))
            .unwrap();

        // body passes its input through and appends the picked item
        let out = session.eval(looper).unwrap();
        assert_eq!(out.len(), 3 * 4);
        assert_eq!(out[3], "a!");
        assert_eq!(out[7], "b!");
        assert_eq!(out[11], "c!");
        assert!(session.node(body).unwrap().errors().is_empty());
    }

    #[test]
    fn test_single_test_iteration() {
        let mut session = testing::session();
        let sink = Arc::new(VecEventSink::new());
        session.set_event_sink(sink.clone());
        let (looper, _) = looper_with_body(&mut session, "run `$$ + 1`");
        set_int(&mut session, looper, params::MAX, 5);
        set_int(&mut session, looper, params::TEST_NUMBER, 2);
        session
            .set_parameter(looper, params::USE_TEST, ParameterValue::Toggle(true))
            .unwrap();

        assert_eq!(session.eval(looper).unwrap(), vec!["run 2"]);
        let iterations: Vec<i64> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                GraphEvent::LoopIteration { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(iterations, vec![2]);
    }

    #[test]
    fn test_feedback_replaces_instead_of_accumulating() {
        let mut session = testing::session();
        let source = text(&mut session, "source", "seed");
        let (looper, _) = looper_with_body(&mut session, "x");
        session.set_input(looper, 0, source, 0).unwrap();
        session
            .set_parameter(looper, params::FEEDBACK, ParameterValue::Toggle(true))
            .unwrap();

        assert_eq!(session.eval(looper).unwrap(), vec!["seed", "x", "x", "x"]);
        let loop_out = session.find("/looper1/loop_out").unwrap();
        assert_eq!(
            session.parameter(loop_out, params::FEEDBACK).unwrap().raw(),
            &ParameterValue::Toggle(true)
        );
    }

    #[test]
    fn test_bad_step_is_a_node_error() {
        let mut session = testing::session();
        let (looper, _) = looper_with_body(&mut session, "x");
        set_int(&mut session, looper, params::STEP, 0);
        session.cook(looper, false).unwrap();
        let node = session.node(looper).unwrap();
        assert_eq!(node.state(), CookState::Uncooked);
        assert_eq!(node.errors().len(), 1);
    }

    #[test]
    fn test_limits_stop_with_warning() {
        let mut session = testing::session();
        let (looper, _) = looper_with_body(&mut session, "abcdef");
        set_int(&mut session, looper, params::MAX_DATA_SIZE, 10);
        assert_eq!(session.eval(looper).unwrap(), vec!["abcdef", "abcdef"]);
        assert_eq!(session.node(looper).unwrap().warnings().len(), 1);

        set_int(&mut session, looper, params::MAX_DATA_SIZE, 0);
        session
            .set_parameter(looper, params::TIMEOUT, ParameterValue::Float(0.0))
            .unwrap();
        let out = session.eval(looper).unwrap();
        assert!(out.len() <= 1);
        assert!(session.node(looper).unwrap().warnings()[0].contains("timed out"));
    }

    #[test]
    fn test_blank_iteration_warns() {
        let mut session = testing::session();
        let (looper, _) = looper_with_body(&mut session, " ");
        session.eval(looper).unwrap();
        assert_eq!(session.node(looper).unwrap().warnings().len(), 3);
    }

    #[test]
    fn test_body_edit_dirties_looper() {
        let mut session = testing::session();
        let (looper, body) = looper_with_body(&mut session, "a");
        session.eval(looper).unwrap();
        assert!(!session.needs_to_cook(looper).unwrap());

        session
            .set_parameter(body, "text", ParameterValue::String("b".into()))
            .unwrap();
        assert!(session.needs_to_cook(looper).unwrap());
        assert_eq!(session.eval(looper).unwrap(), vec!["b", "b", "b"]);
    }

    #[test]
    fn test_failed_iteration_clears_loop_frame() {
        let mut session = testing::session();
        let (looper, body) = looper_with_body(&mut session, "x");
        // Leave loop_out wired to a node that no longer exists
        session.nodes.remove(&body);

        session.cook(looper, false).unwrap();
        assert!(!session.node(looper).unwrap().errors().is_empty());
        assert!(session.loop_context().is_empty());
    }

    #[test]
    fn test_config_defaults_applied() {
        let config = crate::config::EngineConfig {
            loop_timeout_secs: 5.0,
            ..Default::default()
        };
        let mut session = Session::with_config(testing::registry(), config);
        let looper = session.create(node_types::LOOPER, None, ROOT).unwrap();
        assert_eq!(
            session.parameter(looper, params::TIMEOUT).unwrap().raw(),
            &ParameterValue::Float(5.0)
        );
    }
}
