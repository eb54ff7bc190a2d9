//! Dependency-ordered lazy evaluation ("cooking")
//!
//! Pull-based: asking for a node's output walks its inputs backwards,
//! collects every upstream node that needs work (dependencies first), and
//! cooks exactly those. A node that cooked successfully sits in
//! `Unchanged` until something dirties it: an edit to itself, an edit
//! upstream, a global variable change or a loop iteration.
//!
//! # Change detection
//!
//! Edits dirty the edited node and everything downstream eagerly, so
//! [`Session::needs_to_cook`] is accurate without a walk. Kinds flagged
//! `content_hashed` then get a second chance: right before cooking, a
//! blake3 hash over their type, resolved parameters and input data is
//! compared with the one from their last successful cook, and an equal
//! hash skips the cook. Upstream churn that does not change what a node
//! actually sees therefore stops at that node.

use std::collections::HashSet;
use std::time::Instant;

use crate::constants::params;
use crate::error::{NodeEngineError, Result};
use crate::events::GraphEvent;
use crate::node::Node;
use crate::parameter::{EvalScope, ParameterValue};
use crate::session::Session;
use crate::types::{ConnectionId, CookState, NodeId, TextList};

/// What a node's logic sees while it cooks
pub struct CookContext<'a> {
    session: &'a mut Session,
    node: NodeId,
    warnings: Vec<String>,
}

impl<'a> CookContext<'a> {
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The node being cooked
    pub fn node(&self) -> Result<&Node> {
        self.session.node(self.node)
    }

    pub fn path(&self) -> Result<String> {
        Ok(self.node()?.path.clone())
    }

    pub fn session(&self) -> &Session {
        self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        self.session
    }

    /// Record a soft problem; the cook still succeeds
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}: {}", self.node, message);
        self.warnings.push(message);
    }

    /// Data on one input slot (empty when unconnected)
    pub fn input(&self, index: usize) -> Result<TextList> {
        self.session.input_data(self.node, index)
    }

    pub fn is_connected(&self, index: usize) -> bool {
        self.session
            .node(self.node)
            .is_ok_and(|n| n.inputs.contains_key(&index))
    }

    /// Data of every connected input, in slot order
    pub fn inputs(&self) -> Result<Vec<TextList>> {
        let slots: Vec<usize> = self.node()?.inputs.keys().copied().collect();
        slots.into_iter().map(|i| self.input(i)).collect()
    }

    /// Data on the lowest connected input slot
    pub fn first_input(&self) -> Option<TextList> {
        self.session.first_input_data(self.node).map(<[String]>::to_vec)
    }

    /// Loop index of the nearest enclosing Looper
    pub fn loop_index(&self) -> i64 {
        self.session.loop_index(self.node)
    }

    /// Evaluate a parameter, collecting its warnings
    pub fn param(&mut self, name: &str) -> Result<ParameterValue> {
        let evaluation = self.session.eval_parameter(self.node, name)?;
        self.warnings.extend(evaluation.warnings);
        Ok(evaluation.value)
    }

    fn type_error(&self, name: &str, expected: &str, value: &ParameterValue) -> NodeEngineError {
        NodeEngineError::ParameterTypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: value.param_type().to_string(),
        }
    }

    pub fn param_str(&mut self, name: &str) -> Result<String> {
        let value = self.param(name)?;
        match value.as_str() {
            Some(s) => Ok(s.to_string()),
            None => Err(self.type_error(name, "string", &value)),
        }
    }

    pub fn param_int(&mut self, name: &str) -> Result<i64> {
        let value = self.param(name)?;
        value.as_int().ok_or_else(|| self.type_error(name, "int", &value))
    }

    pub fn param_float(&mut self, name: &str) -> Result<f64> {
        let value = self.param(name)?;
        value.as_float().ok_or_else(|| self.type_error(name, "float", &value))
    }

    pub fn param_bool(&mut self, name: &str) -> Result<bool> {
        let value = self.param(name)?;
        value.as_bool().ok_or_else(|| self.type_error(name, "toggle", &value))
    }

    pub fn param_list(&mut self, name: &str) -> Result<Vec<String>> {
        let value = self.param(name)?;
        match value.as_list() {
            Some(items) => Ok(items.to_vec()),
            None => Err(self.type_error(name, "string_list", &value)),
        }
    }
}

impl Session {
    /// Whether cooking `id` would run its logic
    pub fn needs_to_cook(&self, id: NodeId) -> Result<bool> {
        self.node(id)?;
        Ok(self.needs_to_cook_guarded(id, &mut HashSet::new()))
    }

    fn needs_to_cook_guarded(&self, id: NodeId, visited: &mut HashSet<NodeId>) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if !visited.insert(id) {
            return false;
        }
        match node.state {
            CookState::Cooked | CookState::Cooking => return false,
            _ if node.is_time_dependent() => return true,
            CookState::Unchanged => return false,
            CookState::Uncooked => {}
        }
        if !node.metadata.content_hashed || !node.errors.is_empty() {
            return true;
        }
        let Some(previous) = node.content_hash else {
            return true;
        };
        // Cached input data is stale while any source still needs to cook.
        let sources: Vec<NodeId> = node
            .inputs
            .values()
            .filter_map(|c| self.connections.get(c))
            .map(|c| c.output_node())
            .collect();
        if sources
            .into_iter()
            .any(|source| self.needs_to_cook_guarded(source, visited))
        {
            return true;
        }
        previous != self.content_hash(node)
    }

    /// Hash of what a node would cook from right now
    pub(crate) fn content_hash(&self, node: &Node) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        let mut field = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        field(node.node_type().as_bytes());
        let scope = self.eval_scope(node.id);
        for param in node.parameters.values() {
            field(param.name().as_bytes());
            match param.eval(&scope) {
                Ok(evaluation) => field(evaluation.value.to_json().to_string().as_bytes()),
                Err(e) => field(format!("error:{}", e).as_bytes()),
            }
        }
        for (index, conn) in &node.inputs {
            field(&(*index as u64).to_le_bytes()[..]);
            let data = self
                .connections
                .get(conn)
                .and_then(|c| {
                    self.nodes
                        .get(&c.output_node())
                        .map(|n| n.output_slot(c.output_index()))
                })
                .unwrap_or(&[]);
            field(&(data.len() as u64).to_le_bytes()[..]);
            for item in data {
                field(item.as_bytes());
            }
        }
        hasher.finalize()
    }

    /// Upstream nodes of `id` that must cook before it, dependencies first
    ///
    /// Each node appears once. A node is included when it needs to cook
    /// itself or when one of its sources is included. Cycles are logged
    /// and cut.
    pub fn cook_dependencies(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut order = Vec::new();
        let mut included = HashSet::new();
        self.visit_dependencies(id, &mut visited, &mut on_stack, &mut order, &mut included)?;
        order.retain(|n| *n != id);
        Ok(order)
    }

    fn visit_dependencies(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
        on_stack: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
        included: &mut HashSet<NodeId>,
    ) -> Result<()> {
        visited.insert(id);
        on_stack.insert(id);
        let sources = self.input_nodes(id)?;
        for source in &sources {
            if on_stack.contains(source) {
                log::warn!(
                    "Cycle through {} while collecting dependencies",
                    self.node(*source)?.path
                );
                continue;
            }
            if !visited.contains(source) {
                self.visit_dependencies(*source, visited, on_stack, order, included)?;
            }
        }
        on_stack.remove(&id);

        let stale_source = sources.iter().any(|s| included.contains(s));
        if stale_source || self.needs_to_cook(id)? {
            included.insert(id);
            order.push(id);
        }
        Ok(())
    }

    /// Cook `id` and whatever it depends on
    ///
    /// Node-level failures are recorded on the nodes, not returned.
    pub fn cook(&mut self, id: NodeId, force: bool) -> Result<()> {
        let dependencies = self.cook_dependencies(id)?;
        for dep in &dependencies {
            self.cook_if_needed(*dep, false)?;
        }
        self.cook_if_needed(id, force)?;

        for node in dependencies.iter().chain(std::iter::once(&id)) {
            if let Some(node) = self.nodes.get_mut(node) {
                if node.state == CookState::Cooked {
                    node.state = CookState::Unchanged;
                }
            }
        }
        Ok(())
    }

    fn cook_if_needed(&mut self, id: NodeId, force: bool) -> Result<()> {
        let node = self.node(id)?;
        if node.state == CookState::Cooking {
            log::warn!("{} is already cooking; using its cached output", node.path);
            return Ok(());
        }
        if force || self.needs_to_cook(id)? {
            self.internal_cook(id)
        } else {
            let node = self.node_mut(id)?;
            if node.state != CookState::Cooked {
                node.state = CookState::Unchanged;
            }
            Ok(())
        }
    }

    /// Cook `id` if needed and return output slot 0
    pub fn eval(&mut self, id: NodeId) -> Result<TextList> {
        self.eval_output(id, 0)
    }

    /// Cook `id` if needed and return one output slot
    pub fn eval_output(&mut self, id: NodeId, output_index: usize) -> Result<TextList> {
        self.cook(id, false)?;
        Ok(self.node(id)?.output_slot(output_index).to_vec())
    }

    /// Data a connection delivers, cooking its source if needed
    pub fn eval_connection(&mut self, connection: ConnectionId) -> Result<TextList> {
        let conn = self.connection(connection)?;
        let (source, index) = (conn.output_node(), conn.output_index());
        self.eval_output(source, index)
    }

    /// Run one node's logic and cache the result
    fn internal_cook(&mut self, id: NodeId) -> Result<()> {
        let start = Instant::now();
        let hash = {
            let node = self.node(id)?;
            node.metadata.content_hashed.then(|| self.content_hash(node))
        };

        let node = self.node_mut(id)?;
        node.state = CookState::Cooking;
        node.errors.clear();
        node.warnings.clear();
        let enabled = node.is_enabled();
        let arity = node.output_arity();
        let path = node.path.clone();
        log::debug!("Cooking {}", path);

        let mut ctx = CookContext {
            session: self,
            node: id,
            warnings: Vec::new(),
        };
        let result = if enabled {
            let logic = ctx.session.node_mut(id)?.logic.take();
            match logic {
                Some(mut logic) => {
                    let result = logic.cook(&mut ctx);
                    if let Some(node) = ctx.session.nodes.get_mut(&id) {
                        node.logic = Some(logic);
                    }
                    result
                }
                None => Err(NodeEngineError::failed(format!("{} has no logic", path))),
            }
        } else {
            Ok(vec![ctx.first_input().unwrap_or_default()])
        };
        let warnings = std::mem::take(&mut ctx.warnings);

        let elapsed = start.elapsed();
        let node = self.node_mut(id)?;
        node.cook_count += 1;
        node.last_cook_time = elapsed;
        node.warnings = warnings;
        let changed = match result {
            Ok(mut output) => {
                output.resize(arity, Vec::new());
                let changed = node.output != output;
                node.output = output;
                node.state = CookState::Cooked;
                node.content_hash = hash;
                changed
            }
            Err(e) => {
                log::warn!("Cook of {} failed: {}", path, e);
                node.errors.push(e.to_string());
                node.state = CookState::Uncooked;
                node.content_hash = None;
                false
            }
        };

        let node = self.node(id)?;
        let event = if node.errors.is_empty() {
            GraphEvent::NodeCooked {
                path: path.clone(),
                state: node.state,
                duration_ms: elapsed.as_millis() as u64,
                warnings: node.warnings.len(),
            }
        } else {
            GraphEvent::NodeFailed {
                path: path.clone(),
                errors: node.errors.clone(),
            }
        };
        self.emit(event);

        if changed {
            for dependent in self.output_nodes(id)? {
                if let Some(node) = self.nodes.get_mut(&dependent) {
                    node.mark_uncooked();
                }
            }
        }
        Ok(())
    }

    /// Dirty a node, everything downstream of it and any Looper it sits in
    pub(crate) fn invalidate(&mut self, id: NodeId) {
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            node.mark_uncooked();
            stack.extend(
                node.output_connections()
                    .filter_map(|c| self.connections.get(&c))
                    .map(|c| c.input_node()),
            );
            if let Some(looper) = self.enclosing_looper(current) {
                stack.push(looper);
            }
        }
    }

    /// Dirty the Loopers that contain `id` (and what they feed)
    pub(crate) fn invalidate_enclosing_loopers(&mut self, id: NodeId) {
        if let Some(looper) = self.enclosing_looper(id) {
            self.invalidate(looper);
        }
    }

    /// Dirty every node below `parent` without touching `parent` itself
    pub(crate) fn invalidate_descendants(&mut self, parent: NodeId) {
        for id in self.descendants(parent) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.mark_uncooked();
            }
        }
    }

    /// Dirty every node (global variables changed)
    pub(crate) fn invalidate_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.mark_uncooked();
        }
    }

    /// Whether the universal bypass toggle is on for `id`
    pub fn is_enabled(&self, id: NodeId) -> Result<bool> {
        Ok(self
            .parameter(id, params::ENABLED)?
            .raw()
            .as_bool()
            .unwrap_or(true))
    }

    /// Evaluation scope with an explicit loop index (used by tests and hosts)
    pub fn scope_with_loop_index(&self, id: NodeId, loop_index: i64) -> EvalScope<'_> {
        self.eval_scope(id).with_loop_index(loop_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::paths::ROOT;
    use crate::testing::{self, text};
    use crate::types::CookState;

    #[test]
    fn test_cook_dependencies_topological_without_duplicates() {
        // a -> b -> d, a -> c -> d (diamond)
        let mut session = testing::session();
        let a = text(&mut session, "a", "A");
        let b = text(&mut session, "b", "B");
        let c = text(&mut session, "c", "C");
        let d = session.create("join", Some("d"), ROOT).unwrap();
        session.set_input(b, 0, a, 0).unwrap();
        session.set_input(c, 0, a, 0).unwrap();
        session.set_next_input(d, b, 0).unwrap();
        session.set_next_input(d, c, 0).unwrap();

        let deps = session.cook_dependencies(d).unwrap();
        assert_eq!(deps.len(), 3);
        let pos = |id| deps.iter().position(|n| *n == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));

        assert_eq!(session.eval(d).unwrap(), vec!["A", "B", "A", "C"]);
        assert!(session.cook_dependencies(d).unwrap().is_empty());
    }

    #[test]
    fn test_cycles_do_not_loop_forever() {
        let mut session = testing::session();
        let a = text(&mut session, "a", "A");
        let b = text(&mut session, "b", "B");
        session.set_input(b, 0, a, 0).unwrap();
        session.set_input(a, 0, b, 0).unwrap();

        let deps = session.cook_dependencies(b).unwrap();
        assert_eq!(deps, vec![a]);
        session.cook(b, false).unwrap();
    }

    #[test]
    fn test_cache_idempotence() {
        testing::init_logging();
        let mut session = testing::session();
        let a = text(&mut session, "a", "A");
        let b = text(&mut session, "b", "B");
        session.set_input(b, 0, a, 0).unwrap();

        session.eval(b).unwrap();
        assert!(!session.needs_to_cook(a).unwrap());
        assert!(!session.needs_to_cook(b).unwrap());
        assert_eq!(session.node(b).unwrap().state(), CookState::Unchanged);

        session
            .set_parameter(a, "text", ParameterValue::String("A2".into()))
            .unwrap();
        assert!(session.needs_to_cook(a).unwrap());
        assert!(session.needs_to_cook(b).unwrap());
        assert_eq!(session.eval(b).unwrap(), vec!["A2", "B"]);
    }

    #[test]
    fn test_content_hash_short_circuits_upstream_churn() {
        // a -> join -> b; only a and b are content-hashed
        let mut session = testing::session();
        let a = text(&mut session, "a", "A");
        let join = session.create("join", None, ROOT).unwrap();
        let b = text(&mut session, "b", "B");
        session.set_input(join, 0, a, 0).unwrap();
        session.set_input(b, 0, join, 0).unwrap();
        assert_eq!(session.eval(b).unwrap(), vec!["A", "B"]);

        // Same effective value: join recooks, but b sees identical data.
        session
            .set_parameter(a, "text", ParameterValue::String("`'A'`".into()))
            .unwrap();
        assert!(session.needs_to_cook(join).unwrap());
        session.eval(b).unwrap();
        assert_eq!(session.node(a).unwrap().cook_count(), 1);
        assert_eq!(session.node(join).unwrap().cook_count(), 2);
        assert_eq!(session.node(b).unwrap().cook_count(), 1);
        assert_eq!(session.node(b).unwrap().state(), CookState::Unchanged);

        session
            .set_parameter(a, "text", ParameterValue::String("A2".into()))
            .unwrap();
        assert_eq!(session.eval(b).unwrap(), vec!["A2", "B"]);
        assert_eq!(session.node(b).unwrap().cook_count(), 2);
    }

    #[test]
    fn test_force_and_time_dependent() {
        let mut session = testing::session();
        let ticker = session.create("ticker", None, ROOT).unwrap();
        let b = text(&mut session, "b", "");
        session.set_input(b, 0, ticker, 0).unwrap();

        assert_eq!(session.eval(b).unwrap(), vec!["1"]);
        assert!(session.needs_to_cook(ticker).unwrap());
        assert_eq!(session.eval(b).unwrap(), vec!["2"]);

        let a = text(&mut session, "a", "A");
        session.eval(a).unwrap();
        session.cook(a, true).unwrap();
        assert_eq!(session.node(a).unwrap().cook_count(), 2);
    }

    #[test]
    fn test_multi_output_slots() {
        let mut session = testing::session();
        let a = text(&mut session, "a", "x,y,z");
        let split = session.create("head_tail", None, ROOT).unwrap();
        let tail = text(&mut session, "tail", "");
        session.set_input(split, 0, a, 0).unwrap();
        let conn = session.set_input(tail, 0, split, 1).unwrap();

        assert_eq!(session.eval_output(split, 0).unwrap(), vec!["x"]);
        assert_eq!(session.eval_connection(conn).unwrap(), vec!["y", "z"]);
        assert_eq!(session.eval(tail).unwrap(), vec!["y", "z"]);
    }

    #[test]
    fn test_errors_leave_node_uncooked() {
        let mut session = testing::session();
        let a = text(&mut session, "a", "`1 / 0`");
        let b = text(&mut session, "b", "B");
        session.set_input(b, 0, a, 0).unwrap();

        session.cook(b, false).unwrap();
        let node = session.node(a).unwrap();
        assert_eq!(node.state(), CookState::Uncooked);
        assert_eq!(node.errors().len(), 1);
        assert!(session.needs_to_cook(a).unwrap());
        // downstream still cooked with what it had
        assert_eq!(session.node(b).unwrap().output_slot(0), &["B".to_string()]);
    }

    #[test]
    fn test_warnings_keep_node_unchanged() {
        let mut session = testing::session();
        let a = text(&mut session, "a", "$MISSING");
        session.eval(a).unwrap();
        let node = session.node(a).unwrap();
        assert_eq!(node.state(), CookState::Unchanged);
        assert_eq!(node.warnings().len(), 1);
        assert!(node.errors().is_empty());
    }

    #[test]
    fn test_disabled_node_passes_first_input() {
        let mut session = testing::session();
        let a = text(&mut session, "a", "A");
        let b = text(&mut session, "b", "B");
        session.set_input(b, 0, a, 0).unwrap();
        session
            .set_parameter(b, params::ENABLED, ParameterValue::Toggle(false))
            .unwrap();
        assert!(!session.is_enabled(b).unwrap());
        assert_eq!(session.eval(b).unwrap(), vec!["A"]);

        let lone = text(&mut session, "lone", "L");
        session
            .set_parameter(lone, params::ENABLED, ParameterValue::Toggle(false))
            .unwrap();
        assert!(session.eval(lone).unwrap().is_empty());
    }

    #[test]
    fn test_global_change_dirties_everything() {
        let mut session = testing::session();
        let a = text(&mut session, "a", "$WHO");
        session.set_global("WHO", "me").unwrap();
        assert_eq!(session.eval(a).unwrap(), vec!["me"]);
        session.set_global("WHO", "you").unwrap();
        assert!(session.needs_to_cook(a).unwrap());
        assert_eq!(session.eval(a).unwrap(), vec!["you"]);
    }
}
