use std::cell::RefCell;
use std::rc::Rc;

/// Which script chunk is currently running, so log lines can be attributed.
#[derive(Debug, Default)]
pub struct ScriptLogContext {
    stack: Vec<String>,
}

pub(crate) type SharedLogContext = Rc<RefCell<ScriptLogContext>>;

impl ScriptLogContext {
    pub fn push(&mut self, chunk: impl Into<String>) {
        self.stack.push(chunk.into());
    }

    /// Restores whatever chunk was active before the last push.
    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    pub fn current(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

pub(crate) fn chunk_label(context: &SharedLogContext) -> String {
    context
        .borrow()
        .current()
        .unwrap_or("<no script>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_restores_previous_chunk() {
        let mut context = ScriptLogContext::default();
        context.push("outer.rhai");
        context.push("inner.rhai");
        assert_eq!(context.current(), Some("inner.rhai"));
        assert_eq!(context.pop().as_deref(), Some("inner.rhai"));
        assert_eq!(context.current(), Some("outer.rhai"));
        context.pop();
        assert_eq!(context.current(), None);
    }
}
