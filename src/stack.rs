//! The execution stack

/// A single stack cell. Each cell owns the one below it, so the whole
/// stack is freed by dropping the top.
struct Node {
    value: i64,
    next: Option<Box<Node>>,
}

/// Growable LIFO stack of signed integers.
///
/// Built as a chain of owned nodes instead of a fixed array, so the stack
/// itself has no capacity limit. The engine enforces the configured
/// overflow limit as a policy check before each cycle.
#[derive(Default)]
pub struct Stack {
    top: Option<Box<Node>>,
    size: usize,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    /// Number of values currently on the stack.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Push `value` as the new top.
    pub fn push(&mut self, value: i64) {
        self.top = Some(Box::new(Node {
            value,
            next: self.top.take(),
        }));
        self.size += 1;
    }

    /// Remove and return the top value, or `None` if the stack is empty.
    pub fn pop(&mut self) -> Option<i64> {
        self.top.take().map(|node| {
            self.top = node.next;
            self.size -= 1;
            node.value
        })
    }

    /// Return the top value without removing it.
    pub fn top(&self) -> Option<i64> {
        self.top.as_ref().map(|node| node.value)
    }

    /// Contents from top to bottom, for diagnostic dumps.
    pub fn to_vec(&self) -> Vec<i64> {
        let mut values = Vec::with_capacity(self.size);
        let mut cursor = self.top.as_deref();
        while let Some(node) = cursor {
            values.push(node.value);
            cursor = node.next.as_deref();
        }
        values
    }
}

impl Drop for Stack {
    // The default recursive drop of a long node chain can blow the call
    // stack, so unlink iteratively.
    fn drop(&mut self) {
        let mut cursor = self.top.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
        }
    }
}
