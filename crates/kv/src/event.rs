//! Mutation events captured during a transaction.
//!
//! The transaction session appends one event per successful mutation, in
//! program order. After a successful commit the post-commit hooks drain
//! the buffer and fan the events out (e.g. to the search indexer). A
//! rolled-back transaction's events are never consumed.

/// The kind of mutation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    /// New row; failed if the key already existed.
    Insert,
    /// Unconditional write.
    Replace,
    /// Read-modify-write of an existing row.
    Update,
    /// Point delete.
    Delete,
    /// Range update.
    UpdateRange,
    /// Range delete.
    DeleteRange,
}

/// A recorded KV mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Mutation kind.
    pub op: OpType,
    /// Table prefix the mutation hit.
    pub table: Vec<u8>,
    /// Full packed KV key (for range ops, the left edge).
    pub key: Vec<u8>,
    /// Left edge of a range op.
    pub lkey: Option<Vec<u8>>,
    /// Right edge of a range op.
    pub rkey: Option<Vec<u8>>,
    /// Encoded value written, absent for deletes and clears.
    pub data: Option<Vec<u8>>,
    /// Marks the final event of a logical batch.
    pub last: bool,
}

/// Transaction-scoped sink for mutation events.
pub trait EventListener: Send {
    /// Records a point mutation.
    fn on_set(&mut self, op: OpType, table: &[u8], key: &[u8], data: Option<&[u8]>);

    /// Records a range mutation.
    fn on_clear_range(&mut self, op: OpType, table: &[u8], lkey: &[u8], rkey: &[u8]);

    /// The events recorded so far, in append order.
    fn events(&self) -> &[Event];

    /// Drains the recorded events.
    fn take_events(&mut self) -> Vec<Event>;
}

/// The default listener: buffers every event in append order.
#[derive(Debug, Default)]
pub struct BufferingListener {
    events: Vec<Event>,
}

impl BufferingListener {
    /// Creates an empty listener.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventListener for BufferingListener {
    fn on_set(&mut self, op: OpType, table: &[u8], key: &[u8], data: Option<&[u8]>) {
        self.events.push(Event {
            op,
            table: table.to_vec(),
            key: key.to_vec(),
            lkey: None,
            rkey: None,
            data: data.map(<[u8]>::to_vec),
            last: false,
        });
    }

    fn on_clear_range(&mut self, op: OpType, table: &[u8], lkey: &[u8], rkey: &[u8]) {
        self.events.push(Event {
            op,
            table: table.to_vec(),
            key: lkey.to_vec(),
            lkey: Some(lkey.to_vec()),
            rkey: Some(rkey.to_vec()),
            data: None,
            last: false,
        });
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

/// Discards everything. Used on paths that must not produce search
/// activity.
#[derive(Debug, Default)]
pub struct NoopListener;

impl EventListener for NoopListener {
    fn on_set(&mut self, _op: OpType, _table: &[u8], _key: &[u8], _data: Option<&[u8]>) {}

    fn on_clear_range(&mut self, _op: OpType, _table: &[u8], _lkey: &[u8], _rkey: &[u8]) {}

    fn events(&self) -> &[Event] {
        &[]
    }

    fn take_events(&mut self) -> Vec<Event> {
        Vec::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_buffering_preserves_order() {
        let mut listener = BufferingListener::new();
        listener.on_set(OpType::Insert, b"t", b"k1", Some(b"v1"));
        listener.on_set(OpType::Update, b"t", b"k2", Some(b"v2"));
        listener.on_set(OpType::Delete, b"t", b"k1", None);

        let events = listener.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].op, OpType::Insert);
        assert_eq!(events[1].op, OpType::Update);
        assert_eq!(events[2].op, OpType::Delete);
        assert_eq!(events[2].data, None);
    }

    #[test]
    fn test_clear_range_sets_edges() {
        let mut listener = BufferingListener::new();
        listener.on_clear_range(OpType::DeleteRange, b"t", b"a", b"z");
        let events = listener.take_events();
        assert_eq!(events[0].lkey.as_deref(), Some(&b"a"[..]));
        assert_eq!(events[0].rkey.as_deref(), Some(&b"z"[..]));
        assert_eq!(events[0].key, b"a");
        assert!(listener.events().is_empty());
    }

    #[test]
    fn test_noop_discards() {
        let mut listener = NoopListener;
        listener.on_set(OpType::Insert, b"t", b"k", Some(b"v"));
        assert!(listener.events().is_empty());
        assert!(listener.take_events().is_empty());
    }
}
