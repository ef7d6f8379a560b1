//! Ordered, append-only record of frozen input blocks and their output.
//!
//! The transcript is structured data only; how it is painted is the
//! front-end's problem. Items appear strictly in submission/arrival order
//! and past items are never mutated, so readers may hold indices across
//! appends. Each frozen block receives a monotonic id and one stable
//! anchor per physical line (`"block:line"`) usable for external linking.

use tracing::warn;

/// Monotonic id of a frozen input block, starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What kind of result a block produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultKind {
    /// No displayable value (the runtime returned an empty payload).
    #[default]
    None,
    /// Ordinary result value.
    Value,
    /// Runtime-reported error, rendered like a value but tagged.
    Error,
}

/// Which output stream a chunk of incremental text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Out,
    Err,
}

/// A frozen input block. Immutable once its result is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub lines: Vec<String>,
    /// One stable `"block:line"` anchor per physical line.
    pub anchors: Vec<String>,
    pub result: Option<String>,
    pub result_kind: ResultKind,
}

/// One entry in the transcript, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptItem {
    Block(Block),
    /// Incremental output produced during an evaluation.
    Stream { kind: StreamKind, text: String },
    /// Protocol-level failure marker: the evaluation was abandoned and the
    /// session recovered. Distinct from runtime errors, never dropped.
    ProtocolFailure { note: String },
}

/// Append-only transcript store.
#[derive(Debug, Default)]
pub struct Transcript {
    items: Vec<TranscriptItem>,
    next_block: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes a submitted block and assigns its id and line anchors.
    ///
    /// Blocks are frozen exactly once; there is no API to re-freeze or
    /// reorder, which keeps the transcript strictly submission-ordered.
    pub fn freeze(&mut self, lines: Vec<String>) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        let anchors = (0..lines.len()).map(|n| format!("{id}:{n}")).collect();
        self.items.push(TranscriptItem::Block(Block {
            id,
            lines,
            anchors,
            result: None,
            result_kind: ResultKind::None,
        }));
        id
    }

    /// Attaches the final result to a frozen block.
    ///
    /// A second result for the same block is a protocol bug upstream; it
    /// is logged and ignored rather than overwriting history.
    pub fn append_result(&mut self, id: BlockId, text: &str, kind: ResultKind) {
        let Some(block) = self.block_mut(id) else {
            warn!(block = %id, "result for unknown block dropped");
            return;
        };
        if block.result.is_some() || block.result_kind != ResultKind::None {
            warn!(block = %id, "duplicate result for block dropped");
            return;
        }
        block.result = Some(text.to_string());
        block.result_kind = kind;
    }

    /// Appends incremental stream output in arrival order.
    pub fn append_stream(&mut self, kind: StreamKind, text: &str) {
        self.items.push(TranscriptItem::Stream {
            kind,
            text: text.to_string(),
        });
    }

    /// Appends the visible marker for a recovered protocol failure.
    pub fn mark_protocol_failure(&mut self, note: &str) {
        self.items.push(TranscriptItem::ProtocolFailure {
            note: note.to_string(),
        });
    }

    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.items.iter().find_map(|item| match item {
            TranscriptItem::Block(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.items.iter_mut().find_map(|item| match item {
            TranscriptItem::Block(b) if b.id == id => Some(b),
            _ => None,
        })
    }
}
