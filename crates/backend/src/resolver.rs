//! Symbolic block reference resolution.

use std::sync::Arc;

use wisp_core::block_ref::BlockRef;
use wisp_core::store::ChainStore;
use wisp_core::types::Header;

/// Resolves a [`BlockRef`] to at most one concrete header.
///
/// Purely local: the chain store tracks headers itself, so resolution never
/// touches the network. `Latest` and `Pending` both map to the committed
/// head, since a light node has no local pending state to expose.
pub struct HeadResolver {
    store: Arc<dyn ChainStore>,
}

impl HeadResolver {
    pub fn new(store: Arc<dyn ChainStore>) -> Self {
        Self { store }
    }

    /// Header for `block_ref`, or `None` if the reference is out of range.
    pub fn resolve(&self, block_ref: BlockRef) -> Option<Header> {
        match block_ref {
            BlockRef::Latest | BlockRef::Pending => Some(self.store.current_header()),
            BlockRef::Number(number) => self.store.header_by_number(number),
        }
    }
}
