//! Patch flags: per-node hints telling the reconciler which attribute categories may
//! have changed between two renders.

bitflags::bitflags! {
    /// Attribute diff categories a [`VNode`](crate::vnode::VNode) may need.
    ///
    /// An empty set means "no attribute diff needed". It never means the children are
    /// unchanged; the reconciler always walks children.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PatchFlags: u8 {
        /// The element has interpolated text children.
        const TEXT = 1;
        /// The `class` attribute is bound.
        const CLASS = 1 << 1;
        /// The `style` attribute is bound.
        const STYLE = 1 << 2;
        /// At least one other attribute is bound.
        const PROPS = 1 << 3;
        /// The attribute set itself may change: stale attributes must be removed.
        const FULL_PROPS = 1 << 4;
        /// Event listeners must be rebound.
        const HYDRATE = 1 << 5;
    }
}

impl PatchFlags {
    /// Whether attributes other than `class`/`style` need diffing.
    #[must_use]
    pub const fn needs_props(self) -> bool {
        self.intersects(Self::PROPS.union(Self::FULL_PROPS))
    }
}
