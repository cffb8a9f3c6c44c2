use std::fmt;

/// A typed path into an [`AppContext`](super::AppContext) tree.
pub trait Handle: fmt::Debug {
    fn path(&self) -> &str;
}

macro_rules! handle {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub(super) String);

        impl Handle for $name {
            fn path(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

handle!(
    /// The root of one deployment's context, `/context/{id}/`.
    CompositeAppHandle
);
handle!(AppHandle);
handle!(ClusterHandle);
handle!(ResourceHandle);
handle!(
    /// An instruction document, such as an app or resource order.
    InstructionHandle
);
