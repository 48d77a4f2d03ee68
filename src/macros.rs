pub use enclose::enclose;

/// Build a [`Derived`](crate::Derived) cell from named source handles.
///
/// The listed cells become the sources of the new cell and are cloned
/// into its function:
///
/// ```
/// use geoconstruct::{derived, Source};
///
/// let a = Source::new(1);
/// let b = Source::new(2);
/// let sum = derived!((a, b) => Some(*a.get() + *b.get()));
/// assert_eq!(sum.get_cloned(), Some(3));
/// ```
#[macro_export]
macro_rules! derived {
    ($name:literal, ( $($src:ident),* ) => $($b:tt)*) => {
        $crate::Derived::named(
            $name,
            vec![$($crate::Cell::node(&$src)),*],
            $crate::macros::enclose!(($( $src ),*) Box::new(move || { $($b)* })),
        )
    };
    (( $($src:ident),* ) => $($b:tt)*) => {
        $crate::Derived::new(
            vec![$($crate::Cell::node(&$src)),*],
            $crate::macros::enclose!(($( $src ),*) Box::new(move || { $($b)* })),
        )
    };
}
