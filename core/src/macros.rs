/// Implements `Debug` for a type by printing its type name.
///
/// Useful for types that hold closures or host handles whose contents are not
/// meaningful to print.
#[macro_export]
macro_rules! impl_debug {
    ($ty:ty) => {
        impl core::fmt::Debug for $ty {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(core::any::type_name::<Self>())
            }
        }
    };
}
