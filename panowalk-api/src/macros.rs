//! Internal macros for the API crate

/// Implement `FromRef<AppState>` for one state field, so handlers can
/// extract exactly the piece they need.
macro_rules! impl_from_ref {
    ($ty:ty, $field:ident) => {
        impl axum::extract::FromRef<crate::state::AppState> for $ty {
            fn from_ref(state: &crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
