//! Compile-time dependency injection macros for KuzuMem.
//!
//! This crate provides derive macros for DI:
//! - `#[derive(Context)]` for the application root, making each field
//!   extractable by type
//! - `#[derive(FromContext)]` for services resolved from that root
//!
//! The `FromRef` trait must be defined in the consuming crate or imported
//! from a shared crate. By default, generated code references `crate::FromRef`.

use proc_macro::TokenStream;

mod context;
mod from_context;

/// Derive macro for creating a DI context.
///
/// When applied to a struct, generates `FromRef` implementations for each
/// field type, allowing them to be extracted from the context.
///
/// # Requirements
///
/// - All fields must implement `Clone`
/// - The struct itself should derive `Clone`
///
/// # Example
///
/// ```ignore
/// use di_macros::{Context, FromRef};
///
/// #[derive(Context, Clone)]
/// pub struct AppContext {
///     pub handles: HandleManager,
///     pub config: Arc<Config>,
///     pub projects: ProjectRegistry,
/// }
///
/// // Generated implementations:
/// // impl FromRef<AppContext> for HandleManager { ... }
/// // impl FromRef<AppContext> for Arc<Config> { ... }
/// // impl FromRef<AppContext> for ProjectRegistry { ... }
/// ```
#[proc_macro_derive(Context)]
pub fn derive_context(input: TokenStream) -> TokenStream {
    context::derive_context_impl(input)
}

/// Derive macro for types that can be constructed from a context.
///
/// When applied to a struct, generates a `FromRef<Context>` implementation
/// that resolves each field by calling `FromRef::from_ref` on the context.
///
/// # Requirements
///
/// - Each field type must implement `FromRef<Context>`
/// - The context type defaults to `Context` but can be overridden with
///   `#[from_context(Context = "AppContext")]`
///
/// # Example
///
/// ```ignore
/// use di_macros::{FromContext, FromRef};
///
/// #[derive(FromContext, Clone)]
/// #[from_context(Context = "AppContext")]
/// pub struct MemoryService {
///     handles: HandleManager, // resolved via HandleManager::from_ref(ctx)
///     config: Arc<Config>,    // resolved via Arc::<Config>::from_ref(ctx)
/// }
///
/// // Generated implementation:
/// // impl FromRef<AppContext> for MemoryService {
/// //     fn from_ref(ctx: &AppContext) -> Self {
/// //         Self {
/// //             handles: HandleManager::from_ref(ctx),
/// //             config: Arc::<Config>::from_ref(ctx),
/// //         }
/// //     }
/// // }
/// ```
#[proc_macro_derive(FromContext, attributes(from_context))]
pub fn derive_from_context(input: TokenStream) -> TokenStream {
    from_context::derive_from_context_impl(input)
}
