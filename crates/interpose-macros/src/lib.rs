//! # Interpose Macros
//!
//! Procedural macros for declaring interceptable capability surfaces.
//!
//! ## Usage
//!
//! The `#[surface]` attribute turns a trait into a capability surface: the
//! trait is kept as written (with `Send + Sync` supertraits added when
//! missing) and the macro generates the operation table and the forwarding
//! proxy used by `interpose::Plugin::wrap`.
//!
//! ```ignore
//! use interpose::surface;
//!
//! #[surface]
//! pub trait OrderService {
//!     fn charge(&self, order: Order) -> Result<Receipt, PaymentError>;
//!     fn refund(&self, order_id: u64, amount: i64) -> Result<(), PaymentError>;
//! }
//! ```
//!
//! ## Restrictions
//!
//! - methods take `&self` and owned `Send + 'static` arguments (no borrowed
//!   parameters) and return `Send + 'static` values
//! - no generics, associated types or constants, async or unsafe methods
//! - no supertraits besides `Send` and `Sync`
//!
//! Violations are reported as compile errors on the offending item.

use proc_macro::TokenStream;
use syn::ItemTrait;

mod attrs;
mod surface;

/// Declares a trait as an interceptable capability surface.
///
/// # Attributes
///
/// - `name = "OrderService"` - surface name used by textual signatures
///   (defaults to the trait name)
/// - `crate = "path::to::interpose"` - runtime crate path for re-exports
///
/// # Example
///
/// ```ignore
/// #[surface(name = "accounts")]
/// pub trait AccountService {
///     fn withdraw(&self, account: Account, amount: i64) -> Result<i64, AccountError>;
/// }
/// ```
#[proc_macro_attribute]
pub fn surface(args: TokenStream, input: TokenStream) -> TokenStream {
    let attrs = match attrs::SurfaceAttrs::from_args(args.into()) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let item = match syn::parse::<ItemTrait>(input) {
        Ok(item) => item,
        Err(err) => return err.to_compile_error().into(),
    };

    match surface::expand(&attrs, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
