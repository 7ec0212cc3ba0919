//! Attribute parsing for the `#[surface]` macro
//!
//! Accepts a comma separated list of `key = "value"` items:
//! - `name = "OrderService"` overrides the surface name used for lookups
//! - `crate = "my_reexport::interpose"` points generated code at a re-export

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Expr, Lit, Path, Token,
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
};

/// Parsed `#[surface(...)]` arguments
#[derive(Debug, Default)]
pub struct SurfaceAttrs {
    pub name: Option<String>,
    pub krate: Option<Path>,
}

impl SurfaceAttrs {
    /// Parse from the macro attribute arguments
    pub fn from_args(args: TokenStream) -> syn::Result<Self> {
        let mut attrs = SurfaceAttrs::default();

        if args.is_empty() {
            return Ok(attrs);
        }

        let parsed = syn::parse2::<SurfaceAttrArgs>(args)?;

        for item in parsed.items {
            let value = item.string_value()?;
            match item.key.as_str() {
                "name" => {
                    if value.trim().is_empty() {
                        return Err(syn::Error::new_spanned(
                            &item.value,
                            "surface name must not be empty",
                        ));
                    }
                    attrs.name = Some(value);
                }
                "crate" => {
                    attrs.krate = Some(syn::parse_str::<Path>(&value).map_err(|e| {
                        syn::Error::new_spanned(&item.value, format!("invalid crate path: {e}"))
                    })?);
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        &item.value,
                        format!("unknown surface attribute `{other}`, expected `name` or `crate`"),
                    ));
                }
            }
        }

        Ok(attrs)
    }

    /// Path generated code uses to reach the runtime crate
    pub fn crate_path(&self) -> TokenStream {
        match &self.krate {
            Some(path) => quote! { #path },
            None => quote! { ::interpose },
        }
    }
}

/// A single attribute item (key = value)
struct AttrItem {
    key: String,
    value: Expr,
}

impl AttrItem {
    fn string_value(&self) -> syn::Result<String> {
        match &self.value {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(s) => Ok(s.value()),
                _ => Err(syn::Error::new_spanned(&self.value, "expected a string literal")),
            },
            _ => Err(syn::Error::new_spanned(&self.value, "expected a string literal")),
        }
    }
}

impl Parse for AttrItem {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        // `crate` is a keyword, so it cannot be parsed as a plain identifier
        let key = if input.peek(Token![crate]) {
            input.parse::<Token![crate]>()?;
            "crate".to_string()
        } else {
            input.parse::<syn::Ident>()?.to_string()
        };
        input.parse::<Token![=]>()?;
        Ok(AttrItem {
            key,
            value: input.parse()?,
        })
    }
}

struct SurfaceAttrArgs {
    items: Vec<AttrItem>,
}

impl Parse for SurfaceAttrArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let items = Punctuated::<AttrItem, Token![,]>::parse_terminated(input)?
            .into_iter()
            .collect();
        Ok(SurfaceAttrArgs { items })
    }
}
